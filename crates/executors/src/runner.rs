use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use thiserror::Error;
use utils::shell::resolve_executable_path;

use crate::{command_builder::CommandBuilder, profile::LoadProfile, script::ScriptPath};

/// k6 is always looked up by this name on the search path.
pub const K6_BINARY: &str = "k6";

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Error: Script file not found: {0}")]
    NotFound(String),
    #[error("Error: Invalid file type. Expected .js file: {0}")]
    InvalidType(String),
    #[error("Error executing k6 {label}:\n{stderr}")]
    Execution { label: &'static str, stderr: String },
    #[error("Unexpected error: {0} executable not found on PATH")]
    ExecutableNotFound(&'static str),
    #[error("Unexpected error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunError {
    /// Validation failures are detected before anything is spawned.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidType(_))
    }
}

/// Settings the runner needs from its host, passed explicitly instead of
/// being read from the process environment on every call.
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    /// Extra variables for the k6 process, layered over the inherited
    /// environment. A `PATH` entry here is also used to locate k6.
    pub env: Vec<(String, String)>,
}

impl RunnerConfig {
    fn search_path(&self) -> Option<OsString> {
        self.env
            .iter()
            .rev()
            .find(|(key, _)| key == "PATH")
            .map(|(_, value)| OsString::from(value))
    }
}

/// Runs k6 scripts. Each call validates, spawns and awaits its own process;
/// nothing is shared or cached between calls.
#[derive(Debug, Clone, Default)]
pub struct K6Runner {
    config: RunnerConfig,
}

impl K6Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Run `script` with `profile` and always return text: k6's stdout on
    /// success, otherwise the rendered error.
    pub async fn run(&self, script: &str, profile: &LoadProfile) -> String {
        self.try_run(script, profile)
            .await
            .unwrap_or_else(|err| err.to_string())
    }

    /// Like [`K6Runner::run`] but keeps the typed error. Failures other than
    /// validation are logged here.
    pub async fn try_run(&self, script: &str, profile: &LoadProfile) -> Result<String, RunError> {
        self.execute(script, profile).await.inspect_err(|err| {
            if !err.is_validation() {
                tracing::warn!(script, mode = profile.label(), "k6 run failed: {err}");
            }
        })
    }

    async fn execute(&self, script: &str, profile: &LoadProfile) -> Result<String, RunError> {
        let cwd = std::env::current_dir()?;
        let script = ScriptPath::resolve(script, &cwd)?;
        tracing::debug!(
            script = script.raw(),
            resolved = %script.as_path().display(),
            "Resolved k6 script"
        );

        let k6 = self.locate_k6().await;
        let command = self.build_command(
            k6.as_deref().unwrap_or(Path::new(K6_BINARY)),
            &script,
            profile,
            &cwd,
        );

        tracing::info!(
            "Executing k6 {} command: {}",
            profile.label(),
            command.display()
        );

        if k6.is_none() {
            return Err(RunError::ExecutableNotFound(K6_BINARY));
        }

        let output = command.output().await?;

        if !output.status.success() {
            tracing::debug!(status = %output.status, "k6 exited unsuccessfully");
            return Err(RunError::Execution {
                label: profile.label(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn locate_k6(&self) -> Option<PathBuf> {
        let search_path = self.config.search_path();
        resolve_executable_path(K6_BINARY, search_path.as_deref()).await
    }

    fn build_command(
        &self,
        k6: &Path,
        script: &ScriptPath,
        profile: &LoadProfile,
        cwd: &Path,
    ) -> CommandBuilder {
        CommandBuilder::new(k6)
            .args(profile.args())
            .arg(script.as_path())
            .current_dir(cwd)
            .envs(self.config.env.iter().map(|(k, v)| (k, v)))
    }
}
