use std::{collections::HashMap, env, path::Path};

use executors::RunnerConfig;
use thiserror::Error;

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Variables from `.env` that the process environment does not already define.
    pub dotenv: Vec<(String, String)>,
    pub log_filter: String,
    pub sentry_dsn: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read .env file: {0}")]
    DotEnv(#[from] dotenv::Error),
}

impl ServerConfig {
    /// Load from the process environment plus the nearest `.env`, searching
    /// upward from the current directory. A missing `.env` is fine.
    pub fn from_env() -> Result<Self, ConfigError> {
        let dotenv = match dotenv::dotenv_iter() {
            Ok(iter) => iter.collect::<Result<Vec<_>, _>>()?,
            Err(e) if e.not_found() => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self::from_sources(dotenv, |key| env::var(key).ok()))
    }

    /// Like [`ServerConfig::from_env`] but with an explicit `.env` location.
    pub fn from_env_file(path: &Path) -> Result<Self, ConfigError> {
        let dotenv = dotenv::from_path_iter(path)?.collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_sources(dotenv, |key| env::var(key).ok()))
    }

    /// Process variables win over `.env` ones; `.env` never overrides.
    fn from_sources(
        dotenv: Vec<(String, String)>,
        process: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let dotenv: Vec<_> = dotenv
            .into_iter()
            .filter(|(key, _)| process(key.as_str()).is_none())
            .collect();
        let file: HashMap<&str, &str> = dotenv
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let lookup = |key: &str| process(key).or_else(|| file.get(key).map(|v| v.to_string()));

        let log_filter = lookup("K6_MCP_LOG")
            .or_else(|| lookup("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let sentry_dsn = lookup("SENTRY_DSN").filter(|dsn| !dsn.trim().is_empty());

        Self {
            log_filter,
            sentry_dsn,
            dotenv,
        }
    }

    pub fn runner(&self) -> RunnerConfig {
        RunnerConfig {
            env: self.dotenv.clone(),
        }
    }
}
