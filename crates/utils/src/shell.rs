//! Executable lookup on the search path

use std::{
    collections::HashSet,
    env::{join_paths, split_paths},
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
};

use tokio::sync::OnceCell;

// PATH reported by the user's login shells, fetched at most once per process.
static FRESH_PATH: OnceCell<Option<OsString>> = OnceCell::const_new();

/// Resolve an executable by name, falling back to a refreshed PATH if needed.
///
/// The search order is:
/// 1. Explicit paths (absolute and pointing at a file).
/// 2. `search_path` if given, otherwise the current process PATH.
/// 3. Without an explicit `search_path`, the process PATH merged with the PATH
///    of the user's login shell (Unix only), which picks up tools installed
///    from shell profiles that a GUI-launched host never sees.
///
/// The process environment is never modified.
pub async fn resolve_executable_path(
    executable: &str,
    search_path: Option<&OsStr>,
) -> Option<PathBuf> {
    if executable.trim().is_empty() {
        return None;
    }

    let path = Path::new(executable);
    if path.is_absolute() && path.is_file() {
        return Some(path.to_path_buf());
    }

    if let Some(search_path) = search_path {
        return which_in(executable, search_path.to_os_string()).await;
    }

    let base = std::env::var_os("PATH").unwrap_or_default();
    if let Some(found) = which_in(executable, base.clone()).await {
        return Some(found);
    }

    if let Some(fresh) = fresh_path().await {
        let merged = merge_paths(&base, fresh);
        if merged != base {
            tracing::debug!(?base, ?merged, "Retrying executable lookup with login shell PATH");
            return which_in(executable, merged).await;
        }
    }

    None
}

/// Merge two PATH strings into a single, de-duplicated PATH.
///
/// - Keeps the order of entries from `primary`.
/// - Appends only *unseen* entries from `secondary`.
/// - Ignores empty components.
/// - Returns a platform-correct PATH string (using the OS separator).
pub fn merge_paths(primary: impl AsRef<OsStr>, secondary: impl AsRef<OsStr>) -> OsString {
    let mut seen = HashSet::<PathBuf>::new();
    let mut merged = Vec::<PathBuf>::new();

    for p in split_paths(primary.as_ref()).chain(split_paths(secondary.as_ref())) {
        if !p.as_os_str().is_empty() && seen.insert(p.clone()) {
            merged.push(p);
        }
    }

    join_paths(merged).unwrap_or_default()
}

async fn which_in(executable: &str, search_path: OsString) -> Option<PathBuf> {
    let executable = executable.to_string();
    tokio::task::spawn_blocking(move || {
        let cwd = std::env::current_dir().unwrap_or_default();
        which::which_in(executable, Some(search_path), cwd)
    })
    .await
    .ok()
    .and_then(|result| result.ok())
}

async fn fresh_path() -> Option<&'static OsString> {
    FRESH_PATH.get_or_init(get_fresh_path).await.as_ref()
}

#[cfg(not(windows))]
async fn get_fresh_path() -> Option<OsString> {
    use std::time::Duration;

    use tokio::process::Command;

    async fn run(shell: &Path, login: bool) -> Option<String> {
        let mut cmd = Command::new(shell);
        if login {
            cmd.arg("-l");
        }
        cmd.arg("-c")
            .arg("printf '%s' \"$PATH\"")
            .env("TERM", "dumb")
            .kill_on_drop(true);

        const PATH_REFRESH_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

        let child = cmd
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .ok()?;
        let output = match tokio::time::timeout(
            PATH_REFRESH_COMMAND_TIMEOUT,
            child.wait_with_output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                tracing::debug!(
                    shell = %shell.display(),
                    ?err,
                    "Failed to retrieve PATH from login shell"
                );
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    shell = %shell.display(),
                    timeout_secs = PATH_REFRESH_COMMAND_TIMEOUT.as_secs(),
                    "Timed out retrieving PATH from login shell"
                );
                return None;
            }
        };

        if !output.status.success() {
            return None;
        }
        let path = String::from_utf8(output.stdout).ok()?.trim().to_string();
        if path.is_empty() { None } else { Some(path) }
    }

    let mut paths = Vec::new();

    let shells = vec![
        (PathBuf::from("/bin/zsh"), true),
        (PathBuf::from("/bin/bash"), true),
        (PathBuf::from("/bin/sh"), false),
    ];

    let mut current_shell_name = None;
    if let Ok(shell) = std::env::var("SHELL") {
        let path = Path::new(&shell);
        if path.is_absolute() && path.is_file() {
            current_shell_name = path.file_name().and_then(OsStr::to_str).map(String::from);
            if let Some(path) = run(path, true).await {
                paths.push(path);
            }
        }
    }

    for (shell_path, login) in shells {
        if !shell_path.exists() {
            continue;
        }
        let shell_name = shell_path
            .file_name()
            .and_then(OsStr::to_str)
            .map(String::from);
        if current_shell_name != shell_name
            && let Some(path) = run(&shell_path, login).await
        {
            paths.push(path);
        }
    }

    paths
        .into_iter()
        .map(OsString::from)
        .reduce(|a, b| merge_paths(&a, &b))
}

// Windows hosts inherit the registry PATH at process start; nothing to refresh.
#[cfg(windows)]
async fn get_fresh_path() -> Option<OsString> {
    None
}
