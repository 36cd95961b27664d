//! Argument-vector command building for the k6 runner

use std::{
    ffi::{OsStr, OsString},
    path::Path,
    process::{Output, Stdio},
};

use tokio::process::Command;

/// Builder around [`tokio::process::Command`] that remembers what it was given,
/// so the exact invocation can be logged before it runs.
///
/// Arguments are passed to the child as a vector; nothing is interpreted by a
/// shell, so metacharacters in durations or paths are inert.
pub struct CommandBuilder {
    command: Command,
    program: OsString,
    args: Vec<OsString>,
}

impl CommandBuilder {
    /// Create a new command builder for a given program
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        let mut command = Command::new(&program);
        command
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        Self {
            command,
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
        }
    }

    /// Add an argument to the command
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.command.arg(&arg);
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Set the working directory
    pub fn current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.command.current_dir(dir);
        self
    }

    /// Add environment variables on top of the inherited environment
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.command.envs(vars);
        self
    }

    /// The invocation as a single shell-quoted line, for diagnostics only.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy().shell_escape())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Spawn the process and wait for it to exit, collecting both streams.
    pub async fn output(mut self) -> std::io::Result<Output> {
        self.command.output().await
    }
}

/// Helper trait for escaping shell arguments safely
trait ShellEscape {
    fn shell_escape(&self) -> String;
}

impl ShellEscape for str {
    fn shell_escape(&self) -> String {
        if cfg!(windows) {
            if self.contains(|c: char| c.is_whitespace() || "\"^%!<>&|()".contains(c)) {
                format!("\"{}\"", self.replace('"', "\"\""))
            } else {
                self.to_string()
            }
        } else if self.is_empty() {
            "''".to_string()
        } else if self.contains('\'') {
            // End the quote, emit an escaped quote, reopen
            format!("'{}'", self.replace('\'', "'\"'\"'"))
        } else if self
            .chars()
            .all(|c| c.is_alphanumeric() || "._-/=:_".contains(c))
        {
            self.to_string()
        } else {
            format!("'{}'", self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_escape_unix() {
        if !cfg!(windows) {
            assert_eq!("hello".shell_escape(), "hello");
            assert_eq!("10s:50".shell_escape(), "10s:50");
            assert_eq!("/var/folders/x_y/T/ok.js".shell_escape(), "/var/folders/x_y/T/ok.js");
            assert_eq!("hello world".shell_escape(), "'hello world'");
            assert_eq!("it's".shell_escape(), "'it'\"'\"'s'");
            assert_eq!("$PATH".shell_escape(), "'$PATH'");
            assert_eq!("".shell_escape(), "''");
            assert_eq!("/path/to/file.js".shell_escape(), "/path/to/file.js");
        }
    }

    #[test]
    fn test_shell_escape_windows() {
        if cfg!(windows) {
            assert_eq!("hello".shell_escape(), "hello");
            assert_eq!("hello world".shell_escape(), "\"hello world\"");
            assert_eq!("path\\to\\file".shell_escape(), "path\\to\\file");
            assert_eq!("say \"hello\"".shell_escape(), "\"say \"\"hello\"\"\"");
        }
    }

    #[test]
    fn display_quotes_paths_with_spaces() {
        if !cfg!(windows) {
            let builder = CommandBuilder::new("/opt/k6 tools/k6")
                .args(["run", "-d", "30s", "-u", "10"])
                .arg("/home/me/load tests/ok.js");
            assert_eq!(
                builder.display(),
                "'/opt/k6 tools/k6' run -d 30s -u 10 '/home/me/load tests/ok.js'"
            );
        }
    }
}
