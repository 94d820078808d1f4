//! Bounded invocation of external command-line tools
//!
//! Every call carries its own timeout. A child that outlives it is killed
//! (`kill_on_drop`) when the wait is abandoned, so nothing is left running.

use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::error::ToolError;

/// Captured outcome of one finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommandResult {
    pub stdout: String,
    pub stderr: String,
    /// Exit status, or -1 when the process was terminated by a signal
    pub exit_code: i32,
}

impl ExternalCommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit into `NonZeroExit`, keeping stderr as the message
    pub fn into_checked(self, program: &str) -> Result<Self, ToolError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ToolError::NonZeroExit {
                program: program.to_string(),
                code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }

    /// stderr if present, otherwise stdout; both trimmed
    pub fn diagnostic(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() { self.stdout.trim() } else { stderr }
    }
}

/// A program, its arguments, optional stdin script and a time bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    argv: Vec<String>,
    stdin: Option<String>,
    timeout: Duration,
    sensitive: bool,
}

impl Invocation {
    pub fn new<I, S>(argv: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            stdin: None,
            timeout,
            sensitive: false,
        }
    }

    /// Feed `input` to the child's stdin, then close it
    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Arguments carry a secret; keep them out of the logs
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    #[cfg(test)]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Run one program to completion or until its timeout expires.
///
/// A missing executable yields `NotFound`; expiry yields `Timeout` after the
/// child has been killed; any other spawn or I/O problem yields `Execution`.
/// A non-zero exit is not an error here, see [`ExternalCommandResult::into_checked`].
pub async fn invoke(invocation: &Invocation) -> Result<ExternalCommandResult, ToolError> {
    let Some((program, args)) = invocation.argv.split_first() else {
        return Err(ToolError::Execution {
            program: String::new(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty command line"),
        });
    };

    if invocation.sensitive {
        trace!(program = %program, args = args.len(), timeout_ms = invocation.timeout.as_millis() as u64, "Invoking tool");
    } else {
        trace!(program = %program, args = ?args, timeout_ms = invocation.timeout.as_millis() as u64, "Invoking tool");
    }

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if invocation.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ToolError::NotFound { program: program.clone() },
        _ => ToolError::Execution { program: program.clone(), source },
    })?;

    let stdin_pipe = child.stdin.take();
    let script = invocation.stdin.clone();
    let run = async move {
        if let (Some(mut pipe), Some(script)) = (stdin_pipe, script) {
            // An early exit closes the pipe; whatever it printed still counts
            match pipe.write_all(script.as_bytes()).await {
                Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e),
                _ => {}
            }
        }
        child.wait_with_output().await
    };

    // Dropping `run` on expiry drops the child, which kills it
    let output = match tokio::time::timeout(invocation.timeout, run).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(ToolError::Execution { program: program.clone(), source });
        }
        Err(_) => {
            debug!(program = %program, timeout_ms = invocation.timeout.as_millis() as u64, "Tool timed out, killed");
            return Err(ToolError::Timeout { program: program.clone(), after: invocation.timeout });
        }
    };

    let result = ExternalCommandResult {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
    };
    trace!(program = %program, exit_code = result.exit_code, "Tool finished");
    Ok(result)
}

/// Invoke and require a zero exit status
pub async fn invoke_checked(invocation: &Invocation) -> Result<ExternalCommandResult, ToolError> {
    invoke(invocation).await?.into_checked(invocation.program())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> Invocation {
        Invocation::new(["sh", "-c", script], Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_invoke_captures_streams_and_exit_code() {
        let result = invoke(&sh("printf out; printf err >&2; exit 3")).await.unwrap();
        assert_eq!(result.stdout, "out");
        assert_eq!(result.stderr, "err");
        assert_eq!(result.exit_code, 3);
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_invoke_missing_executable_is_not_found() {
        let inv = Invocation::new(["panelsync-definitely-not-installed", "--version"], Duration::from_secs(1));
        let err = invoke(&inv).await.unwrap_err();
        assert!(err.is_not_found(), "expected NotFound, got {err:?}");
        assert!(matches!(&err, ToolError::NotFound { program } if program == "panelsync-definitely-not-installed"));
    }

    #[tokio::test]
    async fn test_invoke_timeout_kills_child() {
        let inv = Invocation::new(["sleep", "5"], Duration::from_millis(100));
        let started = Instant::now();
        let err = invoke(&inv).await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }), "expected Timeout, got {err:?}");
        // Returned at the bound, not after the child's own sleep
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_invoke_feeds_stdin_script() {
        let inv = Invocation::new(["cat"], Duration::from_secs(5)).with_stdin("show\nexit\n");
        let result = invoke(&inv).await.unwrap();
        assert_eq!(result.stdout, "show\nexit\n");
        assert!(result.success());
    }

    #[tokio::test]
    async fn test_invoke_empty_argv_is_execution_error() {
        let inv = Invocation::new(Vec::<String>::new(), Duration::from_secs(1));
        let err = invoke(&inv).await.unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
    }

    #[tokio::test]
    async fn test_invoke_checked_reports_stderr() {
        let err = invoke_checked(&sh("echo 'Error: no such device' >&2; exit 10")).await.unwrap_err();
        match err {
            ToolError::NonZeroExit { program, code, stderr } => {
                assert_eq!(program, "sh");
                assert_eq!(code, 10);
                assert_eq!(stderr, "Error: no such device");
            }
            other => panic!("expected NonZeroExit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_invocations_are_independent() {
        let first = sh("echo a");
        let second = sh("echo b");
        let (a, b) = tokio::join!(invoke(&first), invoke(&second));
        assert_eq!(a.unwrap().stdout.trim(), "a");
        assert_eq!(b.unwrap().stdout.trim(), "b");
    }

    #[test]
    fn test_diagnostic_prefers_stderr() {
        let result = ExternalCommandResult {
            stdout: "partial\n".to_string(),
            stderr: "  \n".to_string(),
            exit_code: 1,
        };
        assert_eq!(result.diagnostic(), "partial");
    }
}
