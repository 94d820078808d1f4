//! Failure taxonomy for tool invocations and dispatched work

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::constants::hints;

/// Why an external tool invocation did not produce usable output
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{program} command not found.")]
    NotFound { program: String },

    #[error("{program} command timed out after {} seconds.", .after.as_secs())]
    Timeout { program: String, after: Duration },

    #[error("{program} exited with status {code}: {stderr}")]
    NonZeroExit { program: String, code: i32, stderr: String },

    #[error("failed to run {program}: {source}")]
    Execution {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl ToolError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ToolError::NotFound { .. })
    }

    /// One-line message for a log sink, with install hints for missing tools
    pub fn headline(&self) -> String {
        match self {
            ToolError::NotFound { program } => match hints::for_program(program) {
                Some(hint) => format!("{self} {hint}"),
                None => self.to_string(),
            },
            // Tools often print several lines on failure; the first one carries the reason
            ToolError::NonZeroExit { program, code, stderr } => {
                let reason = first_line(stderr);
                if reason.is_empty() {
                    format!("{program} exited with status {code}")
                } else {
                    format!("{program} failed: {reason}")
                }
            }
            _ => first_line(&self.to_string()).to_string(),
        }
    }
}

/// A failure caught at the dispatch boundary
#[derive(Debug, Error)]
pub enum Fault {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("worker panicked: {message}")]
    Panicked { message: String },

    #[error("{0:#}")]
    Failed(anyhow::Error),
}

impl From<anyhow::Error> for Fault {
    fn from(err: anyhow::Error) -> Self {
        // Keep tool errors typed so NotFound still gets its remediation hint
        match err.downcast::<ToolError>() {
            Ok(tool) => Fault::Tool(tool),
            Err(other) => Fault::Failed(other),
        }
    }
}

impl Fault {
    /// The executable that could not be found, when that is what failed
    pub fn missing_program(&self) -> Option<&str> {
        match self {
            Fault::Tool(ToolError::NotFound { program }) => Some(program),
            _ => None,
        }
    }

    pub fn headline(&self) -> String {
        match self {
            Fault::Tool(tool) => tool.headline(),
            other => first_line(&other.to_string()).to_string(),
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_headline_carries_hint() {
        let err = ToolError::NotFound { program: "bluetoothctl".to_string() };
        assert_eq!(err.headline(), "bluetoothctl command not found. Is bluez-utils installed?");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_not_found_headline_unknown_program() {
        let err = ToolError::NotFound { program: "frobnicate".to_string() };
        assert_eq!(err.headline(), "frobnicate command not found.");
    }

    #[test]
    fn test_non_zero_exit_uses_first_stderr_line() {
        let err = ToolError::NonZeroExit {
            program: "nmcli".to_string(),
            code: 10,
            stderr: "\nError: Connection activation failed.\nHint: use journalctl".to_string(),
        };
        assert_eq!(err.headline(), "nmcli failed: Error: Connection activation failed.");
    }

    #[test]
    fn test_timeout_headline() {
        let err = ToolError::Timeout { program: "pactl".to_string(), after: Duration::from_secs(3) };
        assert_eq!(err.headline(), "pactl command timed out after 3 seconds.");
    }

    #[test]
    fn test_fault_from_anyhow_keeps_tool_error() {
        let err = anyhow::Error::from(ToolError::NotFound { program: "pactl".to_string() });
        let fault = Fault::from(err);
        assert!(matches!(fault, Fault::Tool(ToolError::NotFound { .. })));
        assert_eq!(fault.headline(), "pactl command not found. Is PulseAudio/PipeWire installed?");
        assert_eq!(fault.missing_program(), Some("pactl"));
    }

    #[test]
    fn test_fault_from_anyhow_with_context_is_failed() {
        let err = anyhow::anyhow!("parse blew up").context("while scanning");
        let fault = Fault::from(err);
        assert!(matches!(fault, Fault::Failed(_)));
        assert_eq!(fault.headline(), "while scanning: parse blew up");
    }

    #[test]
    fn test_panicked_headline_is_one_line() {
        let fault = Fault::Panicked { message: "boom\nstack".to_string() };
        assert_eq!(fault.headline(), "worker panicked: boom");
    }
}
