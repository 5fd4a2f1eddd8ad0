use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Process-level failures. Each variant renders the text reported in the
/// result's `error` field.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Failed to start interpreter: {0}")]
    Spawn(#[source] io::Error),
    #[error("Failed to wait on interpreter: {0}")]
    Wait(#[source] io::Error),
    #[error("{0}")]
    Runtime(String),
    #[error("Process exited with code {0}")]
    ExitCode(i32),
    #[error("Process terminated by signal ({0})")]
    Signal(ExitStatus),
    #[error("Execution timed out after {}", humantime::format_duration(*.0))]
    Timeout(Duration),
}

impl ExecutionError {
    /// Failure for a process that exited unsuccessfully. Captured stderr wins
    /// over a synthesized exit message.
    pub(crate) fn from_exit(status: ExitStatus, stderr: &str) -> Self {
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            return Self::Runtime(stderr.to_string());
        }
        match status.code() {
            Some(code) => Self::ExitCode(code),
            None => Self::Signal(status),
        }
    }
}
