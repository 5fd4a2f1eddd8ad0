use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 10_000;

const DEFAULT_PROGRAM: &str = "python3";
const ENCODING_ENV: (&str, &str) = ("PYTHONIOENCODING", "utf-8");

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InterpreterConfig {
    pub program: String,
    /// Arguments placed before the script, which is always passed last.
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: vec!["-c".to_string()],
            cwd: None,
        }
    }
}

impl InterpreterConfig {
    pub(crate) fn command(&self, script: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(script);
        if let Some(cwd) = self.cwd.as_deref() {
            cmd.current_dir(cwd);
        }
        cmd.env(ENCODING_ENV.0, ENCODING_ENV.1);
        cmd
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimitsConfig {
    pub timeout_ms: u64,
    /// Per-stream cap, counted in characters rather than bytes.
    pub max_output_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
        }
    }
}

impl LimitsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
