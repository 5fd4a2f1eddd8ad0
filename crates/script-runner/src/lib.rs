//! Runs caller-supplied scripts in a short-lived interpreter process.
//!
//! Every call to [`ScriptRunner::run`] owns one invocation:
//! its own child process, its own pair of capped output buffers and its own
//! deadline. Nothing is shared between calls beyond the immutable
//! configuration held by the runner.

mod buffer;
mod config;
mod error;
mod invocation;
mod process;
mod stream;

use std::time::Instant;

use protocol::ExecutionResult;

pub use buffer::{OutputBuffer, TRUNCATION_MARKER};
pub use config::{InterpreterConfig, LimitsConfig, DEFAULT_MAX_OUTPUT_CHARS, DEFAULT_TIMEOUT_MS};
pub use error::ExecutionError;

use invocation::{elapsed_ms, Invocation};

#[derive(Debug, Clone, Default)]
pub struct ScriptRunner {
    interpreter: InterpreterConfig,
    limits: LimitsConfig,
}

impl ScriptRunner {
    pub fn new(interpreter: InterpreterConfig, limits: LimitsConfig) -> Self {
        Self {
            interpreter,
            limits,
        }
    }

    pub fn interpreter(&self) -> &InterpreterConfig {
        &self.interpreter
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    /// Executes `script` and resolves once the process exits, is killed at the
    /// deadline, or fails to start. Never returns an error: every failure is
    /// folded into the result.
    pub async fn run(&self, script: &str) -> ExecutionResult {
        let entered_at = Instant::now();
        match Invocation::spawn(&self.interpreter, &self.limits, script) {
            Ok(invocation) => invocation.wait().await,
            Err(err) => {
                tracing::warn!(
                    event = "invocation.spawn_failed",
                    program = %self.interpreter.program,
                    error = %err,
                    "interpreter failed to start"
                );
                ExecutionResult::failed(None, err.to_string(), elapsed_ms(entered_at))
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn shell_runner(timeout_ms: u64, max_output_chars: usize) -> ScriptRunner {
        ScriptRunner::new(
            InterpreterConfig {
                program: "/bin/sh".to_string(),
                args: vec!["-c".to_string()],
                cwd: None,
            },
            LimitsConfig {
                timeout_ms,
                max_output_chars,
            },
        )
    }

    fn temp_path(prefix: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()))
    }

    /// Zombies awaiting their reaper count as gone.
    fn process_gone(pid: i32) -> bool {
        for _ in 0..40 {
            if unsafe { libc::kill(pid, 0) } != 0 {
                return true;
            }
            let zombie = std::fs::read_to_string(format!("/proc/{pid}/stat"))
                .ok()
                .and_then(|stat| {
                    stat.rsplit_once(')')
                        .map(|(_, rest)| rest.trim_start().starts_with('Z'))
                })
                .unwrap_or(false);
            if zombie {
                return true;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        false
    }

    fn run(runner: &ScriptRunner, script: &str) -> ExecutionResult {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(runner.run(script))
    }

    #[test]
    fn successful_script_reports_trimmed_stdout() {
        let result = run(&shell_runner(5_000, 10_000), "printf '  hello world \\n\\n'");
        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("hello world"));
        assert!(result.error.is_none());
    }

    #[test]
    fn silent_success_uses_placeholder() {
        let result = run(&shell_runner(5_000, 10_000), "true");
        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some(protocol::NO_OUTPUT_PLACEHOLDER));
    }

    #[test]
    fn nonzero_exit_without_stderr_names_the_code() {
        let result = run(&shell_runner(5_000, 10_000), "exit 7");
        assert!(!result.success);
        assert!(result.output.is_none());
        assert_eq!(result.error.as_deref(), Some("Process exited with code 7"));
    }

    #[test]
    fn nonzero_exit_reports_stderr_and_partial_stdout() {
        let result = run(
            &shell_runner(5_000, 10_000),
            "echo partial; echo 'NameError: x' >&2; exit 1",
        );
        assert!(!result.success);
        assert_eq!(result.output.as_deref(), Some("partial"));
        assert_eq!(result.error.as_deref(), Some("NameError: x"));
    }

    #[test]
    fn stderr_on_success_is_not_an_error() {
        let result = run(&shell_runner(5_000, 10_000), "echo warn >&2; echo ok");
        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("ok"));
        assert!(result.error.is_none());
    }

    #[test]
    fn runaway_script_is_killed_at_deadline() {
        let result = run(&shell_runner(300, 10_000), "sleep 30");
        assert!(!result.success);
        assert!(result.output.is_none());
        let error = result.error.expect("timeout error");
        assert!(error.contains("timed out after 300ms"), "{error}");
        assert!(result.execution_time_ms >= 300);
        assert!(result.execution_time_ms < 5_000);
    }

    #[test]
    fn ignored_sigterm_escalates_to_sigkill() {
        let pid_file = temp_path("script-runner-pid");
        let script = format!(
            "trap '' TERM; echo $$ > '{}'; sleep 30",
            pid_file.display()
        );
        let started = std::time::Instant::now();
        let result = run(&shell_runner(300, 10_000), &script);
        let wall = started.elapsed();

        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Execution timed out after 300ms")
        );
        assert!(result.execution_time_ms >= 300);
        assert!(
            wall >= Duration::from_millis(300) + crate::process::TERMINATE_GRACE,
            "{wall:?}"
        );

        let pid: i32 = std::fs::read_to_string(&pid_file)
            .expect("pid file")
            .trim()
            .parse()
            .expect("pid");
        std::fs::remove_file(&pid_file).ok();
        assert!(process_gone(pid), "interpreter {pid} still running");
    }

    #[test]
    fn background_children_do_not_outlive_the_call() {
        let result = run(
            &shell_runner(5_000, 10_000),
            "sleep 30 >/dev/null 2>&1 & echo $!",
        );
        assert!(result.success);
        let pid: i32 = result
            .output
            .as_deref()
            .expect("background pid")
            .parse()
            .expect("pid");
        assert!(process_gone(pid), "background child {pid} still running");
    }

    #[test]
    fn verbose_output_is_capped() {
        let result = run(
            &shell_runner(10_000, 10_000),
            "head -c 50000 /dev/zero | tr '\\0' 'a'",
        );
        assert!(result.success);
        let output = result.output.expect("output");
        assert_eq!(
            output.chars().count(),
            10_000 + TRUNCATION_MARKER.chars().count()
        );
        assert!(output.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn missing_interpreter_fails_to_start() {
        let runner = ScriptRunner::new(
            InterpreterConfig {
                program: "/nonexistent/interpreter".to_string(),
                args: Vec::new(),
                cwd: None,
            },
            LimitsConfig::default(),
        );
        let result = run(&runner, "print('hi')");
        assert!(!result.success);
        let error = result.error.expect("spawn error");
        assert!(error.starts_with("Failed to start interpreter:"), "{error}");
    }

    #[test]
    fn child_sees_utf8_encoding_setting() {
        let result = run(
            &shell_runner(5_000, 10_000),
            "printf '%s' \"$PYTHONIOENCODING\"",
        );
        assert_eq!(result.output.as_deref(), Some("utf-8"));
    }

    #[test]
    fn concurrent_invocations_are_isolated() {
        let runner = shell_runner(5_000, 10_000);
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let (slow, fast) = rt.block_on(async {
            tokio::join!(
                runner.run("sleep 0.4; echo slow; echo slow-err >&2; exit 2"),
                runner.run("echo fast")
            )
        });
        assert!(!slow.success);
        assert_eq!(slow.output.as_deref(), Some("slow"));
        assert_eq!(slow.error.as_deref(), Some("slow-err"));
        assert!(slow.execution_time_ms >= 400);

        assert!(fast.success);
        assert_eq!(fast.output.as_deref(), Some("fast"));
        assert!(fast.execution_time_ms < slow.execution_time_ms);
    }
}
