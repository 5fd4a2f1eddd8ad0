use std::io;
use std::process::Stdio;
use std::time::{Duration, Instant};

use protocol::ExecutionResult;
use uuid::Uuid;

use crate::config::{InterpreterConfig, LimitsConfig};
use crate::error::ExecutionError;
use crate::process::{apply_process_group, kill_group, terminate_child};
use crate::stream::StreamCapture;

/// How long pipes may stay open after the process itself has exited.
const STREAM_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// One running script: the child, its two capped captures and its deadline.
///
/// Consumed by [`Invocation::wait`]. Dropping it early kills the child
/// (`kill_on_drop`) and aborts both readers.
pub(crate) struct Invocation {
    id: Uuid,
    child: tokio::process::Child,
    pgid: Option<u32>,
    stdout: StreamCapture,
    stderr: StreamCapture,
    started_at: Instant,
    deadline: Duration,
}

impl Invocation {
    pub(crate) fn spawn(
        interpreter: &InterpreterConfig,
        limits: &LimitsConfig,
        script: &str,
    ) -> Result<Self, ExecutionError> {
        let mut cmd = interpreter.command(script);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        apply_process_group(&mut cmd);
        let mut child = cmd.spawn().map_err(ExecutionError::Spawn)?;
        let started_at = Instant::now();
        let pgid = child.id();

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| missing_pipe("stderr"))?;

        let id = Uuid::new_v4();
        tracing::debug!(
            event = "invocation.spawned",
            invocation = %id,
            pid = ?pgid,
            timeout_ms = limits.timeout_ms,
            "interpreter started"
        );

        Ok(Self {
            id,
            child,
            pgid,
            stdout: StreamCapture::spawn("stdout", stdout, limits.max_output_chars),
            stderr: StreamCapture::spawn("stderr", stderr, limits.max_output_chars),
            started_at,
            deadline: limits.timeout(),
        })
    }

    /// Resolves on whichever comes first: process exit or the deadline.
    pub(crate) async fn wait(mut self) -> ExecutionResult {
        let status = tokio::select! {
            status = self.child.wait() => status,
            _ = tokio::time::sleep(self.deadline) => {
                let elapsed = elapsed_ms(self.started_at);
                tracing::warn!(
                    event = "invocation.timeout",
                    invocation = %self.id,
                    timeout_ms = self.deadline.as_millis() as u64,
                    "deadline reached, terminating interpreter"
                );
                let status = terminate_child(&mut self.child, self.pgid).await;
                tracing::debug!(
                    event = "invocation.terminated",
                    invocation = %self.id,
                    status = ?status,
                    "interpreter terminated"
                );
                let err = ExecutionError::Timeout(self.deadline);
                return ExecutionResult::failed(None, err.to_string(), elapsed);
            }
        };
        let elapsed = elapsed_ms(self.started_at);

        let status = match status {
            Ok(status) => status,
            Err(err) => {
                kill_group(self.pgid);
                let err = ExecutionError::Wait(err);
                tracing::warn!(
                    event = "invocation.wait_failed",
                    invocation = %self.id,
                    error = %err,
                    "wait on interpreter failed"
                );
                return ExecutionResult::failed(None, err.to_string(), elapsed);
            }
        };

        // background children must not outlive the call
        kill_group(self.pgid);

        let Self { id, stdout, stderr, .. } = self;
        let (stdout, stderr) = tokio::join!(
            stdout.collect(STREAM_DRAIN_GRACE),
            stderr.collect(STREAM_DRAIN_GRACE)
        );
        tracing::debug!(
            event = "invocation.exited",
            invocation = %id,
            status = %status,
            elapsed_ms = elapsed,
            "interpreter exited"
        );

        if status.success() {
            ExecutionResult::succeeded(&stdout, elapsed)
        } else {
            let err = ExecutionError::from_exit(status, &stderr);
            ExecutionResult::failed(Some(&stdout), err.to_string(), elapsed)
        }
    }
}

pub(crate) fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn missing_pipe(name: &str) -> ExecutionError {
    ExecutionError::Spawn(io::Error::new(
        io::ErrorKind::BrokenPipe,
        format!("{name} pipe unavailable"),
    ))
}
