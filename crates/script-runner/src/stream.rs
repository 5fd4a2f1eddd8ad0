use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

use crate::buffer::OutputBuffer;

/// Background reader draining one child pipe into a capped buffer.
///
/// Dropping the capture aborts the reader, so an abandoned invocation never
/// leaves a task behind.
pub(crate) struct StreamCapture {
    name: &'static str,
    buffer: Arc<Mutex<OutputBuffer>>,
    task: JoinHandle<io::Result<()>>,
}

impl StreamCapture {
    pub(crate) fn spawn<R>(name: &'static str, reader: R, max_chars: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(OutputBuffer::new(max_chars)));
        let task = tokio::spawn(read_stream_capture(reader, Arc::clone(&buffer)));
        Self { name, buffer, task }
    }

    /// Waits up to `grace` for the pipe to reach EOF, then returns whatever
    /// was captured.
    pub(crate) async fn collect(mut self, grace: Duration) -> String {
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => {
                tracing::warn!(stream = self.name, error = %err, "stream read failed");
            }
            Ok(Err(err)) => {
                tracing::warn!(stream = self.name, error = %err, "stream task join failed");
            }
            Err(_) => {
                tracing::warn!(
                    stream = self.name,
                    grace_ms = grace.as_millis() as u64,
                    "stream still open after exit, keeping partial capture"
                );
            }
        }
        lock(&self.buffer).take_text()
    }
}

impl Drop for StreamCapture {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_stream_capture<R: AsyncRead + Unpin>(
    mut reader: R,
    buffer: Arc<Mutex<OutputBuffer>>,
) -> io::Result<()> {
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let mut guard = lock(&buffer);
        // keep draining after truncation so the child never blocks on a full pipe
        if !guard.is_truncated() {
            guard.push(&chunk[..n]);
        }
    }
    Ok(())
}

fn lock(buffer: &Mutex<OutputBuffer>) -> MutexGuard<'_, OutputBuffer> {
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
