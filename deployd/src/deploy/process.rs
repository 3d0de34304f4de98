//! Child processes with line-streamed output

use std::io;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::models::log::Severity;

/// Receives output lines of a pipeline stage
#[async_trait]
pub trait StageSink: Send + Sync {
    async fn line(&self, severity: Severity, message: String);
}

/// Newline-delimited reader that tolerates invalid UTF-8.
///
/// Bytes read by a dropped `next_line` future stay in `buf`, so the reader
/// can be polled from `select!`.
struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> io::Result<Option<String>> {
        let read = self.inner.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }

        let mut end = self.buf.len();
        while end > 0 && matches!(self.buf[end - 1], b'\n' | b'\r') {
            end -= 1;
        }
        let line = String::from_utf8_lossy(&self.buf[..end]).into_owned();
        self.buf.clear();
        Ok(Some(line))
    }
}

async fn next_line<R>(reader: &mut Option<LineReader<R>>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    match reader {
        Some(reader) => reader.next_line().await,
        None => Ok(None),
    }
}

/// Run a command to completion, forwarding stdout lines as info and stderr
/// lines as warn.
///
/// The child is killed if the returned future is dropped, which is how the
/// caller's timeout terminates it.
pub async fn run_streaming(
    mut command: Command,
    sink: &dyn StageSink,
) -> io::Result<ExitStatus> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn()?;
    let mut stdout = child.stdout.take().map(|s| LineReader::new(BufReader::new(s)));
    let mut stderr = child.stderr.take().map(|s| LineReader::new(BufReader::new(s)));
    let mut stdout_done = stdout.is_none();
    let mut stderr_done = stderr.is_none();

    while !(stdout_done && stderr_done) {
        tokio::select! {
            line = next_line(&mut stdout), if !stdout_done => match line {
                Ok(Some(line)) => sink.line(Severity::Info, line).await,
                _ => stdout_done = true,
            },
            line = next_line(&mut stderr), if !stderr_done => match line {
                Ok(Some(line)) => sink.line(Severity::Warn, line).await,
                _ => stderr_done = true,
            },
        }
    }

    child.wait().await
}
