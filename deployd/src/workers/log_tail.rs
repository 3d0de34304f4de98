//! Live tail of application stdout/stderr to subscribed clients

use std::collections::HashMap;
use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use crate::errors::PlatformError;
use crate::events::{Broadcaster, Topics};
use crate::filesys::dir::Dir;
use crate::models::log::LogSource;
use crate::store::{AppFilter, AppStore};

/// Largest chunk read from one file per tick
const MAX_CHUNK: u64 = 64 * 1024;

/// Log tail worker options
#[derive(Debug, Clone)]
pub struct Options {
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Complete lines appended to `path` since `offset`, and the new offset.
///
/// A trailing partial line is left for the next read. A file shorter than
/// `offset` was rotated and is read from the start.
pub async fn read_new_lines(path: &Path, offset: u64) -> Result<(Vec<String>, u64), PlatformError> {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(e.into()),
    };

    let len = file.metadata().await?.len();
    let start = if len < offset { 0 } else { offset };
    if len == start {
        return Ok((Vec::new(), start));
    }

    file.seek(SeekFrom::Start(start)).await?;
    let mut buf = Vec::new();
    file.take(MAX_CHUNK).read_to_end(&mut buf).await?;

    let Some(last_newline) = buf.iter().rposition(|b| *b == b'\n') else {
        return Ok((Vec::new(), start));
    };

    let lines = String::from_utf8_lossy(&buf[..last_newline])
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect();

    Ok((lines, start + last_newline as u64 + 1))
}

/// Tracks read offsets per log file
#[derive(Debug, Default)]
pub struct Tailer {
    offsets: HashMap<PathBuf, u64>,
}

impl Tailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish new lines for every watched application. Files seen for the
    /// first time start at their current end.
    pub async fn tick(
        &mut self,
        store: &dyn AppStore,
        broadcaster: &Broadcaster,
        logs_dir: &Dir,
    ) -> Result<usize, PlatformError> {
        let apps = store
            .list_apps(&AppFilter::new().with_process_handle(true))
            .await?;

        let mut watched = Vec::new();
        let mut published = 0;

        for app in apps {
            if broadcaster.subscriber_count(&Topics::app(&app.id)) == 0 {
                continue;
            }

            let name = app.process_name();
            for (source, ext) in [(LogSource::Stdout, "out"), (LogSource::Stderr, "err")] {
                let path = logs_dir.path().join(format!("{}.{}", name, ext));
                watched.push(path.clone());

                let offset = match self.offsets.get(&path) {
                    Some(offset) => *offset,
                    None => {
                        let end = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
                        self.offsets.insert(path, end);
                        continue;
                    }
                };

                let (lines, next) = read_new_lines(&path, offset).await?;
                for line in &lines {
                    broadcaster.app_log(&app.id, source, line);
                }
                published += lines.len();
                self.offsets.insert(path, next);
            }
        }

        // Forget files nobody watches so a later subscriber starts fresh
        self.offsets.retain(|path, _| watched.contains(path));
        Ok(published)
    }
}

/// Run the log tail worker
pub async fn run<S, F>(
    options: &Options,
    store: &dyn AppStore,
    broadcaster: &Broadcaster,
    logs_dir: &Dir,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Log tail worker starting...");
    let mut tailer = Tailer::new();

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Log tail worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        match tailer.tick(store, broadcaster, logs_dir).await {
            Ok(0) => {}
            Ok(n) => debug!("Published {} live log line(s)", n),
            Err(e) => warn!("Log tail failed: {}", e),
        }
    }
}
