//! Reading, merging, and paginating application log files

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::applogs::paginate::{select_page, LogPage};
use crate::applogs::severity;
use crate::applogs::timestamp::TimestampChain;
use crate::errors::PlatformError;
use crate::models::log::{AppLogLine, LogSource};
use crate::utils::format_bytes;

/// Size above which a log file is rotated
pub const DEFAULT_ROTATE_BYTES: u64 = 10 * 1024 * 1024;

/// Summary of one log file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStats {
    pub exists: bool,
    pub size: u64,
    pub lines: usize,
    pub last_modified: Option<DateTime<Utc>>,
    pub size_formatted: String,
}

/// Parses log files on the blocking pool
#[derive(Clone, Default)]
pub struct LogAggregator {
    chain: Arc<TimestampChain>,
}

fn read_optional(path: &Path) -> Result<Option<String>, PlatformError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn non_empty_lines(content: &str) -> impl DoubleEndedIterator<Item = &str> {
    content.lines().filter(|l| !l.trim().is_empty())
}

/// Parse one stream. Lines without a timestamp get `now + index` seconds.
fn parse_stream(
    chain: &TimestampChain,
    content: &str,
    source: LogSource,
    now: DateTime<Utc>,
) -> Vec<AppLogLine> {
    non_empty_lines(content)
        .enumerate()
        .map(|(index, line)| {
            let parsed = chain.parse(line, now + Duration::seconds(index as i64));
            AppLogLine {
                id: 0,
                timestamp: parsed.timestamp,
                severity: severity::detect(line),
                message: parsed.message.to_string(),
                source,
            }
        })
        .collect()
}

fn number_page(lines: Vec<AppLogLine>, start: usize) -> Vec<AppLogLine> {
    lines
        .into_iter()
        .enumerate()
        .map(|(position, mut line)| {
            line.id = start + position;
            line
        })
        .collect()
}

impl LogAggregator {
    pub fn new(chain: TimestampChain) -> Self {
        Self {
            chain: Arc::new(chain),
        }
    }

    /// Paginate a single file. Messages keep the full raw line.
    pub async fn paginate_file(
        &self,
        path: &Path,
        source: LogSource,
        page: usize,
        page_size: usize,
    ) -> Result<LogPage, PlatformError> {
        let chain = self.chain.clone();
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || -> Result<_, PlatformError> {
            let Some(content) = read_optional(&path)? else {
                debug!("Log file {} does not exist", path.display());
                return Ok(LogPage::empty(page, page_size));
            };

            let now = Utc::now();
            let newest_first: Vec<AppLogLine> = non_empty_lines(&content)
                .rev()
                .map(|line| AppLogLine {
                    id: 0,
                    timestamp: chain.parse(line, now).timestamp,
                    severity: severity::detect(line),
                    message: line.to_string(),
                    source,
                })
                .collect();

            let (lines, start, pagination) = select_page(newest_first, page, page_size);
            Ok(LogPage {
                logs: number_page(lines, start),
                pagination,
            })
        })
        .await?
    }

    /// Merge several streams by timestamp, newest first, and paginate
    pub async fn merge(
        &self,
        streams: Vec<(LogSource, PathBuf)>,
        page: usize,
        page_size: usize,
    ) -> Result<LogPage, PlatformError> {
        let chain = self.chain.clone();

        tokio::task::spawn_blocking(move || -> Result<_, PlatformError> {
            let now = Utc::now();
            let mut all = Vec::new();

            for (source, path) in &streams {
                if let Some(content) = read_optional(path)? {
                    all.extend(parse_stream(&chain, &content, *source, now));
                }
            }

            // Stable: equal timestamps keep stream order
            all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

            let (lines, start, pagination) = select_page(all, page, page_size);
            Ok(LogPage {
                logs: number_page(lines, start),
                pagination,
            })
        })
        .await?
    }

    /// Size, line count, and modification time of a log file
    pub async fn log_stats(&self, path: &Path) -> Result<LogStats, PlatformError> {
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || -> Result<_, PlatformError> {
            let meta = match std::fs::metadata(&path) {
                Ok(meta) => meta,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Ok(LogStats {
                        exists: false,
                        size: 0,
                        lines: 0,
                        last_modified: None,
                        size_formatted: format_bytes(0),
                    });
                }
                Err(e) => return Err(e.into()),
            };

            let lines = read_optional(&path)?
                .map(|c| non_empty_lines(&c).count())
                .unwrap_or(0);

            Ok(LogStats {
                exists: true,
                size: meta.len(),
                lines,
                last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
                size_formatted: format_bytes(meta.len()),
            })
        })
        .await?
    }

    /// Rename the file to `<path>.<epoch ms>` when it exceeds `max_bytes`
    pub async fn rotate_if_larger(
        &self,
        path: &Path,
        max_bytes: u64,
    ) -> Result<Option<PathBuf>, PlatformError> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if meta.len() <= max_bytes {
            return Ok(None);
        }

        let mut rotated = path.as_os_str().to_owned();
        rotated.push(format!(".{}", crate::utils::epoch_millis()));
        let rotated = PathBuf::from(rotated);

        tokio::fs::rename(path, &rotated).await?;
        info!("Rotated log file {} -> {}", path.display(), rotated.display());
        Ok(Some(rotated))
    }
}
