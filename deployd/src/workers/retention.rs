//! Daily log retention worker

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use tracing::{debug, error, info, warn};

use crate::applogs::aggregator::DEFAULT_ROTATE_BYTES;
use crate::applogs::retention::{self, DEFAULT_MAX_AGE};
use crate::applogs::LogAggregator;
use crate::errors::PlatformError;
use crate::filesys::dir::Dir;

/// Extensions of live supervisor log files
const LIVE_EXTENSIONS: [&str; 3] = ["log", "out", "err"];

/// Retention worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Files older than this are removed
    pub max_age: Duration,

    /// Local hour of day the sweep runs
    pub hour: u32,

    /// Live files above this size are rotated
    pub rotate_bytes: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            hour: 2,
            rotate_bytes: DEFAULT_ROTATE_BYTES,
        }
    }
}

/// Rotate live log files larger than `max_bytes`. Returns the count rotated.
pub async fn rotate_large_files(
    aggregator: &LogAggregator,
    logs_dir: &Dir,
    max_bytes: u64,
) -> Result<usize, PlatformError> {
    if !logs_dir.exists().await {
        return Ok(0);
    }

    let mut rotated = 0;
    for file in logs_dir.list_files().await? {
        let live = file
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| LIVE_EXTENSIONS.contains(&e));
        if !live {
            continue;
        }

        match aggregator.rotate_if_larger(file.path(), max_bytes).await {
            Ok(Some(_)) => rotated += 1,
            Ok(None) => {}
            Err(e) => warn!("Failed to rotate {}: {}", file.path().display(), e),
        }
    }
    Ok(rotated)
}

/// Time left until the next `hour:00` local time after `now`
pub fn until_next_run<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32) -> Duration {
    let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or_default();
    let today = now.date_naive().and_time(at);

    let next = if today > now.naive_local() {
        today
    } else {
        now.date_naive()
            .checked_add_days(Days::new(1))
            .map(|d| d.and_time(at))
            .unwrap_or(today)
    };

    (next - now.naive_local())
        .to_std()
        .unwrap_or(Duration::from_secs(60 * 60 * 24))
}

/// Run the retention worker
pub async fn run<S, F>(
    options: &Options,
    logs_dir: &Dir,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Retention worker starting...");
    let aggregator = LogAggregator::default();

    loop {
        let wait = until_next_run(&Local::now(), options.hour);
        debug!("Next log retention sweep in {}s", wait.as_secs());

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Retention worker shutting down...");
                return;
            }
            _ = sleep_fn(wait) => {}
        }

        match retention::sweep(logs_dir, options.max_age).await {
            Ok(removed) => debug!("Retention sweep removed {} file(s)", removed),
            Err(e) => error!("Retention sweep failed: {}", e),
        }

        match rotate_large_files(&aggregator, logs_dir, options.rotate_bytes).await {
            Ok(0) => {}
            Ok(n) => info!("Rotated {} oversized log file(s)", n),
            Err(e) => error!("Log rotation failed: {}", e),
        }
    }
}
