//! Age-based cleanup of the application logs directory

use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::errors::PlatformError;
use crate::filesys::dir::Dir;

/// Default age after which log files are removed
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(3 * 24 * 60 * 60);

/// Delete every file in `dir` last modified more than `max_age` ago.
///
/// Failures on individual files are logged and skipped. Returns the number of
/// files removed.
pub async fn sweep(dir: &Dir, max_age: Duration) -> Result<usize, PlatformError> {
    if !dir.exists().await {
        debug!("Logs directory {} missing, nothing to sweep", dir.path().display());
        return Ok(0);
    }

    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut removed = 0;

    for file in dir.list_files().await? {
        let modified = match file.modified().await {
            Ok(modified) => modified,
            Err(e) => {
                warn!("Failed to stat {}: {}", file.path().display(), e);
                continue;
            }
        };

        if modified >= cutoff {
            continue;
        }

        match file.delete().await {
            Ok(()) => {
                debug!("Deleted old log file {}", file.path().display());
                removed += 1;
            }
            Err(e) => warn!("Failed to delete {}: {}", file.path().display(), e),
        }
    }

    info!(
        "Log retention sweep removed {} file(s) from {}",
        removed,
        dir.path().display()
    );
    Ok(removed)
}
