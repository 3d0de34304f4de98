//! Severity classification of raw log lines

use crate::models::log::Severity;

/// Classify a raw line. Matching is case-insensitive and the first rule wins:
/// `err` (which covers `error`), then `warn`, then `debug`, else info.
pub fn detect(line: &str) -> Severity {
    let lower = line.to_lowercase();
    if lower.contains("err") {
        Severity::Error
    } else if lower.contains("warn") {
        Severity::Warn
    } else if lower.contains("debug") {
        Severity::Debug
    } else {
        Severity::Info
    }
}
