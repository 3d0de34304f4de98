//! Timestamp extraction from raw log lines
//!
//! Each [`TimestampParser`] recognises one prefix format. [`TimestampChain`]
//! tries them in priority order and falls back to a caller-provided instant.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

/// Timestamp and message split out of a line
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine<'a> {
    pub timestamp: DateTime<Utc>,
    pub message: &'a str,
}

/// One timestamp prefix format
pub trait TimestampParser: Send + Sync {
    fn name(&self) -> &'static str;

    /// Parse the line, `None` when the prefix does not match
    fn parse<'a>(&self, line: &'a str) -> Option<ParsedLine<'a>>;
}

static PM2_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2} [+-]\d{4}): (.+)$").ok()
});

static ISO_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4}-\d{2}-\d{2})[T ](\d{2}:\d{2}:\d{2}(?:\.\d{1,9})?)(Z|[+-]\d{2}:\d{2})?:?\s*(.*)$",
    )
    .ok()
});

static US_DATE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(\d{1,2})/(\d{1,2})/(\d{4}) (\d{1,2}):(\d{2}):(\d{2})(?:\s*([AP]M))?:?\s*(.*)$",
    )
    .ok()
});

static EPOCH_MS_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d{13}):?\s*(.*)$").ok());

/// Empty captured message means the whole line is the message
fn message_or_line<'a>(message: Option<regex::Match<'a>>, line: &'a str) -> &'a str {
    match message {
        Some(m) if !m.as_str().is_empty() => m.as_str(),
        _ => line,
    }
}

/// `YYYY-MM-DD HH:mm:ss ±ZZZZ: message`, as written by the supervisor
pub struct SupervisorPrefix;

impl TimestampParser for SupervisorPrefix {
    fn name(&self) -> &'static str {
        "supervisor"
    }

    fn parse<'a>(&self, line: &'a str) -> Option<ParsedLine<'a>> {
        let caps = PM2_RE.as_ref()?.captures(line)?;
        let ts = DateTime::parse_from_str(caps.get(1)?.as_str(), "%Y-%m-%d %H:%M:%S %z").ok()?;
        Some(ParsedLine {
            timestamp: ts.with_timezone(&Utc),
            message: caps.get(2)?.as_str(),
        })
    }
}

/// ISO-8601 with optional fraction and zone; no zone means UTC
pub struct IsoPrefix;

impl TimestampParser for IsoPrefix {
    fn name(&self) -> &'static str {
        "iso8601"
    }

    fn parse<'a>(&self, line: &'a str) -> Option<ParsedLine<'a>> {
        let caps = ISO_RE.as_ref()?.captures(line)?;
        let zone = caps.get(3).map(|m| m.as_str()).unwrap_or("Z");
        let rfc3339 = format!("{}T{}{}", caps.get(1)?.as_str(), caps.get(2)?.as_str(), zone);
        let ts = DateTime::parse_from_rfc3339(&rfc3339).ok()?;
        Some(ParsedLine {
            timestamp: ts.with_timezone(&Utc),
            message: message_or_line(caps.get(4), line),
        })
    }
}

/// `M/D/YYYY H:mm:ss[ AM|PM]`, read as UTC
pub struct UsDatePrefix;

impl TimestampParser for UsDatePrefix {
    fn name(&self) -> &'static str {
        "us-date"
    }

    fn parse<'a>(&self, line: &'a str) -> Option<ParsedLine<'a>> {
        let caps = US_DATE_RE.as_ref()?.captures(line)?;
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

        let (month, day, year) = (num(1)?, num(2)?, num(3)?);
        let (mut hour, minute, second) = (num(4)?, num(5)?, num(6)?);

        if let Some(meridiem) = caps.get(7) {
            if hour == 0 || hour > 12 {
                return None;
            }
            let pm = meridiem.as_str().eq_ignore_ascii_case("pm");
            hour = match (pm, hour) {
                (false, 12) => 0,
                (true, 12) => 12,
                (true, h) => h + 12,
                (false, h) => h,
            };
        }

        let date = NaiveDate::from_ymd_opt(year as i32, month, day)?;
        let naive: NaiveDateTime = date.and_hms_opt(hour, minute, second)?;
        Some(ParsedLine {
            timestamp: Utc.from_utc_datetime(&naive),
            message: message_or_line(caps.get(8), line),
        })
    }
}

/// Bare 13-digit millisecond epoch
pub struct EpochMillisPrefix;

impl TimestampParser for EpochMillisPrefix {
    fn name(&self) -> &'static str {
        "epoch-ms"
    }

    fn parse<'a>(&self, line: &'a str) -> Option<ParsedLine<'a>> {
        let caps = EPOCH_MS_RE.as_ref()?.captures(line)?;
        let millis: i64 = caps.get(1)?.as_str().parse().ok()?;
        Some(ParsedLine {
            timestamp: DateTime::from_timestamp_millis(millis)?,
            message: message_or_line(caps.get(2), line),
        })
    }
}

/// Ordered list of parsers
pub struct TimestampChain {
    parsers: Vec<Box<dyn TimestampParser>>,
}

impl TimestampChain {
    pub fn new(parsers: Vec<Box<dyn TimestampParser>>) -> Self {
        Self { parsers }
    }

    /// Parse with the first matching strategy, else `fallback` and the full line
    pub fn parse<'a>(&self, line: &'a str, fallback: DateTime<Utc>) -> ParsedLine<'a> {
        self.parsers
            .iter()
            .find_map(|p| p.parse(line))
            .unwrap_or(ParsedLine {
                timestamp: fallback,
                message: line,
            })
    }

    /// Names of the strategies in priority order
    pub fn names(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }
}

impl Default for TimestampChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(SupervisorPrefix),
            Box::new(IsoPrefix),
            Box::new(UsDatePrefix),
            Box::new(EpochMillisPrefix),
        ])
    }
}
