//! Sliding-window rate limiter

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Request timestamps for one key
#[derive(Debug, Clone)]
struct WindowEntry {
    hits: VecDeque<Instant>,
    last_seen: Instant,
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Rejected; retry after the given delay
    Limited(Duration),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Per-key sliding-window limiter with bounded key capacity
pub struct RateLimiter {
    entries: RwLock<HashMap<String, WindowEntry>>,
    max_requests: usize,
    window: Duration,
    capacity: usize,
}

impl RateLimiter {
    /// Allow `max_requests` per `window` for each of at most `capacity` keys
    pub fn new(max_requests: usize, window: Duration, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_requests: max_requests.max(1),
            window,
            capacity: capacity.max(1),
        }
    }

    /// Record a request for `key` if the window allows it
    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    pub(crate) fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());

        // Evict least recently seen key if at capacity
        if !entries.contains_key(key) && entries.len() >= self.capacity {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.last_seen)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }

        let entry = entries.entry(key.to_string()).or_insert_with(|| WindowEntry {
            hits: VecDeque::new(),
            last_seen: now,
        });
        entry.last_seen = now;

        while let Some(first) = entry.hits.front() {
            if now.duration_since(*first) >= self.window {
                entry.hits.pop_front();
            } else {
                break;
            }
        }

        if entry.hits.len() >= self.max_requests {
            let retry_after = entry
                .hits
                .front()
                .map(|first| self.window.saturating_sub(now.duration_since(*first)))
                .unwrap_or(self.window);
            return Decision::Limited(retry_after);
        }

        entry.hits.push_back(now);
        Decision::Allowed
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop keys with no hits inside the window
    pub fn purge_idle(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.last_seen) < self.window);
        before - entries.len()
    }
}
