//! Subdomain generation and validation

use std::collections::HashSet;
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use tracing::warn;

use crate::errors::PlatformError;

/// Names that can never be assigned to an application
pub const RESERVED_SUBDOMAINS: &[&str] = &[
    "www", "mail", "ftp", "ssh", "admin", "api", "staging", "dev", "test", "blog", "shop",
    "store", "app", "portal", "dashboard", "control", "manage", "system", "root", "secure",
    "ssl", "cdn", "static", "assets", "media", "files", "docs", "support", "help", "status",
    "monitor", "health",
];

/// Generation attempts before falling back to a timestamp-based name
pub const MAX_ATTEMPTS: usize = 15;

const MAX_BASE_LEN: usize = 10;
const FALLBACK_BASE: &str = "app";

static SUBDOMAIN_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{1,18}[a-z0-9]$|^[a-z0-9]{3}$").ok());

/// Lowercase, keep ASCII alphanumerics, truncate to ten characters
pub fn clean_base(app_name: &str) -> String {
    let cleaned: String = app_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(MAX_BASE_LEN)
        .collect();

    if cleaned.len() < 2 {
        FALLBACK_BASE.to_string()
    } else {
        cleaned
    }
}

/// One random candidate for an application name
pub fn candidate(app_name: &str, rng: &mut impl Rng) -> String {
    let suffix: u32 = rng.gen_range(10000..=99999);
    format!("{}-{}", clean_base(app_name), suffix)
}

pub fn is_reserved(subdomain: &str) -> bool {
    RESERVED_SUBDOMAINS.contains(&subdomain)
}

/// Format and reserved-word check
pub fn is_valid(subdomain: &str) -> bool {
    SUBDOMAIN_RE
        .as_ref()
        .is_some_and(|re| re.is_match(subdomain))
        && !is_reserved(subdomain)
}

/// Generate a subdomain not present in `taken`.
///
/// After [`MAX_ATTEMPTS`] collisions the result is `app-<last five digits of
/// epoch ms>`, which is not checked against `taken`.
pub fn generate(
    app_name: &str,
    taken: &HashSet<String>,
    rng: &mut impl Rng,
) -> Result<String, PlatformError> {
    for _ in 0..MAX_ATTEMPTS {
        let subdomain = candidate(app_name, rng);
        if is_valid(&subdomain) && !taken.contains(&subdomain) {
            return Ok(subdomain);
        }
    }

    let millis = crate::utils::epoch_millis().unsigned_abs() % 100_000;
    let fallback = format!("{}-{:05}", FALLBACK_BASE, millis);
    warn!(
        "Subdomain generation for '{}' exhausted {} attempts, falling back to {}",
        app_name, MAX_ATTEMPTS, fallback
    );

    if is_valid(&fallback) {
        Ok(fallback)
    } else {
        Err(PlatformError::SubdomainGenerationFailure(format!(
            "fallback '{}' is invalid",
            fallback
        )))
    }
}
