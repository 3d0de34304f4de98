//! Port allocation

use std::collections::HashSet;

use crate::errors::PlatformError;

/// Return the lowest port in `[start, end]` not present in `used`
pub fn first_free_port(start: u16, end: u16, used: &HashSet<u16>) -> Result<u16, PlatformError> {
    (start..=end)
        .find(|port| !used.contains(port))
        .ok_or(PlatformError::PortExhaustion { start, end })
}
