use std::fmt;

use serde::Deserialize;

/// Cache policy for static file delivery.
#[derive(Deserialize, Debug, Clone, Copy)]
pub enum CacheStrategy {
    Yes,      // Long-lived (1 year)
    No,       // Short-lived (1 hour)
    Explicit, // No caching at all
}

impl CacheStrategy {
    /// `Cache-Control: max-age` value in seconds, or `None` for the
    /// no-cache strategy.
    pub fn max_age_secs(&self) -> Option<u64> {
        match self {
            CacheStrategy::Yes => Some(31_536_000),
            CacheStrategy::No => Some(3_600),
            CacheStrategy::Explicit => None,
        }
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStrategy::Yes => write!(f, "Yes (1 year)"),
            CacheStrategy::No => write!(f, "No (1 hour)"),
            CacheStrategy::Explicit => write!(f, "Explicit (no-cache)"),
        }
    }
}
