use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};

/// Time source for the security components.
///
/// Both the rate limiter and the session gate take their "now" from here
/// instead of calling `SystemTime` directly, so tests can drive time
/// explicitly.
pub trait Clock: Debug + Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;

    /// Seconds since the Unix epoch (database timestamps use this unit).
    fn now_secs(&self) -> i64 {
        (self.now_millis() / 1000) as i64
    }
}

/// Wall-clock time. The only implementation used outside tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64
    }
}
