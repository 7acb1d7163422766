use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::clock::Clock;

/// Fixed-window login limiter keyed by client identifier (IP address).
///
/// Process-local and in-memory: a restart clears all counters and blocks.
/// Limits are therefore per server process, not per deployment — a known
/// property, not something callers should try to compensate for.
#[derive(Clone, Debug)]
pub struct LoginRateLimiter {
    inner: Arc<LimiterInner>,
}

#[derive(Debug)]
struct LimiterInner {
    /// Attempt counters per identifier
    entries: RwLock<HashMap<String, AttemptEntry>>,
    clock: Arc<dyn Clock>,
    /// Handle of the running sweep task, if any
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug, Clone)]
struct AttemptEntry {
    count: u32,
    /// When the current window ends (ms since epoch)
    reset_time: u64,
    /// Set once the identifier exceeds the attempt cap (ms since epoch)
    blocked_until: Option<u64>,
}

/// Outcome of a single `check` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Attempts left in the current window after this one
    pub remaining: u32,
    /// When the current window ends (ms since epoch)
    pub reset_time: u64,
    /// Block expiry while a block is active (ms since epoch)
    pub blocked_until: Option<u64>,
}

impl RateDecision {
    /// Seconds until the caller may try again, rounded up.
    pub fn retry_after_secs(&self, now_millis: u64) -> u64 {
        let until = self.blocked_until.unwrap_or(self.reset_time);
        until.saturating_sub(now_millis).div_ceil(1000)
    }
}

impl LoginRateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(LimiterInner {
                entries: RwLock::new(HashMap::new()),
                clock,
                sweeper: Mutex::new(None),
            }),
        }
    }

    /// Count one attempt for `identifier` and decide whether to admit it.
    ///
    /// Window and block parameters come from the caller on every call so a
    /// config reload takes effect without rebuilding the limiter. `block`
    /// of `None` means exceeding the cap denies only until the window ends.
    ///
    /// The whole check-and-increment runs under one write guard; two
    /// concurrent calls for the same identifier can never both observe the
    /// same count.
    pub async fn check(
        &self,
        identifier: &str,
        window: Duration,
        max_attempts: u32,
        block: Option<Duration>,
    ) -> RateDecision {
        let now = self.inner.clock.now_millis();
        let window_ms = window.as_millis() as u64;
        let mut entries = self.inner.entries.write().await;

        let entry = entries
            .entry(identifier.to_string())
            .or_insert_with(|| AttemptEntry {
                count: 0,
                reset_time: now + window_ms,
                blocked_until: None,
            });

        // An active block denies outright; blocked attempts are not counted.
        if let Some(blocked_until) = entry.blocked_until {
            if now < blocked_until {
                return RateDecision {
                    allowed: false,
                    remaining: 0,
                    reset_time: entry.reset_time,
                    blocked_until: Some(blocked_until),
                };
            }
        }

        // Start a fresh window when the entry is brand new, its window has
        // passed, or its block has just lapsed.
        if entry.count == 0 || now >= entry.reset_time || entry.blocked_until.is_some() {
            entry.count = 1;
            entry.reset_time = now + window_ms;
            entry.blocked_until = None;
            return RateDecision {
                allowed: true,
                remaining: max_attempts.saturating_sub(1),
                reset_time: entry.reset_time,
                blocked_until: None,
            };
        }

        // Same window: count this attempt.
        entry.count += 1;
        if entry.count > max_attempts {
            entry.blocked_until = block.map(|d| now + d.as_millis() as u64);
            debug!(
                "Rate limit exceeded for {} ({} attempts)",
                identifier, entry.count
            );
            return RateDecision {
                allowed: false,
                remaining: 0,
                reset_time: entry.reset_time,
                blocked_until: entry.blocked_until,
            };
        }

        RateDecision {
            allowed: true,
            remaining: max_attempts - entry.count,
            reset_time: entry.reset_time,
            blocked_until: None,
        }
    }

    /// Forget everything about `identifier` (called after a successful
    /// login so earlier failures stop counting against the user).
    pub async fn reset(&self, identifier: &str) {
        self.inner.entries.write().await.remove(identifier);
    }

    /// Evict entries whose window and block have both lapsed.
    pub async fn sweep(&self) {
        let now = self.inner.clock.now_millis();
        let mut entries = self.inner.entries.write().await;

        let before = entries.len();
        entries
            .retain(|_, e| now < e.reset_time || e.blocked_until.is_some_and(|until| now < until));
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!("Rate limiter sweep evicted {} idle entries", evicted);
        }
    }

    /// Spawn the periodic sweep task. Calling this twice is a no-op.
    pub async fn start(&self, interval: Duration) {
        let mut sweeper = self.inner.sweeper.lock().await;
        if sweeper.is_some() {
            return;
        }

        let limiter = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                limiter.sweep().await;
            }
        });
        *sweeper = Some(handle);

        info!("Rate limiter sweep task started (every {:?})", interval);
    }

    /// Stop the sweep task if it is running.
    pub async fn stop(&self) {
        if let Some(handle) = self.inner.sweeper.lock().await.take() {
            handle.abort();
            info!("Rate limiter sweep task stopped");
        }
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.inner.entries.read().await.len()
    }
}
