/// Rate limiting and throttling
///
/// Per-client request quotas behind an injected `CounterStore` seam: the
/// boundary only sees atomic increment-and-check, so the in-memory backend
/// can be swapped for a shared store without touching auth or routing.
/// The reported quota is surfaced unmodified as the X-RateLimit-* headers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Outcome of one counted request
#[derive(Debug, Clone, Copy)]
pub struct Quota {
    pub limit: u32,
    pub remaining: u32,
    /// Unix timestamp at which the window resets
    pub reset_at: i64,
    pub allowed: bool,
}

/// Atomic increment-and-check over a fixed window
pub trait CounterStore: Send + Sync {
    fn hit(&self, key: &str, limit: u32, window_seconds: i64, now: i64) -> Quota;
}

struct Window {
    started_at: i64,
    reset_at: i64,
    attempts: u32,
}

impl Window {
    fn new(now: i64, window_seconds: i64) -> Self {
        Self {
            started_at: now,
            reset_at: now + window_seconds,
            attempts: 0,
        }
    }
}

/// Process-local fixed-window counters
pub struct MemoryCounterStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore for MemoryCounterStore {
    fn hit(&self, key: &str, limit: u32, window_seconds: i64, now: i64) -> Quota {
        let mut windows = self.windows.lock().unwrap();
        let window = windows
            .entry(key.to_string())
            .or_insert_with(|| Window::new(now, window_seconds));

        if now - window.started_at >= window_seconds {
            *window = Window::new(now, window_seconds);
        }

        if window.attempts >= limit {
            return Quota {
                limit,
                remaining: 0,
                reset_at: window.reset_at,
                allowed: false,
            };
        }

        window.attempts += 1;
        Quota {
            limit,
            remaining: limit - window.attempts,
            reset_at: window.reset_at,
            allowed: true,
        }
    }
}

/// Per-client request quota over a fixed window
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    limit: u32,
    window_seconds: i64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, limit: u32, window_seconds: i64) -> Self {
        Self {
            store,
            limit,
            window_seconds,
        }
    }

    pub fn attempt(&self, key: &str) -> Quota {
        let now = chrono::Utc::now().timestamp();
        self.store.hit(key, self.limit, self.window_seconds, now)
    }
}

/// Minimum spacing between consecutive requests from one client. A request
/// arriving too soon is delayed by the interval, then served.
pub struct Throttle {
    min_interval: Duration,
    last_seen: Mutex<HashMap<String, i64>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// The delay to apply before serving, if the client is too eager
    pub fn check(&self, key: &str) -> Option<Duration> {
        self.check_at(key, chrono::Utc::now().timestamp_millis())
    }

    fn check_at(&self, key: &str, now_millis: i64) -> Option<Duration> {
        let mut last_seen = self.last_seen.lock().unwrap();
        match last_seen.get(key) {
            Some(last) if now_millis - last < self.min_interval.as_millis() as i64 => {
                Some(self.min_interval)
            }
            _ => {
                last_seen.insert(key.to_string(), now_millis);
                None
            }
        }
    }
}
