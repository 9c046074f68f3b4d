//! Per-user fixed-window rate limiting for ticket creation.

use crate::clock::Clock;
use crate::errors::TicketwardenError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Requests allowed per window by default.
pub const DEFAULT_MAX_REQUESTS: u32 = 5;

/// Default window length in seconds.
pub const DEFAULT_WINDOW_SECS: i64 = 300;

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: i64,
    count: u32,
}

/// Fixed-window limiter keyed by user id.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    max_requests: u32,
    window_secs: i64,
    windows: Mutex<HashMap<u64, Window>>,
}

impl RateLimiter {
    /// Limiter with the default 5 requests per 5 minutes.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(clock, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECS)
    }

    /// Limiter with explicit limits. A zero window is treated as one second.
    pub fn with_limits(clock: Arc<dyn Clock>, max_requests: u32, window_secs: i64) -> Self {
        Self {
            clock,
            max_requests,
            window_secs: window_secs.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` when `user_id` must be refused; otherwise counts the request.
    pub fn check(&self, user_id: u64) -> bool {
        let now = self.clock.now_unix();
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let window = windows.entry(user_id).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now - window.started_at >= self.window_secs {
            *window = Window {
                started_at: now,
                count: 0,
            };
        }

        if window.count >= self.max_requests {
            return true;
        }

        window.count += 1;
        false
    }

    /// Guard form of [`check`](Self::check).
    pub fn require(&self, user_id: u64) -> Result<(), TicketwardenError> {
        if self.check(user_id) {
            return Err(TicketwardenError::RateLimited);
        }
        Ok(())
    }

    /// Drop windows that have ended. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_unix();
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = windows.len();
        windows.retain(|_, window| now - window.started_at < self.window_secs);
        before - windows.len()
    }

    /// Number of users with an open window.
    pub fn tracked_users(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
