//! Per-route, per-client request budgets over a fixed one-hour window. Abuse
//! prevention only; nothing relies on it for correctness.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Hourly budget for a method, or `None` when the method is not limited.
pub fn hourly_limit(method: &str) -> Option<u32> {
    match method {
        "auth.student.loginUrl" => Some(800),
        "auth.student.callback" => Some(200),
        "student.setup"
        | "student.activity.get"
        | "student.activity.book"
        | "student.confirmation" => Some(500),
        "auth.admin.loginUrl" | "auth.admin.login" => Some(100),
        _ => None,
    }
}

struct Window {
    started: DateTime<Utc>,
    count: u32,
}

pub struct RateLimiter {
    window: Duration,
    counters: HashMap<String, Window>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::hours(1))
    }
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            counters: HashMap::new(),
        }
    }

    /// Counts the request and reports whether it is within budget.
    pub fn allow(&mut self, method: &str, client: &str, now: DateTime<Utc>) -> bool {
        let Some(limit) = hourly_limit(method) else {
            return true;
        };
        let key = format!("{}|{}", method, client);
        let window = self.counters.entry(key).or_insert(Window {
            started: now,
            count: 0,
        });
        if now - window.started >= self.window {
            window.started = now;
            window.count = 0;
        }
        if window.count >= limit {
            return false;
        }
        window.count += 1;
        true
    }
}
