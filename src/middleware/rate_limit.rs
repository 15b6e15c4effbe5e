//! Per-partner fixed-window request limiter.
//!
//! The counter is process-local and in-memory. Under horizontal scale-out
//! each instance counts independently; correctness there requires sticky
//! routing per partner or promoting the counter to a shared store behind
//! this same interface.

use crate::config::RateLimitConfig;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.reset_at - now).num_seconds().max(0) as u64
    }
}

pub struct RateLimiter {
    windows: Mutex<HashMap<Uuid, Window>>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            limit: config.max_requests,
            window: Duration::seconds(config.window_secs as i64),
        }
    }

    pub fn check(&self, partner_id: Uuid) -> RateLimitDecision {
        self.check_at(partner_id, Utc::now())
    }

    pub fn check_at(&self, partner_id: Uuid, now: DateTime<Utc>) -> RateLimitDecision {
        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");
        let entry = windows.entry(partner_id).or_insert(Window {
            count: 0,
            reset_at: now + self.window,
        });
        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window;
        }
        entry.count += 1;

        RateLimitDecision {
            allowed: entry.count <= self.limit,
            limit: self.limit,
            remaining: self.limit.saturating_sub(entry.count),
            reset_at: entry.reset_at,
        }
    }
}
