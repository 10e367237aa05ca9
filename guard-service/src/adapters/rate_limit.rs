//! Sliding-window rate limiting.
//!
//! One timestamp deque per key. All work on a key happens under its
//! `DashMap` entry lock, so check-and-increment is atomic per key: a
//! burst of concurrent creations cannot all observe the pre-increment
//! count and slip past the cap.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use guard_core::{RateLimitVerdict, RateLimiter, StoreError, WindowSpec};

#[derive(Default)]
pub struct SlidingWindowRateLimiter {
    hits: DashMap<String, VecDeque<Instant>>,
}

impl SlidingWindowRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop keys whose entire window has elapsed. Called opportunistically
    /// by whoever owns the limiter; counting does its own per-key pruning.
    pub fn purge_idle(&self, window: Duration) -> usize {
        let now = Instant::now();
        let before = self.hits.len();
        self.hits.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|last| now.duration_since(*last) < window)
        });
        before - self.hits.len()
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowRateLimiter {
    async fn check_and_increment(
        &self,
        key: &str,
        window: WindowSpec,
    ) -> Result<RateLimitVerdict, StoreError> {
        let now = Instant::now();
        let mut timestamps = self.hits.entry(key.to_string()).or_default();

        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= window.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if (timestamps.len() as u32) < window.max_requests {
            timestamps.push_back(now);
            Ok(RateLimitVerdict {
                allowed: true,
                remaining: window.max_requests - timestamps.len() as u32,
                retry_after: None,
            })
        } else {
            // The key frees up when the oldest in-window hit ages out.
            let retry_after = timestamps
                .front()
                .map(|oldest| window.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(window.window)
                .max(Duration::from_secs(1));
            Ok(RateLimitVerdict {
                allowed: false,
                remaining: 0,
                retry_after: Some(retry_after),
            })
        }
    }
}
