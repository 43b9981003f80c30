//! Per-client rate limiting
//!
//! Token bucket per client key. Buckets refill at the configured QPS and
//! hold at most one second of burst. Old buckets are pruned lazily when the
//! map grows past a housekeeping threshold.

use dashmap::DashMap;
use std::time::Instant;

/// Map size that triggers a prune pass
const PRUNE_THRESHOLD: usize = 10_000;

/// Buckets idle this long are dropped
const IDLE_SECONDS: f64 = 300.0;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket limiter keyed by client id
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    qps: f64,
}

impl RateLimiter {
    pub fn new(qps_ceiling: u32) -> Self {
        Self {
            buckets: DashMap::new(),
            qps: qps_ceiling.max(1) as f64,
        }
    }

    /// Try to take one token for the client; false means 429
    pub fn allow(&self, client_key: &str) -> bool {
        if self.buckets.len() > PRUNE_THRESHOLD {
            self.prune();
        }

        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry(client_key.to_string())
            .or_insert_with(|| Bucket {
                tokens: self.qps,
                last_refill: now,
            });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.qps).min(self.qps);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn prune(&self) {
        self.buckets
            .retain(|_, b| b.last_refill.elapsed().as_secs_f64() < IDLE_SECONDS);
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}
