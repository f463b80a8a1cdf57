// mailverify
// Copyright (C) 2024 mailverify contributors

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The rate limiter: per-client token buckets at request ingress.
//! Global buckets (200/hour, 50/minute) apply across both endpoints;
//! `/verify` and `/bulk-verify` each additionally carry their own
//! per-minute bucket. An exceeded bucket never invokes the pipeline.
//!
//! Each client's buckets live behind one `DashMap` entry, so checking and
//! consuming all of a request's buckets happens under a single shard lock
//! with no separate global lock in the hot path.

use std::time::Instant;

use dashmap::DashMap;

use crate::config::RateLimitConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Verify,
    BulkVerify,
}

/// A classic token bucket: refills continuously at `refill_per_sec`, capped
/// at `capacity`, checked lazily on each access rather than via a
/// background ticker.
#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn per_window(count: u32, window_secs: f64) -> Self {
        let capacity = count as f64;
        TokenBucket {
            capacity,
            tokens: capacity,
            refill_per_sec: capacity / window_secs,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    fn has_token(&mut self) -> bool {
        self.refill();
        self.tokens >= 1.0
    }

    fn consume(&mut self) {
        self.tokens -= 1.0;
    }
}

struct ClientBuckets {
    hourly_global: TokenBucket,
    minute_global: TokenBucket,
    minute_verify: TokenBucket,
    minute_bulk: TokenBucket,
}

impl ClientBuckets {
    fn fresh(config: &RateLimitConfig) -> Self {
        ClientBuckets {
            hourly_global: TokenBucket::per_window(config.global_per_hour, 3600.0),
            minute_global: TokenBucket::per_window(config.global_per_minute, 60.0),
            minute_verify: TokenBucket::per_window(config.verify_per_minute, 60.0),
            minute_bulk: TokenBucket::per_window(config.bulk_verify_per_minute, 60.0),
        }
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    clients: DashMap<String, ClientBuckets>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        RateLimiter {
            config,
            clients: DashMap::new(),
        }
    }

    /// Checks every bucket that applies to `endpoint` for `client_key` and,
    /// only if all of them have a token available, consumes one from each.
    /// A request that fails one check never partially drains the others.
    pub fn try_acquire(&self, client_key: &str, endpoint: Endpoint) -> bool {
        let mut entry = self
            .clients
            .entry(client_key.to_string())
            .or_insert_with(|| ClientBuckets::fresh(&self.config));

        let hour_ok = entry.hourly_global.has_token();
        let minute_ok = entry.minute_global.has_token();
        let endpoint_ok = match endpoint {
            Endpoint::Verify => entry.minute_verify.has_token(),
            Endpoint::BulkVerify => entry.minute_bulk.has_token(),
        };

        if !(hour_ok && minute_ok && endpoint_ok) {
            return false;
        }

        entry.hourly_global.consume();
        entry.minute_global.consume();
        match endpoint {
            Endpoint::Verify => entry.minute_verify.consume(),
            Endpoint::BulkVerify => entry.minute_bulk.consume(),
        }
        true
    }
}
