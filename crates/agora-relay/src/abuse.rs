use agora_types::AgentKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Token-bucket rate limiter. Buckets are keyed by agent key or client
/// address depending on the caller.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<String, TokenBucket>>>,
    config: RateLimitConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum tokens (burst capacity).
    pub max_tokens: u32,
    /// Tokens replenished per second.
    pub refill_rate: f64,
    /// Tokens consumed per request.
    pub cost: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_tokens: 60,
            refill_rate: 10.0,
            cost: 1,
        }
    }
}

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(max_tokens: u32) -> Self {
        Self {
            tokens: max_tokens as f64,
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self, cost: u32, max_tokens: u32, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(max_tokens as f64);
        self.last_refill = now;

        if self.tokens >= cost as f64 {
            self.tokens -= cost as f64;
            true
        } else {
            false
        }
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Check if a request from this key is allowed.
    /// Returns true if allowed, false if rate-limited.
    pub fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.write().unwrap();
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.config.max_tokens));
        bucket.try_consume(self.config.cost, self.config.max_tokens, self.config.refill_rate)
    }

    /// Check rate limit by client IP address.
    pub fn check_ip(&self, ip: &str) -> bool {
        self.check(&format!("ip:{ip}"))
    }

    /// Check rate limit for an agent's registration. Only charge this once
    /// the agent has proven it owns the key.
    pub fn check_register(&self, agent: &AgentKey) -> bool {
        self.check(&format!("register:{agent}"))
    }

    /// Check rate limit for an agent's outbound sends.
    pub fn check_send(&self, agent: &AgentKey) -> bool {
        self.check(&format!("send:{agent}"))
    }

    /// Evict stale buckets (idle for more than `max_idle_seconds`).
    pub fn evict_stale(&self, max_idle_seconds: f64) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.write().unwrap();
        let before = buckets.len();
        buckets.retain(|_, bucket| {
            now.duration_since(bucket.last_refill).as_secs_f64() < max_idle_seconds
        });
        before - buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_identity::AgentKeypair;

    #[test]
    fn rate_limiter_allows_normal_traffic() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_tokens: 10,
            refill_rate: 10.0,
            cost: 1,
        });
        for i in 0..10 {
            assert!(limiter.check("test"), "request {i} should be allowed");
        }
    }

    #[test]
    fn rate_limiter_rejects_burst() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_tokens: 5,
            refill_rate: 0.001,
            cost: 1,
        });
        for _ in 0..5 {
            assert!(limiter.check("test"));
        }
        assert!(!limiter.check("test"));
    }

    #[test]
    fn register_and_send_buckets_are_separate() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_tokens: 1,
            refill_rate: 0.001,
            cost: 1,
        });
        let agent = AgentKeypair::generate().agent_key();
        assert!(limiter.check_send(&agent));
        assert!(!limiter.check_send(&agent));
        assert!(limiter.check_register(&agent));
    }

    #[test]
    fn ip_buckets_are_separate_from_agents() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_tokens: 1,
            refill_rate: 0.001,
            cost: 1,
        });
        assert!(limiter.check_ip("192.168.1.1"));
        assert!(!limiter.check_ip("192.168.1.1"));
        assert!(limiter.check_ip("192.168.1.2"));
        assert!(limiter.check_register(&AgentKeypair::generate().agent_key()));
    }

    #[test]
    fn evict_stale_drops_idle_buckets() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        limiter.check("a");
        limiter.check("b");
        assert_eq!(limiter.evict_stale(3600.0), 0);
        assert_eq!(limiter.evict_stale(0.0), 2);
    }
}
