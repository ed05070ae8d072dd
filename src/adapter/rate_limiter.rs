//! @ai:module:intent Token-bucket throttle shared by the hosted-API adapters
//! @ai:module:layer infrastructure
//! @ai:module:public_api RateLimiter
//! @ai:module:stateless false

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// @ai:intent Trait for request throttling
pub trait RateLimiterTrait: Send + Sync {
    /// @ai:intent Wait until one more request may be sent
    fn acquire(&self) -> impl std::future::Future<Output = ()> + Send;
}

/// @ai:intent Requests-per-minute bucket; a limit of 0 disables throttling
#[derive(Clone)]
pub struct RateLimiter {
    bucket: Arc<Mutex<Bucket>>,
    requests_per_minute: u32,
}

struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl Bucket {
    fn refill(&mut self, per_second: f64, capacity: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.refilled_at).as_secs_f64();
        self.tokens = (self.tokens + elapsed * per_second).min(capacity);
        self.refilled_at = now;
    }
}

impl RateLimiter {
    /// @ai:intent Create a full bucket holding `requests_per_minute` tokens
    /// @ai:effects time
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: requests_per_minute as f64,
                refilled_at: Instant::now(),
            })),
            requests_per_minute,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.requests_per_minute == 0
    }

    fn per_second(&self) -> f64 {
        self.requests_per_minute as f64 / 60.0
    }

    /// @ai:intent Tokens currently in the bucket
    /// @ai:effects state:write, time
    pub async fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(self.per_second(), self.requests_per_minute as f64);
        bucket.tokens
    }
}

impl RateLimiterTrait for RateLimiter {
    /// @ai:intent Take a token, sleeping until one is refilled
    /// @ai:effects state:write, time
    async fn acquire(&self) {
        if self.is_unlimited() {
            return;
        }

        loop {
            let wait_for = {
                let mut bucket = self.bucket.lock().await;
                bucket.refill(self.per_second(), self.requests_per_minute as f64);

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }

                Duration::from_secs_f64((1.0 - bucket.tokens) / self.per_second())
            };

            tracing::debug!("Rate limit reached, waiting {:?}", wait_for);
            tokio::time::sleep(wait_for).await;
        }
    }
}
