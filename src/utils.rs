//! Utility functions for the trading engine
//!
//! Time sources, retry with exponential backoff, and the shared token-bucket
//! rate limiter used by both HTTP and WebSocket transports.

use crate::errors::Result;

/// High-precision timestamp utilities
pub mod time {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

    /// Get current Unix timestamp in seconds
    #[inline]
    pub fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_secs()
    }

    /// Get current Unix timestamp in milliseconds
    #[inline]
    pub fn now_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_millis() as u64
    }

    /// Monotonic elapsed-time measurement, immune to wall-clock adjustments
    #[derive(Debug, Clone, Copy)]
    pub struct MonotonicClock(Instant);

    impl MonotonicClock {
        pub fn start() -> Self {
            Self(Instant::now())
        }

        pub fn elapsed(&self) -> Duration {
            self.0.elapsed()
        }
    }

    /// Strictly increasing nonce source seeded from wall-clock milliseconds
    ///
    /// The venue rejects out-of-order nonces, and a nonce must never be
    /// reused even under retry, so two calls in the same millisecond (or
    /// across a clock rewind) still advance.
    #[derive(Debug)]
    pub struct NonceGenerator {
        last: AtomicU64,
    }

    impl NonceGenerator {
        pub fn new() -> Self {
            Self {
                last: AtomicU64::new(0),
            }
        }

        pub fn next(&self) -> u64 {
            let now = now_millis();
            let mut last = self.last.load(Ordering::Relaxed);
            loop {
                let candidate = now.max(last + 1);
                match self.last.compare_exchange_weak(
                    last,
                    candidate,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => return candidate,
                    Err(observed) => last = observed,
                }
            }
        }
    }

    impl Default for NonceGenerator {
        fn default() -> Self {
            Self::new()
        }
    }
}

/// Network and retry utilities
pub mod retry {
    use super::Result;
    use std::future::Future;
    use tokio::time::{sleep, Duration};

    /// Exponential backoff configuration
    #[derive(Debug, Clone)]
    pub struct RetryConfig {
        pub max_attempts: usize,
        pub initial_delay: Duration,
        pub max_delay: Duration,
        pub backoff_factor: f64,
        pub jitter: bool,
    }

    impl Default for RetryConfig {
        fn default() -> Self {
            Self {
                max_attempts: 3,
                initial_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(10),
                backoff_factor: 2.0,
                jitter: true,
            }
        }
    }

    impl RetryConfig {
        /// No retries; run the operation exactly once
        pub fn none() -> Self {
            Self {
                max_attempts: 1,
                ..Self::default()
            }
        }
    }

    /// Retry a future with exponential backoff
    ///
    /// Only errors classified retryable by `HyperfillError::is_retryable` are
    /// retried; everything else propagates immediately.
    pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = config.initial_delay;
        let mut last_error = None;

        for attempt in 0..config.max_attempts {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !err.is_retryable() || attempt == config.max_attempts - 1 {
                        return Err(err);
                    }
                    last_error = Some(err);

                    let actual_delay = if config.jitter {
                        // ±5% so simultaneous clients spread out
                        let jitter = 0.95 + rand::random::<f64>() * 0.1;
                        Duration::from_nanos((delay.as_nanos() as f64 * jitter) as u64)
                    } else {
                        delay
                    };
                    sleep(actual_delay).await;

                    delay = std::cmp::min(
                        Duration::from_nanos(
                            (delay.as_nanos() as f64 * config.backoff_factor) as u64,
                        ),
                        config.max_delay,
                    );
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| crate::errors::HyperfillError::invariant("retry loop exhausted")))
    }
}

/// Rate limiting utilities
pub mod rate_limit {
    use std::sync::Mutex;
    use std::time::Instant;

    /// Token bucket pacing all outgoing HTTP requests and WS subscribe frames
    ///
    /// Exhaustion is reported to the caller (mapped to `RateLimited`), never
    /// silently queued.
    #[derive(Debug)]
    pub struct TokenBucket {
        capacity: f64,
        refill_per_sec: f64,
        state: Mutex<BucketState>,
    }

    #[derive(Debug)]
    struct BucketState {
        tokens: f64,
        last_refill: Instant,
    }

    impl TokenBucket {
        pub fn per_second(rate: u32) -> Self {
            let capacity = rate as f64;
            Self {
                capacity,
                refill_per_sec: capacity,
                state: Mutex::new(BucketState {
                    tokens: capacity,
                    last_refill: Instant::now(),
                }),
            }
        }

        /// Try to consume one token; `false` means the bucket is exhausted
        pub fn try_consume(&self) -> bool {
            let mut state = self.state.lock().expect("rate limiter lock poisoned");
            let elapsed = state.last_refill.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                state.last_refill = Instant::now();
            }
            if state.tokens >= 1.0 {
                state.tokens -= 1.0;
                true
            } else {
                false
            }
        }

        /// Remaining whole tokens, for diagnostics
        pub fn available(&self) -> u32 {
            let state = self.state.lock().expect("rate limiter lock poisoned");
            state.tokens.max(0.0) as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HyperfillError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_nonce_strictly_increasing() {
        let gen = time::NonceGenerator::new();
        let mut last = 0;
        for _ in 0..1_000 {
            let next = gen.next();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn test_nonce_seeded_from_wall_clock() {
        let before = time::now_millis();
        let nonce = time::NonceGenerator::new().next();
        assert!(nonce >= before);
    }

    #[test]
    fn test_token_bucket_exhaustion_and_refill() {
        let bucket = rate_limit::TokenBucket::per_second(5);
        for _ in 0..5 {
            assert!(bucket.try_consume());
        }
        assert!(!bucket.try_consume());
        std::thread::sleep(std::time::Duration::from_millis(250));
        // ~1.25 tokens refilled
        assert!(bucket.try_consume());
    }

    #[tokio::test]
    async fn test_retry_stops_on_non_retryable() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let result: Result<()> = retry::with_retry(&retry::RetryConfig::default(), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(HyperfillError::order_rejected("no margin"))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let config = retry::RetryConfig {
            initial_delay: std::time::Duration::from_millis(1),
            jitter: false,
            ..Default::default()
        };
        let result = retry::with_retry(&config, || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(HyperfillError::timeout("blip"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
