//! Rate Limiter (C2, §4.2): a concurrency cap plus a leaky-bucket RPS
//! budget in front of every RPC call, mirroring the original's paired
//! `asyncio.Semaphore` + token-bucket rate limiter.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

#[derive(Clone, Copy, Debug)]
pub struct RateLimiterStats {
    pub in_flight: usize,
    pub available_permits: usize,
    pub rps_budget: u32,
}

/// Holds the concurrency permit for the duration of one RPC call; dropping
/// it returns the slot to the semaphore.
pub struct RateLimitPermit {
    _permit: OwnedSemaphorePermit,
}

struct LeakyBucket {
    rps: u32,
    tokens: Mutex<(f64, Instant)>,
}

impl LeakyBucket {
    fn new(rps: u32) -> Self {
        Self { rps, tokens: Mutex::new((rps as f64, Instant::now())) }
    }

    async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.tokens.lock().await;
                let (tokens, last) = &mut *state;
                let elapsed = last.elapsed().as_secs_f64();
                *tokens = (*tokens + elapsed * self.rps as f64).min(self.rps as f64);
                *last = Instant::now();

                if *tokens >= 1.0 {
                    *tokens -= 1.0;
                    None
                } else {
                    Some(Duration::from_secs_f64((1.0 - *tokens) / self.rps as f64))
                }
            };
            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}

/// `semaphore` caps in-flight RPC calls; `bucket` independently caps the
/// rate at which new calls may start. Both must admit a caller before
/// `acquire` returns.
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    bucket: LeakyBucket,
    max_permits: usize,
}

impl RateLimiter {
    pub fn new(max_concurrency: usize, rps: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            bucket: LeakyBucket::new(rps),
            max_permits: max_concurrency,
        }
    }

    pub async fn acquire(&self) -> RateLimitPermit {
        self.bucket.acquire().await;
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore is never closed");
        RateLimitPermit { _permit: permit }
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            in_flight: self.max_permits - self.semaphore.available_permits(),
            available_permits: self.semaphore.available_permits(),
            rps_budget: self.bucket.rps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_respects_concurrency_cap() {
        let limiter = RateLimiter::new(1, 1000);
        let permit = limiter.acquire().await;
        assert_eq!(limiter.stats().available_permits, 0);
        drop(permit);
        assert_eq!(limiter.stats().available_permits, 1);
    }

    #[tokio::test]
    async fn stats_reports_rps_budget() {
        let limiter = RateLimiter::new(4, 10);
        assert_eq!(limiter.stats().rps_budget, 10);
    }
}
