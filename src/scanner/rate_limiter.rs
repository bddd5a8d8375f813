//! Rate limiting for outbound probes.
//!
//! Provides token bucket rate limiting to control the pace of requests
//! across every worker of a scan.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovLimiter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

type DirectLimiter = GovLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Bucket parameters. `limiter` is `None` while limiting is disabled.
struct Bucket {
    rate: u32,
    burst: u32,
    limiter: Option<Arc<DirectLimiter>>,
}

struct Shared {
    enabled: AtomicBool,
    bucket: RwLock<Bucket>,
}

/// A shared token bucket.
///
/// The bucket holds at most `burst` tokens and gains `rate` tokens per second.
/// A rate of 0 disables limiting: every operation succeeds immediately
/// without touching the bucket lock.
///
/// Clones share the same bucket.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Shared>,
}

impl RateLimiter {
    /// Create a rate limiter allowing `rate` requests per second.
    ///
    /// `burst` is the bucket capacity; 0 means "same as the rate".
    /// A `rate` of 0 yields a disabled limiter.
    pub fn new(rate: u32, burst: u32) -> Self {
        let bucket = build_bucket(rate, burst);
        Self {
            inner: Arc::new(Shared {
                enabled: AtomicBool::new(bucket.limiter.is_some()),
                bucket: RwLock::new(bucket),
            }),
        }
    }

    /// Create a limiter that never throttles.
    pub fn disabled() -> Self {
        Self::new(0, 0)
    }

    /// Wait until a token is available, then consume it.
    pub async fn wait(&self) {
        if !self.is_enabled() {
            return;
        }
        // Clone the handle so no lock is held while sleeping.
        if let Some(limiter) = self.current() {
            limiter.until_ready().await;
        }
    }

    /// Try to consume a token without waiting.
    ///
    /// Returns `true` if a token was available (always, when disabled).
    pub fn try_acquire(&self) -> bool {
        if !self.is_enabled() {
            return true;
        }
        match self.current() {
            Some(limiter) => limiter.check().is_ok(),
            None => true,
        }
    }

    /// Reconfigure the rate. 0 disables limiting entirely.
    ///
    /// The capacity becomes the new rate. Tokens left in the old bucket carry
    /// over (capped at the new capacity), so an exhausted bucket stays empty.
    pub fn set_rate(&self, rate: u32) {
        let mut bucket = self
            .inner
            .bucket
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let next = build_bucket(rate, rate);
        if let (Some(old), Some(new)) = (&bucket.limiter, &next.limiter) {
            carry_over(old, new, next.burst);
        }
        *bucket = next;
        self.inner
            .enabled
            .store(bucket.limiter.is_some(), Ordering::Release);
    }

    /// Whether requests are currently being throttled.
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Configured requests per second (0 when disabled).
    pub fn rate(&self) -> u32 {
        self.read_bucket(|b| b.rate)
    }

    /// Configured bucket capacity (0 when disabled).
    pub fn burst(&self) -> u32 {
        self.read_bucket(|b| b.burst)
    }

    fn current(&self) -> Option<Arc<DirectLimiter>> {
        self.read_bucket(|b| b.limiter.clone())
    }

    fn read_bucket<T>(&self, f: impl FnOnce(&Bucket) -> T) -> T {
        let bucket = self
            .inner
            .bucket
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&bucket)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::disabled()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("enabled", &self.is_enabled())
            .field("rate", &self.rate())
            .field("burst", &self.burst())
            .finish()
    }
}

fn build_bucket(rate: u32, burst: u32) -> Bucket {
    let Some(rate_nz) = NonZeroU32::new(rate) else {
        return Bucket {
            rate: 0,
            burst: 0,
            limiter: None,
        };
    };
    let burst_nz = NonZeroU32::new(burst).unwrap_or(rate_nz);
    let quota = Quota::per_second(rate_nz).allow_burst(burst_nz);

    Bucket {
        rate,
        burst: burst_nz.get(),
        limiter: Some(Arc::new(GovLimiter::direct(quota))),
    }
}

/// Drain what is left in `old` (up to `capacity`) and leave `new` holding
/// only that many tokens.
fn carry_over(old: &DirectLimiter, new: &DirectLimiter, capacity: u32) {
    let mut remaining = 0;
    while remaining < capacity && old.check().is_ok() {
        remaining += 1;
    }
    if let Some(spent) = NonZeroU32::new(capacity - remaining) {
        let _ = new.check_n(spent);
    }
}
