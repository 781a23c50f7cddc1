//! Bounded-concurrency gates for browser work.
//!
//! One [`RateLimiter`] exists per operation class. Listing traversal runs
//! through a single-slot gate so the listing surface is never hit in
//! parallel; detail fetches share a wider gate. A [`RateLimitPermit`] is
//! released when dropped, so every exit path of the guarded work gives the
//! slot back.
//!
//! # Example
//!
//! ```rust
//! use gleaner_core::rate_limit::{LimiterClass, RateLimiter};
//!
//! # async fn run() -> Result<(), gleaner_core::AppError> {
//! let detail = RateLimiter::new(LimiterClass::Detail, 5);
//! let permit = detail.acquire().await?;
//! // ... open a page, do the work ...
//! drop(permit);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::AppError;

/// Operation class sharing one concurrency ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterClass {
    /// Listing (search results) traversal.
    Listing,
    /// Detail page fetches.
    Detail,
}

impl fmt::Display for LimiterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimiterClass::Listing => write!(f, "listing"),
            LimiterClass::Detail => write!(f, "detail"),
        }
    }
}

/// Counting-semaphore gate for one [`LimiterClass`].
#[derive(Clone)]
pub struct RateLimiter {
    class: LimiterClass,
    capacity: usize,
    semaphore: Arc<Semaphore>,
}

impl RateLimiter {
    /// Creates a gate with `capacity` slots (at least one).
    pub fn new(class: LimiterClass, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            class,
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    pub fn class(&self) -> LimiterClass {
        self.class
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a free slot.
    pub async fn acquire(&self) -> Result<RateLimitPermit, AppError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| AppError::Generic(format!("{} rate limiter closed", self.class)))?;
        tracing::trace!(class = %self.class, available = self.available(), "Permit acquired");
        Ok(RateLimitPermit {
            class: self.class,
            _permit: permit,
        })
    }

    /// Runs `operation` while holding a slot.
    pub async fn run<F, T>(&self, operation: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let _permit = self.acquire().await?;
        operation.await
    }
}

/// Scoped hold on one limiter slot; released on drop.
pub struct RateLimitPermit {
    class: LimiterClass,
    _permit: OwnedSemaphorePermit,
}

impl RateLimitPermit {
    pub fn class(&self) -> LimiterClass {
        self.class
    }
}

impl Drop for RateLimitPermit {
    fn drop(&mut self) {
        tracing::trace!(class = %self.class, "Permit released");
    }
}
