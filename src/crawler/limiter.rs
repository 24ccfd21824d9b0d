//! Process-wide concurrency limiter
//!
//! A single counting semaphore bounds the number of outstanding fetches across
//! every level of every tree. Closing the semaphore is the cancellation signal:
//! all current and future waiters receive `Cancelled`, while permits already
//! handed out stay valid until their fetch finishes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Returned to waiters once the limiter has been closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("harvest cancelled")]
pub struct Cancelled;

/// Global ceiling on in-flight fetches
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Semaphore,
    capacity: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Semaphore::new(capacity),
            capacity,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Waits for a permit
    ///
    /// Suspends while the ceiling is reached. Fails only once the limiter
    /// has been closed.
    pub async fn acquire(&self) -> Result<FetchPermit<'_>, Cancelled> {
        let permit = self.semaphore.acquire().await.map_err(|_| Cancelled)?;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        Ok(FetchPermit {
            _permit: permit,
            in_flight: &self.in_flight,
        })
    }

    /// Stops granting permits and wakes every waiter with `Cancelled`
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently held
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of permits ever held at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// A held slot; released on drop, on every exit path
#[derive(Debug)]
pub struct FetchPermit<'a> {
    _permit: SemaphorePermit<'a>,
    in_flight: &'a AtomicUsize,
}

impl Drop for FetchPermit<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Clonable handle that cancels a run
#[derive(Debug, Clone)]
pub struct CancelHandle {
    limiter: Arc<ConcurrencyLimiter>,
}

impl CancelHandle {
    pub fn new(limiter: Arc<ConcurrencyLimiter>) -> Self {
        Self { limiter }
    }

    pub fn cancel(&self) {
        if !self.limiter.is_closed() {
            tracing::warn!("Cancellation requested; no new requests will be issued");
        }
        self.limiter.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.limiter.is_closed()
    }
}
