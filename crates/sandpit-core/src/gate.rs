//! Bounded admission in front of the sandbox
//!
//! At most `capacity` children run at once. Further submissions wait in a
//! queue of at most `max_queued`; beyond that they are turned away
//! immediately instead of piling up.

use crate::{Result, SandpitError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Admission semaphore with a bounded wait queue
#[derive(Debug)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    max_queued: usize,
    queued: AtomicUsize,
}

/// Held for the duration of one execution; releases the slot on drop
#[derive(Debug)]
pub struct Admission {
    _permit: OwnedSemaphorePermit,
}

/// Snapshot of gate occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStatus {
    pub capacity: usize,
    pub running: usize,
    pub queued: usize,
}

/// Decrements the queue counter however the wait ends, including when the
/// waiting future is dropped.
struct QueuedGuard<'a>(&'a AtomicUsize);

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ConcurrencyGate {
    #[must_use]
    pub fn new(capacity: usize, max_queued: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            max_queued,
            queued: AtomicUsize::new(0),
        }
    }

    /// Wait for a free slot, or fail with [`SandpitError::Overloaded`] when
    /// the queue is already full.
    pub async fn admit(&self) -> Result<Admission> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => return Ok(Admission { _permit: permit }),
            Err(TryAcquireError::Closed) => return Err(SandpitError::GateClosed),
            Err(TryAcquireError::NoPermits) => {}
        }

        let ahead = self.queued.fetch_add(1, Ordering::AcqRel);
        let _guard = QueuedGuard(&self.queued);
        if ahead >= self.max_queued {
            return Err(SandpitError::Overloaded { queued: ahead });
        }

        tracing::debug!(queued = ahead + 1, "waiting for sandbox slot");

        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| SandpitError::GateClosed)?;

        Ok(Admission { _permit: permit })
    }

    /// Stop admitting; current and future waiters get [`SandpitError::GateClosed`].
    pub fn close(&self) {
        self.semaphore.close();
    }

    #[must_use]
    pub fn status(&self) -> GateStatus {
        GateStatus {
            capacity: self.capacity,
            running: self
                .capacity
                .saturating_sub(self.semaphore.available_permits()),
            queued: self.queued.load(Ordering::Acquire),
        }
    }
}
