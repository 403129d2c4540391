use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::GateError;

/// RAII guard for one admitted request.
///
/// Dropping it returns the slot to the gate, so release happens exactly once
/// on every exit path of the holder, including unwinding.
pub struct Permit {
    #[allow(dead_code)]
    permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for Permit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit").finish()
    }
}

/// Bounds the number of requests concurrently forwarded to the backend.
///
/// Constructed once and handed to every request flow by handle; clones share
/// the same slots. Capacity is fixed at construction.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    /// Create a gate admitting at most `capacity` concurrent holders.
    ///
    /// `capacity` is clamped to `1..=Semaphore::MAX_PERMITS`; a zero-capacity
    /// gate would block every caller forever.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot, or give up when `cancel` fires.
    ///
    /// Cancellation is checked first, so an already-cancelled scope is
    /// rejected even if a slot is free. A rejected call holds no slot. The
    /// semaphore is never closed, so `Rejected` is the only failure.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Permit, GateError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GateError::Rejected),
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit
                .map(|permit| Permit { permit })
                .map_err(|_| GateError::Rejected),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of permits currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }
}
