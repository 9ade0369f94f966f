//! Fixed-size pool of loaded model handles.
//!
//! Handles are loaded once at startup. A request leases one handle for the
//! duration of an inference; the lease returns it to the pool on drop, even
//! if the inference panicked.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use super::model::ModelHandle;
use crate::error::{MediaError, MediaResult};
use crate::metrics;

type IdleHandles = Arc<Mutex<Vec<Box<dyn ModelHandle>>>>;

/// Pool of independent model handles with a bounded acquire wait.
#[derive(Clone)]
pub struct HandlePool {
    idle: IdleHandles,
    semaphore: Arc<Semaphore>,
    capacity: usize,
    acquire_timeout: Duration,
}

impl HandlePool {
    pub fn new(handles: Vec<Box<dyn ModelHandle>>, acquire_timeout: Duration) -> Self {
        let capacity = handles.len();
        Self {
            idle: Arc::new(Mutex::new(handles)),
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            acquire_timeout,
        }
    }

    /// Wait up to the acquire timeout for an idle handle.
    pub async fn acquire(&self) -> MediaResult<ModelLease> {
        let start = Instant::now();
        let timeout_ms = self.acquire_timeout.as_millis() as u64;

        let permit = match tokio::time::timeout(
            self.acquire_timeout,
            self.semaphore.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(MediaError::internal("Model pool closed")),
            Err(_) => {
                metrics::record_lease_timeout();
                warn!(
                    timeout_ms,
                    capacity = self.capacity,
                    "Timed out waiting for a model handle"
                );
                return Err(MediaError::ModelUnavailable(timeout_ms));
            }
        };

        let handle = lock_idle(&self.idle)
            .pop()
            .ok_or_else(|| MediaError::internal("Model pool permit granted with no idle handle"))?;

        let waited = start.elapsed();
        metrics::record_lease_wait(waited.as_secs_f64());
        debug!(wait_ms = waited.as_millis() as u64, "Model handle leased");

        Ok(ModelLease {
            handle: Some(handle),
            idle: Arc::clone(&self.idle),
            _permit: permit,
        })
    }

    pub fn stats(&self) -> PoolStats {
        let idle = lock_idle(&self.idle).len();
        PoolStats {
            capacity: self.capacity,
            idle,
            in_flight: self.capacity - self.semaphore.available_permits(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Exclusive temporary ownership of one model handle.
pub struct ModelLease {
    handle: Option<Box<dyn ModelHandle>>,
    idle: IdleHandles,
    // Released after the handle is pushed back, see Drop.
    _permit: OwnedSemaphorePermit,
}

impl ModelLease {
    pub fn handle_mut(&mut self) -> MediaResult<&mut (dyn ModelHandle + 'static)> {
        self.handle
            .as_deref_mut()
            .ok_or_else(|| MediaError::internal("Model lease already released"))
    }
}

impl Drop for ModelLease {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            lock_idle(&self.idle).push(handle);
        }
    }
}

impl std::fmt::Debug for ModelLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLease")
            .field("held", &self.handle.is_some())
            .finish()
    }
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub idle: usize,
    pub in_flight: usize,
}

// A poisoned lock only means a holder panicked while pushing or popping;
// the Vec itself is still consistent.
fn lock_idle(idle: &IdleHandles) -> std::sync::MutexGuard<'_, Vec<Box<dyn ModelHandle>>> {
    idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
