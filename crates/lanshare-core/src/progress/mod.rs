//! Bounded pool of upload progress slots.
//!
//! A receiving server hands every upload a [`ProgressSlot`] so concurrent
//! uploads report progress independently. The pool holds a fixed number of
//! slot ids (default 5). Acquiring from an empty pool waits until another
//! upload finishes; it never fails. Waiters are served in arrival order.
//!
//! Slots are guards: dropping one returns its id, so an upload that fails
//! half-way through cannot leak its slot.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lanshare_core::progress::ProgressTracker;
//!
//! let tracker = ProgressTracker::new(5);
//! let slot = tracker.acquire().await?;
//! slot.set_label("report.pdf");
//! slot.advance(8192);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Error, Result};

/// Shared pool of progress slots.
///
/// Cloning is cheap and every clone refers to the same pool.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    capacity: usize,
    permits: Arc<Semaphore>,
    free: Mutex<BTreeSet<usize>>,
    active: Mutex<BTreeMap<usize, Arc<SlotStatus>>>,
}

#[derive(Debug, Default)]
struct SlotStatus {
    label: Mutex<String>,
    bytes: AtomicU64,
}

/// Point-in-time view of an active slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    /// Slot id
    pub id: usize,
    /// What the slot is tracking (usually a file name)
    pub label: String,
    /// Bytes recorded so far
    pub bytes: u64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ProgressTracker {
    /// Create a pool with `capacity` slots (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Inner {
                capacity,
                permits: Arc::new(Semaphore::new(capacity)),
                free: Mutex::new((0..capacity).collect()),
                active: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// Total number of slots in the pool.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of slots currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Wait for a free slot and take it.
    ///
    /// # Errors
    ///
    /// Only fails if the pool's internal bookkeeping is inconsistent.
    pub async fn acquire(&self) -> Result<ProgressSlot> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|e| Error::Internal(format!("progress pool closed: {e}")))?;

        let id = lock(&self.inner.free)
            .pop_first()
            .ok_or_else(|| Error::Internal("progress pool has no free id".to_string()))?;

        let status = Arc::new(SlotStatus::default());
        lock(&self.inner.active).insert(id, Arc::clone(&status));

        tracing::trace!(slot = id, "Progress slot acquired");

        Ok(ProgressSlot {
            id,
            status,
            inner: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Snapshot of all slots currently held, ordered by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SlotSnapshot> {
        lock(&self.inner.active)
            .iter()
            .map(|(id, status)| SlotSnapshot {
                id: *id,
                label: lock(&status.label).clone(),
                bytes: status.bytes.load(Ordering::Relaxed),
            })
            .collect()
    }
}

/// A held progress slot. Dropping it returns the id to the pool.
#[derive(Debug)]
pub struct ProgressSlot {
    id: usize,
    status: Arc<SlotStatus>,
    inner: Arc<Inner>,
    _permit: OwnedSemaphorePermit,
}

impl ProgressSlot {
    /// The slot id, unique among held slots.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Set what this slot is tracking.
    pub fn set_label(&self, label: &str) {
        label.clone_into(&mut lock(&self.status.label));
    }

    /// Record `n` more bytes and return the running total.
    pub fn advance(&self, n: u64) -> u64 {
        self.status.bytes.fetch_add(n, Ordering::Relaxed) + n
    }

    /// Bytes recorded so far.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.status.bytes.load(Ordering::Relaxed)
    }

    /// Return the slot to the pool.
    pub fn release(self) {}
}

impl Drop for ProgressSlot {
    fn drop(&mut self) {
        lock(&self.inner.active).remove(&self.id);
        lock(&self.inner.free).insert(self.id);
        tracing::trace!(slot = self.id, "Progress slot released");
    }
}
