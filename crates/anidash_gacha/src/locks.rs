//! Per-user mutation locks.
//!
//! The table's own mutex is held only to look up or insert an entry; the
//! returned per-user mutex is what serializes operations on one account.
//!
//! Idle entries are swept every [`DEFAULT_PRUNE_INTERVAL`] lookups, so the
//! table tracks active users rather than every user ever seen.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::account::UserId;

/// Lookups between automatic sweeps of idle entries.
pub const DEFAULT_PRUNE_INTERVAL: u64 = 1024;

/// One mutex per user, created on first use.
#[derive(Debug)]
pub struct LockTable {
    locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
    lookups: AtomicU64,
    prune_interval: u64,
}

impl Default for LockTable {
    fn default() -> Self {
        Self::with_prune_interval(DEFAULT_PRUNE_INTERVAL)
    }
}

impl LockTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty table that sweeps idle entries every `interval` lookups.
    /// Zero disables the automatic sweep.
    #[must_use]
    pub fn with_prune_interval(interval: u64) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            lookups: AtomicU64::new(0),
            prune_interval: interval,
        }
    }

    /// The mutex guarding `user_id`'s account.
    #[must_use]
    pub fn lock_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();

        let lookups = self.lookups.fetch_add(1, Ordering::Relaxed) + 1;
        if self.prune_interval > 0 && lookups % self.prune_interval == 0 {
            let pruned = retain_busy(&mut locks);
            if pruned > 0 {
                tracing::debug!(pruned, remaining = locks.len(), "idle user locks swept");
            }
        }

        if let Some(lock) = locks.get(user_id) {
            return Arc::clone(lock);
        }
        let lock = Arc::new(Mutex::new(()));
        locks.insert(user_id.to_string(), Arc::clone(&lock));
        lock
    }

    /// Drops entries nobody currently holds. Returns how many went.
    pub fn prune_idle(&self) -> usize {
        retain_busy(&mut self.locks.lock())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

fn retain_busy(locks: &mut HashMap<UserId, Arc<Mutex<()>>>) -> usize {
    let before = locks.len();
    locks.retain(|_, lock| Arc::strong_count(lock) > 1 || lock.is_locked());
    before - locks.len()
}
