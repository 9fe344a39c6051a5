//! Sync lock
//!
//! A flag that at most one pass holds at a time. Acquisition never waits:
//! a caller that finds the lock held simply does not run. The guard clears
//! the flag on drop, so early returns, errors and panics all release it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Non-blocking mutual exclusion for sync passes
#[derive(Debug, Clone, Default)]
pub struct SyncLock {
    held: Arc<AtomicBool>,
}

impl SyncLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock if it is free
    #[must_use]
    pub fn try_acquire(&self) -> Option<SyncGuard> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncGuard {
                held: Arc::clone(&self.held),
            })
    }

    /// Whether a pass currently holds the lock
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Proof of holding the [`SyncLock`]; releases it when dropped
#[derive(Debug)]
pub struct SyncGuard {
    held: Arc<AtomicBool>,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let lock = SyncLock::new();
        let guard = lock.try_acquire();
        assert!(guard.is_some());
        assert!(lock.is_held());
        assert!(lock.try_acquire().is_none());
    }

    #[test]
    fn test_drop_releases() {
        let lock = SyncLock::new();
        {
            let _guard = lock.try_acquire().unwrap();
        }
        assert!(!lock.is_held());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn test_clones_share_state() {
        let lock = SyncLock::new();
        let other = lock.clone();
        let _guard = lock.try_acquire().unwrap();
        assert!(other.try_acquire().is_none());
    }

    #[test]
    fn test_panic_releases() {
        let lock = SyncLock::new();
        let inner = lock.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = inner.try_acquire().unwrap();
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(!lock.is_held());
    }
}
