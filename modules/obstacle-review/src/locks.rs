//! Exclusive write locks over sets of reports.
//!
//! A mutating review operation locks every report it will touch (merge
//! target plus duplicates) in one step. Acquisition is all-or-nothing, so two
//! merges with overlapping id sets serialize instead of interleaving, and
//! there is no lock-ordering deadlock.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
pub struct ReportLocks {
    held: Mutex<HashSet<Uuid>>,
    released: Notify,
}

/// Releases its ids when dropped.
pub struct ReportLockGuard<'a> {
    locks: &'a ReportLocks,
    ids: Vec<Uuid>,
}

impl ReportLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until none of `ids` is held, then hold all of them.
    pub async fn acquire(&self, ids: &[Uuid]) -> ReportLockGuard<'_> {
        let ids = normalized(ids);
        loop {
            // Register interest before checking so a release between the
            // check and the await is not missed.
            let released = self.released.notified();
            if let Some(guard) = self.try_acquire_normalized(&ids) {
                return guard;
            }
            debug!(reports = ids.len(), "Waiting for report lock");
            released.await;
        }
    }

    /// Hold all of `ids` if none is currently held.
    #[cfg(test)]
    fn try_acquire(&self, ids: &[Uuid]) -> Option<ReportLockGuard<'_>> {
        self.try_acquire_normalized(&normalized(ids))
    }

    #[cfg(test)]
    fn is_held(&self, id: Uuid) -> bool {
        self.held().contains(&id)
    }

    fn try_acquire_normalized(&self, ids: &[Uuid]) -> Option<ReportLockGuard<'_>> {
        let mut held = self.held();
        if ids.iter().any(|id| held.contains(id)) {
            return None;
        }
        held.extend(ids.iter().copied());
        Some(ReportLockGuard {
            locks: self,
            ids: ids.to_vec(),
        })
    }

    fn held(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        // The set stays consistent even if a holder panicked mid-operation.
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
impl ReportLockGuard<'_> {
    fn ids(&self) -> &[Uuid] {
        &self.ids
    }
}

impl Drop for ReportLockGuard<'_> {
    fn drop(&mut self) {
        {
            let mut held = self.locks.held();
            for id in &self.ids {
                held.remove(id);
            }
        }
        self.locks.released.notify_waiters();
    }
}

fn normalized(ids: &[Uuid]) -> Vec<Uuid> {
    let mut ids = ids.to_vec();
    ids.sort();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn overlapping_sets_conflict() {
        let locks = ReportLocks::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let first = locks.try_acquire(&[a, b]).expect("free");
        assert!(locks.try_acquire(&[b, c]).is_none());
        let disjoint = locks.try_acquire(&[c]).expect("disjoint set is free");
        assert!(locks.is_held(a) && locks.is_held(c));

        drop(first);
        drop(disjoint);
        assert!(!locks.is_held(a));
        assert!(locks.try_acquire(&[b, c]).is_some());
    }

    #[test]
    fn repeated_ids_are_held_once() {
        let locks = ReportLocks::new();
        let a = Uuid::new_v4();
        let guard = locks.try_acquire(&[a, a, a]).unwrap();
        assert_eq!(guard.ids(), &[a]);
    }

    #[tokio::test]
    async fn waiter_proceeds_after_release() {
        let locks = Arc::new(ReportLocks::new());
        let a = Uuid::new_v4();
        let guard = locks.try_acquire(&[a]).unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&[a]).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should acquire after release")
            .unwrap();
        assert!(!locks.is_held(a));
    }
}
