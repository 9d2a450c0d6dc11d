//! Callback ledger: active timer handles for one grain.

use crate::error::TimerError;
use crate::id::{GrainId, TimerId};
use crate::scheduler::TimerHandle;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::warn;

/// Per-grain mapping from timer id to its active, cancellable handle.
///
/// Ids are unique within one grain. Entries are created on registration and
/// removed on unregistration. Ledger operations never await, so a plain
/// mutex suffices under the grain's turn discipline. Dropping the ledger
/// drops (and thereby cancels) whatever handles remain, which is exactly
/// what grain deactivation needs.
#[derive(Debug)]
pub struct CallbackLedger {
    grain: GrainId,
    entries: Mutex<HashMap<TimerId, TimerHandle>>,
}

impl CallbackLedger {
    pub fn new(grain: GrainId) -> Self {
        Self {
            grain,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Owning grain
    pub fn grain(&self) -> GrainId {
        self.grain
    }

    /// Install a handle under a fresh id. Duplicate ids are a caller error.
    ///
    /// The handle is produced by `schedule` only after the duplicate check
    /// passes, under the ledger lock, so a rejected registration never
    /// creates a live timer.
    pub fn insert(
        &self,
        id: TimerId,
        schedule: impl FnOnce() -> TimerHandle,
    ) -> Result<(), TimerError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&id) {
            return Err(TimerError::AlreadyRegistered {
                id,
                grain: self.grain,
            });
        }
        entries.insert(id, schedule());
        Ok(())
    }

    /// Install a handle, cancelling any previous one under the same id.
    /// The swap happens under the ledger lock, so the old and new cadence
    /// are never live together. Returns true when an existing timer was
    /// replaced.
    pub fn replace(&self, id: TimerId, schedule: impl FnOnce() -> TimerHandle) -> bool {
        let mut entries = self.entries.lock();
        let replaced = match entries.remove(&id) {
            Some(previous) => {
                previous.cancel();
                true
            }
            None => false,
        };
        entries.insert(id, schedule());
        replaced
    }

    /// Remove and return the handle. Unknown ids are a programmer error.
    pub fn remove(&self, id: &TimerId) -> Result<TimerHandle, TimerError> {
        self.entries.lock().remove(id).ok_or_else(|| {
            warn!(grain_id = %self.grain, timer_id = %id, "attempted to unregister unknown timer");
            TimerError::NotRegistered {
                id: id.clone(),
                grain: self.grain,
            }
        })
    }

    /// Pure query, no side effect
    pub fn contains(&self, id: &TimerId) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Point-in-time snapshot of active timer ids
    pub fn ids(&self) -> Vec<TimerId> {
        self.entries.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn tracking_handle() -> (TimerHandle, Arc<AtomicBool>) {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let handle = TimerHandle::new(move || flag.store(true, Ordering::Relaxed));
        (handle, cancelled)
    }

    #[test]
    fn test_insert_and_remove() {
        let ledger = CallbackLedger::new(GrainId::new());
        let (handle, cancelled) = tracking_handle();
        let id = TimerId::new("heartbeat");

        ledger.insert(id.clone(), || handle).unwrap();
        assert!(ledger.contains(&id));
        assert_eq!(ledger.len(), 1);

        let handle = ledger.remove(&id).unwrap();
        assert!(!ledger.contains(&id));
        assert!(ledger.is_empty());
        assert!(!cancelled.load(Ordering::Relaxed), "removal must not cancel");

        handle.cancel();
        assert!(cancelled.load(Ordering::Relaxed));
    }

    #[test]
    fn test_duplicate_insert_rejected_without_scheduling() {
        let ledger = CallbackLedger::new(GrainId::new());
        let id = TimerId::new("heartbeat");
        ledger.insert(id.clone(), || tracking_handle().0).unwrap();

        let scheduled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&scheduled);
        let err = ledger
            .insert(id.clone(), move || {
                flag.store(true, Ordering::Relaxed);
                tracking_handle().0
            })
            .unwrap_err();

        assert!(matches!(err, TimerError::AlreadyRegistered { .. }));
        assert!(ledger.contains(&id));
        assert!(
            !scheduled.load(Ordering::Relaxed),
            "a rejected registration must not schedule anything"
        );
    }

    #[test]
    fn test_remove_unknown_is_lookup_error() {
        let ledger = CallbackLedger::new(GrainId::new());
        let err = ledger.remove(&TimerId::new("never-registered")).unwrap_err();
        assert!(matches!(err, TimerError::NotRegistered { .. }));
    }

    #[test]
    fn test_replace_cancels_previous_before_scheduling() {
        let ledger = CallbackLedger::new(GrainId::new());
        let id = TimerId::new("poll");
        let (first, first_cancelled) = tracking_handle();
        let (second, second_cancelled) = tracking_handle();

        assert!(!ledger.replace(id.clone(), || first));

        let observed_first = Arc::clone(&first_cancelled);
        assert!(ledger.replace(id.clone(), move || {
            // The old cadence must already be dead when the new one starts
            assert!(observed_first.load(Ordering::Relaxed));
            second
        }));

        assert!(first_cancelled.load(Ordering::Relaxed));
        assert!(!second_cancelled.load(Ordering::Relaxed));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_drop_cancels_remaining_handles() {
        let (handle, cancelled) = tracking_handle();
        {
            let ledger = CallbackLedger::new(GrainId::new());
            ledger.insert(TimerId::new("heartbeat"), || handle).unwrap();
        }
        assert!(cancelled.load(Ordering::Relaxed));
    }

    #[test]
    fn test_ids_snapshot() {
        let ledger = CallbackLedger::new(GrainId::new());
        ledger.insert(TimerId::new("a"), || tracking_handle().0).unwrap();
        ledger.insert(TimerId::new("b"), || tracking_handle().0).unwrap();

        let mut ids = ledger.ids();
        ids.sort_by(|x, y| x.as_str().cmp(y.as_str()));
        assert_eq!(ids, vec![TimerId::new("a"), TimerId::new("b")]);
    }
}
