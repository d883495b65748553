use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Per-lead mutexes so at most one refresh per lead talks to the source at a time.
#[derive(Debug, Default)]
pub struct LeadLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl LeadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `lead_id`; callers hold its guard for the whole refresh.
    pub fn lock_for(&self, lead_id: i64) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // Entries only the registry still references are idle.
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        map.entry(lead_id).or_default().clone()
    }

    /// Leads with a refresh in flight or waiting.
    pub fn active_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_lead_shares_a_lock() {
        let locks = LeadLocks::new();
        let a = locks.lock_for(1);
        let b = locks.lock_for(1);
        let c = locks.lock_for(2);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn idle_locks_are_pruned() {
        let locks = LeadLocks::new();
        drop(locks.lock_for(1));
        drop(locks.lock_for(2));
        let _held = locks.lock_for(3);
        assert_eq!(locks.active_count(), 1);
    }
}
