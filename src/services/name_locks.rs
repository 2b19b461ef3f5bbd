use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard};
use tracing::debug;

/// In-process registry of environment names with an operation in flight.
#[derive(Debug, Default)]
pub struct NameLocks {
    busy: Mutex<HashSet<String>>,
    released: Condvar,
}

/// Holds a name until dropped.
#[derive(Debug)]
pub struct NameGuard<'a> {
    locks: &'a NameLocks,
    name: String,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until `name` is free, then claims it.
    pub fn acquire(&self, name: &str) -> NameGuard<'_> {
        let mut busy = self.busy_set();
        while busy.contains(name) {
            debug!("waiting for '{}' to be released", name);
            busy = self
                .released
                .wait(busy)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        busy.insert(name.to_string());

        NameGuard {
            locks: self,
            name: name.to_string(),
        }
    }

    pub fn try_acquire(&self, name: &str) -> Option<NameGuard<'_>> {
        let mut busy = self.busy_set();
        if !busy.insert(name.to_string()) {
            return None;
        }

        Some(NameGuard {
            locks: self,
            name: name.to_string(),
        })
    }

    pub fn is_busy(&self, name: &str) -> bool {
        self.busy_set().contains(name)
    }

    // A panic while holding the set cannot leave it half-updated.
    fn busy_set(&self) -> MutexGuard<'_, HashSet<String>> {
        self.busy
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        self.locks.busy_set().remove(&self.name);
        self.locks.released.notify_all();
    }
}
