use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Every critical section in this crate leaves its data consistent before any call that could
/// panic, so a poisoned lock carries no torn state.
pub(crate) fn lock_unpoisoned<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct Owner {
    thread: Option<ThreadId>,
    depth: usize,
}

/// Mutual exclusion that the owning thread may acquire again while holding it.
///
/// This lock protects no data of its own; it serializes whole operations. Data touched inside
/// an operation lives behind ordinary short-lived mutexes that are never held across callbacks.
#[derive(Debug, Default)]
pub(crate) struct ReentrantLock {
    owner: Mutex<Owner>,
    released: Condvar,
}

impl ReentrantLock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> ReentrantGuard<'_> {
        let me = thread::current().id();
        let mut owner = lock_unpoisoned(&self.owner);
        loop {
            match owner.thread {
                None => {
                    owner.thread = Some(me);
                    owner.depth = 1;
                    break;
                }
                Some(t) if t == me => {
                    owner.depth += 1;
                    break;
                }
                Some(_) => {
                    owner = self
                        .released
                        .wait(owner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        ReentrantGuard { lock: self }
    }

    fn unlock(&self) {
        let mut owner = lock_unpoisoned(&self.owner);
        owner.depth = owner.depth.saturating_sub(1);
        if owner.depth == 0 {
            owner.thread = None;
            drop(owner);
            self.released.notify_one();
        }
    }
}

/// Held acquisition of a [`ReentrantLock`].
#[derive(Debug)]
pub(crate) struct ReentrantGuard<'a> {
    lock: &'a ReentrantLock,
}

impl ReentrantGuard<'_> {
    /// `true` when dropping this guard fully releases the lock.
    pub(crate) fn is_outermost(&self) -> bool {
        lock_unpoisoned(&self.lock.owner).depth == 1
    }
}

impl Drop for ReentrantGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/sync.rs"]
mod tests;
