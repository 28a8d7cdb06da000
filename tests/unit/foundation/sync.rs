use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn same_thread_can_nest() {
    let lock = ReentrantLock::new();
    let outer = lock.lock();
    assert!(outer.is_outermost());
    {
        let inner = lock.lock();
        assert!(!inner.is_outermost());
    }
    assert!(outer.is_outermost());
}

#[test]
fn other_threads_are_excluded() {
    let lock = Arc::new(ReentrantLock::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let _g = lock.lock();
                    let _nested = lock.lock();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
}

#[test]
fn poisoned_mutex_is_recovered() {
    let m = Arc::new(Mutex::new(3));
    let m2 = Arc::clone(&m);
    let _ = std::thread::spawn(move || {
        let _g = m2.lock().unwrap();
        panic!("poison");
    })
    .join();
    assert_eq!(*lock_unpoisoned(&m), 3);
}
