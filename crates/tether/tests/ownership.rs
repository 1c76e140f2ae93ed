// Ownership lifecycle tests
//
// These tests walk shared and weak handles through the documented lifecycle
// scenarios and check the counts and the deleter at each step. Control block
// accounting relies on the per-thread counters of the `block-stats` feature.

#![cfg(feature = "block-stats")]

mod common;

use common::{Counter, Tracked};
use std::sync::{Arc, Mutex};
use tether::stats::{block_stats, reset_block_stats};
use tether::{SharedHandle, WeakHandle};

#[test]
fn test_copy_then_destroy_both() {
    reset_block_stats();
    let deletes = Counter::new();

    let a = SharedHandle::with_deleter(Tracked::new("A", &deletes), deletes.deleter::<Tracked>());
    assert_eq!(a.use_count(), 1);

    let b = a.clone();
    assert_eq!(b.use_count(), 2);

    drop(a);
    assert_eq!(b.use_count(), 1);
    assert_eq!(deletes.get(), 0);

    drop(b);
    // The deleter bumps once, and dropping the Tracked value bumps once more.
    assert_eq!(deletes.get(), 2);

    let stats = block_stats();
    assert_eq!(stats.allocated, 1);
    assert_eq!(stats.freed, 1);
    assert_eq!(stats.deleters_run, 1);
}

#[test]
fn test_weak_expires_with_last_strong() {
    reset_block_stats();
    let deletes = Counter::new();

    let a = SharedHandle::with_deleter(7u32, deletes.deleter::<u32>());
    let w = WeakHandle::new(&a);
    assert_eq!(a.weak_count(), 1);
    assert_eq!(a.use_count(), 1);
    assert!(!w.expired());

    drop(a);
    assert_eq!(deletes.get(), 1);
    assert!(w.expired());
    assert!(w.lock().is_empty());

    // The weak handle still holds the block.
    assert_eq!(block_stats().freed, 0);
    drop(w);
    assert_eq!(block_stats().freed, 1);
}

#[test]
fn test_use_count_matches_live_handles() {
    let root = SharedHandle::new(0u64);
    let mut live: Vec<SharedHandle<u64>> = Vec::new();

    // Deterministic mix of copies and resets.
    for step in 0..64usize {
        match step % 5 {
            0 | 1 | 3 => live.push(root.clone()),
            2 => {
                if let Some(mut handle) = live.pop() {
                    handle.reset();
                }
            }
            _ => {
                if let Some(handle) = live.first_mut() {
                    let moved = handle.take();
                    *handle = moved;
                }
            }
        }
        assert_eq!(root.use_count(), live.len() + 1, "step {step}");
    }
}

#[test]
fn test_expired_never_before_last_strong() {
    let a = SharedHandle::new("shared".to_string());
    let handles: Vec<_> = (0..4).map(|_| a.clone()).collect();
    let w = a.downgrade();
    drop(a);

    for (remaining, handle) in handles.into_iter().enumerate().rev() {
        assert!(!w.expired());
        assert_eq!(w.use_count(), remaining + 1);
        drop(handle);
    }
    assert!(w.expired());
}

#[test]
fn test_lock_increments_by_one_and_expired_lock_is_noop() {
    let a = SharedHandle::new(1u8);
    let w = a.downgrade();

    let before = a.use_count();
    let locked = w.lock();
    assert_eq!(a.use_count(), before + 1);
    drop(locked);
    assert_eq!(a.use_count(), before);

    drop(a);
    assert_eq!(w.use_count(), 0);
    assert_eq!(w.weak_count(), 1);
    let empty = w.lock();
    assert!(empty.is_empty());
    assert_eq!(w.use_count(), 0);
    assert_eq!(w.weak_count(), 1);
}

#[test]
fn test_block_freed_once_after_both_counts_reach_zero() {
    reset_block_stats();

    let a = SharedHandle::new(vec![1, 2, 3]);
    let w1 = a.downgrade();
    let w2 = w1.clone();
    let b = w2.lock();

    drop(a);
    drop(w1);
    assert_eq!(block_stats().freed, 0);

    drop(b);
    assert_eq!(block_stats().deleters_run, 1);
    assert_eq!(block_stats().freed, 0);

    drop(w2);
    let stats = block_stats();
    assert_eq!(stats.allocated, 1);
    assert_eq!(stats.freed, 1);
    assert_eq!(stats.live(), 0);
}

#[test]
fn test_reset_with_allocates_before_releasing() {
    reset_block_stats();
    let deletes = Counter::new();

    let mut a = SharedHandle::with_deleter("bob".to_string(), deletes.deleter::<String>());
    a.reset_with("chris".to_string());

    assert_eq!(deletes.get(), 1);
    assert_eq!(a.get().map(String::as_str), Some("chris"));

    let stats = block_stats();
    assert_eq!(stats.allocated, 2);
    assert_eq!(stats.freed, 1);
    assert_eq!(stats.live(), 1);
}

#[test]
fn test_scope_exit_releases_on_early_return() {
    fn early_exit(handle: SharedHandle<Tracked>, bail: bool) -> Option<usize> {
        let local = handle.clone();
        if bail {
            return None;
        }
        Some(local.use_count())
    }

    let drops = Counter::new();
    let a = SharedHandle::new(Tracked::new("scoped", &drops));

    assert_eq!(early_exit(a.clone(), true), None);
    assert_eq!(a.use_count(), 1);
    assert_eq!(early_exit(a.clone(), false), Some(3));
    assert_eq!(a.use_count(), 1);

    drop(a);
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_scope_exit_releases_on_panic() {
    let drops = Counter::new();
    let a = SharedHandle::new(Tracked::new("unwound", &drops));
    let moved = a.clone();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
        let _inner = moved;
        panic!("unwinding with a live handle");
    }));

    assert!(result.is_err());
    assert_eq!(a.use_count(), 1);
    drop(a);
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_panicking_deleter_still_frees_block() {
    reset_block_stats();
    let a = SharedHandle::with_deleter(5u32, |_| panic!("deleter failed"));
    let w = a.downgrade();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || drop(a)));
    assert!(result.is_err());
    assert!(w.expired());
    assert!(w.lock().is_empty());

    drop(w);
    assert_eq!(block_stats().live(), 0);

    // Without weak handles the block goes away with the last strong one.
    reset_block_stats();
    let b = SharedHandle::with_deleter(6u32, |_| panic!("deleter failed"));
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || drop(b)));
    assert!(result.is_err());
    assert_eq!(block_stats().live(), 0);
}

#[test]
fn test_counts_seen_from_inside_deleter() {
    let observer = Arc::new(Mutex::new(WeakHandle::<u32>::empty()));
    let seen = Arc::new(Mutex::new(None::<(usize, bool)>));

    let a = SharedHandle::with_deleter(1u32, {
        let observer = observer.clone();
        let seen = seen.clone();
        move |_| {
            let weak = observer.lock().unwrap();
            *seen.lock().unwrap() = Some((weak.weak_count(), weak.expired()));
        }
    });
    *observer.lock().unwrap() = a.downgrade();

    drop(a);
    assert_eq!(*seen.lock().unwrap(), Some((1, true)));
    assert_eq!(observer.lock().unwrap().weak_count(), 1);
}

#[test]
fn test_take_transfers_without_count_change() {
    let drops = Counter::new();
    let mut source = SharedHandle::new(Tracked::new("moved", &drops));
    let w = source.downgrade();

    let destination = source.take();
    assert!(source.is_empty());
    assert_eq!(w.use_count(), 1);
    assert_eq!(destination.get().map(|t| t.name.as_str()), Some("moved"));

    drop(source);
    assert_eq!(drops.get(), 0);
    drop(destination);
    assert_eq!(drops.get(), 1);
}
