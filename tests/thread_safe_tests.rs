#![cfg(feature = "arc")]
//! Integration tests for thread-safe sharing.
//!
//! With the `arc` feature enabled, nodes are shared through `Arc`, so
//! whole maps and sets can be read and extended from multiple threads.

use hamtrie::{HamtMap, HamtSet};
use rstest::rstest;
use std::sync::Arc;
use std::thread;

#[rstest]
fn test_map_cross_thread_structural_sharing() {
    let base: HamtMap<String, i32> = (0..100).map(|index| (format!("key-{index}"), index)).collect();
    let original = Arc::new(base);

    let handles: Vec<_> = (0..4)
        .map(|thread_index| {
            let map_clone = Arc::clone(&original);
            thread::spawn(move || {
                // Each thread derives its own version
                let derived = map_clone.insert(format!("thread-{thread_index}"), thread_index);
                assert_eq!(derived.len(), 101);
                // The shared original is unchanged
                assert_eq!(map_clone.len(), 100);
                assert_eq!(map_clone.get("key-0"), Some(&0));
                derived
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread panicked"))
        .collect();

    for (thread_index, derived) in results.iter().enumerate() {
        let key = format!("thread-{thread_index}");
        let expected = i32::try_from(thread_index).unwrap();
        assert_eq!(derived.get(&key), Some(&expected));
    }

    assert_eq!(original.len(), 100);
}

#[rstest]
fn test_concurrent_readers_observe_consistent_snapshot() {
    let map: HamtMap<i32, i32> = (0..1_000).map(|index| (index, index * 2)).collect();
    let shared = Arc::new(map);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let reader = Arc::clone(&shared);
            thread::spawn(move || {
                let mut sum: i64 = 0;
                for (key, value) in reader.iter() {
                    assert_eq!(*value, key * 2);
                    sum += i64::from(*value);
                }
                sum
            })
        })
        .collect();

    let sums: Vec<i64> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread panicked"))
        .collect();

    assert!(sums.windows(2).all(|pair| pair[0] == pair[1]));
}

#[rstest]
fn test_set_cross_thread_structural_sharing() {
    let base: HamtSet<i32> = (0..100).collect();
    let original = Arc::new(base);

    let handles: Vec<_> = (0..4)
        .map(|thread_index| {
            let set_clone = Arc::clone(&original);
            thread::spawn(move || {
                let derived = set_clone.insert(1_000 + thread_index);
                assert_eq!(derived.len(), 101);
                assert_eq!(set_clone.len(), 100);
                derived
            })
        })
        .collect();

    for handle in handles {
        let derived = handle.join().expect("thread panicked");
        assert_eq!(derived.len(), 101);
    }

    assert_eq!(original.len(), 100);
}
