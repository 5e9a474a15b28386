//! # hamtrie
//!
//! A persistent (immutable) hash map and hash set built on a Hash Array
//! Mapped Trie (HAMT).
//!
//! ## Overview
//!
//! A HAMT slices a key's hash into 5-bit indexes and uses them to navigate
//! a 32-way branching trie. Updates copy only the nodes along the affected
//! root-to-leaf path and share everything else with previous versions, so
//! any number of map versions can coexist cheaply:
//!
//! - O(log32 N) get, insert, and remove (effectively O(1) in practice)
//! - O(1) len and `is_empty`
//! - structural sharing across all versions
//!
//! ```rust
//! use hamtrie::HamtMap;
//!
//! let map = HamtMap::new()
//!     .insert("one".to_string(), 1)
//!     .insert("two".to_string(), 2);
//!
//! // The original map is never modified
//! let updated = map.insert("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));
//! assert_eq!(updated.get("one"), Some(&100));
//! ```
//!
//! ## Feature Flags
//!
//! - `arc`: share nodes with `Arc` instead of `Rc`, making maps and sets
//!   `Send + Sync` so immutable versions can be read from any thread
//! - `fxhash`: hash keys with `FxHasher` instead of `DefaultHasher`
//! - `serde`: `Serialize`/`Deserialize` implementations for [`HamtMap`]
//!   and [`HamtSet`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod map;
mod set;

pub use map::HamtMap;
pub use map::HamtMapIntoIterator;
pub use map::HamtMapIterator;
pub use set::HamtSet;
pub use set::HamtSetIntoIterator;
pub use set::HamtSetIterator;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod reference_counter_tests {
    use super::ReferenceCounter;
    use rstest::rstest;

    #[rstest]
    fn test_reference_counter_clone() {
        let reference_counter: ReferenceCounter<i32> = ReferenceCounter::new(42);
        let reference_counter_clone = reference_counter.clone();
        assert_eq!(*reference_counter, *reference_counter_clone);
    }

    #[rstest]
    fn test_reference_counter_strong_count() {
        let reference_counter: ReferenceCounter<i32> = ReferenceCounter::new(42);
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 1);
        let reference_counter_clone = reference_counter.clone();
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 2);
        drop(reference_counter_clone);
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 1);
    }
}
