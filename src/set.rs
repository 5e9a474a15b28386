//! Persistent (immutable) hash set.
//!
//! This module provides [`HamtSet`], an immutable hash set that uses
//! [`HamtMap`] internally for efficient operations.
//!
//! # Overview
//!
//! `HamtSet` is a wrapper around `HamtMap<T, ()>` that provides set
//! operations like union, intersection, difference, and symmetric
//! difference.
//!
//! - O(log32 N) contains (effectively O(1) for practical sizes)
//! - O(log32 N) insert
//! - O(log32 N) remove
//! - O(1) len and `is_empty`
//!
//! All operations return new sets without modifying the original, and
//! structural sharing ensures memory efficiency.
//!
//! # Examples
//!
//! ```rust
//! use hamtrie::HamtSet;
//!
//! let set = HamtSet::new().insert(1).insert(2).insert(3);
//!
//! assert!(set.contains(&1));
//! assert!(!set.contains(&4));
//!
//! // Structural sharing: the original set is preserved
//! let updated = set.insert(4);
//! assert_eq!(set.len(), 3);      // Original unchanged
//! assert_eq!(updated.len(), 4);  // New version
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::iter::FromIterator;

use crate::map::{HamtMap, HamtMapIntoIterator, HamtMapIterator};

// =============================================================================
// HamtSet Definition
// =============================================================================

/// A persistent (immutable) hash set based on [`HamtMap`].
///
/// # Time Complexity
///
/// | Operation              | Complexity        |
/// |------------------------|-------------------|
/// | `new`                  | O(1)              |
/// | `contains`             | O(log32 N)        |
/// | `insert`               | O(log32 N)        |
/// | `remove`               | O(log32 N)        |
/// | `len`                  | O(1)              |
/// | `is_empty`             | O(1)              |
/// | `union`                | O(n + m)          |
/// | `intersection`         | O(min(n,m) * log32(max(n,m))) |
/// | `difference`           | O(n * log32 m)    |
///
/// # Examples
///
/// ```rust
/// use hamtrie::HamtSet;
///
/// let set = HamtSet::singleton(42);
/// assert!(set.contains(&42));
/// assert!(!set.contains(&0));
/// ```
#[derive(Clone)]
pub struct HamtSet<T> {
    /// Internal hash map with () as value type
    inner: HamtMap<T, ()>,
}

impl<T> HamtSet<T> {
    /// Creates a new empty set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtSet;
    ///
    /// let set: HamtSet<i32> = HamtSet::new();
    /// assert!(set.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: HamtMap::new(),
        }
    }

    /// Returns the number of elements in the set.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtSet;
    ///
    /// let set = HamtSet::new().insert(1).insert(2);
    /// assert_eq!(set.len(), 2);
    /// ```
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the set contains no elements.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtSet;
    ///
    /// let set: HamtSet<i32> = HamtSet::new();
    /// assert!(set.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over the elements of the set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtSet;
    ///
    /// let set = HamtSet::new().insert(1).insert(2).insert(3);
    ///
    /// for element in set.iter() {
    ///     println!("{}", element);
    /// }
    /// ```
    #[must_use]
    pub fn iter(&self) -> HamtSetIterator<'_, T> {
        HamtSetIterator {
            inner: self.inner.iter(),
        }
    }
}

impl<T: Clone + Hash + Eq> HamtSet<T> {
    /// Creates a set containing a single element.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtSet;
    ///
    /// let set = HamtSet::singleton(42);
    /// assert_eq!(set.len(), 1);
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(element: T) -> Self {
        Self::new().insert(element)
    }

    /// Returns `true` if the set contains the element.
    ///
    /// The element may be any borrowed form of the set's element type, but
    /// `Hash` and `Eq` on the borrowed form must match those for the
    /// element type.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtSet;
    ///
    /// let set = HamtSet::singleton("key".to_string());
    ///
    /// assert!(set.contains("key"));
    /// assert!(!set.contains("other"));
    /// ```
    #[must_use]
    pub fn contains<Q>(&self, element: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.contains_key(element)
    }

    /// Adds an element to the set.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtSet;
    ///
    /// let set = HamtSet::new().insert(1);
    /// let updated = set.insert(2);
    ///
    /// assert_eq!(set.len(), 1);     // Original unchanged
    /// assert_eq!(updated.len(), 2); // New version
    /// ```
    #[must_use]
    pub fn insert(&self, element: T) -> Self {
        Self {
            inner: self.inner.insert(element, ()),
        }
    }

    /// Removes an element from the set.
    ///
    /// If the element doesn't exist, returns a clone of the original set.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtSet;
    ///
    /// let set = HamtSet::new().insert(1).insert(2);
    /// let removed = set.remove(&1);
    ///
    /// assert_eq!(set.len(), 2);     // Original unchanged
    /// assert_eq!(removed.len(), 1); // New version
    /// assert!(!removed.contains(&1));
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, element: &Q) -> Self
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        Self {
            inner: self.inner.remove(element),
        }
    }

    /// Returns the union of two sets.
    ///
    /// The union contains all elements that are in either set.
    ///
    /// # Complexity
    ///
    /// O(n + m) where n and m are the sizes of the two sets
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtSet;
    ///
    /// let set_a: HamtSet<i32> = [1, 2].into_iter().collect();
    /// let set_b: HamtSet<i32> = [2, 3].into_iter().collect();
    ///
    /// let union = set_a.union(&set_b);
    ///
    /// assert_eq!(union.len(), 3);
    /// ```
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            inner: self.inner.merge(&other.inner),
        }
    }

    /// Returns the intersection of two sets.
    ///
    /// The intersection contains only elements that are in both sets.
    ///
    /// # Complexity
    ///
    /// O(min(n, m) * log32(max(n, m)))
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtSet;
    ///
    /// let set_a: HamtSet<i32> = [1, 2, 3].into_iter().collect();
    /// let set_b: HamtSet<i32> = [2, 3, 4].into_iter().collect();
    ///
    /// let intersection = set_a.intersection(&set_b);
    ///
    /// assert_eq!(intersection.len(), 2);
    /// assert!(intersection.contains(&2));
    /// assert!(intersection.contains(&3));
    /// ```
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        // Iterate over the smaller set for better performance
        let (smaller, larger) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };

        let mut result = Self::new();
        for element in smaller {
            if larger.contains(element) {
                result = result.insert(element.clone());
            }
        }
        result
    }

    /// Returns the difference of two sets.
    ///
    /// The difference contains elements that are in `self` but not in
    /// `other`.
    ///
    /// # Complexity
    ///
    /// O(n * log32 m) where n = `self.len()` and m = `other.len()`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtSet;
    ///
    /// let set_a: HamtSet<i32> = [1, 2, 3].into_iter().collect();
    /// let set_b: HamtSet<i32> = [2, 3, 4].into_iter().collect();
    ///
    /// let difference = set_a.difference(&set_b);
    ///
    /// assert_eq!(difference.len(), 1);
    /// assert!(difference.contains(&1));
    /// ```
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let mut result = Self::new();
        for element in self {
            if !other.contains(element) {
                result = result.insert(element.clone());
            }
        }
        result
    }

    /// Returns the symmetric difference of two sets.
    ///
    /// The symmetric difference contains elements that are in either set
    /// but not in both.
    ///
    /// # Complexity
    ///
    /// O(n + m)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtSet;
    ///
    /// let set_a: HamtSet<i32> = [1, 2, 3].into_iter().collect();
    /// let set_b: HamtSet<i32> = [2, 3, 4].into_iter().collect();
    ///
    /// let symmetric_diff = set_a.symmetric_difference(&set_b);
    ///
    /// assert_eq!(symmetric_diff.len(), 2);
    /// assert!(symmetric_diff.contains(&1));
    /// assert!(symmetric_diff.contains(&4));
    /// ```
    #[must_use]
    pub fn symmetric_difference(&self, other: &Self) -> Self {
        let self_minus_other = self.difference(other);
        let other_minus_self = other.difference(self);
        self_minus_other.union(&other_minus_self)
    }

    /// Returns `true` if `self` is a subset of `other`.
    ///
    /// # Complexity
    ///
    /// O(n * log32 m) where n = `self.len()` and m = `other.len()`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtSet;
    ///
    /// let subset: HamtSet<i32> = [1, 2].into_iter().collect();
    /// let superset: HamtSet<i32> = [1, 2, 3].into_iter().collect();
    ///
    /// assert!(subset.is_subset(&superset));
    /// assert!(!superset.is_subset(&subset));
    /// ```
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        if self.len() > other.len() {
            return false;
        }

        for element in self {
            if !other.contains(element) {
                return false;
            }
        }
        true
    }

    /// Returns `true` if `self` is a superset of `other`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtSet;
    ///
    /// let superset: HamtSet<i32> = [1, 2, 3].into_iter().collect();
    /// let subset: HamtSet<i32> = [1, 2].into_iter().collect();
    ///
    /// assert!(superset.is_superset(&subset));
    /// ```
    #[must_use]
    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    /// Returns `true` if `self` and `other` have no elements in common.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtSet;
    ///
    /// let set_a: HamtSet<i32> = [1, 2].into_iter().collect();
    /// let set_b: HamtSet<i32> = [3, 4].into_iter().collect();
    ///
    /// assert!(set_a.is_disjoint(&set_b));
    /// ```
    #[must_use]
    pub fn is_disjoint(&self, other: &Self) -> bool {
        // Iterate over the smaller set for better performance
        let (smaller, larger) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };

        for element in smaller {
            if larger.contains(element) {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// A lazy iterator over the elements of a [`HamtSet`].
pub struct HamtSetIterator<'a, T> {
    inner: HamtMapIterator<'a, T, ()>,
}

impl<'a, T> Iterator for HamtSetIterator<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(element, ())| element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for HamtSetIterator<'_, T> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// An owning iterator over the elements of a [`HamtSet`].
pub struct HamtSetIntoIterator<T> {
    inner: HamtMapIntoIterator<T, ()>,
}

impl<T> Iterator for HamtSetIntoIterator<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(element, ())| element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for HamtSetIntoIterator<T> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Default for HamtSet<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Hash + Eq> FromIterator<T> for HamtSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for element in iter {
            set = set.insert(element);
        }
        set
    }
}

impl<T: Clone + Hash + Eq> IntoIterator for HamtSet<T> {
    type Item = T;
    type IntoIter = HamtSetIntoIterator<T>;

    fn into_iter(self) -> Self::IntoIter {
        HamtSetIntoIterator {
            inner: self.inner.into_iter(),
        }
    }
}

impl<'a, T> IntoIterator for &'a HamtSet<T> {
    type Item = &'a T;
    type IntoIter = HamtSetIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Clone + Hash + Eq> PartialEq for HamtSet<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }

        for element in self {
            if !other.contains(element) {
                return false;
            }
        }
        true
    }
}

impl<T: Clone + Hash + Eq> Eq for HamtSet<T> {}

impl<T: fmt::Debug> fmt::Debug for HamtSet<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T> serde::Serialize for HamtSet<T>
where
    T: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut sequence = serializer.serialize_seq(Some(self.len()))?;
        for element in self {
            sequence.serialize_element(element)?;
        }
        sequence.end()
    }
}

#[cfg(feature = "serde")]
struct HamtSetVisitor<T> {
    element_marker: std::marker::PhantomData<T>,
}

#[cfg(feature = "serde")]
impl<T> HamtSetVisitor<T> {
    const fn new() -> Self {
        Self {
            element_marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::de::Visitor<'de> for HamtSetVisitor<T>
where
    T: serde::Deserialize<'de> + Clone + Hash + Eq,
{
    type Value = HamtSet<T>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut set = HamtSet::new();
        while let Some(element) = access.next_element()? {
            set = set.insert(element);
        }
        Ok(set)
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for HamtSet<T>
where
    T: serde::Deserialize<'de> + Clone + Hash + Eq,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(HamtSetVisitor::new())
    }
}

// =============================================================================
// Tests
// =============================================================================
