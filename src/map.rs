//! Persistent (immutable) hash map based on a HAMT.
//!
//! This module provides [`HamtMap`], an immutable hash map that uses
//! structural sharing for efficient operations.
//!
//! # Overview
//!
//! `HamtMap` is a Hash Array Mapped Trie: a 32-way branching trie navigated
//! by successive 5-bit slices of a key's hash. Each branching node carries a
//! 32-bit occupancy bitmap and a dense array of slots, so empty branches
//! cost nothing.
//!
//! - O(log32 N) get (effectively O(1) for practical sizes)
//! - O(log32 N) insert
//! - O(log32 N) remove
//! - O(1) len and `is_empty`
//!
//! All operations return new maps without modifying the original. A write
//! copies only the nodes on the root-to-leaf path it touches and shares the
//! rest with every earlier version.
//!
//! # Examples
//!
//! ```rust
//! use hamtrie::HamtMap;
//!
//! let map = HamtMap::new()
//!     .insert("one".to_string(), 1)
//!     .insert("two".to_string(), 2)
//!     .insert("three".to_string(), 3);
//!
//! assert_eq!(map.get("one"), Some(&1));
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.insert("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));       // Original unchanged
//! assert_eq!(updated.get("one"), Some(&100)); // New version
//! ```
//!
//! # Internal Structure
//!
//! The trie keeps itself in a canonical shape:
//!
//! - a map with a single entry stores it directly as the root;
//! - branching nodes hold at least two slots, except when their only slot
//!   references a deeper branching node;
//! - keys whose full 64-bit hashes are equal live together in a collision
//!   node, a flat list scanned linearly;
//! - removal collapses any branching node left with a single leaf or
//!   collision node, hoisting it towards the root.
//!
//! Two maps holding the same entries therefore always have the same node
//! structure, no matter which sequence of operations produced them.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;

use crate::ReferenceCounter;

// =============================================================================
// Constants
// =============================================================================

/// Branching factor (2^5 = 32)
const BRANCHING_FACTOR: usize = 32;

/// Bits per level in the trie
const BITS_PER_LEVEL: usize = 5;

/// Bit mask for extracting the branch index within a node
const MASK: u64 = (BRANCHING_FACTOR - 1) as u64;

/// Deepest level at which a 64-bit hash still yields fresh bits.
///
/// Level 12 consumes bits 60..64, so two distinct hashes always diverge at
/// some level in `0..=MAX_LEVEL`. Branching nodes are never produced below
/// this level; fully equal hashes become a collision node instead.
const MAX_LEVEL: usize = 12;

// =============================================================================
// Hash computation
// =============================================================================

/// Computes the hash of a key using `DefaultHasher`.
#[cfg(not(feature = "fxhash"))]
fn compute_hash<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Computes the hash of a key using `FxHasher64`.
#[cfg(feature = "fxhash")]
fn compute_hash<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = fxhash::FxHasher64::default();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Extracts the branch index for a given level from a hash.
#[inline]
const fn hash_index(hash: u64, level: usize) -> usize {
    ((hash >> (level * BITS_PER_LEVEL)) & MASK) as usize
}

// =============================================================================
// Node Definition
// =============================================================================

/// A leaf holding one key-value pair together with the key's full hash.
///
/// Caching the hash lets split, collapse, and lookup compare hashes without
/// re-hashing keys.
#[derive(Clone)]
struct Entry<K, V> {
    hash: u64,
    key: K,
    value: V,
}

/// Internal node structure for the HAMT.
#[derive(Clone)]
enum Node<K, V> {
    /// The empty sentinel; only ever the root.
    Empty,
    /// A single leaf promoted to root.
    Entry(Entry<K, V>),
    /// Bitmap-indexed branching node.
    Bitmap {
        /// Bit `i` is set iff branch index `i` is occupied.
        bitmap: u32,
        /// Dense slots, one per set bit, in branch-index order.
        children: ReferenceCounter<[Child<K, V>]>,
    },
    /// Collision node for keys sharing one full hash.
    Collision {
        hash: u64,
        entries: ReferenceCounter<[(K, V)]>,
    },
}

/// A slot in a branching node.
#[derive(Clone)]
enum Child<K, V> {
    /// A key-value leaf stored inline.
    Entry(Entry<K, V>),
    /// A reference to a deeper branching or collision node.
    Node(ReferenceCounter<Node<K, V>>),
}

// =============================================================================
// HamtMap Definition
// =============================================================================

/// A persistent (immutable) hash map based on a Hash Array Mapped Trie.
///
/// `HamtMap` is an immutable data structure that uses structural sharing to
/// efficiently support functional programming patterns. Operations never
/// mutate state observable through any other handle to the same map.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `get`          | O(log32 N)        |
/// | `insert`       | O(log32 N)        |
/// | `remove`       | O(log32 N)        |
/// | `contains_key` | O(log32 N)        |
/// | `len`          | O(1)              |
/// | `is_empty`     | O(1)              |
///
/// # Examples
///
/// ```rust
/// use hamtrie::HamtMap;
///
/// let map = HamtMap::singleton("key".to_string(), 42);
/// assert_eq!(map.get("key"), Some(&42));
/// ```
#[derive(Clone)]
pub struct HamtMap<K, V> {
    /// Root node of the trie
    root: ReferenceCounter<Node<K, V>>,
    /// Number of entries
    length: usize,
}

impl<K, V> HamtMap<K, V> {
    /// Creates a new empty map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtMap;
    ///
    /// let map: HamtMap<String, i32> = HamtMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: ReferenceCounter::new(Node::Empty),
            length: 0,
        }
    }

    /// Returns the number of entries in the map.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtMap;
    ///
    /// let map = HamtMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    /// assert_eq!(map.len(), 2);
    /// ```
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the map contains no entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtMap;
    ///
    /// let empty: HamtMap<String, i32> = HamtMap::new();
    /// assert!(empty.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns an iterator over key-value pairs.
    ///
    /// The iterator is lazy: it walks the trie depth-first with an explicit
    /// stack of cursors (the trie is at most 14 levels deep) and yields each
    /// entry exactly once. The order is stable for a given map but otherwise
    /// unspecified.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtMap;
    ///
    /// let map = HamtMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    ///
    /// for (key, value) in map.iter() {
    ///     println!("{}: {}", key, value);
    /// }
    /// ```
    #[must_use]
    pub fn iter(&self) -> HamtMapIterator<'_, K, V> {
        let mut stack = Vec::new();
        let mut root_entry = None;
        match self.root.as_ref() {
            Node::Empty => {}
            Node::Entry(entry) => root_entry = Some((&entry.key, &entry.value)),
            Node::Bitmap { children, .. } => stack.push(IterFrame::Children(children.iter())),
            Node::Collision { entries, .. } => stack.push(IterFrame::Entries(entries.iter())),
        }
        HamtMapIterator {
            stack,
            root_entry,
            remaining: self.length,
        }
    }

    /// Returns an iterator over keys.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtMap;
    ///
    /// let map = HamtMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    ///
    /// assert_eq!(map.keys().count(), 2);
    /// ```
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over values.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtMap;
    ///
    /// let map = HamtMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    ///
    /// let sum: i32 = map.values().sum();
    /// assert_eq!(sum, 3);
    /// ```
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }
}

impl<K: Clone + Hash + Eq, V: Clone> HamtMap<K, V> {
    /// Creates a map containing a single key-value pair.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtMap;
    ///
    /// let map = HamtMap::singleton("key".to_string(), 42);
    /// assert_eq!(map.len(), 1);
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::new().insert(key, value)
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but `Hash`
    /// and `Eq` on the borrowed form must match those for the key type.
    /// Lookups never allocate.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtMap;
    ///
    /// let map = HamtMap::new().insert("hello".to_string(), 42);
    ///
    /// // Can use &str to look up String keys
    /// assert_eq!(map.get("hello"), Some(&42));
    /// assert_eq!(map.get("world"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, value)| value)
    }

    /// Returns the key-value pair corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtMap;
    ///
    /// let map = HamtMap::new().insert("hello".to_string(), 42);
    ///
    /// let (key, value) = map.get_key_value("hello").unwrap();
    /// assert_eq!(key, "hello");
    /// assert_eq!(value, &42);
    /// ```
    #[must_use]
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = compute_hash(key);
        Self::lookup(&self.root, key, hash, 0)
    }

    /// Recursive helper for lookups.
    fn lookup<'a, Q>(
        node: &'a Node<K, V>,
        key: &Q,
        hash: u64,
        level: usize,
    ) -> Option<(&'a K, &'a V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match node {
            Node::Empty => {
                // The empty sentinel is only ever the root.
                assert_eq!(level, 0, "empty node below the trie root");
                None
            }
            Node::Entry(entry) => {
                if entry.hash == hash && entry.key.borrow() == key {
                    Some((&entry.key, &entry.value))
                } else {
                    None
                }
            }
            Node::Bitmap { bitmap, children } => {
                let index = hash_index(hash, level);
                let bit = 1u32 << index;

                if bitmap & bit == 0 {
                    return None;
                }

                let position = (bitmap & (bit - 1)).count_ones() as usize;
                match &children[position] {
                    Child::Entry(entry) => {
                        if entry.hash == hash && entry.key.borrow() == key {
                            Some((&entry.key, &entry.value))
                        } else {
                            None
                        }
                    }
                    Child::Node(subnode) => Self::lookup(subnode, key, hash, level + 1),
                }
            }
            Node::Collision {
                hash: collision_hash,
                entries,
            } => {
                if *collision_hash != hash {
                    return None;
                }
                entries
                    .iter()
                    .find(|(entry_key, _)| entry_key.borrow() == key)
                    .map(|(entry_key, value)| (entry_key, value))
            }
        }
    }

    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtMap;
    ///
    /// let map = HamtMap::new().insert("key".to_string(), 42);
    ///
    /// assert!(map.contains_key("key"));
    /// assert!(!map.contains_key("other"));
    /// ```
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map already contains the key, the value is replaced.
    ///
    /// # Complexity
    ///
    /// O(log32 N); allocates at most one node per level on the descent path.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtMap;
    ///
    /// let map1 = HamtMap::new().insert("key".to_string(), 1);
    /// let map2 = map1.insert("key".to_string(), 2);
    ///
    /// assert_eq!(map1.get("key"), Some(&1)); // Original unchanged
    /// assert_eq!(map2.get("key"), Some(&2)); // New version
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let hash = compute_hash(&key);
        let (new_root, added) = Self::insert_into_node(&self.root, Entry { hash, key, value }, 0);

        Self {
            root: ReferenceCounter::new(new_root),
            length: if added { self.length + 1 } else { self.length },
        }
    }

    /// Recursive helper for insert.
    ///
    /// Returns the replacement node and `true` when a new key was added
    /// (`false` when an existing key's value was replaced).
    fn insert_into_node(node: &Node<K, V>, entry: Entry<K, V>, level: usize) -> (Node<K, V>, bool) {
        match node {
            Node::Empty => (Node::Entry(entry), true),
            Node::Entry(existing) => {
                if existing.hash == entry.hash && existing.key == entry.key {
                    (Node::Entry(entry), false)
                } else if existing.hash == entry.hash {
                    let entries = ReferenceCounter::from(vec![
                        (existing.key.clone(), existing.value.clone()),
                        (entry.key, entry.value),
                    ]);
                    (
                        Node::Collision {
                            hash: existing.hash,
                            entries,
                        },
                        true,
                    )
                } else {
                    (Self::combine_entries(existing.clone(), entry, level), true)
                }
            }
            Node::Bitmap { bitmap, children } => {
                Self::insert_into_bitmap(*bitmap, children, entry, level)
            }
            Node::Collision {
                hash: collision_hash,
                entries,
            } => Self::insert_into_collision(node, *collision_hash, entries, entry, level),
        }
    }

    /// Builds the subtree holding two leaves whose hashes differ.
    ///
    /// Descends until the hash slices diverge, producing a single-slot
    /// branching node per level of shared prefix and a two-slot node at the
    /// point of divergence.
    fn combine_entries(existing: Entry<K, V>, entry: Entry<K, V>, level: usize) -> Node<K, V> {
        // Distinct 64-bit hashes always diverge by MAX_LEVEL; running past
        // it means the trie descent is corrupt.
        assert!(
            level <= MAX_LEVEL,
            "hash slices exhausted while splitting distinct hashes"
        );

        let existing_index = hash_index(existing.hash, level);
        let entry_index = hash_index(entry.hash, level);

        if existing_index == entry_index {
            let subnode = Self::combine_entries(existing, entry, level + 1);
            Node::Bitmap {
                bitmap: 1u32 << existing_index,
                children: ReferenceCounter::from(vec![Child::Node(ReferenceCounter::new(subnode))]),
            }
        } else {
            let bitmap = (1u32 << existing_index) | (1u32 << entry_index);
            let children = if existing_index < entry_index {
                vec![Child::Entry(existing), Child::Entry(entry)]
            } else {
                vec![Child::Entry(entry), Child::Entry(existing)]
            };
            Node::Bitmap {
                bitmap,
                children: ReferenceCounter::from(children),
            }
        }
    }

    /// Helper for inserting into a branching node.
    fn insert_into_bitmap(
        bitmap: u32,
        children: &ReferenceCounter<[Child<K, V>]>,
        entry: Entry<K, V>,
        level: usize,
    ) -> (Node<K, V>, bool) {
        let index = hash_index(entry.hash, level);
        let bit = 1u32 << index;
        let position = (bitmap & (bit - 1)).count_ones() as usize;

        if bitmap & bit == 0 {
            // Free branch: widen the node by one slot.
            let mut new_children = children.to_vec();
            new_children.insert(position, Child::Entry(entry));
            return (
                Node::Bitmap {
                    bitmap: bitmap | bit,
                    children: ReferenceCounter::from(new_children),
                },
                true,
            );
        }

        let (new_child, added) = match &children[position] {
            Child::Entry(existing) => {
                if existing.hash == entry.hash && existing.key == entry.key {
                    (Child::Entry(entry), false)
                } else if existing.hash == entry.hash {
                    let collision = Node::Collision {
                        hash: existing.hash,
                        entries: ReferenceCounter::from(vec![
                            (existing.key.clone(), existing.value.clone()),
                            (entry.key, entry.value),
                        ]),
                    };
                    (Child::Node(ReferenceCounter::new(collision)), true)
                } else {
                    let subnode = Self::combine_entries(existing.clone(), entry, level + 1);
                    (Child::Node(ReferenceCounter::new(subnode)), true)
                }
            }
            Child::Node(subnode) => {
                let (new_subnode, added) = Self::insert_into_node(subnode, entry, level + 1);
                (Child::Node(ReferenceCounter::new(new_subnode)), added)
            }
        };

        let mut new_children = children.to_vec();
        new_children[position] = new_child;
        (
            Node::Bitmap {
                bitmap,
                children: ReferenceCounter::from(new_children),
            },
            added,
        )
    }

    /// Helper for inserting into a collision node.
    fn insert_into_collision(
        node: &Node<K, V>,
        collision_hash: u64,
        entries: &ReferenceCounter<[(K, V)]>,
        entry: Entry<K, V>,
        level: usize,
    ) -> (Node<K, V>, bool) {
        if entry.hash != collision_hash {
            // A different hash can never join this node; push the collision
            // node down and branch until the slices diverge.
            return (
                Self::disperse_collision(node.clone(), collision_hash, entry, level),
                true,
            );
        }

        let mut new_entries = entries.to_vec();
        let added = match new_entries
            .iter()
            .position(|(existing_key, _)| *existing_key == entry.key)
        {
            Some(position) => {
                new_entries[position].1 = entry.value;
                false
            }
            None => {
                new_entries.push((entry.key, entry.value));
                true
            }
        };

        (
            Node::Collision {
                hash: collision_hash,
                entries: ReferenceCounter::from(new_entries),
            },
            added,
        )
    }

    /// Wraps a collision node and a leaf with a different hash under fresh
    /// branching nodes at the current level.
    fn disperse_collision(
        collision: Node<K, V>,
        collision_hash: u64,
        entry: Entry<K, V>,
        level: usize,
    ) -> Node<K, V> {
        assert!(
            level <= MAX_LEVEL,
            "hash slices exhausted while splitting distinct hashes"
        );

        let collision_index = hash_index(collision_hash, level);
        let entry_index = hash_index(entry.hash, level);

        if collision_index == entry_index {
            let subnode = Self::disperse_collision(collision, collision_hash, entry, level + 1);
            Node::Bitmap {
                bitmap: 1u32 << collision_index,
                children: ReferenceCounter::from(vec![Child::Node(ReferenceCounter::new(subnode))]),
            }
        } else {
            let bitmap = (1u32 << collision_index) | (1u32 << entry_index);
            let collision_child = Child::Node(ReferenceCounter::new(collision));
            let children = if collision_index < entry_index {
                vec![collision_child, Child::Entry(entry)]
            } else {
                vec![Child::Entry(entry), collision_child]
            };
            Node::Bitmap {
                bitmap,
                children: ReferenceCounter::from(children),
            }
        }
    }

    /// Removes a key from the map.
    ///
    /// Returns a new map without the key. If the key doesn't exist, returns
    /// a clone of the original map, sharing its root.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtMap;
    ///
    /// let map = HamtMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    /// let removed = map.remove("a");
    ///
    /// assert_eq!(map.len(), 2);     // Original unchanged
    /// assert_eq!(removed.len(), 1); // New version
    /// assert_eq!(removed.get("a"), None);
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = compute_hash(key);
        match Self::remove_from_node(&self.root, key, hash, 0) {
            Some(new_root) => Self {
                root: ReferenceCounter::new(new_root),
                length: self.length - 1,
            },
            None => self.clone(),
        }
    }

    /// Recursive helper for remove.
    ///
    /// Returns `None` when the key is absent (the caller keeps the existing
    /// node) and `Some(replacement)` when it was removed. The replacement
    /// may be `Empty`, a hoisted leaf, a collision node, or a rebuilt
    /// branching node.
    fn remove_from_node<Q>(node: &Node<K, V>, key: &Q, hash: u64, level: usize) -> Option<Node<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match node {
            Node::Empty => {
                assert_eq!(level, 0, "empty node below the trie root");
                None
            }
            Node::Entry(entry) => {
                if entry.hash == hash && entry.key.borrow() == key {
                    Some(Node::Empty)
                } else {
                    None
                }
            }
            Node::Bitmap { bitmap, children } => {
                Self::remove_from_bitmap(*bitmap, children, key, hash, level)
            }
            Node::Collision {
                hash: collision_hash,
                entries,
            } => Self::remove_from_collision(*collision_hash, entries, key, hash),
        }
    }

    /// Helper for removing from a branching node.
    fn remove_from_bitmap<Q>(
        bitmap: u32,
        children: &ReferenceCounter<[Child<K, V>]>,
        key: &Q,
        hash: u64,
        level: usize,
    ) -> Option<Node<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = hash_index(hash, level);
        let bit = 1u32 << index;

        if bitmap & bit == 0 {
            return None;
        }

        let position = (bitmap & (bit - 1)).count_ones() as usize;

        match &children[position] {
            Child::Entry(entry) => {
                if entry.hash == hash && entry.key.borrow() == key {
                    Some(Self::drop_slot(bitmap, children, position, bit))
                } else {
                    None
                }
            }
            Child::Node(subnode) => {
                let new_subnode = Self::remove_from_node(subnode, key, hash, level + 1)?;
                Some(match new_subnode {
                    // Referenced nodes hold at least two entries, so one
                    // removal can never empty them.
                    Node::Empty => unreachable!("removal emptied a referenced node"),
                    Node::Entry(entry) => {
                        if children.len() == 1 {
                            // Only slot left: hoist the leaf up one level.
                            Node::Entry(entry)
                        } else {
                            let mut new_children = children.to_vec();
                            new_children[position] = Child::Entry(entry);
                            Node::Bitmap {
                                bitmap,
                                children: ReferenceCounter::from(new_children),
                            }
                        }
                    }
                    collision @ Node::Collision { .. } if children.len() == 1 => collision,
                    other => {
                        let mut new_children = children.to_vec();
                        new_children[position] = Child::Node(ReferenceCounter::new(other));
                        Node::Bitmap {
                            bitmap,
                            children: ReferenceCounter::from(new_children),
                        }
                    }
                })
            }
        }
    }

    /// Removes the inline leaf at `position`, collapsing the node when a
    /// single slot remains.
    ///
    /// A leftover leaf or collision node is hoisted up one level so that
    /// chains of single-slot branching nodes never survive a removal. A
    /// leftover branching child stays in place: its occupancy bits belong to
    /// the next level and a one-slot node above it is the canonical shape.
    fn drop_slot(
        bitmap: u32,
        children: &ReferenceCounter<[Child<K, V>]>,
        position: usize,
        bit: u32,
    ) -> Node<K, V> {
        match children.len() {
            1 => Node::Empty,
            2 => {
                let other = &children[1 - position];
                match other {
                    Child::Entry(entry) => Node::Entry(entry.clone()),
                    Child::Node(subnode) => match subnode.as_ref() {
                        collision @ Node::Collision { .. } => collision.clone(),
                        Node::Bitmap { .. } => Node::Bitmap {
                            bitmap: bitmap & !bit,
                            children: ReferenceCounter::from(vec![other.clone()]),
                        },
                        Node::Empty | Node::Entry(_) => {
                            unreachable!("slot references an empty or leaf node")
                        }
                    },
                }
            }
            _ => {
                let mut new_children = children.to_vec();
                new_children.remove(position);
                Node::Bitmap {
                    bitmap: bitmap & !bit,
                    children: ReferenceCounter::from(new_children),
                }
            }
        }
    }

    /// Helper for removing from a collision node.
    fn remove_from_collision<Q>(
        collision_hash: u64,
        entries: &ReferenceCounter<[(K, V)]>,
        key: &Q,
        hash: u64,
    ) -> Option<Node<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if hash != collision_hash {
            return None;
        }

        let position = entries
            .iter()
            .position(|(entry_key, _)| entry_key.borrow() == key)?;

        let mut new_entries = entries.to_vec();
        new_entries.remove(position);

        // Collision nodes hold at least two entries, so at least one
        // survives the removal.
        if new_entries.len() == 1 {
            let (remaining_key, remaining_value) = new_entries.remove(0);
            Some(Node::Entry(Entry {
                hash: collision_hash,
                key: remaining_key,
                value: remaining_value,
            }))
        } else {
            Some(Node::Collision {
                hash: collision_hash,
                entries: ReferenceCounter::from(new_entries),
            })
        }
    }

    /// Updates the value for a key using a function.
    ///
    /// Returns `None` if the key doesn't exist.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtMap;
    ///
    /// let map = HamtMap::new().insert("count".to_string(), 10);
    /// let updated = map.update("count", |value| value + 1);
    ///
    /// assert_eq!(updated.unwrap().get("count"), Some(&11));
    /// ```
    #[must_use]
    pub fn update<Q, F>(&self, key: &Q, function: F) -> Option<Self>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> V,
    {
        let (actual_key, value) = self.get_key_value(key)?;
        let new_value = function(value);
        Some(self.insert(actual_key.clone(), new_value))
    }

    /// Updates or removes a value for a key using an updater function.
    ///
    /// The updater receives `Some(&V)` if the key exists, or `None` if it
    /// doesn't. If the updater returns `Some(V)`, the value is inserted or
    /// updated. If the updater returns `None`, the key is removed (if it
    /// exists).
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtMap;
    ///
    /// let map = HamtMap::new().insert("count".to_string(), 10);
    ///
    /// // Increment existing value
    /// let updated = map.update_with("count", |maybe| maybe.map(|value| value + 1));
    /// assert_eq!(updated.get("count"), Some(&11));
    ///
    /// // Remove by returning None
    /// let removed = map.update_with("count", |_| None);
    /// assert_eq!(removed.get("count"), None);
    /// ```
    #[must_use]
    pub fn update_with<Q, F>(&self, key: &Q, updater: F) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let current = self.get_key_value(key);
        match (current, updater(current.map(|(_, value)| value))) {
            (Some((actual_key, _)), Some(value)) => self.insert(actual_key.clone(), value),
            (Some(_), None) => self.remove(key),
            (None, Some(value)) => self.insert(key.to_owned(), value),
            (None, None) => self.clone(),
        }
    }

    /// Merges two maps, with values from `other` taking precedence on key
    /// conflicts.
    ///
    /// # Complexity
    ///
    /// O(m log32 (n + m)) where m is the size of `other`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hamtrie::HamtMap;
    ///
    /// let map1 = HamtMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    /// let map2 = HamtMap::new()
    ///     .insert("b".to_string(), 20)
    ///     .insert("c".to_string(), 3);
    ///
    /// let merged = map1.merge(&map2);
    ///
    /// assert_eq!(merged.get("a"), Some(&1));
    /// assert_eq!(merged.get("b"), Some(&20)); // From map2
    /// assert_eq!(merged.get("c"), Some(&3));
    /// ```
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for (key, value) in other {
            result = result.insert(key.clone(), value.clone());
        }
        result
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// A depth-first cursor into one node's slots.
enum IterFrame<'a, K, V> {
    Children(std::slice::Iter<'a, Child<K, V>>),
    Entries(std::slice::Iter<'a, (K, V)>),
}

/// A lazy iterator over key-value pairs of a [`HamtMap`].
pub struct HamtMapIterator<'a, K, V> {
    stack: Vec<IterFrame<'a, K, V>>,
    root_entry: Option<(&'a K, &'a V)>,
    remaining: usize,
}

impl<'a, K, V> Iterator for HamtMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(entry) = self.root_entry.take() {
            self.remaining -= 1;
            return Some(entry);
        }

        loop {
            let frame = self.stack.last_mut()?;
            match frame {
                IterFrame::Children(children) => match children.next() {
                    Some(Child::Entry(entry)) => {
                        self.remaining -= 1;
                        return Some((&entry.key, &entry.value));
                    }
                    Some(Child::Node(subnode)) => match subnode.as_ref() {
                        Node::Bitmap { children, .. } => {
                            self.stack.push(IterFrame::Children(children.iter()));
                        }
                        Node::Collision { entries, .. } => {
                            self.stack.push(IterFrame::Entries(entries.iter()));
                        }
                        Node::Empty | Node::Entry(_) => {
                            unreachable!("slot references an empty or leaf node")
                        }
                    },
                    None => {
                        self.stack.pop();
                    }
                },
                IterFrame::Entries(entries) => match entries.next() {
                    Some((key, value)) => {
                        self.remaining -= 1;
                        return Some((key, value));
                    }
                    None => {
                        self.stack.pop();
                    }
                },
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for HamtMapIterator<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

/// An owning iterator over key-value pairs of a [`HamtMap`].
pub struct HamtMapIntoIterator<K, V> {
    entries: std::vec::IntoIter<(K, V)>,
}

impl<K, V> Iterator for HamtMapIntoIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> ExactSizeIterator for HamtMapIntoIterator<K, V> {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Default for HamtMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Hash + Eq, V: Clone> FromIterator<(K, V)> for HamtMap<K, V> {
    /// Builds a map from a sequence of pairs; duplicate keys keep the last
    /// value.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map = map.insert(key, value);
        }
        map
    }
}

impl<K: Clone + Hash + Eq, V: Clone> IntoIterator for HamtMap<K, V> {
    type Item = (K, V);
    type IntoIter = HamtMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        let entries: Vec<(K, V)> = self
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        HamtMapIntoIterator {
            entries: entries.into_iter(),
        }
    }
}

impl<'a, K, V> IntoIterator for &'a HamtMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = HamtMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, Q> std::ops::Index<&Q> for HamtMap<K, V>
where
    K: Clone + Hash + Eq + Borrow<Q>,
    V: Clone,
    Q: Hash + Eq + ?Sized,
{
    type Output = V;

    /// Returns a reference to the value corresponding to the key.
    ///
    /// # Panics
    ///
    /// Panics if the key is not present in the map. Use [`HamtMap::get`]
    /// for a non-panicking lookup.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("no entry found for key")
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> PartialEq for HamtMap<K, V> {
    /// Two maps are equal iff they contain the same key-value pairs.
    ///
    /// Maps sharing a root compare equal without iterating.
    fn eq(&self, other: &Self) -> bool {
        if ReferenceCounter::ptr_eq(&self.root, &other.root) {
            return true;
        }
        if self.length != other.length {
            return false;
        }
        self.iter()
            .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K: Clone + Hash + Eq, V: Clone + Eq> Eq for HamtMap<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for HamtMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V> serde::Serialize for HamtMap<K, V>
where
    K: serde::Serialize,
    V: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
struct HamtMapVisitor<K, V> {
    key_marker: std::marker::PhantomData<K>,
    value_marker: std::marker::PhantomData<V>,
}

#[cfg(feature = "serde")]
impl<K, V> HamtMapVisitor<K, V> {
    const fn new() -> Self {
        Self {
            key_marker: std::marker::PhantomData,
            value_marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::de::Visitor<'de> for HamtMapVisitor<K, V>
where
    K: serde::Deserialize<'de> + Clone + Hash + Eq,
    V: serde::Deserialize<'de> + Clone,
{
    type Value = HamtMap<K, V>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let mut map = HamtMap::new();
        while let Some((key, value)) = access.next_entry()? {
            map = map.insert(key, value);
        }
        Ok(map)
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::Deserialize<'de> for HamtMap<K, V>
where
    K: serde::Deserialize<'de> + Clone + Hash + Eq,
    V: serde::Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(HamtMapVisitor::new())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// A key whose hash is a fixed constant, forcing every instance into
    /// the same trie path and, with distinct inner values, into one
    /// collision node.
    #[derive(Clone, Debug, PartialEq, Eq)]
    struct CollidingKey(u32);

    impl Hash for CollidingKey {
        fn hash<H: Hasher>(&self, state: &mut H) {
            state.write_u64(0);
        }
    }

    /// Structural equality on nodes. Collision entries are compared as
    /// sets because their internal order is insertion order.
    fn same_structure<K: PartialEq, V: PartialEq>(left: &Node<K, V>, right: &Node<K, V>) -> bool {
        match (left, right) {
            (Node::Empty, Node::Empty) => true,
            (Node::Entry(a), Node::Entry(b)) => {
                a.hash == b.hash && a.key == b.key && a.value == b.value
            }
            (
                Node::Bitmap {
                    bitmap: left_bitmap,
                    children: left_children,
                },
                Node::Bitmap {
                    bitmap: right_bitmap,
                    children: right_children,
                },
            ) => {
                left_bitmap == right_bitmap
                    && left_children.len() == right_children.len()
                    && left_children
                        .iter()
                        .zip(right_children.iter())
                        .all(|pair| match pair {
                            (Child::Entry(a), Child::Entry(b)) => {
                                a.hash == b.hash && a.key == b.key && a.value == b.value
                            }
                            (Child::Node(a), Child::Node(b)) => same_structure(a, b),
                            _ => false,
                        })
            }
            (
                Node::Collision {
                    hash: left_hash,
                    entries: left_entries,
                },
                Node::Collision {
                    hash: right_hash,
                    entries: right_entries,
                },
            ) => {
                left_hash == right_hash
                    && left_entries.len() == right_entries.len()
                    && left_entries.iter().all(|(key, value)| {
                        right_entries
                            .iter()
                            .any(|(other_key, other_value)| key == other_key && value == other_value)
                    })
            }
            _ => false,
        }
    }

    /// Builds a trie by feeding entries with explicit hashes through the
    /// node-level insert.
    fn build_node(entries: &[(u64, &'static str, i32)]) -> Node<&'static str, i32> {
        let mut node = Node::Empty;
        for &(hash, key, value) in entries {
            let (next, _) = HamtMap::insert_into_node(&node, Entry { hash, key, value }, 0);
            node = next;
        }
        node
    }

    // =========================================================================
    // Basic Operations
    // =========================================================================

    #[rstest]
    fn test_new_creates_empty() {
        let map: HamtMap<String, i32> = HamtMap::new();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
    }

    #[rstest]
    fn test_insert_and_get() {
        let map = HamtMap::new()
            .insert("one".to_string(), 1)
            .insert("two".to_string(), 2);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("one"), Some(&1));
        assert_eq!(map.get("two"), Some(&2));
        assert_eq!(map.get("three"), None);
    }

    #[rstest]
    fn test_remove() {
        let map = HamtMap::new()
            .insert("a".to_string(), 1)
            .insert("b".to_string(), 2);
        let removed = map.remove("a");

        assert_eq!(removed.len(), 1);
        assert_eq!(removed.get("a"), None);
        assert_eq!(removed.get("b"), Some(&2));
    }

    #[rstest]
    fn test_single_entry_root_is_bare_leaf() {
        let map = HamtMap::singleton("key".to_string(), 42);
        assert!(matches!(map.root.as_ref(), Node::Entry(_)));
    }

    // =========================================================================
    // Collision Handling
    // =========================================================================

    #[rstest]
    fn test_colliding_keys_share_one_collision_node() {
        let mut map = HamtMap::new();
        for index in 0..16 {
            map = map.insert(CollidingKey(index), index);
        }

        assert_eq!(map.len(), 16);
        match map.root.as_ref() {
            Node::Collision { entries, .. } => assert_eq!(entries.len(), 16),
            _ => panic!("expected a collision node at the root"),
        }

        for index in 0..16 {
            assert_eq!(map.get(&CollidingKey(index)), Some(&index));
        }
    }

    #[rstest]
    fn test_collision_node_shrinks_and_collapses() {
        let mut map = HamtMap::new();
        for index in 0..16 {
            map = map.insert(CollidingKey(index), index);
        }

        let fifteen = map.remove(&CollidingKey(0));
        assert_eq!(fifteen.len(), 15);
        match fifteen.root.as_ref() {
            Node::Collision { entries, .. } => assert_eq!(entries.len(), 15),
            _ => panic!("expected a collision node at the root"),
        }

        let mut shrinking = fifteen;
        for index in 1..15 {
            shrinking = shrinking.remove(&CollidingKey(index));
        }
        assert_eq!(shrinking.len(), 1);
        assert!(matches!(shrinking.root.as_ref(), Node::Entry(_)));
        assert_eq!(shrinking.get(&CollidingKey(15)), Some(&15));

        let empty = shrinking.remove(&CollidingKey(15));
        assert!(empty.is_empty());
        assert!(matches!(empty.root.as_ref(), Node::Empty));
    }

    #[rstest]
    fn test_colliding_keys_behave_as_associative_list() {
        let mut map = HamtMap::new();
        for index in 0..8 {
            map = map.insert(CollidingKey(index), index);
        }

        let replaced = map.insert(CollidingKey(3), 999);
        assert_eq!(replaced.len(), 8);
        assert_eq!(replaced.get(&CollidingKey(3)), Some(&999));
        assert_eq!(map.get(&CollidingKey(3)), Some(&3));
        assert!(!map.contains_key(&CollidingKey(8)));
    }

    // =========================================================================
    // Node-Level Structure (explicit hashes)
    // =========================================================================

    #[rstest]
    fn test_equal_hashes_build_collision_at_current_level() {
        let node = build_node(&[(5, "a", 1), (5, "b", 2)]);
        assert!(matches!(&node, Node::Collision { hash: 5, entries } if entries.len() == 2));

        let removed = HamtMap::remove_from_node(&node, "a", 5, 0).unwrap();
        let direct = build_node(&[(5, "b", 2)]);
        assert!(same_structure(&removed, &direct));
    }

    #[rstest]
    fn test_shared_prefix_builds_single_slot_chain() {
        // Level 0 slice is 1 for both; they diverge at level 1.
        let node = build_node(&[(0x01, "a", 1), (0x21, "b", 2)]);

        match &node {
            Node::Bitmap { bitmap, children } => {
                assert_eq!(*bitmap, 1 << 1);
                assert_eq!(children.len(), 1);
                match &children[0] {
                    Child::Node(subnode) => match subnode.as_ref() {
                        Node::Bitmap { bitmap, children } => {
                            assert_eq!(*bitmap, 0b11);
                            assert_eq!(children.len(), 2);
                        }
                        _ => panic!("expected an inner branching node"),
                    },
                    Child::Entry(_) => panic!("expected a node slot"),
                }
            }
            _ => panic!("expected a branching node"),
        }
    }

    #[rstest]
    fn test_removal_collapses_single_slot_chain() {
        let node = build_node(&[(0x01, "a", 1), (0x21, "b", 2)]);

        let removed = HamtMap::remove_from_node(&node, "b", 0x21, 0).unwrap();
        let direct = build_node(&[(0x01, "a", 1)]);
        assert!(same_structure(&removed, &direct));
    }

    #[rstest]
    fn test_removal_inlines_leaf_beside_sibling() {
        let node = build_node(&[(0x01, "a", 1), (0x21, "b", 2), (0x02, "c", 3)]);

        let removed = HamtMap::remove_from_node(&node, "b", 0x21, 0).unwrap();
        let direct = build_node(&[(0x01, "a", 1), (0x02, "c", 3)]);
        assert!(same_structure(&removed, &direct));
    }

    #[rstest]
    fn test_removal_keeps_branching_child_under_single_slot_node() {
        // "a" and "b" diverge at level 1 under branch 1; "c" is an inline
        // leaf under branch 2. Removing "c" must not hoist the branching
        // child, because its bits belong to level 1.
        let node = build_node(&[(0x01, "a", 1), (0x21, "b", 2), (0x02, "c", 3)]);

        let removed = HamtMap::remove_from_node(&node, "c", 0x02, 0).unwrap();
        let direct = build_node(&[(0x01, "a", 1), (0x21, "b", 2)]);
        assert!(same_structure(&removed, &direct));

        match &removed {
            Node::Bitmap { bitmap, children } => {
                assert_eq!(*bitmap, 1 << 1);
                assert_eq!(children.len(), 1);
                assert!(matches!(&children[0], Child::Node(_)));
            }
            _ => panic!("expected a branching node"),
        }
    }

    #[rstest]
    fn test_collision_pushed_down_by_distinct_hash() {
        // Two keys collide on hash 0x01; a third key shares the level 0
        // slice but diverges at level 1.
        let node = build_node(&[(0x01, "a", 1), (0x01, "b", 2), (0x21, "c", 3)]);

        match &node {
            Node::Bitmap { bitmap, children } => {
                assert_eq!(*bitmap, 1 << 1);
                assert_eq!(children.len(), 1);
                match &children[0] {
                    Child::Node(subnode) => match subnode.as_ref() {
                        Node::Bitmap { bitmap, children } => {
                            assert_eq!(*bitmap, 0b11);
                            assert!(matches!(&children[0], Child::Node(collision)
                                if matches!(collision.as_ref(), Node::Collision { .. })));
                            assert!(matches!(&children[1], Child::Entry(_)));
                        }
                        _ => panic!("expected an inner branching node"),
                    },
                    Child::Entry(_) => panic!("expected a node slot"),
                }
            }
            _ => panic!("expected a branching node"),
        }

        // Removing the diverging key hoists the collision node back up.
        let removed = HamtMap::remove_from_node(&node, "c", 0x21, 0).unwrap();
        let direct = build_node(&[(0x01, "a", 1), (0x01, "b", 2)]);
        assert!(same_structure(&removed, &direct));
    }

    #[rstest]
    fn test_canonical_structure_is_insertion_order_independent() {
        let forward = build_node(&[(0x01, "a", 1), (0x21, "b", 2), (0x02, "c", 3)]);
        let backward = build_node(&[(0x02, "c", 3), (0x21, "b", 2), (0x01, "a", 1)]);
        assert!(same_structure(&forward, &backward));
    }

    // =========================================================================
    // Fatal Invariant Violations
    // =========================================================================

    #[rstest]
    #[should_panic(expected = "hash slices exhausted")]
    fn test_splitting_past_max_level_is_fatal() {
        let first = Entry {
            hash: 1,
            key: "a",
            value: 1,
        };
        let second = Entry {
            hash: 2,
            key: "b",
            value: 2,
        };
        let _ = HamtMap::combine_entries(first, second, MAX_LEVEL + 1);
    }

    #[rstest]
    #[should_panic(expected = "empty node below the trie root")]
    fn test_empty_node_in_slot_is_fatal() {
        let corrupt: Node<&'static str, i32> = Node::Bitmap {
            bitmap: 1,
            children: ReferenceCounter::from(vec![Child::Node(ReferenceCounter::new(Node::Empty))]),
        };
        let _ = HamtMap::lookup(&corrupt, "a", 0, 0);
    }

    #[rstest]
    #[should_panic(expected = "removal emptied a referenced node")]
    fn test_leaf_node_in_slot_is_fatal_on_remove() {
        let corrupt: Node<&'static str, i32> = Node::Bitmap {
            bitmap: 1,
            children: ReferenceCounter::from(vec![Child::Node(ReferenceCounter::new(
                Node::Entry(Entry {
                    hash: 0,
                    key: "a",
                    value: 1,
                }),
            ))]),
        };
        let _ = HamtMap::remove_from_node(&corrupt, "a", 0, 0);
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    #[rstest]
    fn test_iterator_is_exact_size() {
        let map: HamtMap<i32, i32> = (0..100).map(|index| (index, index)).collect();
        let mut iterator = map.iter();
        assert_eq!(iterator.len(), 100);
        iterator.next();
        assert_eq!(iterator.len(), 99);
        assert_eq!(iterator.size_hint(), (99, Some(99)));
    }

    #[rstest]
    fn test_iterator_covers_collision_nodes() {
        let mut map = HamtMap::new();
        for index in 0..4 {
            map = map.insert(CollidingKey(index), index);
        }
        let mut seen: Vec<u32> = map.iter().map(|(key, _)| key.0).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }
}
