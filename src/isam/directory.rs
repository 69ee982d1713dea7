// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The ordered map from a block's minimum key to the block, used to locate
//! the block potentially containing a given key.
//!
//! Locating a key is specified as: find the first entry strictly greater
//! than `k` (the upper bound), then step back one entry unless that upper
//! bound entry is the head -- the result being the greatest block whose
//! min-key is `<= k`. For an ordered map that procedure is exactly a single
//! "floor" range query; `BTreeMap::range(..=k).next_back()` is the same
//! traversal expressed directly through the ordered API rather than
//! iterator-stepping, in the same spirit as `Memtable::get`'s use of
//! `range(lower_bound..)` in the teacher crate.

use std::collections::BTreeMap;

/// Ordered `min_key(block) -> arena index` mapping.
pub struct Directory<K> {
    map: BTreeMap<K, usize>,
}

impl<K> Default for Directory<K> {
    fn default() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> Directory<K> {
    /// An empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Registers (or re-registers) a block under `min_key`.
    pub fn insert(&mut self, min_key: K, idx: usize) {
        self.map.insert(min_key, idx);
    }

    /// Removes a block's registration under its (now stale) min-key.
    pub fn remove(&mut self, min_key: &K) {
        self.map.remove(min_key);
    }

    /// The block that would contain `key` if present: the greatest block
    /// whose min-key is `<= key`, along with the registered key itself, or
    /// `None` if `key` is smaller than every block's min-key (or the
    /// directory is empty).
    pub fn floor_entry(&self, key: &K) -> Option<(K, usize)> {
        self.map
            .range(..=key.clone())
            .next_back()
            .map(|(k, &i)| (k.clone(), i))
    }

    /// The directory's smallest entry, i.e. the head block's registration.
    pub fn first_entry(&self) -> Option<(K, usize)> {
        self.map.iter().next().map(|(k, &i)| (k.clone(), i))
    }

    /// The min-key of the directory entry immediately after `key`, i.e. the
    /// min-key of the successor block, if any.
    pub fn successor_key_of(&self, key: &K) -> Option<&K> {
        self.map
            .range((std::ops::Bound::Excluded(key.clone()), std::ops::Bound::Unbounded))
            .next()
            .map(|(k, _)| k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn sample() -> Directory<i32> {
        let mut dir = Directory::new();
        dir.insert(0, 10);
        dir.insert(10, 11);
        dir.insert(20, 12);
        dir
    }

    #[test]
    fn floor_entry_finds_the_greatest_min_key_not_exceeding() {
        let dir = sample();
        assert_eq!(dir.floor_entry(&5), Some((0, 10)));
        assert_eq!(dir.floor_entry(&10), Some((10, 11)));
        assert_eq!(dir.floor_entry(&25), Some((20, 12)));
    }

    #[test]
    fn floor_entry_below_every_min_key_is_none() {
        let dir = sample();
        assert_eq!(dir.floor_entry(&-1), None);
    }

    #[test]
    fn first_entry_is_the_head() {
        let dir = sample();
        assert_eq!(dir.first_entry(), Some((0, 10)));
    }

    #[test]
    fn successor_key_of_skips_to_the_next_registration() {
        let dir = sample();
        assert_eq!(dir.successor_key_of(&0), Some(&10));
        assert_eq!(dir.successor_key_of(&10), Some(&20));
        assert_eq!(dir.successor_key_of(&20), None);
    }

    #[test]
    fn remove_drops_a_registration() {
        let mut dir = sample();
        dir.remove(&10);
        assert_eq!(dir.floor_entry(&15), Some((0, 10)));
    }

    #[test]
    fn empty_directory_has_no_entries() {
        let dir: Directory<i32> = Directory::new();
        assert!(dir.is_empty());
        assert_eq!(dir.first_entry(), None);
        assert_eq!(dir.floor_entry(&0), None);
    }
}
