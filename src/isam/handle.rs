// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Scoped acquisition of a block's bytes.
//!
//! A [`BlockHandle`] is the sole gateway to a block's contents: acquiring one
//! calls [`BlockProvider::load_block`], and dropping one calls
//! [`BlockProvider::store_block`] exactly once. It owns its buffer outright
//! (no lifetime tied to the provider -- see the `Arc<P>` field below), so it
//! is movable and emphatically not [`Clone`]: two live handles to the same
//! block would double-store on drop.
//!
//! Rust's move semantics already give us "at most one handle, move doesn't
//! double-drop" for free (a moved-from binding never runs its destructor),
//! which is simpler than the C++ original's "defang the source on move"
//! dance. The one piece of the original discipline that *does* need code is
//! move-*assignment*: reassigning a place that already holds a handle runs
//! that handle's `Drop` (storing it) before the new value moves in -- that,
//! too, is something the language does for us automatically.

use super::overflow::Overflow;
use super::pager::{BlockId, BlockProvider};
use crate::binary_search::partition_point;
use std::sync::Arc;

/// A scoped, exclusive, loaded view of one block's sorted `(K, V)` entries.
pub struct BlockHandle<K, V, P: BlockProvider<K, V>> {
    provider: Arc<P>,
    id: BlockId,
    capacity: usize,
    // `None` only ever transiently, after the buffer has been taken by `drop`.
    buffer: Option<Vec<(K, V)>>,
}

impl<K, V, P: BlockProvider<K, V>> BlockHandle<K, V, P> {
    /// Acquires a handle to `id`, loading its contents through `provider`.
    pub fn acquire(provider: Arc<P>, id: BlockId, capacity: usize) -> Self {
        let buffer = provider.load_block(id);
        Self {
            provider,
            id,
            capacity,
            buffer: Some(buffer),
        }
    }

    /// Creates a fresh block through `provider` and returns a handle to its
    /// (empty) contents.
    pub fn create(provider: Arc<P>, capacity: usize) -> Self {
        let id = provider.create_block(capacity);
        Self {
            provider,
            id,
            capacity,
            buffer: Some(Vec::new()),
        }
    }

    /// The id of the block this handle was acquired for.
    pub fn id(&self) -> BlockId {
        self.id
    }

    fn buf(&self) -> &[(K, V)] {
        self.buffer
            .as_deref()
            .expect("handle buffer missing outside of drop")
    }

    fn buf_mut(&mut self) -> &mut Vec<(K, V)> {
        self.buffer
            .as_mut()
            .expect("handle buffer missing outside of drop")
    }

    /// Number of entries currently held by the block.
    pub fn size(&self) -> usize {
        self.buf().len()
    }

    /// The smallest key in the block, if non-empty.
    pub fn min_key(&self) -> Option<&K> {
        self.buf().first().map(|(k, _)| k)
    }

    /// The largest key in the block, if non-empty.
    pub fn max_key(&self) -> Option<&K> {
        self.buf().last().map(|(k, _)| k)
    }

    /// Indexed access into the block's sorted entries.
    pub fn get(&self, index: usize) -> Option<&(K, V)> {
        self.buf().get(index)
    }

    /// Mutable indexed access into the block's sorted entries.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut (K, V)> {
        self.buf_mut().get_mut(index)
    }
}

impl<K: Ord, V, P: BlockProvider<K, V>> BlockHandle<K, V, P> {
    /// Binary search for `key`. Returns its exact position, or `None` --
    /// callers decide policy for absent keys, this never returns a
    /// neighboring position.
    pub fn find(&self, key: &K) -> Option<usize> {
        let buf = self.buf();
        let idx = partition_point(buf, |(k, _)| k < key);
        match buf.get(idx) {
            Some((k, _)) if k == key => Some(idx),
            _ => None,
        }
    }

    /// Folds overflow entries whose key is `< upper_bound` (or all of them,
    /// if `upper_bound` is `None`) into this block, respecting `capacity`.
    ///
    /// See the module-level algorithm description in `isam::index` for the
    /// step-by-step walk this implements verbatim.
    pub fn merge_overflow(&mut self, overflow: &mut Overflow<K, V>, upper_bound: Option<&K>) {
        let capacity = self.capacity;
        let skip_upper_bound_check = capacity < 2;

        let mut i = 0;
        loop {
            if i == capacity {
                break;
            }

            let Some(overflow_min) = overflow.peek_min_key() else {
                break;
            };

            if i < self.buf().len() {
                // SAFETY of indexing: i < len, just checked.
                #[allow(clippy::indexing_slicing)]
                let cmp = self.buf()[i].0.cmp(overflow_min);

                match cmp {
                    std::cmp::Ordering::Less => {
                        i += 1;
                        continue;
                    }
                    std::cmp::Ordering::Equal => {
                        // Same key on both sides: overflow's value wins, and
                        // the stale block value is simply discarded -- not
                        // reinserted, which would hand the same key straight
                        // back to the next iteration and duplicate it in
                        // this block once it got swapped or appended again.
                        let (_, ov) = overflow.pop_min().expect("just peeked");
                        #[allow(clippy::indexing_slicing)]
                        {
                            self.buf_mut()[i].1 = ov;
                        }
                        i += 1;
                    }
                    std::cmp::Ordering::Greater => {
                        let (ok, ov) = overflow.pop_min().expect("just peeked");
                        #[allow(clippy::indexing_slicing)]
                        let old = std::mem::replace(&mut self.buf_mut()[i], (ok, ov));
                        overflow.insert(old.0, old.1);
                        i += 1;
                    }
                }
            } else {
                // i == current_size: maybe append.
                let within_bound =
                    skip_upper_bound_check || upper_bound.is_none_or(|ub| overflow_min < ub);

                if within_bound {
                    let (k, v) = overflow.pop_min().expect("just peeked");
                    self.buf_mut().push((k, v));
                    i += 1;
                } else {
                    break;
                }
            }
        }
    }

    /// Splits this block in half: moves the upper `current_size / 2` entries
    /// (starting at `current_size - count`) into a freshly created block.
    ///
    /// Returns a handle to the new block so the caller can register it in
    /// the directory and splice it into the block list immediately.
    pub fn split(&mut self) -> BlockHandle<K, V, P> {
        let count = self.buf().len() / 2;
        let split_at = self.buf().len() - count;
        let upper_half = self.buf_mut().split_off(split_at);

        let new_id = self.provider.create_block(self.capacity);
        BlockHandle {
            provider: Arc::clone(&self.provider),
            id: new_id,
            capacity: self.capacity,
            buffer: Some(upper_half),
        }
    }
}

impl<K, V, P: BlockProvider<K, V>> Drop for BlockHandle<K, V, P> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.provider.store_block(self.id, buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isam::pager::MemoryPager;
    use test_log::test;

    fn filled(provider: &Arc<MemoryPager<i32, i32>>, capacity: usize, keys: &[i32]) -> BlockHandle<i32, i32, MemoryPager<i32, i32>> {
        let mut handle = BlockHandle::create(Arc::clone(provider), capacity);
        for &k in keys {
            handle.buf_mut().push((k, k * 10));
        }
        handle
    }

    #[test]
    fn find_returns_exact_position_never_a_neighbor() {
        let provider = Arc::new(MemoryPager::new());
        let handle = filled(&provider, 5, &[2, 4, 6, 8]);

        assert_eq!(handle.find(&4), Some(1));
        assert_eq!(handle.find(&5), None);
        assert_eq!(handle.find(&1), None);
        assert_eq!(handle.find(&9), None);
    }

    #[test]
    fn merge_overflow_respects_capacity() {
        let provider = Arc::new(MemoryPager::new());
        let mut handle = filled(&provider, 3, &[2]);

        let mut overflow = Overflow::new();
        overflow.insert(1, 10);
        overflow.insert(3, 30);
        overflow.insert(4, 40);

        handle.merge_overflow(&mut overflow, None);

        assert_eq!(handle.size(), 3);
        assert_eq!(handle.get(0), Some(&(1, 10)));
        assert_eq!(handle.get(1), Some(&(2, 20)));
        assert_eq!(handle.get(2), Some(&(3, 30)));
        // Capacity reached: 4 stays buffered in overflow.
        assert_eq!(overflow.get(&4), Some(&40));
    }

    #[test]
    fn merge_overflow_upper_bound_excludes_keys_for_a_later_block() {
        let provider = Arc::new(MemoryPager::new());
        let mut handle = filled(&provider, 10, &[1]);

        let mut overflow = Overflow::new();
        overflow.insert(2, 20);
        overflow.insert(50, 500);

        handle.merge_overflow(&mut overflow, Some(&10));

        assert_eq!(handle.size(), 2);
        assert_eq!(handle.get(1), Some(&(2, 20)));
        // 50 is >= the upper bound, so it is left for a later block.
        assert_eq!(overflow.get(&50), Some(&500));
    }

    #[test]
    fn overflow_key_equal_to_block_key_wins_the_tie() {
        let provider = Arc::new(MemoryPager::new());
        let mut handle = filled(&provider, 3, &[5]);

        let mut overflow = Overflow::new();
        overflow.insert(5, 999);

        handle.merge_overflow(&mut overflow, None);

        // Overflow's value for a duplicate key replaces the block's in
        // place -- the stale value is discarded, not bounced back into
        // overflow, so the block ends up with exactly one entry for key 5.
        assert_eq!(handle.size(), 1);
        assert_eq!(handle.get(0), Some(&(5, 999)));
        assert!(overflow.get(&5).is_none());
    }

    #[test]
    fn split_moves_the_upper_half_and_shrinks_the_source() {
        let provider = Arc::new(MemoryPager::new());
        let mut handle = filled(&provider, 10, &[1, 2, 3, 4, 5]);

        let new_handle = handle.split();

        assert_eq!(handle.size(), 3);
        assert_eq!(handle.min_key(), Some(&1));
        assert_eq!(handle.max_key(), Some(&3));

        assert_eq!(new_handle.size(), 2);
        assert_eq!(new_handle.min_key(), Some(&4));
        assert_eq!(new_handle.max_key(), Some(&5));
    }
}
