// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The ISAM index: owns the block list, the directory, the overflow buffer,
//! and the flush/split policy that keeps them consistent.

use super::block::Block;
use super::cursor::{Cursor, CursorMut};
use super::directory::Directory;
use super::handle::BlockHandle;
use super::overflow::Overflow;
use super::pager::{BlockProvider, MemoryPager};
use std::cell::RefCell;
use std::sync::Arc;

/// An ISAM-style ordered key/value index with an in-memory overflow buffer
/// over a paged block store.
///
/// Single-threaded: every mutating operation, and the flush procedure it
/// triggers, assumes exclusive access. Concurrent readers without a writer
/// are not supported either, because even the read-only lookup caches a
/// loaded block handle (see [`Index::get`]).
pub struct Index<K, V, P: BlockProvider<K, V>> {
    provider: Arc<P>,
    block_capacity: usize,
    overflow_capacity: usize,

    /// Block arena. Blocks are never removed (there is no delete
    /// operation), only split, so plain indices double as stable "pointers".
    blocks: Vec<Block<K, V>>,
    head: Option<usize>,
    directory: Directory<K>,
    overflow: Overflow<K, V>,

    /// At most one cached loaded handle, shared by the mutable and const
    /// lookup paths. A `RefCell` because the const path needs to populate
    /// this cache from behind a `&self` receiver.
    loaded: RefCell<Option<(usize, BlockHandle<K, V, P>)>>,

    /// Stable default returned by `get` when the key is absent from both
    /// the blocks and the overflow.
    default_value: V,
}

impl<K, V> Index<K, V, MemoryPager<K, V>>
where
    K: Ord + Clone,
    V: Default,
{
    /// Creates an index backed by the in-memory reference pager.
    #[must_use]
    pub fn new(block_capacity: usize, overflow_capacity: usize) -> Self {
        Self::with_provider(MemoryPager::new(), block_capacity, overflow_capacity)
    }
}

impl<K, V, P> Index<K, V, P>
where
    K: Ord + Clone,
    V: Default,
    P: BlockProvider<K, V>,
{
    /// Creates an index over a caller-supplied [`BlockProvider`].
    #[must_use]
    pub fn with_provider(provider: P, block_capacity: usize, overflow_capacity: usize) -> Self {
        Self {
            provider: Arc::new(provider),
            block_capacity,
            overflow_capacity,
            blocks: Vec::new(),
            head: None,
            directory: Directory::new(),
            overflow: Overflow::new(),
            loaded: RefCell::new(None),
            default_value: V::default(),
        }
    }

    /// Mutable lookup: ensures the overflow is within capacity (triggering a
    /// flush if not), then returns a reference to the value for `key`,
    /// inserting `V::default()` into the overflow if it is absent --
    /// mirroring standard associative-container insertion semantics.
    pub fn get_mut(&mut self, key: &K) -> &mut V {
        self.maybe_flush();

        let target = self
            .directory
            .floor_entry(key)
            .or_else(|| self.directory.first_entry())
            .map(|(_, idx)| idx);

        if let Some(idx) = target {
            self.load_cached_mut(idx);
            let cache = self.loaded.get_mut();
            let (_, handle) = cache.as_mut().expect("just loaded");
            if let Some(pos) = handle.find(key) {
                return &mut handle.get_mut(pos).expect("position just found is valid").1;
            }
        }

        self.overflow.get_or_default_mut(key.clone())
    }

    /// Inserts or overwrites `key`'s value.
    pub fn insert(&mut self, key: K, value: V) {
        *self.get_mut(&key) = value;
    }

    /// Const lookup: locates `key` without flushing or otherwise mutating
    /// structure, caching the loaded block handle across calls for the
    /// benefit of the next lookup.
    ///
    /// Returns a clone of the value, or a clone of the stable per-index
    /// default if `key` is absent. Rust's borrow checker does not allow a
    /// `&self` method to hand back a live reference into state reached
    /// through interior mutability (the cache) -- unlike the C++ original,
    /// where `operator[] const` returns `const V&`. Cloning out is the
    /// idiomatic way to keep the caching behavior without `unsafe`; see
    /// `DESIGN.md` for the full discussion.
    pub fn get(&self, key: &K) -> V
    where
        V: Clone,
    {
        if let Some((_, idx)) = self
            .directory
            .floor_entry(key)
            .or_else(|| self.directory.first_entry())
        {
            self.load_cached(idx);
            let cache = self.loaded.borrow();
            let (_, handle) = cache.as_ref().expect("just loaded");
            if let Some(pos) = handle.find(key) {
                return handle.get(pos).expect("position just found is valid").1.clone();
            }
        }

        if let Some(v) = self.overflow.get(key) {
            return v.clone();
        }

        self.default_value.clone()
    }

    /// Forward cursor over ascending `(K, V)` pairs, merging the block list
    /// with the overflow. Does not flush.
    ///
    /// Releases any handle cached by a prior `get`/`get_mut`/`insert` first:
    /// the cursor acquires the head block itself, and a provider is free to
    /// assume a block is never checked out twice at once.
    pub fn iter(&self) -> Cursor<'_, K, V, P> {
        *self.loaded.borrow_mut() = None;
        Cursor::new(self)
    }

    /// Mutable forward cursor. Does not flush. Borrows `self` for its
    /// entire lifetime, which is what keeps "cursors are invalidated by
    /// mutation" from needing a runtime check: the borrow checker simply
    /// will not let you mutate the index while a cursor is alive.
    pub fn iter_mut(&mut self) -> CursorMut<'_, K, V, P> {
        *self.loaded.get_mut() = None;
        CursorMut::new(self)
    }

    pub(super) fn head(&self) -> Option<usize> {
        self.head
    }

    pub(super) fn block(&self, idx: usize) -> &Block<K, V> {
        self.blocks.get(idx).expect("arena index out of range")
    }

    pub(super) fn overflow(&self) -> &Overflow<K, V> {
        &self.overflow
    }

    pub(super) fn overflow_mut(&mut self) -> &mut Overflow<K, V> {
        &mut self.overflow
    }

    pub(super) fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    fn load_cached(&self, idx: usize) {
        let mut cache = self.loaded.borrow_mut();
        let already_loaded = matches!(&*cache, Some((i, _)) if *i == idx);
        if !already_loaded {
            // Dropping the old entry (if any) stores it before the new one
            // is acquired -- "if the assignee already held a different
            // block, that block is stored before reassigning."
            *cache = None;
            let block = &self.blocks[idx];
            *cache = Some((
                idx,
                BlockHandle::acquire(Arc::clone(&self.provider), block.id, block.capacity),
            ));
        }
    }

    fn load_cached_mut(&mut self, idx: usize) {
        let cache = self.loaded.get_mut();
        let already_loaded = matches!(cache, Some((i, _)) if *i == idx);
        if !already_loaded {
            *cache = None;
            let block = &self.blocks[idx];
            *cache = Some((
                idx,
                BlockHandle::acquire(Arc::clone(&self.provider), block.id, block.capacity),
            ));
        }
    }

    fn acquire(&self, idx: usize) -> BlockHandle<K, V, P> {
        let block = &self.blocks[idx];
        BlockHandle::acquire(Arc::clone(&self.provider), block.id, block.capacity)
    }

    fn push_empty_block(&mut self) -> usize {
        let handle = BlockHandle::create(Arc::clone(&self.provider), self.block_capacity);
        let id = handle.id();
        drop(handle);
        let idx = self.blocks.len();
        self.blocks.push(Block::new(id, self.block_capacity));
        idx
    }

    fn maybe_flush(&mut self) {
        if self.overflow.len() >= self.overflow_capacity {
            self.flush();
        }
    }

    /// Drains the overflow into the block list, splitting and appending
    /// blocks as the fill-factor policy demands. See `SPEC_FULL.md`/`spec.md`
    /// §4.2 for the step numbering referenced in the comments below.
    fn flush(&mut self) {
        // Precondition: release any cached handle before the loop begins.
        *self.loaded.get_mut() = None;

        while !self.overflow.is_empty() {
            let k = self
                .overflow
                .peek_min_key()
                .expect("loop condition checked non-empty")
                .clone();

            log::trace!("isam: flushing key into block list");

            // Step 1: locate the target block, creating the very first one
            // if the directory is still empty.
            let (mut current_key, mut idx) = match self
                .directory
                .floor_entry(&k)
                .or_else(|| self.directory.first_entry())
            {
                Some(pair) => pair,
                None => {
                    let idx = self.push_empty_block();
                    self.head = Some(idx);
                    self.directory.insert(k.clone(), idx);
                    (k.clone(), idx)
                }
            };

            // Step 2: consider splitting the target block before merging.
            if self.block_capacity >= 2 {
                let threshold = (3 * self.block_capacity).div_ceil(4);
                let mut h = self.acquire(idx);
                let should_split =
                    h.size() >= threshold && h.max_key().is_none_or(|mx| !(*mx < k));

                if should_split {
                    log::trace!("isam: splitting block under fill-factor policy");
                    let new_handle = h.split();
                    drop(h);

                    let new_min = new_handle.min_key().expect("split half is non-empty").clone();
                    let new_id = new_handle.id();
                    drop(new_handle);

                    let new_idx = self.blocks.len();
                    let mut new_block = Block::new(new_id, self.block_capacity);
                    new_block.next = self.blocks[idx].next;
                    self.blocks.push(new_block);
                    self.blocks[idx].next = Some(new_idx);
                    self.directory.insert(new_min, new_idx);

                    let (ck, ix) = self
                        .directory
                        .floor_entry(&k)
                        .or_else(|| self.directory.first_entry())
                        .expect("a block exists after split");
                    current_key = ck;
                    idx = ix;
                }
            }

            // Step 3: the located block may already be full and entirely
            // below `k` -- not just when it is the last block in the list
            // (the degenerate `block_capacity < 2` case can never split, so
            // a full block anywhere in the middle of the list is just as
            // stuck as a full tail), but whenever `k` belongs strictly past
            // its range. Splice a fresh block in immediately after it,
            // linking it ahead of whatever used to be its successor, and
            // make that the new target. Mirrors the forward block-map walk
            // `examples/original_source/03-ISAM/isam.hpp`'s
            // `check_flush_overflow` performs instead of a single
            // floor-relocate, generalized here to however many stuck blocks
            // separate the floor block from where `k` actually belongs.
            let stuck = {
                let h = self.acquire(idx);
                h.size() >= self.block_capacity && h.max_key().is_some_and(|mx| *mx < k)
            };

            if stuck {
                log::trace!("isam: splicing a block to absorb a key past the current block's range");
                let new_idx = self.push_empty_block();
                self.blocks[new_idx].next = self.blocks[idx].next;
                self.blocks[idx].next = Some(new_idx);
                self.directory.insert(k.clone(), new_idx);

                let (ck, ix) = self
                    .directory
                    .floor_entry(&k)
                    .or_else(|| self.directory.first_entry())
                    .expect("a block exists after splice");
                current_key = ck;
                idx = ix;
            }

            // Step 4: the upper bound is the min-key of the directory entry
            // immediately following the target's current registration.
            let upper_bound = self.directory.successor_key_of(&current_key).cloned();

            // Step 5: merge and re-register under the (possibly new) min-key.
            let mut handle = self.acquire(idx);
            let old_min = handle.min_key().cloned();
            handle.merge_overflow(&mut self.overflow, upper_bound.as_ref());
            let new_min = handle.min_key().expect("non-empty after merge").clone();
            drop(handle);

            if old_min.as_ref() != Some(&new_min) {
                self.directory.remove(old_min.as_ref().unwrap_or(&current_key));
                self.directory.insert(new_min, idx);
            }
        }
    }
}

impl<K, V, P: BlockProvider<K, V>> Drop for Index<K, V, P> {
    fn drop(&mut self) {
        // Release the cached handle first so its store-on-drop runs before
        // we free the underlying storage.
        *self.loaded.get_mut() = None;

        for block in &self.blocks {
            self.provider.free_block(block.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    /// `spec.md` §8: "ISAM flush idempotence: two consecutive flushes
    /// produce the same state as one."
    #[test]
    fn flush_is_idempotent() {
        let mut index = Index::<i32, i32, _>::new(2, 2);
        for i in 0..40 {
            index.insert(i, i);
        }

        index.flush();
        let before: Vec<_> = index.iter().collect();
        index.flush();
        let after: Vec<_> = index.iter().collect();

        assert_eq!(before, after);
        assert!(index.overflow.is_empty());
    }

    /// `spec.md` §8: "ISAM capacity respect: after flush returns, no block
    /// exceeds `block_capacity` and overflow is empty."
    #[test]
    fn flush_respects_block_capacity() {
        let mut index = Index::<i32, i32, _>::new(3, 3);
        for i in 0..500 {
            index.insert(i, i);
        }
        index.flush();

        assert!(index.overflow.is_empty());

        let mut idx = index.head;
        while let Some(i) = idx {
            let handle = index.acquire(i);
            assert!(handle.size() <= index.block_capacity);
            idx = index.blocks[i].next;
        }
    }

    /// `spec.md` §8: "ISAM block invariant: after any public call returns,
    /// every block's internal keys are strictly ascending and
    /// `max_key(b_i) < min_key(b_{i+1})`."
    #[test]
    fn blocks_stay_strictly_ascending_across_splits() {
        let mut index = Index::<i32, i32, _>::new(2, 2);
        for i in 0..200 {
            index.insert(i, i * i);
        }
        index.flush();

        let mut idx = index.head;
        let mut prev_max: Option<i32> = None;
        while let Some(i) = idx {
            let handle = index.acquire(i);
            let keys: Vec<i32> = (0..handle.size())
                .map(|p| handle.get(p).expect("within size").0)
                .collect();
            for w in keys.windows(2) {
                assert!(w[0] < w[1], "keys within a block must be strictly ascending");
            }
            if let (Some(prev), Some(&min)) = (prev_max, keys.first()) {
                assert!(prev < min, "max_key(b_i) < min_key(b_{{i+1}})");
            }
            prev_max = keys.last().copied();
            idx = index.blocks[i].next;
        }
    }

    #[test]
    fn degenerate_block_capacity_of_one_acts_as_a_plain_linked_list() {
        let mut index = Index::<i32, String, _>::new(1, 2);
        for k in [5, 2, 4, 1, 3] {
            index.insert(k, k.to_string());
        }

        let keys: Vec<i32> = index.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn get_mut_on_new_key_inserts_default_into_overflow() {
        let mut index = Index::<i32, Vec<i32>, _>::new(4, 4);
        index.get_mut(&1).push(10);
        assert_eq!(index.get(&1), vec![10]);
    }
}
