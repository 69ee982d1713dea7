// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The pager boundary the ISAM index is built on top of.
//!
//! `BlockProvider` is the external `block_provider` collaborator: the index
//! never interprets where a block's bytes actually live (memory, file, mmap).
//! All four operations are synchronous and, by contract, infallible at this
//! layer -- a real disk-backed implementation may still surface I/O errors,
//! but recovering from them is outside the scope of the index itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Opaque identifier for a block, handed out by a [`BlockProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u64);

/// A pluggable paged block store.
///
/// Implementations own the actual storage medium. The index only ever calls
/// these four operations and never peeks at how a block is persisted.
pub trait BlockProvider<K, V> {
    /// Reserves storage for a block able to hold at least `capacity` entries
    /// and returns its id.
    fn create_block(&self, capacity: usize) -> BlockId;

    /// Loads a block's current contents, taking ownership of them.
    ///
    /// Callers must return the buffer via [`store_block`](Self::store_block)
    /// before loading the same id again -- the index enforces "at most one
    /// handle per block" through [`super::handle::BlockHandle`]'s scoped
    /// acquisition, never by calling this twice concurrently.
    fn load_block(&self, id: BlockId) -> Vec<(K, V)>;

    /// Persists a block's contents. May be called multiple times per id.
    fn store_block(&self, id: BlockId, buffer: Vec<(K, V)>);

    /// Releases a block's storage. Further operations on `id` are undefined.
    fn free_block(&self, id: BlockId);
}

/// An in-memory [`BlockProvider`], used by tests and as a runnable reference
/// implementation -- the crate ships no disk-backed pager of its own, per
/// the out-of-scope boundary around `block_provider`.
#[derive(Default)]
pub struct MemoryPager<K, V> {
    next_id: AtomicU64,
    blocks: Mutex<HashMap<BlockId, Vec<(K, V)>>>,
}

impl<K, V> MemoryPager<K, V> {
    /// Creates an empty in-memory pager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            blocks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> BlockProvider<K, V> for MemoryPager<K, V> {
    fn create_block(&self, _capacity: usize) -> BlockId {
        let id = BlockId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.blocks
            .lock()
            .expect("pager lock poisoned")
            .insert(id, Vec::new());
        id
    }

    fn load_block(&self, id: BlockId) -> Vec<(K, V)> {
        self.blocks
            .lock()
            .expect("pager lock poisoned")
            .remove(&id)
            .expect("load_block called on a block that is already checked out or unknown")
    }

    fn store_block(&self, id: BlockId, buffer: Vec<(K, V)>) {
        self.blocks
            .lock()
            .expect("pager lock poisoned")
            .insert(id, buffer);
    }

    fn free_block(&self, id: BlockId) {
        self.blocks.lock().expect("pager lock poisoned").remove(&id);
    }
}
