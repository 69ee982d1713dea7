// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Forward traversal that merges the block list with the overflow buffer in
//! ascending key order.
//!
//! The standard [`Iterator`] trait only models "streaming" iteration when
//! `Item` owns its data -- it cannot yield a borrow tied to the iterator's
//! own internal state across calls to `next`. [`Cursor`] sidesteps this by
//! yielding owned clones, the same choice the teacher crate's
//! `Memtable::iter` makes. [`CursorMut`] cannot do that (there is no sense in
//! which a mutable reference can be cloned), so it is a hand-written
//! "lending iterator" with an inherent `next` method instead of an
//! `Iterator` impl.

use super::handle::BlockHandle;
use super::index::Index;
use super::pager::BlockProvider;

enum Source {
    Blocks,
    Overflow,
}

/// Ascending `(K, V)` iterator merging the block list and the overflow
/// buffer. Yields owned clones; does not flush or otherwise mutate the index.
pub struct Cursor<'a, K, V, P: BlockProvider<K, V>> {
    index: &'a Index<K, V, P>,
    block_idx: Option<usize>,
    block_pos: usize,
    block_handle: Option<BlockHandle<K, V, P>>,
    overflow_iter: std::collections::btree_map::Iter<'a, K, V>,
    overflow_peek: Option<(&'a K, &'a V)>,
}

impl<'a, K, V, P> Cursor<'a, K, V, P>
where
    K: Ord + Clone,
    V: Default + Clone,
    P: BlockProvider<K, V>,
{
    pub(super) fn new(index: &'a Index<K, V, P>) -> Self {
        let block_idx = index.head();
        let block_handle = block_idx.map(|idx| {
            let block = index.block(idx);
            BlockHandle::acquire(std::sync::Arc::clone(index.provider()), block.id, block.capacity)
        });
        let mut overflow_iter = index.overflow().iter();
        let overflow_peek = overflow_iter.next();

        Self {
            index,
            block_idx,
            block_pos: 0,
            block_handle,
            overflow_iter,
            overflow_peek,
        }
    }

    fn advance_block(&mut self) {
        self.block_pos += 1;
        if let Some(handle) = &self.block_handle {
            if self.block_pos >= handle.size() {
                let idx = self.block_idx.expect("handle implies block_idx");
                let next = self.index.block(idx).next;
                self.block_idx = next;
                self.block_pos = 0;
                self.block_handle = next.map(|idx| {
                    let block = self.index.block(idx);
                    BlockHandle::acquire(
                        std::sync::Arc::clone(self.index.provider()),
                        block.id,
                        block.capacity,
                    )
                });
            }
        }
    }
}

impl<'a, K, V, P> Iterator for Cursor<'a, K, V, P>
where
    K: Ord + Clone,
    V: Default + Clone,
    P: BlockProvider<K, V>,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let block_entry = self
            .block_handle
            .as_ref()
            .and_then(|h| h.get(self.block_pos));

        let source = match (block_entry, self.overflow_peek) {
            (Some(_), None) => Source::Blocks,
            (None, Some(_)) => Source::Overflow,
            (Some((bk, _)), Some((ok, _))) => {
                if bk <= ok {
                    Source::Blocks
                } else {
                    Source::Overflow
                }
            }
            (None, None) => return None,
        };

        match source {
            Source::Blocks => {
                let (k, v) = block_entry.expect("matched Source::Blocks").clone();
                self.advance_block();
                Some((k, v))
            }
            Source::Overflow => {
                let (k, v) = self.overflow_peek.take().expect("matched Source::Overflow");
                self.overflow_peek = self.overflow_iter.next();
                Some((k.clone(), v.clone()))
            }
        }
    }
}

/// Mutable ascending traversal. Not an [`Iterator`]: `next` borrows from
/// `self` with a lifetime tied to the call, which the trait cannot express.
pub struct CursorMut<'a, K, V, P: BlockProvider<K, V>> {
    index: &'a mut Index<K, V, P>,
    block_idx: Option<usize>,
    block_pos: usize,
    block_handle: Option<BlockHandle<K, V, P>>,
    in_overflow: bool,
    last_overflow_key: Option<K>,
}

impl<'a, K, V, P> CursorMut<'a, K, V, P>
where
    K: Ord + Clone,
    V: Default,
    P: BlockProvider<K, V>,
{
    pub(super) fn new(index: &'a mut Index<K, V, P>) -> Self {
        let block_idx = index.head();
        let block_handle = block_idx.map(|idx| {
            let block = index.block(idx);
            BlockHandle::acquire(std::sync::Arc::clone(index.provider()), block.id, block.capacity)
        });

        Self {
            index,
            block_idx,
            block_pos: 0,
            block_handle,
            in_overflow: false,
            last_overflow_key: None,
        }
    }

    /// Advances the cursor and returns the next `(&K, &mut V)` pair, if any.
    ///
    /// The returned borrow's lifetime is tied to this call (`&'s mut self`),
    /// not to `'a`: this is exactly the shape `Iterator::next` cannot express,
    /// since it fixes `Item` once for the whole impl.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<(&K, &mut V)> {
        if !self.in_overflow {
            let has_more_in_block = self
                .block_handle
                .as_ref()
                .is_some_and(|h| self.block_pos < h.size());

            if has_more_in_block {
                let pos = self.block_pos;
                self.block_pos += 1;
                let handle = self.block_handle.as_mut().expect("checked above");
                let (k, v) = handle.get_mut(pos).expect("pos < size");
                return Some((k, v));
            }

            if self.block_handle.is_some() {
                // Current block exhausted: advance to the next block, or
                // fall into the overflow phase if there is none.
                let idx = self.block_idx.expect("handle implies block_idx");
                let next = self.index.block(idx).next;
                self.block_idx = next;
                self.block_pos = 0;
                self.block_handle = next.map(|idx| {
                    let block = self.index.block(idx);
                    BlockHandle::acquire(
                        std::sync::Arc::clone(self.index.provider()),
                        block.id,
                        block.capacity,
                    )
                });
                if next.is_some() {
                    return self.next();
                }
            }
            self.in_overflow = true;
        }

        let (k, v) = self
            .index
            .overflow_mut()
            .next_after_mut(self.last_overflow_key.as_ref())?;
        self.last_overflow_key = Some(k.clone());
        Some((k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::super::index::Index;
    use test_log::test;

    /// Before a flush, the cursor merges the block list with whatever is
    /// still buffered in the overflow -- `spec.md` §4.3.
    #[test]
    fn merges_block_list_with_unflushed_overflow() {
        let mut index = Index::<i32, i32, _>::new(100, 100);
        for k in [10, 20, 30] {
            index.insert(k, k);
        }
        // overflow_capacity is large enough that nothing has flushed yet:
        // every key here still lives in the overflow only.
        let keys: Vec<i32> = index.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![10, 20, 30]);
    }

    #[test]
    fn iter_mut_allows_in_place_updates_in_ascending_order() {
        let mut index = Index::<i32, i32, _>::new(2, 2);
        for k in 0..50 {
            index.insert(k, k);
        }

        {
            let mut cursor = index.iter_mut();
            let mut seen = Vec::new();
            while let Some((k, v)) = cursor.next() {
                seen.push(*k);
                *v *= 2;
            }
            assert_eq!(seen, (0..50).collect::<Vec<_>>());
        }

        let values: Vec<i32> = index.iter().map(|(_, v)| v).collect();
        assert_eq!(values, (0..50).map(|v| v * 2).collect::<Vec<_>>());
    }
}
