// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Lazy forward iteration over one feature's encoded posting list.

use super::varint::decode_delta;

/// Decodes a single feature's delta-encoded document ids lazily, one at a
/// time, in ascending order.
pub struct PostingIterator<'a> {
    bytes: &'a [u8],
    offset: usize,
    last: u64,
}

impl<'a> PostingIterator<'a> {
    /// Wraps the already-sliced byte range for one feature's posting list
    /// (i.e. `Storage::posting_bytes`'s output, not the whole segment).
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            last: 0,
        }
    }
}

impl Iterator for PostingIterator<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.offset >= self.bytes.len() {
            return None;
        }

        // `byte_count` already bounds this slice to exactly one feature's
        // postings (checked once in `Storage::parse`), so a decode failure
        // here would mean the writer produced an inconsistent segment --
        // trusted input per the format's error model, not a runtime error.
        let (delta, consumed) = decode_delta(self.bytes, self.offset, self.bytes.len())
            .expect("posting list bytes were already bounds-checked by Storage::parse");

        self.last += delta;
        self.offset += consumed;
        Some(self.last)
    }
}
