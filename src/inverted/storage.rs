// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The read-only on-disk layout: a fixed-size feature table followed by a
//! concatenated blob of encoded posting lists.

use super::posting::PostingIterator;
use crate::error::{Error, Result};

/// One feature's location within the postings blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureEntry {
    /// The feature this entry describes. Equal to the entry's own index in
    /// the table (`entries[i].feature_id == i`).
    pub feature_id: u64,
    /// Length, in bytes, of the encoded posting list.
    pub byte_count: u64,
    /// Offset, in bytes, from the start of the postings blob.
    pub byte_offset: u64,
}

impl FeatureEntry {
    /// Fixed on-disk size: three little-endian `u64`s.
    pub const ENCODED_LEN: usize = 24;

    pub(crate) fn encode(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&self.feature_id.to_le_bytes());
        out[8..16].copy_from_slice(&self.byte_count.to_le_bytes());
        out[16..24].copy_from_slice(&self.byte_offset.to_le_bytes());
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::ENCODED_LEN {
            return Err(Error::Corrupt("feature entry truncated"));
        }
        Ok(Self {
            feature_id: u64::from_le_bytes(bytes[0..8].try_into().expect("slice is 8 bytes")),
            byte_count: u64::from_le_bytes(bytes[8..16].try_into().expect("slice is 8 bytes")),
            byte_offset: u64::from_le_bytes(bytes[16..24].try_into().expect("slice is 8 bytes")),
        })
    }
}

/// A read-only view over a `{entries, postings_blob}` segment.
///
/// The caller must know `feature_count` externally -- the format has no
/// header or magic number (`spec.md` §6).
pub struct Storage<'a> {
    entries: Vec<FeatureEntry>,
    postings: &'a [u8],
}

impl<'a> Storage<'a> {
    /// Parses `segment` as `feature_count` feature-table entries followed by
    /// a postings blob, validating that every entry's range falls within
    /// the blob.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupt`] if the segment is shorter than the
    /// feature table, or if any entry's `byte_offset + byte_count` runs
    /// past the end of the postings blob.
    pub fn parse(segment: &'a [u8], feature_count: usize) -> Result<Self> {
        let header_len = feature_count * FeatureEntry::ENCODED_LEN;
        if segment.len() < header_len {
            return Err(Error::Corrupt("segment shorter than feature table"));
        }

        let mut entries = Vec::with_capacity(feature_count);
        for i in 0..feature_count {
            let start = i * FeatureEntry::ENCODED_LEN;
            entries.push(FeatureEntry::decode(&segment[start..start + FeatureEntry::ENCODED_LEN])?);
        }

        let postings = &segment[header_len..];
        for entry in &entries {
            let end = (entry.byte_offset as usize)
                .checked_add(entry.byte_count as usize)
                .ok_or(Error::Corrupt("feature entry range overflows"))?;
            if end > postings.len() {
                return Err(Error::Corrupt("feature entry points past postings blob"));
            }
        }

        Ok(Self { entries, postings })
    }

    /// Number of features in the table.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.entries.len()
    }

    /// The table entry for `feature_id`, if it is within range.
    #[must_use]
    pub fn entry(&self, feature_id: u64) -> Option<&FeatureEntry> {
        self.entries.get(feature_id as usize)
    }

    /// The raw encoded bytes of `feature_id`'s posting list.
    #[must_use]
    pub fn posting_bytes(&self, feature_id: u64) -> Option<&'a [u8]> {
        let entry = self.entry(feature_id)?;
        let start = entry.byte_offset as usize;
        let end = start + entry.byte_count as usize;
        Some(&self.postings[start..end])
    }

    /// Convenience wrapper yielding `feature_id`'s document ids directly,
    /// without the caller having to go through [`Storage::posting_bytes`]
    /// and construct a [`PostingIterator`] themselves.
    #[must_use]
    pub fn postings(&self, feature_id: u64) -> Option<PostingIterator<'a>> {
        self.posting_bytes(feature_id).map(PostingIterator::new)
    }
}
