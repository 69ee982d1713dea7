// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Sequential, single-pass builder for the on-disk segment layout.

use super::storage::FeatureEntry;
use super::varint::encode_delta;

/// Number of pending `FeatureEntry` records buffered before they are
/// flushed into their reserved slots in the table. `spec.md` §4.5 calls
/// this "a small threshold (~20)"; the exact value has no externally
/// observable effect beyond write-amortization.
const PENDING_FLUSH_THRESHOLD: usize = 20;

/// Builds a `{entries, postings_blob}` segment from per-feature, ascending,
/// deduplicated document-id lists, in one sequential pass.
pub struct Writer {
    feature_count: usize,
}

impl Writer {
    /// Creates a writer for a fixed number of features.
    #[must_use]
    pub fn new(feature_count: usize) -> Self {
        Self { feature_count }
    }

    /// Encodes `features[f]` as feature `f`'s posting list, for every `f`.
    ///
    /// # Panics
    ///
    /// Panics if `features.len()` does not equal the `feature_count` this
    /// writer was constructed with, or if a feature's document ids are not
    /// strictly ascending -- both are programming errors at the writer's
    /// boundary (`spec.md` §7 treats a writer overrun the same way).
    #[must_use]
    pub fn build(&self, features: &[Vec<u64>]) -> Vec<u8> {
        assert_eq!(
            features.len(),
            self.feature_count,
            "writer: feature list count does not match feature_count"
        );

        let header_len = self.feature_count * FeatureEntry::ENCODED_LEN;
        let total_doc_ids: usize = features.iter().map(Vec::len).sum();
        let max_size = header_len + std::mem::size_of::<u64>() * total_doc_ids;

        let mut buf = vec![0u8; max_size];
        let mut next_byte_offset = header_len;
        let mut pending = Vec::with_capacity(PENDING_FLUSH_THRESHOLD);

        log::debug!(
            "inverted: writing {} features, {total_doc_ids} total document ids",
            self.feature_count
        );

        for (feature_id, doc_ids) in features.iter().enumerate() {
            let start = next_byte_offset;

            let mut encoded = Vec::new();
            let mut last = 0u64;
            for &doc_id in doc_ids {
                let delta = doc_id
                    .checked_sub(last)
                    .expect("document ids within a feature must be strictly ascending");
                encode_delta(delta, &mut encoded);
                last = doc_id;
            }

            buf[start..start + encoded.len()].copy_from_slice(&encoded);
            let byte_count = encoded.len();
            next_byte_offset += byte_count;

            pending.push(FeatureEntry {
                feature_id: feature_id as u64,
                byte_count: byte_count as u64,
                byte_offset: (start - header_len) as u64,
            });

            if pending.len() >= PENDING_FLUSH_THRESHOLD {
                flush_pending(&mut buf, &mut pending);
            }
        }
        flush_pending(&mut buf, &mut pending);

        buf.truncate(next_byte_offset);
        buf
    }
}

fn flush_pending(buf: &mut [u8], pending: &mut Vec<FeatureEntry>) {
    for entry in pending.drain(..) {
        let start = entry.feature_id as usize * FeatureEntry::ENCODED_LEN;
        entry.encode(&mut buf[start..start + FeatureEntry::ENCODED_LEN]);
    }
}

#[cfg(test)]
mod tests {
    use super::super::storage::Storage;
    use super::*;

    #[test_log::test]
    fn writes_a_segment_readable_by_storage() {
        let features = vec![vec![1u64, 3, 5], vec![3, 5, 7], vec![5, 8]];
        let segment = Writer::new(features.len()).build(&features);

        let storage = Storage::parse(&segment, features.len()).expect("valid segment");
        for (id, expected) in features.iter().enumerate() {
            let actual: Vec<u64> = storage.postings(id as u64).expect("feature exists").collect();
            assert_eq!(&actual, expected);
        }
    }

    #[test_log::test]
    fn truncates_to_the_actual_encoded_size() {
        let features = vec![vec![0u64, 1, 2]];
        let segment = Writer::new(1).build(&features);
        let header_len = FeatureEntry::ENCODED_LEN;
        // Three single-byte deltas (0, 1, 1) for three ascending ids.
        assert_eq!(segment.len(), header_len + 3);
    }

    #[test_log::test]
    fn empty_feature_set() {
        let segment = Writer::new(0).build(&[]);
        assert!(segment.is_empty());
    }

    #[test_log::test]
    #[should_panic(expected = "strictly ascending")]
    fn rejects_non_ascending_ids() {
        Writer::new(1).build(&[vec![5, 3]]);
    }
}
