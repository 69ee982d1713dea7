// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Variable-byte delta codec for ascending document-id streams.
//!
//! This is deliberately **not** LEB128. The continuation bit marks bytes
//! that *extend* an integer begun by an earlier byte in the same group --
//! it does not mark "more bytes follow before a terminator". Concretely:
//! the first byte of an integer always has its high bit clear; every byte
//! after it has the high bit set, including the last one. A decoder finds
//! the end of an integer by looking ahead for the next byte with the high
//! bit clear (which is the first byte of the following integer) or for the
//! end of the declared region. Preserve this exact convention -- an
//! encoder or decoder written to the usual LEB128 termination rule will
//! desynchronize against this format.

use crate::error::{Error, Result};

/// Appends the variable-byte encoding of `v` to `out`.
///
/// `v == 0` encodes to the single byte `0x00`; this falls out of the
/// general loop below without a special case, since the first byte's low
/// 7 bits of zero are already `0` and no extension bytes follow.
pub fn encode_delta(mut v: u64, out: &mut Vec<u8>) {
    out.push((v & 0x7f) as u8);
    v >>= 7;
    while v != 0 {
        out.push(((v & 0x7f) | 0x80) as u8);
        v >>= 7;
    }
}

/// Decodes one integer starting at `bytes[offset]`, never reading at or
/// past `limit`. Returns the decoded value and the number of bytes it
/// occupied.
///
/// # Errors
///
/// Returns [`Error::Corrupt`] if `offset >= limit`, i.e. the declared
/// region is exhausted before an integer could be read.
pub fn decode_delta(bytes: &[u8], offset: usize, limit: usize) -> Result<(u64, usize)> {
    if offset >= limit || offset >= bytes.len() {
        return Err(Error::Corrupt("varint: truncated stream"));
    }

    let mut len = 1;
    while offset + len < limit && bytes[offset + len] & 0x80 != 0 {
        len += 1;
    }

    let mut v: u64 = 0;
    for (i, &byte) in bytes[offset..offset + len].iter().enumerate() {
        v |= u64::from(byte & 0x7f) << (7 * i);
    }

    Ok((v, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn zero_is_a_single_byte() {
        let mut out = Vec::new();
        encode_delta(0, &mut out);
        assert_eq!(out, vec![0x00]);
    }

    #[test_log::test]
    fn round_trips_small_and_large_deltas() {
        for v in [0u64, 1, 127, 128, 130, 130 + 16383, 130 + 16383 + 1, u64::MAX] {
            let mut out = Vec::new();
            encode_delta(v, &mut out);
            let (decoded, byte_count) = decode_delta(&out, 0, out.len()).expect("valid stream");
            assert_eq!(decoded, v);
            assert_eq!(byte_count, out.len());
        }
    }

    #[test_log::test]
    fn concatenated_stream_decodes_in_sequence() {
        let deltas = [1u64, 130, 130 + 16383, 130 + 16383 + 1];
        let mut buf = Vec::new();
        for &d in &deltas {
            encode_delta(d, &mut buf);
        }

        let mut offset = 0;
        let mut last = 0u64;
        let mut doc_ids = Vec::new();
        while offset < buf.len() {
            let (delta, count) = decode_delta(&buf, offset, buf.len()).expect("valid stream");
            last += delta;
            doc_ids.push(last);
            offset += count;
        }

        let mut running = 0u64;
        let expected: Vec<u64> = deltas
            .iter()
            .map(|&d| {
                running += d;
                running
            })
            .collect();
        assert_eq!(doc_ids, expected);
    }

    #[test_log::test]
    fn truncated_region_is_corrupt() {
        let mut out = Vec::new();
        encode_delta(130, &mut out);
        assert!(decode_delta(&out, 0, 1).is_err());
    }
}
