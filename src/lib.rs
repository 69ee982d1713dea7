// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Two small, independent storage/indexing primitives written in a systems
//! style.
//!
//! ##### About
//!
//! [`isam`] is an ISAM-style ordered key/value index: a singly linked list
//! of fixed-capacity sorted blocks, addressed through a directory keyed by
//! each block's minimum key, with an in-memory overflow buffer that absorbs
//! recent writes until a fill-factor policy folds them back into the block
//! list. The block store itself is an external collaborator -- the index is
//! generic over a [`isam::BlockProvider`] and never interprets where a
//! block's bytes actually live (memory, file, mmap).
//!
//! [`inverted`] is a write-once inverted index: a fixed-size feature table
//! plus a concatenated blob of variable-byte delta-encoded document-id
//! postings, read through a multi-threaded conjunctive (AND) query engine
//! that reduces a set of posting lists to their intersection via a shared
//! work queue of partial results.
//!
//! The two cores share no state; pick the module you need.
//!
//! # Example usage
//!
//! ```
//! use ordered_store::isam::Index;
//!
//! let mut index = Index::<i32, String, _>::new(2, 2);
//! index.insert(5, "five".to_owned());
//! index.insert(2, "two".to_owned());
//! index.insert(4, "four".to_owned());
//!
//! assert_eq!(index.get(&2), "two".to_owned());
//!
//! let items: Vec<_> = index.iter().collect();
//! assert_eq!(
//!     items,
//!     vec![(2, "two".to_owned()), (4, "four".to_owned()), (5, "five".to_owned())]
//! );
//! ```
//!
//! ```
//! use ordered_store::inverted::{Storage, Writer, intersect};
//!
//! let features = vec![vec![1u64, 3, 5], vec![3, 5, 7], vec![5, 8]];
//! let segment = Writer::new(features.len()).build(&features);
//! let storage = Storage::parse(&segment, features.len())?;
//!
//! assert_eq!(intersect(&storage, &[0, 1, 2]), vec![5]);
//! # Ok::<(), ordered_store::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::module_name_repetitions)]

mod binary_search;
mod error;

/// ISAM-style ordered key/value index. See [`isam::Index`].
pub mod isam;

/// Inverted index with a sorted-posting conjunctive query engine. See
/// [`inverted::Storage`] and [`inverted::intersect`].
pub mod inverted;

pub use error::{Error, Result};
