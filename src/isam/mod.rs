// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An ISAM-style ordered index: a directory of sorted, fixed-capacity
//! blocks over a pluggable block store, with an in-memory overflow buffer
//! that absorbs recent writes until a fill-factor policy folds them in.

mod block;
mod cursor;
mod directory;
mod handle;
mod index;
mod overflow;
mod pager;

pub use cursor::{Cursor, CursorMut};
pub use index::Index;
pub use pager::{BlockId, BlockProvider, MemoryPager};
