// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Represents errors that can occur while reading an inverted-index segment.
///
/// The ISAM index is infallible by contract (see `isam::pager::BlockProvider`)
/// and does not use this type; pager faults propagate as whatever error type
/// the pager implementation returns.
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// The segment is structurally invalid: an entry's `byte_offset + byte_count`
    /// runs past the end of the postings blob, or a requested feature id is out
    /// of range.
    Corrupt(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IoError({e})"),
            Self::Corrupt(msg) => write!(f, "CorruptError({msg})"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Corrupt(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Crate-wide result type for the inverted index reader.
pub type Result<T> = std::result::Result<T, Error>;
