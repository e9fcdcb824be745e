//! Error types for archive construction.

use std::string::FromUtf8Error;

use thiserror::Error;

/// Result type for archive construction
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Failure of a single fixed-width field write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The value needs more bytes than the field has
    #[error("value {value} does not fit in a {width}-byte field")]
    ValueTooLarge { value: u64, width: usize },

    /// The write would run past the end of the buffer
    #[error("buffer of length {len} has no room for a {width}-byte write at offset {offset}")]
    OutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },

    /// Only widths of 1 to 8 bytes can be written
    #[error("unsupported field width: {0}")]
    UnsupportedWidth(usize),
}

/// Archive construction errors.
///
/// Every variant is reported before any output is produced; a failed
/// build never hands back a partial archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Names and payloads were supplied as lists of different lengths
    #[error("number of names ({names}) and payloads ({payloads}) must match")]
    CountMismatch { names: usize, payloads: usize },

    /// A name could not be decoded as UTF-8
    #[error("entry {index}: name is not valid UTF-8")]
    InvalidName {
        index: usize,
        #[source]
        source: FromUtf8Error,
    },

    /// A size or offset is too large for its field (there is no ZIP64 fallback)
    #[error("entry {index} ({name:?}): {field} of {value} exceeds the maximum of {max}")]
    CapacityOverflow {
        index: usize,
        name: String,
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// A record could not be written at its planned position
    #[error("failed to write record: {0}")]
    Field(#[from] FieldError),
}

impl ArchiveError {
    /// Index of the entry the error refers to, if any.
    pub fn entry_index(&self) -> Option<usize> {
        match self {
            ArchiveError::InvalidName { index, .. }
            | ArchiveError::CapacityOverflow { index, .. } => Some(*index),
            ArchiveError::CountMismatch { .. } | ArchiveError::Field(_) => None,
        }
    }
}
