//! ZIP archive writing and reading.
//!
//! ## Architecture
//!
//! - [`structures`]: record layouts (local header, central directory header, EOCD)
//! - [`field`]: checked little-endian writes of fixed-width fields
//! - [`builder`]: the in-memory archive writer
//! - [`parser`] and [`extractor`]: a reader for checking archives
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and file data for each entry
//! 2. Central Directory with metadata for all entries
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Limitations
//!
//! - Entries are always STORED (no compression)
//! - No ZIP64, so every entry and the archive itself must stay below 4 GiB
//! - No encryption, comments, extra fields or multi-disk archives

pub mod builder;
mod extractor;
pub mod field;
mod parser;
mod structures;

pub use builder::{ArchiveLayout, Entry, EntryLayout, build, build_from_parts};
pub use extractor::{EntryCheck, ZipExtractor};
pub use field::write_le;
pub use parser::ZipParser;
pub use structures::*;
