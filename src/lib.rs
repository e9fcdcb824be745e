//! # storezip
//!
//! A minimal ZIP archive writer. Given an ordered list of named byte
//! payloads, [`build`] produces a complete archive in memory: local file
//! headers, file data, central directory and end of central directory
//! record. Entries are stored uncompressed with a CRC-32 checksum.
//!
//! A small reader ([`ZipExtractor`]) lists and verifies archives, which is
//! what the `storezip list` and `storezip test` commands use.
//!
//! ## Example
//!
//! ```
//! use storezip::{Entry, build, crc32};
//!
//! let archive = build(&[
//!     Entry::new("hello.txt", "hello"),
//!     Entry::new("docs/readme.md", "# readme\n"),
//! ])?;
//!
//! assert_eq!(&archive[..4], b"PK\x03\x04");
//! assert_eq!(crc32(b"hello"), 0x3610_A686);
//! # Ok::<(), storezip::ArchiveError>(())
//! ```

pub mod checksum;
pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use checksum::{Crc32, crc32};
pub use cli::Cli;
pub use error::{ArchiveError, FieldError};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use zip::{
    ArchiveLayout, Entry, EntryCheck, EntryLayout, ZipExtractor, ZipFileEntry, ZipParser, build,
    build_from_parts, write_le,
};
