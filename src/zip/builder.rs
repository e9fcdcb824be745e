//! In-memory ZIP archive writer.
//!
//! Archives are built in two passes over the entries:
//!
//! 1. An accounting pass ([`ArchiveLayout::plan`]) computes every CRC-32,
//!    size and offset and checks each against the width of the field it is
//!    stored in. There is no ZIP64 fallback, so any overflow is a hard error.
//! 2. A write pass allocates one zeroed buffer of the exact archive length
//!    and writes each record at its precomputed position.
//!
//! The output is laid out as
//!
//! ```text
//! [LFH 0][name 0][payload 0] ... [LFH n][name n][payload n]
//! [CDFH 0][name 0] ... [CDFH n][name n]
//! [EOCD]
//! ```
//!
//! Entries are always stored uncompressed, without extra fields, comments
//! or timestamps.

use tracing::{debug, info};

use super::field::{max_value, write_bytes};
use super::structures::{
    CentralDirectoryHeader, EndOfCentralDirectory, FLAG_UTF8_NAME, LocalFileHeader,
};
use crate::checksum::crc32;
use crate::error::{ArchiveError, Result};

/// A named payload to be stored in an archive.
///
/// The name is written as UTF-8. Names are not checked for uniqueness or
/// path safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    name: String,
    payload: Vec<u8>,
}

impl Entry {
    pub fn new(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Position and header values of one entry inside the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLayout {
    pub lfh_offset: u32,
    pub name_len: u16,
    pub payload_len: u32,
    pub crc32: u32,
    pub flags: u16,
}

impl EntryLayout {
    fn local_header(&self) -> LocalFileHeader {
        LocalFileHeader {
            flags: self.flags,
            crc32: self.crc32,
            size: self.payload_len,
            name_len: self.name_len,
        }
    }

    fn central_header(&self) -> CentralDirectoryHeader {
        CentralDirectoryHeader {
            flags: self.flags,
            crc32: self.crc32,
            size: self.payload_len,
            name_len: self.name_len,
            lfh_offset: self.lfh_offset,
        }
    }

    /// Offset of the first payload byte.
    pub fn data_offset(&self) -> usize {
        self.lfh_offset as usize + LocalFileHeader::SIZE + usize::from(self.name_len)
    }
}

/// Offsets and sizes of a whole archive, computed before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    pub entries: Vec<EntryLayout>,
    pub cd_offset: u32,
    pub cd_size: u32,
    pub total_len: usize,
}

impl ArchiveLayout {
    /// Run the accounting pass over `entries`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::CapacityOverflow`] naming the first entry
    /// whose name length, payload length or position does not fit the
    /// 16/32-bit fields of the format.
    pub fn plan(entries: &[Entry]) -> Result<Self> {
        let mut planner = Planner::default();
        for (index, entry) in entries.iter().enumerate() {
            planner.push(
                index,
                &entry.name,
                entry.payload.len() as u64,
                crc32(&entry.payload),
            )?;
        }
        planner.finish()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Running totals of the accounting pass.
#[derive(Debug, Default)]
struct Planner {
    entries: Vec<EntryLayout>,
    /// Bytes of local headers, names and payloads so far
    data_len: u64,
    /// Bytes of central directory headers and names so far
    cd_size: u64,
}

impl Planner {
    fn push(&mut self, index: usize, name: &str, payload_len: u64, crc32: u32) -> Result<()> {
        let overflow = |field: &'static str, value: u64, max: u64| ArchiveError::CapacityOverflow {
            index,
            name: name.to_string(),
            field,
            value,
            max,
        };

        let count = index as u64 + 1;
        let count_max = max_value(2);
        if count > count_max {
            return Err(overflow("entry count", count, count_max));
        }

        let name_len = u16::try_from(name.len())
            .map_err(|_| overflow("name length", name.len() as u64, max_value(2)))?;
        let payload_len = u32::try_from(payload_len)
            .map_err(|_| overflow("compressed size", payload_len, max_value(4)))?;
        let lfh_offset = u32::try_from(self.data_len)
            .map_err(|_| overflow("local header offset", self.data_len, max_value(4)))?;

        // Whatever follows this entry (the next local header or the central
        // directory) must still be addressable with a 32-bit offset.
        let data_end = self.data_len
            + LocalFileHeader::SIZE as u64
            + u64::from(name_len)
            + u64::from(payload_len);
        if data_end > max_value(4) {
            return Err(overflow("archive offset", data_end, max_value(4)));
        }

        let cd_size = self.cd_size + CentralDirectoryHeader::SIZE as u64 + u64::from(name_len);
        if cd_size > max_value(4) {
            return Err(overflow("central directory size", cd_size, max_value(4)));
        }

        let flags = if name.is_ascii() { 0 } else { FLAG_UTF8_NAME };

        self.entries.push(EntryLayout {
            lfh_offset,
            name_len,
            payload_len,
            crc32,
            flags,
        });
        self.data_len = data_end;
        self.cd_size = cd_size;
        Ok(())
    }

    fn finish(self) -> Result<ArchiveLayout> {
        // Both values were range-checked in push()
        let cd_offset = self.data_len as u32;
        let cd_size = self.cd_size as u32;
        let total_len = self.data_len + self.cd_size + EndOfCentralDirectory::SIZE as u64;

        let total_len = usize::try_from(total_len).map_err(|_| {
            let index = self.entries.len().saturating_sub(1);
            ArchiveError::CapacityOverflow {
                index,
                name: String::new(),
                field: "archive length",
                value: total_len,
                max: usize::MAX as u64,
            }
        })?;

        Ok(ArchiveLayout {
            entries: self.entries,
            cd_offset,
            cd_size,
            total_len,
        })
    }
}

/// Build a complete ZIP archive from `entries`, in order.
///
/// An empty slice produces a valid 22-byte archive holding only the
/// end of central directory record.
///
/// # Errors
///
/// Returns [`ArchiveError::CapacityOverflow`] if any size or offset does not
/// fit its field. No partial archive is ever returned.
///
/// # Example
///
/// ```
/// use storezip::{Entry, build};
///
/// let archive = build(&[Entry::new("hello.txt", "hello")])?;
/// assert_eq!(archive.len(), 121);
/// assert_eq!(&archive[0..4], b"PK\x03\x04");
/// # Ok::<(), storezip::ArchiveError>(())
/// ```
pub fn build(entries: &[Entry]) -> Result<Vec<u8>> {
    info!("Creating zip data containing {} files", entries.len());

    let layout = ArchiveLayout::plan(entries)?;
    let mut out = vec![0u8; layout.total_len];

    // Local headers, names and payloads
    for (entry, slot) in entries.iter().zip(&layout.entries) {
        debug!(
            name = %entry.name,
            size = slot.payload_len,
            crc32 = slot.crc32,
            offset = slot.lfh_offset,
            "adding file"
        );

        let offset = slot.lfh_offset as usize;
        slot.local_header().write(&mut out, offset)?;
        write_bytes(&mut out, offset + LocalFileHeader::SIZE, entry.name.as_bytes())?;
        write_bytes(&mut out, slot.data_offset(), &entry.payload)?;
    }

    // Central directory
    let mut offset = layout.cd_offset as usize;
    for (entry, slot) in entries.iter().zip(&layout.entries) {
        slot.central_header().write(&mut out, offset)?;
        write_bytes(
            &mut out,
            offset + CentralDirectoryHeader::SIZE,
            entry.name.as_bytes(),
        )?;
        offset += CentralDirectoryHeader::SIZE + usize::from(slot.name_len);
    }

    // Entry count was checked against u16 during planning
    let count = layout.entry_count() as u16;
    EndOfCentralDirectory::new(count, layout.cd_size, layout.cd_offset).write(&mut out, offset)?;

    debug!(
        bytes = out.len(),
        cd_offset = layout.cd_offset,
        cd_size = layout.cd_size,
        "archive complete"
    );

    Ok(out)
}

/// Build an archive from parallel lists of raw names and payloads.
///
/// # Errors
///
/// - [`ArchiveError::CountMismatch`] if the lists differ in length
/// - [`ArchiveError::InvalidName`] if a name is not valid UTF-8
/// - anything [`build`] returns
pub fn build_from_parts<N, P>(names: &[N], payloads: &[P]) -> Result<Vec<u8>>
where
    N: AsRef<[u8]>,
    P: AsRef<[u8]>,
{
    if names.len() != payloads.len() {
        return Err(ArchiveError::CountMismatch {
            names: names.len(),
            payloads: payloads.len(),
        });
    }

    let entries = names
        .iter()
        .zip(payloads)
        .enumerate()
        .map(|(index, (name, payload))| {
            let name = String::from_utf8(name.as_ref().to_vec())
                .map_err(|source| ArchiveError::InvalidName { index, source })?;
            Ok(Entry::new(name, payload.as_ref()))
        })
        .collect::<Result<Vec<_>>>()?;

    build(&entries)
}
