use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use anyhow::{Result, bail};

use super::field::{write_u16, write_u32};
use crate::error::FieldError;

/// Version needed to extract: 2.0
pub const VERSION_NEEDED: u16 = 20;

/// General purpose flag bit 11: file name is encoded as UTF-8
pub const FLAG_UTF8_NAME: u16 = 1 << 11;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Local File Header (LFH) - 30 bytes, followed by the name and the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub flags: u16,
    pub crc32: u32,
    /// Payload length; compressed and uncompressed sizes are equal for stored entries
    pub size: u32,
    pub name_len: u16,
}

impl LocalFileHeader {
    pub const SIGNATURE: u32 = 0x0403_4b50;
    pub const SIZE: usize = 30;

    /// Write the fixed part of the header at `offset`. Unlisted fields
    /// (method, time, date, extra length) stay zero.
    pub fn write(&self, buf: &mut [u8], offset: usize) -> Result<(), FieldError> {
        write_u32(buf, offset, Self::SIGNATURE)?;
        write_u16(buf, offset + 4, VERSION_NEEDED)?;
        write_u16(buf, offset + 6, self.flags)?;
        write_u32(buf, offset + 14, self.crc32)?;
        write_u32(buf, offset + 18, self.size)?;
        write_u32(buf, offset + 22, self.size)?;
        write_u16(buf, offset + 26, self.name_len)?;
        Ok(())
    }
}

/// Central Directory File Header (CDFH) - 46 bytes, followed by the name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    pub flags: u16,
    pub crc32: u32,
    pub size: u32,
    pub name_len: u16,
    /// Offset of the entry's local file header from the start of the archive
    pub lfh_offset: u32,
}

impl CentralDirectoryHeader {
    pub const SIGNATURE: u32 = 0x0201_4b50;
    pub const SIZE: usize = 46;

    /// Write the fixed part of the header at `offset`. Version made by,
    /// method, time, date, extra/comment lengths, disk number and
    /// attributes stay zero.
    pub fn write(&self, buf: &mut [u8], offset: usize) -> Result<(), FieldError> {
        write_u32(buf, offset, Self::SIGNATURE)?;
        write_u16(buf, offset + 6, VERSION_NEEDED)?;
        write_u16(buf, offset + 8, self.flags)?;
        write_u32(buf, offset + 16, self.crc32)?;
        write_u32(buf, offset + 20, self.size)?;
        write_u32(buf, offset + 24, self.size)?;
        write_u16(buf, offset + 28, self.name_len)?;
        write_u32(buf, offset + 42, self.lfh_offset)?;
        Ok(())
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x0605_4b50;
    pub const SIZE: usize = 22;

    /// Single-disk record without a comment.
    pub fn new(entries: u16, cd_size: u32, cd_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size,
            cd_offset,
            comment_len: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Invalid End of Central Directory");
        }

        let mut cursor = Cursor::new(data);
        if cursor.read_u32::<LittleEndian>()? != Self::SIGNATURE {
            bail!("Invalid End of Central Directory");
        }

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn write(&self, buf: &mut [u8], offset: usize) -> Result<(), FieldError> {
        write_u32(buf, offset, Self::SIGNATURE)?;
        write_u16(buf, offset + 4, self.disk_number)?;
        write_u16(buf, offset + 6, self.disk_with_cd)?;
        write_u16(buf, offset + 8, self.disk_entries)?;
        write_u16(buf, offset + 10, self.total_entries)?;
        write_u32(buf, offset + 12, self.cd_size)?;
        write_u32(buf, offset + 16, self.cd_offset)?;
        write_u16(buf, offset + 20, self.comment_len)?;
        Ok(())
    }

    /// Whether any field holds its maximum value.
    ///
    /// ZIP64 writers put these sentinels in the EOCD and the real numbers in
    /// a ZIP64 record, but a plain archive can hold exactly these values too
    /// (65 535 entries, a central directory starting at offset 0xFFFFFFFF). Only a
    /// [`Zip64Locator`] in front of the EOCD tells the two apart.
    pub fn has_max_values(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFF_FFFF
            || self.cd_offset == 0xFFFF_FFFF
    }

    pub fn is_multi_disk(&self) -> bool {
        self.disk_number != 0 || self.disk_with_cd != 0 || self.disk_entries != self.total_entries
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes, directly before the EOCD
pub struct Zip64Locator;

impl Zip64Locator {
    pub const SIGNATURE: u32 = 0x0706_4b50;
    pub const SIZE: usize = 20;

    /// Check whether `data` starts with a locator signature.
    pub fn is_present(data: &[u8]) -> bool {
        data.len() >= Self::SIZE && data[..4] == Self::SIGNATURE.to_le_bytes()
    }
}

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub flags: u16,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl ZipFileEntry {
    pub fn has_utf8_name(&self) -> bool {
        self.flags & FLAG_UTF8_NAME != 0
    }

    /// Parse modification date to (year, month, day)
    ///
    /// Returns `None` when the field is zero, as in archives written without
    /// timestamps.
    pub fn mod_date(&self) -> Option<(u16, u8, u8)> {
        if self.last_mod_date == 0 {
            return None;
        }
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        Some((year, month, day))
    }
}
