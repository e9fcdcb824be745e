//! Low-level ZIP archive parser.
//!
//! Reads archives back from any source implementing [`ReadAt`], mainly to
//! check what the builder produced. Only what the builder can emit is
//! understood: single-disk archives without ZIP64 records.
//!
//! ## Parsing Strategy
//!
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. Read the Central Directory to get metadata for all files
//! 3. For extraction, read each file's Local File Header to find its data

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};
use tracing::{debug, trace};

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser.
///
/// This struct handles reading and parsing ZIP structures from
/// a data source. It's generic over the reader type so the same code
/// checks archives on disk and archives still in memory.
///
/// ## Usage
///
/// Typically used through [`ZipExtractor`](super::ZipExtractor)
/// rather than directly.
///
/// ## Example
///
/// ```ignore
/// let parser = ZipParser::new(reader);
/// let entries = parser.list_files().await?;
/// for entry in entries {
///     let offset = parser.get_data_offset(&entry).await?;
///     // Read file data from offset...
/// }
/// ```
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    /// Create a new parser for the given reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - A shared reference to a reader implementing [`ReadAt`]
    ///
    /// # Returns
    ///
    /// A new parser instance ready to read the archive.
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// The EOCD is located at the end of the ZIP file. Archives with a
    /// trailing comment are found by scanning backwards for the signature.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of EOCD in file).
    ///
    /// # Errors
    ///
    /// Returns an error if no valid EOCD can be found, indicating
    /// the data is not a ZIP archive.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;

        // Common case: no comment, EOCD is the last 22 bytes
        if self.size >= eocd_size {
            let offset = self.size - eocd_size;
            let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
            self.reader.read_exact_at(offset, &mut buf).await?;

            if let Ok(eocd) = EndOfCentralDirectory::from_bytes(&buf)
                && eocd.comment_len == 0
            {
                return Ok((eocd, offset));
            }
        }

        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf).await?;

        if buf.len() < EndOfCentralDirectory::SIZE {
            bail!("Not a valid ZIP file");
        }

        let signature = EndOfCentralDirectory::SIGNATURE.to_le_bytes();
        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if buf[i..i + 4] != signature {
                continue;
            }

            // The comment length must account for exactly the remaining bytes
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
            if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                let eocd =
                    EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                trace!(offset = search_start + i as u64, comment_len, "found EOCD behind comment");
                return Ok((eocd, search_start + i as u64));
            }
        }

        bail!("Not a valid ZIP file")
    }

    /// Check whether a ZIP64 EOCD locator sits right before the EOCD.
    ///
    /// # Arguments
    ///
    /// * `eocd_offset` - Offset of the regular EOCD in the file
    ///
    /// # Returns
    ///
    /// `true` if the 20 bytes in front of the EOCD carry the locator signature.
    pub async fn has_zip64_locator(&self, eocd_offset: u64) -> Result<bool> {
        let Some(locator_offset) = eocd_offset.checked_sub(Zip64Locator::SIZE as u64) else {
            return Ok(false);
        };

        let mut buf = vec![0u8; Zip64Locator::SIZE];
        self.reader.read_exact_at(locator_offset, &mut buf).await?;
        Ok(Zip64Locator::is_present(&buf))
    }

    /// List all files in the ZIP archive.
    ///
    /// Reads the EOCD first, then fetches and parses the entire Central
    /// Directory in a single read.
    ///
    /// # Returns
    ///
    /// A vector of [`ZipFileEntry`] structures, one for each entry,
    /// in central directory order.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is invalid, uses ZIP64 records,
    /// spans several disks, or cannot be read.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        // Maximum values are legal on their own; only a locator means ZIP64
        if eocd.has_max_values() && self.has_zip64_locator(eocd_offset).await? {
            bail!("ZIP64 archives are not supported");
        }
        if eocd.is_multi_disk() {
            bail!("Multi-disk archives are not supported");
        }

        let cd_offset = u64::from(eocd.cd_offset);
        let cd_size = u64::from(eocd.cd_size);
        if cd_offset + cd_size > eocd_offset {
            bail!(
                "Central directory ({} bytes at {}) overlaps the EOCD at {}",
                cd_size,
                cd_offset,
                eocd_offset
            );
        }

        debug!(
            entries = eocd.total_entries,
            cd_offset, cd_size, "reading central directory"
        );

        // Read the entire Central Directory at once
        let mut cd_data = vec![0u8; cd_size as usize];
        self.reader.read_exact_at(cd_offset, &mut cd_data).await?;

        let mut entries = Vec::with_capacity(usize::from(eocd.total_entries));
        let mut cursor = Cursor::new(cd_data.as_slice());

        for index in 0..eocd.total_entries {
            let entry = Self::parse_cdfh(&mut cursor)
                .with_context(|| format!("Central directory entry {index}"))?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Parse a Central Directory File Header from a cursor.
    ///
    /// # Arguments
    ///
    /// * `cursor` - A cursor positioned at the start of a CDFH
    ///
    /// # Errors
    ///
    /// Returns an error if the signature is wrong or the header is truncated.
    fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
        if cursor.read_u32::<LittleEndian>()? != CentralDirectoryHeader::SIGNATURE {
            bail!("Invalid Central Directory File Header");
        }

        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let lfh_offset = cursor.read_u32::<LittleEndian>()?;

        let mut file_name_bytes = vec![0u8; usize::from(file_name_length)];
        cursor.read_exact(&mut file_name_bytes)?;
        // Lossy so that names written by other tools in legacy code pages still list
        let file_name = String::from_utf8_lossy(&file_name_bytes).into_owned();

        // Extra fields and comments are skipped
        let skip = u64::from(extra_field_length) + u64::from(file_comment_length);
        let next = cursor.position() + skip;
        if next > cursor.get_ref().len() as u64 {
            bail!("Central directory entry {file_name:?} is truncated");
        }
        cursor.set_position(next);

        Ok(ZipFileEntry {
            is_directory: file_name.ends_with('/'),
            file_name,
            compression_method: CompressionMethod::from_u16(compression_method),
            flags,
            compressed_size: u64::from(compressed_size),
            uncompressed_size: u64::from(uncompressed_size),
            crc32,
            lfh_offset: u64::from(lfh_offset),
            last_mod_date,
        })
    }

    /// Get the actual data offset for a file entry.
    ///
    /// The local header's name and extra field lengths may differ from the
    /// central directory's, so they are read from the local header itself.
    ///
    /// # Arguments
    ///
    /// * `entry` - The file entry from [`list_files()`](Self::list_files)
    ///
    /// # Returns
    ///
    /// The byte offset where the stored file data begins.
    ///
    /// # Errors
    ///
    /// Returns an error if the Local File Header is missing or invalid.
    pub async fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh_buf = vec![0u8; LocalFileHeader::SIZE];
        self.reader
            .read_exact_at(entry.lfh_offset, &mut lfh_buf)
            .await
            .with_context(|| format!("Local File Header of {:?}", entry.file_name))?;

        let mut cursor = Cursor::new(&lfh_buf);
        if cursor.read_u32::<LittleEndian>()? != LocalFileHeader::SIGNATURE {
            bail!("Invalid Local File Header for {:?}", entry.file_name);
        }

        cursor.set_position(26); // Offset to filename length field
        let file_name_length = u64::from(cursor.read_u16::<LittleEndian>()?);
        let extra_field_length = u64::from(cursor.read_u16::<LittleEndian>()?);

        Ok(entry.lfh_offset + LocalFileHeader::SIZE as u64 + file_name_length + extra_field_length)
    }

    /// Get a reference to the underlying reader.
    ///
    /// Useful for reading file data after getting the offset
    /// from [`get_data_offset()`](Self::get_data_offset).
    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use crate::{Entry, build};

    fn parser_for(data: Vec<u8>) -> ZipParser<MemoryReader> {
        ZipParser::new(Arc::new(MemoryReader::new(data)))
    }

    #[tokio::test]
    async fn test_lists_built_archive() {
        let archive = build(&[
            Entry::new("hello.txt", "hello"),
            Entry::new("dir/", Vec::<u8>::new()),
            Entry::new("naïve.txt", "x"),
        ])
        .unwrap();
        let parser = parser_for(archive);

        let entries = parser.list_files().await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, ["hello.txt", "dir/", "naïve.txt"]);

        assert_eq!(entries[0].crc32, 0x3610_A686);
        assert_eq!(entries[0].compressed_size, 5);
        assert_eq!(entries[0].compression_method, CompressionMethod::Stored);
        assert_eq!(entries[0].lfh_offset, 0);
        assert!(entries[1].is_directory);
        assert!(entries[2].has_utf8_name());

        assert_eq!(parser.get_data_offset(&entries[0]).await.unwrap(), 39);
    }

    #[tokio::test]
    async fn test_empty_archive() {
        let parser = parser_for(build(&[]).unwrap());
        let (eocd, offset) = parser.find_eocd().await.unwrap();
        assert_eq!(offset, 0);
        assert_eq!(eocd.total_entries, 0);
        assert!(parser.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_finds_eocd_behind_comment() {
        let mut archive = build(&[Entry::new("a", "b")]).unwrap();
        let eocd_at = archive.len() - EndOfCentralDirectory::SIZE;
        let comment = b"made by hand";
        archive[eocd_at + 20..eocd_at + 22].copy_from_slice(&(comment.len() as u16).to_le_bytes());
        archive.extend_from_slice(comment);

        let parser = parser_for(archive);
        let (eocd, offset) = parser.find_eocd().await.unwrap();
        assert_eq!(offset, eocd_at as u64);
        assert_eq!(eocd.comment_len as usize, comment.len());
        assert_eq!(parser.list_files().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_garbage() {
        let parser = parser_for(b"definitely not a zip file at all".to_vec());
        let err = parser.find_eocd().await.unwrap_err();
        assert_eq!(err.to_string(), "Not a valid ZIP file");

        let parser = parser_for(Vec::new());
        assert!(parser.find_eocd().await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_zip64_locator() {
        // A ZIP64 locator followed by an EOCD full of sentinels
        let mut archive = vec![0u8; Zip64Locator::SIZE];
        archive[..4].copy_from_slice(&Zip64Locator::SIGNATURE.to_le_bytes());
        let mut eocd = vec![0u8; EndOfCentralDirectory::SIZE];
        EndOfCentralDirectory::new(0xFFFF, 0xFFFF_FFFF, 0xFFFF_FFFF)
            .write(&mut eocd, 0)
            .unwrap();
        archive.extend_from_slice(&eocd);

        let parser = parser_for(archive);
        assert!(parser.has_zip64_locator(20).await.unwrap());
        let err = parser.list_files().await.unwrap_err();
        assert!(err.to_string().contains("ZIP64"));
    }

    #[tokio::test]
    async fn test_max_entry_count_without_locator() {
        let entries: Vec<Entry> = (0..0xFFFF)
            .map(|i| Entry::new(format!("f{i}"), Vec::<u8>::new()))
            .collect();
        let parser = parser_for(build(&entries).unwrap());

        let (eocd, eocd_offset) = parser.find_eocd().await.unwrap();
        assert_eq!(eocd.total_entries, 0xFFFF);
        assert!(eocd.has_max_values());
        assert!(!parser.has_zip64_locator(eocd_offset).await.unwrap());

        let listed = parser.list_files().await.unwrap();
        assert_eq!(listed.len(), 0xFFFF);
        assert_eq!(listed[0].file_name, "f0");
        assert_eq!(listed[0xFFFE].file_name, "f65534");
    }

    #[tokio::test]
    async fn test_zip64_locator_before_start() {
        let parser = parser_for(build(&[]).unwrap());
        assert!(!parser.has_zip64_locator(0).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_bad_central_header() {
        let mut archive = build(&[Entry::new("a", "b")]).unwrap();
        // Corrupt the central directory signature (CD starts at 30 + 1 + 1)
        archive[32] = 0;

        let err = parser_for(archive).list_files().await.unwrap_err();
        assert!(format!("{err:#}").contains("Invalid Central Directory File Header"));
    }

    #[tokio::test]
    async fn test_rejects_bad_local_header() {
        let mut archive = build(&[Entry::new("a", "b")]).unwrap();
        archive[0] = b'X';

        let parser = parser_for(archive);
        let entries = parser.list_files().await.unwrap();
        assert!(parser.get_data_offset(&entries[0]).await.is_err());
    }
}
