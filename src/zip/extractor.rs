use std::sync::Arc;

use crate::checksum::Crc32;
use crate::io::ReadAt;
use anyhow::{Result, bail};
use tracing::{debug, warn};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Payloads are checksummed in chunks of this size
const CHUNK_SIZE: usize = 64 * 1024;

/// Outcome of checking one entry, as returned by [`ZipExtractor::verify`]
#[derive(Debug)]
pub struct EntryCheck {
    pub file_name: String,
    pub result: Result<()>,
}

/// High-level API for reading entries back out of an archive.
///
/// Wraps a [`ZipParser`] and adds payload reads with CRC-32 checks. Only
/// STORED entries can be read, which covers everything the builder writes.
///
/// ## Example
///
/// ```ignore
/// let extractor = ZipExtractor::new(Arc::new(LocalFileReader::new(path)?));
/// for check in extractor.verify().await? {
///     println!("{}: {}", check.file_name, check.result.is_ok());
/// }
/// ```
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl<R: ReadAt> ZipExtractor<R> {
    /// Create an extractor over the given reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - A shared reference to a reader implementing [`ReadAt`]
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all files in the archive.
    ///
    /// # Returns
    ///
    /// One [`ZipFileEntry`] per central directory record, in archive order.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is not a readable, single-disk,
    /// non-ZIP64 ZIP file.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Extract file data to memory, checking its CRC-32.
    ///
    /// # Arguments
    ///
    /// * `entry` - The file entry from [`list_files()`](Self::list_files)
    ///
    /// # Returns
    ///
    /// The payload bytes of the entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry is compressed, its local header is
    /// invalid, the data is truncated, or the CRC-32 does not match.
    pub async fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        Self::check_stored(entry)?;

        let data_offset = self.parser.get_data_offset(entry).await?;
        let mut buf = vec![0u8; entry.uncompressed_size as usize];
        self.parser.reader().read_exact_at(data_offset, &mut buf).await?;

        let mut crc = Crc32::new();
        crc.update(&buf);
        Self::check_crc(entry, crc.finalize())?;

        Ok(buf)
    }

    /// Check the CRC-32 of an entry without keeping its payload around.
    ///
    /// The payload is read in chunks, so memory use does not grow with the
    /// entry size.
    ///
    /// # Errors
    ///
    /// Same conditions as [`extract_to_memory()`](Self::extract_to_memory).
    pub async fn verify_entry(&self, entry: &ZipFileEntry) -> Result<()> {
        Self::check_stored(entry)?;

        let data_offset = self.parser.get_data_offset(entry).await?;
        let mut crc = Crc32::new();
        let mut buf = vec![0u8; CHUNK_SIZE.min(entry.uncompressed_size as usize)];
        let mut done = 0u64;

        while done < entry.uncompressed_size {
            let n = (entry.uncompressed_size - done).min(buf.len() as u64) as usize;
            self.parser
                .reader()
                .read_exact_at(data_offset + done, &mut buf[..n])
                .await?;
            crc.update(&buf[..n]);
            done += n as u64;
        }

        Self::check_crc(entry, crc.finalize())
    }

    /// Check every entry of the archive, in directory order.
    ///
    /// A failing entry does not stop the others from being checked.
    ///
    /// # Returns
    ///
    /// One [`EntryCheck`] per entry.
    ///
    /// # Errors
    ///
    /// Returns an error only if the central directory itself cannot be read.
    pub async fn verify(&self) -> Result<Vec<EntryCheck>> {
        let entries = self.list_files().await?;
        let mut checks = Vec::with_capacity(entries.len());

        for entry in entries {
            let result = self.verify_entry(&entry).await;
            match &result {
                Ok(()) => debug!(name = %entry.file_name, "entry OK"),
                Err(e) => warn!(name = %entry.file_name, error = %e, "entry failed"),
            }
            checks.push(EntryCheck {
                file_name: entry.file_name,
                result,
            });
        }

        Ok(checks)
    }

    fn check_stored(entry: &ZipFileEntry) -> Result<()> {
        if entry.compression_method != CompressionMethod::Stored {
            bail!(
                "Unsupported compression method: {} (only STORED/uncompressed is supported)",
                entry.compression_method.as_u16()
            );
        }
        if entry.compressed_size != entry.uncompressed_size {
            bail!(
                "Stored entry {:?} has compressed size {} but uncompressed size {}",
                entry.file_name,
                entry.compressed_size,
                entry.uncompressed_size
            );
        }
        Ok(())
    }

    fn check_crc(entry: &ZipFileEntry, actual: u32) -> Result<()> {
        if actual != entry.crc32 {
            bail!(
                "CRC-32 mismatch for {:?}: expected {:08x}, got {:08x}",
                entry.file_name,
                entry.crc32,
                actual
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use crate::{Entry, build};

    fn extractor_for(data: Vec<u8>) -> ZipExtractor<MemoryReader> {
        ZipExtractor::new(Arc::new(MemoryReader::new(data)))
    }

    #[tokio::test]
    async fn test_extracts_in_order() {
        let entries = vec![
            Entry::new("one.txt", "first payload"),
            Entry::new("two.bin", (0..=255u8).collect::<Vec<_>>()),
            Entry::new("three", ""),
        ];
        let extractor = extractor_for(build(&entries).unwrap());

        let listed = extractor.list_files().await.unwrap();
        assert_eq!(listed.len(), entries.len());
        for (want, got) in entries.iter().zip(&listed) {
            assert_eq!(got.file_name, want.name());
            assert_eq!(extractor.extract_to_memory(got).await.unwrap(), want.payload());
        }
    }

    #[tokio::test]
    async fn test_lists_and_verifies_max_entry_count() {
        let entries: Vec<Entry> = (0..0xFFFF)
            .map(|i| Entry::new(format!("e{i}"), Vec::<u8>::new()))
            .collect();
        let extractor = extractor_for(build(&entries).unwrap());

        let listed = extractor.list_files().await.unwrap();
        assert_eq!(listed.len(), 0xFFFF);
        assert_eq!(listed[0xFFFE].file_name, "e65534");

        let checks = extractor.verify().await.unwrap();
        assert!(checks.iter().all(|c| c.result.is_ok()));
    }

    #[tokio::test]
    async fn test_verify_large_entry_in_chunks() {
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let extractor = extractor_for(build(&[Entry::new("big.bin", payload)]).unwrap());

        let checks = extractor.verify().await.unwrap();
        assert_eq!(checks.len(), 1);
        assert!(checks[0].result.is_ok());
    }

    #[tokio::test]
    async fn test_detects_corrupted_payload() {
        let mut archive = build(&[Entry::new("a.txt", "hello"), Entry::new("b.txt", "world")]).unwrap();
        // First payload byte of a.txt sits right after its 30-byte header and 5-byte name
        archive[35] ^= 0xFF;
        let extractor = extractor_for(archive);

        let checks = extractor.verify().await.unwrap();
        assert!(checks[0].result.is_err());
        assert!(checks[1].result.is_ok());

        let entries = extractor.list_files().await.unwrap();
        let err = extractor.extract_to_memory(&entries[0]).await.unwrap_err();
        assert!(err.to_string().contains("CRC-32 mismatch"));
    }

    #[tokio::test]
    async fn test_rejects_deflate_entries() {
        let mut archive = build(&[Entry::new("a", "b")]).unwrap();
        // Compression method in the central directory header (CD at 32, field at +10)
        archive[42] = 8;
        let extractor = extractor_for(archive);

        let entries = extractor.list_files().await.unwrap();
        assert_eq!(entries[0].compression_method, CompressionMethod::Deflate);
        let err = extractor.verify_entry(&entries[0]).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported compression method: 8"));
    }
}
