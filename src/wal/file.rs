/// Raw byte-level access to the WAL file.
///
/// Deliberately dumb: this module knows nothing about record framing. It
/// appends bytes, reads byte ranges, and truncates a prefix. Everything
/// about what the bytes mean lives in `record` and `scan`.
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::error::Result;

pub struct WalFile {
    file: File,
}

impl WalFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(WalFile { file })
    }

    pub fn size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Append raw bytes at the current end of the file. Returns the byte
    /// offset the bytes were written at.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(bytes)?;
        Ok(offset)
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Read the full byte range `[offset, end of file)`.
    ///
    /// Uses a positioned read (`pread`) rather than seek-then-read so this
    /// can be called through a shared reference — readers take the WAL's
    /// `RwLock` in shared mode and must be able to read concurrently with
    /// each other without touching a shared file cursor.
    pub fn read_from(&self, offset: u64) -> Result<Vec<u8>> {
        let len = self.size()?;
        if offset >= len {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; (len - offset) as usize];
        self.file.read_exact_at(&mut buf, offset)?;
        Ok(buf)
    }

    /// Discard every byte before `keep_from`, shifting the surviving suffix
    /// down to offset 0. Used by checkpoint to drop the committed prefix and
    /// by recovery to truncate to zero after replay.
    pub fn truncate_prefix(&mut self, keep_from: u64) -> Result<()> {
        let tail = self.read_from(keep_from)?;
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&tail)?;
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn append_then_read_from_zero() {
        let tmp = NamedTempFile::new().unwrap();
        let mut wal = WalFile::open(tmp.path()).unwrap();
        let off = wal.append(b"hello").unwrap();
        assert_eq!(off, 0);
        assert_eq!(wal.read_from(0).unwrap(), b"hello");
    }

    #[test]
    fn appends_accumulate_in_order() {
        let tmp = NamedTempFile::new().unwrap();
        let mut wal = WalFile::open(tmp.path()).unwrap();
        wal.append(b"aaa").unwrap();
        let second_off = wal.append(b"bbb").unwrap();
        assert_eq!(second_off, 3);
        assert_eq!(wal.read_from(0).unwrap(), b"aaabbb");
    }

    #[test]
    fn truncate_prefix_keeps_only_the_suffix() {
        let tmp = NamedTempFile::new().unwrap();
        let mut wal = WalFile::open(tmp.path()).unwrap();
        wal.append(b"aaabbbccc").unwrap();
        wal.truncate_prefix(6).unwrap();
        assert_eq!(wal.read_from(0).unwrap(), b"ccc");
        assert_eq!(wal.size().unwrap(), 3);
    }

    #[test]
    fn truncate_prefix_to_end_empties_the_file() {
        let tmp = NamedTempFile::new().unwrap();
        let mut wal = WalFile::open(tmp.path()).unwrap();
        wal.append(b"aaabbb").unwrap();
        wal.truncate_prefix(6).unwrap();
        assert_eq!(wal.size().unwrap(), 0);
    }
}
