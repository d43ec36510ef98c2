use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::Path;

use lru::LruCache;

use crate::error::Result;
use crate::storage::page::{Page, PageId, PAGE_SIZE};

/// Default LRU read cache capacity, in pages.
const DEFAULT_CACHE_CAPACITY: usize = 256;

/// The main file: a flat, sparse array of `PAGE_SIZE`-byte pages.
///
/// Only `Recovery` and `Checkpoint` ever call [`PageStore::write_page`] — the
/// commit path never touches this file directly (spec invariant I1).
pub struct PageStore {
    file: File,
    cache: LruCache<PageId, Page>,
}

impl PageStore {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(PageStore {
            file,
            cache: LruCache::new(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap()),
        })
    }

    /// Read a page. Offsets past the current file extent read back zero-filled
    /// (the store is sparse-by-default and never pre-allocates).
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        if let Some(page) = self.cache.get(&page_id) {
            return Ok(page.clone());
        }

        let offset = page_id as u64 * PAGE_SIZE as u64;
        let file_len = self.file.metadata()?.len();

        let page = if offset >= file_len {
            Page::zeroed()
        } else {
            self.file.seek(SeekFrom::Start(offset))?;
            let mut data = [0u8; PAGE_SIZE];
            let available = (file_len - offset).min(PAGE_SIZE as u64) as usize;
            self.file.read_exact(&mut data[..available])?;
            Page::from_array(data)
        };

        self.cache.put(page_id, page.clone());
        Ok(page)
    }

    /// Write a page at its slot. Only called by Recovery and Checkpoint.
    pub fn write_page(&mut self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.cache.put(page_id, Page::from_array(*data));
        Ok(())
    }

    /// `fsync` — must follow any batch of checkpoint/recovery writes before the
    /// WAL prefix that produced them is truncated.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
