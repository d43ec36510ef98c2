//! `pagelog`: a single-writer, multi-reader page-oriented storage engine
//! backed by a write-ahead log.
//!
//! Clients address storage as a flat array of fixed-size pages. The engine
//! guarantees atomic multi-page commits, snapshot isolation for concurrent
//! readers, crash recovery to the last durably committed state, and bounded
//! log growth through checkpointing. Everything above page granularity —
//! tables, row encoding, indexes, query execution — is out of scope; those
//! live in a layer that consumes this engine through the operations below.

pub mod error;
pub mod read_path;
pub mod storage;
pub mod tx;
pub mod wal;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::Result;
use crate::storage::page::{Page, PageId, PAGE_SIZE};
use crate::storage::page_store::PageStore;
use crate::tx::manager::TransactionManager;
use crate::tx::reader::ReaderHandle;
use crate::tx::writer::WriterHandle;
use crate::wal::file::WalFile;
use crate::wal::recovery::recover;

fn wal_path(main_path: &Path) -> PathBuf {
    let mut name = main_path.as_os_str().to_owned();
    name.push("-wal");
    PathBuf::from(name)
}

/// The engine handle. Owns the Page Store and the WAL file; coordinates
/// writers, readers, and checkpoints through the Transaction Manager.
///
/// The WAL is guarded by a `RwLock`: readers take a shared lock to read
/// bytes up to their snapshot, while commit and checkpoint take an
/// exclusive lock to append or rewrite. A separate `checkpoint_gate` mutex
/// serializes checkpoint invocations against each other and against
/// in-flight commits, so checkpoint never observes a half-written commit.
pub struct Engine {
    store: Mutex<PageStore>,
    wal: RwLock<WalFile>,
    manager: Arc<TransactionManager>,
    checkpoint_gate: Mutex<()>,
}

impl Engine {
    /// Open (creating if absent) the main file at `path` and its WAL at
    /// `<path>-wal`, running recovery before returning.
    pub fn open(path: &Path) -> Result<Self> {
        let mut store = PageStore::open(path)?;
        let mut wal = WalFile::open(&wal_path(path))?;

        let report = recover(&mut wal, &mut store)?;
        info!(?report, "engine opened");

        Ok(Engine {
            store: Mutex::new(store),
            wal: RwLock::new(wal),
            manager: Arc::new(TransactionManager::new()),
            checkpoint_gate: Mutex::new(()),
        })
    }

    /// Best-effort close: fsyncs the page store. Does not implicitly flush
    /// any in-flight writer — an open `WriterHandle` must still be
    /// committed or dropped by its owner.
    pub fn close(&self) -> Result<()> {
        self.store.lock().sync()?;
        Ok(())
    }

    pub fn begin_write(&self) -> Result<WriterHandle> {
        let tx_id = self.manager.begin_write()?;
        Ok(WriterHandle::new(tx_id, self.manager.clone()))
    }

    /// Commit protocol: append Page Records, then a Commit Record, fsync,
    /// release the writer slot. No Page Store bytes are touched here.
    ///
    /// The writer slot stays held (spec §3: "at most one exists at a time")
    /// until the very last line here, after the fsync below has succeeded —
    /// `drain_for_commit` only reads `writer`'s staged pages, it does not
    /// release anything, so a second `begin_write` cannot be admitted while
    /// this transaction's durability work is still in flight. A failed
    /// append or fsync returns early via `?` and lets `writer`'s `Drop`
    /// release the slot instead, aborting the transaction per spec §4.5.
    pub fn commit(&self, mut writer: WriterHandle) -> Result<()> {
        let (tx_id, writes) = writer.drain_for_commit();

        let mut wal = self.wal.write();
        for (page_id, data) in &writes {
            let record = crate::wal::record::WalRecord::Page {
                tx_id,
                page_id: *page_id,
                data: data.clone(),
            };
            wal.append(&record.serialize())?;
        }
        let commit_record = crate::wal::record::WalRecord::Commit { tx_id };
        wal.append(&commit_record.serialize())?;
        wal.sync()?;
        drop(wal);

        debug!(tx_id, pages = writes.len(), "transaction committed");
        writer.release();
        Ok(())
    }

    /// Capture a snapshot at the current WAL size, atomically with respect
    /// to concurrent commits (both take the WAL lock).
    pub fn begin_read(&self) -> ReaderHandle {
        let wal = self.wal.read();
        let size = wal.size().unwrap_or(0);
        let snapshot = self.manager.begin_read(size);
        ReaderHandle::new(snapshot)
    }

    pub fn read(&self, reader: &ReaderHandle, page_id: PageId) -> Result<Page> {
        let wal = self.wal.read();
        let prefix = wal.read_from(0)?;
        let snapshot = reader.snapshot_offset().min(prefix.len() as u64) as usize;
        let mut store = self.store.lock();
        read_path::read_page(&prefix[..snapshot], &mut store, page_id)
    }

    pub fn end_read(&self, reader: ReaderHandle) {
        self.manager.end_read(reader.snapshot_handle());
    }

    /// Drain the committed WAL prefix no live reader still needs into the
    /// Page Store, then rebase every surviving reader's snapshot in place.
    pub fn checkpoint(&self) -> Result<()> {
        let _gate = self.checkpoint_gate.lock();
        let mut wal = self.wal.write();

        let wal_size = wal.size()?;
        let safe = self.manager.oldest_reader_snapshot(wal_size);
        if safe == 0 {
            return Ok(());
        }

        let prefix = wal.read_from(0)?;
        let scanned = crate::wal::scan::scan(&prefix[..safe as usize]);
        let committed: std::collections::HashSet<u32> = scanned
            .records
            .iter()
            .filter_map(|r| match &r.record {
                crate::wal::record::WalRecord::Commit { tx_id } => Some(*tx_id),
                crate::wal::record::WalRecord::Page { .. } => None,
            })
            .collect();

        let mut store = self.store.lock();
        for scanned_record in &scanned.records {
            if let crate::wal::record::WalRecord::Page {
                tx_id,
                page_id,
                data,
            } = &scanned_record.record
            {
                if committed.contains(tx_id) {
                    store.write_page(*page_id, data)?;
                }
            }
        }
        store.sync()?;
        drop(store);

        wal.truncate_prefix(safe)?;
        self.manager.rebase_readers(safe);

        debug!(safe, "checkpoint drained WAL prefix");
        Ok(())
    }
}
