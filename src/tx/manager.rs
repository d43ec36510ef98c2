/// Transaction Manager: issues writer ids and reader snapshots, tracks who's
/// active. One mutex guards all of it — operations are O(readers) but brief,
/// per the concurrency model.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{EngineError, Result};
use crate::tx::TxId;

struct State {
    next_tx_id: TxId,
    writer_active: bool,
    active_readers: Vec<Arc<AtomicU64>>,
}

pub struct TransactionManager {
    state: Mutex<State>,
}

impl TransactionManager {
    pub fn new() -> Self {
        TransactionManager {
            state: Mutex::new(State {
                next_tx_id: 1,
                writer_active: false,
                active_readers: Vec::new(),
            }),
        }
    }

    /// Allocate a writer id, refusing a second concurrent writer.
    pub fn begin_write(&self) -> Result<TxId> {
        let mut state = self.state.lock();
        if state.writer_active {
            return Err(EngineError::WriterBusy);
        }
        let tx_id = state.next_tx_id;
        state.next_tx_id += 1;
        state.writer_active = true;
        Ok(tx_id)
    }

    /// Release the writer slot, whether via commit or silent drop-abort.
    pub fn release_writer(&self) {
        self.state.lock().writer_active = false;
    }

    /// Capture a snapshot at the given WAL size and register it as active.
    /// The caller must take this snapshot atomically with respect to
    /// concurrent commits (i.e. under the same lock that publishes commits).
    pub fn begin_read(&self, wal_size: u64) -> Arc<AtomicU64> {
        let snapshot = Arc::new(AtomicU64::new(wal_size));
        self.state.lock().active_readers.push(snapshot.clone());
        snapshot
    }

    /// Remove a reader's snapshot from the active set.
    pub fn end_read(&self, snapshot: &Arc<AtomicU64>) {
        self.state
            .lock()
            .active_readers
            .retain(|r| !Arc::ptr_eq(r, snapshot));
    }

    /// Minimum snapshot among active readers, or `wal_size` if none are
    /// active — checkpoint may then drain the entire log.
    pub fn oldest_reader_snapshot(&self, wal_size: u64) -> u64 {
        let state = self.state.lock();
        state
            .active_readers
            .iter()
            .map(|r| r.load(Ordering::SeqCst))
            .min()
            .unwrap_or(wal_size)
    }

    /// Rebase every active reader's snapshot down by `delta` bytes, in place.
    /// Called by checkpoint after it has shifted WAL bytes `[safe, end)`
    /// down to `[0, end - safe)`.
    pub fn rebase_readers(&self, delta: u64) {
        let state = self.state.lock();
        for r in state.active_readers.iter() {
            r.fetch_sub(delta, Ordering::SeqCst);
        }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
