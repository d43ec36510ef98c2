/// The Write Buffer and the Writer Handle that owns it.
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::storage::page::{PageId, PAGE_SIZE};
use crate::tx::manager::TransactionManager;
use crate::tx::TxId;

/// Per-writer staging area: `page_id -> bytes`, last write wins, insertion
/// order preserved for tie-breaking during replay of same-tx writes.
#[derive(Default)]
pub struct WriteBuffer {
    order: Vec<PageId>,
    pages: std::collections::HashMap<PageId, Box<[u8; PAGE_SIZE]>>,
}

impl WriteBuffer {
    fn new() -> Self {
        WriteBuffer::default()
    }

    fn stage(&mut self, page_id: PageId, data: [u8; PAGE_SIZE]) {
        if self.pages.insert(page_id, Box::new(data)).is_none() {
            self.order.push(page_id);
        }
    }

    /// Drain staged pages in insertion order, emptying the buffer.
    pub fn drain(&mut self) -> Vec<(PageId, Box<[u8; PAGE_SIZE]>)> {
        let order = std::mem::take(&mut self.order);
        order
            .into_iter()
            .map(|page_id| {
                let data = self.pages.remove(&page_id).expect("order tracks pages");
                (page_id, data)
            })
            .collect()
    }
}

/// Owns a `tx_id` and the exclusive write buffer for the one active writer.
///
/// The writer slot is released in exactly one of two ways: `commit`'s last
/// step, via the explicit [`release`](WriterHandle::release) below — only
/// after the WAL append and fsync in spec §4.5 steps 1-3 have both
/// succeeded — or `Drop`, if the handle is discarded without ever reaching
/// `commit` (a silent abort). `released` records which path already ran so
/// the slot is never freed twice: without it, an explicit `release` inside
/// `commit` followed by the handle's own `Drop` at end of scope would free
/// a slot a *different*, later writer had since acquired.
pub struct WriterHandle {
    tx_id: TxId,
    buffer: WriteBuffer,
    manager: Arc<TransactionManager>,
    released: bool,
}

impl WriterHandle {
    pub(crate) fn new(tx_id: TxId, manager: Arc<TransactionManager>) -> Self {
        WriterHandle {
            tx_id,
            buffer: WriteBuffer::new(),
            manager,
            released: false,
        }
    }

    pub fn tx_id(&self) -> TxId {
        self.tx_id
    }

    pub fn stage_write(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        if data.len() != PAGE_SIZE {
            return Err(EngineError::BadPageSize {
                expected: PAGE_SIZE,
                got: data.len(),
            });
        }
        let mut buf = [0u8; PAGE_SIZE];
        buf.copy_from_slice(data);
        self.buffer.stage(page_id, buf);
        Ok(())
    }

    /// Return this writer's id and drain its staged writes, without
    /// releasing the writer slot. `commit` calls this first and only
    /// releases the slot once the WAL append and fsync that follow have
    /// both succeeded — while they're in flight, this handle (and the
    /// exclusivity it represents) must still be considered held, so no
    /// second writer can be admitted.
    pub(crate) fn drain_for_commit(&mut self) -> (TxId, Vec<(PageId, Box<[u8; PAGE_SIZE]>)>) {
        (self.tx_id, self.buffer.drain())
    }

    /// Release the writer slot. `commit` calls this as its last step, after
    /// durability work has finished; consuming `self` here means `Drop`
    /// below still runs at the end of `commit`'s scope, but sees
    /// `released` already set and does nothing.
    pub(crate) fn release(mut self) {
        self.manager.release_writer();
        self.released = true;
    }
}

impl Drop for WriterHandle {
    fn drop(&mut self) {
        if !self.released {
            self.manager.release_writer();
        }
    }
}
