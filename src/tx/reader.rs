/// The Reader Handle. Deliberately has no `Drop` impl: dropping one without
/// calling `end_read` leaks its snapshot in the active-reader set, which
/// delays checkpoint reclamation but never violates correctness. That's the
/// documented behavior, not an oversight.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct ReaderHandle {
    snapshot: Arc<AtomicU64>,
}

impl ReaderHandle {
    pub(crate) fn new(snapshot: Arc<AtomicU64>) -> Self {
        ReaderHandle { snapshot }
    }

    pub fn snapshot_offset(&self) -> u64 {
        self.snapshot.load(Ordering::SeqCst)
    }

    pub(crate) fn snapshot_handle(&self) -> &Arc<AtomicU64> {
        &self.snapshot
    }
}
