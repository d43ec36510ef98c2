/// Read Path: resolves a `(page_id, snapshot)` lookup against the WAL,
/// falling back to the Page Store.
use std::collections::HashSet;

use crate::storage::page::{Page, PageId};
use crate::storage::page_store::PageStore;
use crate::wal::record::WalRecord;
use crate::wal::scan::scan;

/// Resolve `page_id` as of `wal_prefix`, the bytes `[0, reader.snapshot)`.
///
/// A forward pass collects which `tx_id`s committed within the prefix, then
/// a reverse pass over the same records returns the first (i.e.
/// last-written) committed Page Record for `page_id`. Falling off the end
/// of both passes means no WAL image exists for this page within the
/// snapshot, so the Page Store has the answer.
pub fn read_page(wal_prefix: &[u8], store: &mut PageStore, page_id: PageId) -> crate::error::Result<Page> {
    let scanned = scan(wal_prefix);

    let committed: HashSet<u32> = scanned
        .records
        .iter()
        .filter_map(|r| match &r.record {
            WalRecord::Commit { tx_id } => Some(*tx_id),
            WalRecord::Page { .. } => None,
        })
        .collect();

    for scanned_record in scanned.records.iter().rev() {
        if let WalRecord::Page {
            tx_id,
            page_id: pid,
            data,
        } = &scanned_record.record
        {
            if *pid == page_id && committed.contains(tx_id) {
                return Ok(Page::from_array(**data));
            }
        }
    }

    store.read_page(page_id)
}
