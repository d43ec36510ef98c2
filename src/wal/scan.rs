/// Forward scanning over a WAL byte range.
///
/// Every reader of the WAL — recovery's two passes, and the diagnostic CLI —
/// goes through a single scan so that "what counts as a clean tail" is
/// decided in exactly one place.
use tracing::warn;

use crate::wal::record::{decode, Decoded, WalRecord};

/// A record found during a scan, paired with its byte offset within the
/// scanned range (not the absolute file offset, unless the scan started at 0).
pub struct ScannedRecord {
    pub offset: u64,
    pub record: WalRecord,
}

/// Result of scanning a byte range once, forward, to its end.
pub struct ScanResult {
    pub records: Vec<ScannedRecord>,
    /// Byte length of the well-formed prefix: the offset at which scanning
    /// stopped, relative to the start of the scanned slice.
    pub valid_len: u64,
    /// Set when scanning stopped because a record's type tag (or a Commit
    /// Record's magic) was invalid, rather than because bytes simply ran
    /// out. This is "not a clean tail": truncate here, but also log it.
    pub corrupt_tag_at: Option<u64>,
}

/// Scan `bytes` forward, decoding one record after another until either the
/// bytes are exhausted, a record is truncated mid-body (an ordinary
/// crash-torn tail), or a record's tag cannot be decoded at all (corruption).
///
/// Both stopping conditions end the scan the same way: everything from that
/// point on is discarded. Only the second is logged as corruption.
pub fn scan(bytes: &[u8]) -> ScanResult {
    let mut records = Vec::new();
    let mut pos: usize = 0;
    let mut corrupt_tag_at = None;

    loop {
        match decode(&bytes[pos..]) {
            Decoded::Record(record, len) => {
                records.push(ScannedRecord {
                    offset: pos as u64,
                    record,
                });
                pos += len;
            }
            Decoded::Incomplete => break,
            Decoded::BadTag(tag) => {
                warn!(offset = pos as u64, tag, "WAL corruption: unrecognized record tag, truncating");
                corrupt_tag_at = Some(pos as u64);
                break;
            }
        }
    }

    ScanResult {
        records,
        valid_len: pos as u64,
        corrupt_tag_at,
    }
}
