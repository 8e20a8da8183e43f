//! Block framing for the two on-wire layouts.
//!
//! Both layouts are built from standalone gzip members. The sequential layout
//! stores each member's length in its MTIME field; the index-tagged layout
//! additionally replaces the gzip magic with the block index.

mod consts;
mod framer;
mod indexed;
mod sequential;

pub use consts::{
    GZIP_HEADER_SIZE, GZIP_MAGIC, GZIP_TRAILER_SIZE, INDEX_TAG_SIZE, MTIME_OFFSET,
    RECORD_PREFIX_SIZE, TAGGED_SHIFT,
};
pub use framer::{BlockFramer, FramerSettings};
pub use indexed::{frame_tagged, read_tagged};
pub use sequential::{frame_member, read_member};

use crate::telemetry::tags;
use crate::{GzparError, Result};

/// Validates a length read from the wire before anything is allocated for it.
fn checked_record_len(declared: u32, alloc_limit: u64) -> Result<usize> {
    if u64::from(declared) >= alloc_limit {
        tracing::debug!(target: tags::TARGET_FORMAT, declared, alloc_limit, "record rejected");
        return Err(GzparError::Format("declared record length exceeds memory ceiling"));
    }
    if (declared as usize) < RECORD_PREFIX_SIZE {
        tracing::debug!(target: tags::TARGET_FORMAT, declared, "record rejected");
        return Err(GzparError::Format("declared record length is too short"));
    }
    usize::try_from(declared)
        .map_err(|_| GzparError::Format("declared record length exceeds usize range"))
}

/// Checks that the codec produced a plain gzip member header.
fn ensure_member_header(record: &[u8]) -> Result<u32> {
    if record.len() < GZIP_HEADER_SIZE + GZIP_TRAILER_SIZE || record[..2] != GZIP_MAGIC {
        return Err(GzparError::Format("codec output is not a gzip member"));
    }
    u32::try_from(record.len())
        .map_err(|_| GzparError::Format("gzip member exceeds 32-bit length field"))
}
