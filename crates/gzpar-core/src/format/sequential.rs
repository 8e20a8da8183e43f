use std::io::Read;

use crate::io::read_up_to;
use crate::{GzparError, Result};

use super::{
    GZIP_MAGIC, MTIME_OFFSET, RECORD_PREFIX_SIZE, checked_record_len, ensure_member_header,
};

/// Stamps a gzip member with its own total length.
///
/// The length replaces the MTIME field (big-endian), which lets a reader cut
/// member boundaries out of a concatenation without inflating anything. The
/// result is still a valid gzip member.
pub fn frame_member(mut record: Vec<u8>) -> Result<Vec<u8>> {
    let len = ensure_member_header(&record)?;
    record[MTIME_OFFSET..MTIME_OFFSET + 4].copy_from_slice(&len.to_be_bytes());
    Ok(record)
}

/// Reads one length-stamped gzip member.
///
/// Returns `Ok(None)` when the stream is exhausted before the first byte.
///
/// # Errors
/// Fails with a format error on a magic mismatch, a short read, or a declared
/// length at or above `alloc_limit`.
pub fn read_member<R: Read + ?Sized>(reader: &mut R, alloc_limit: u64) -> Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; RECORD_PREFIX_SIZE];
    let got = read_up_to(reader, &mut prefix[..MTIME_OFFSET])?;
    if got == 0 {
        return Ok(None);
    }
    if got != MTIME_OFFSET {
        return Err(GzparError::Format("truncated gzip member header"));
    }
    if prefix[..2] != GZIP_MAGIC {
        return Err(GzparError::Format("gzip magic mismatch"));
    }
    if read_up_to(reader, &mut prefix[MTIME_OFFSET..])? != 4 {
        return Err(GzparError::Format("truncated gzip member length"));
    }

    let declared = u32::from_be_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]);
    let len = checked_record_len(declared, alloc_limit)?;

    let mut record = vec![0u8; len];
    record[..RECORD_PREFIX_SIZE].copy_from_slice(&prefix);
    if read_up_to(reader, &mut record[RECORD_PREFIX_SIZE..])? != len - RECORD_PREFIX_SIZE {
        return Err(GzparError::Format("truncated gzip member body"));
    }

    Ok(Some(record))
}
