use std::io::Read;

use crate::io::read_up_to;
use crate::{GzparError, Result};

use super::{
    GZIP_MAGIC, INDEX_TAG_SIZE, RECORD_PREFIX_SIZE, TAGGED_SHIFT, checked_record_len,
    ensure_member_header,
};

/// Offset of the length field once the member has been shifted.
const TAGGED_LENGTH_OFFSET: usize = 6;

/// Wraps a gzip member into the index-tagged layout.
///
/// Layout: `[u32 index][CM][FLG][u32 member length][XFL][OS][deflate data][trailer]`,
/// all integers big-endian. The index overwrites the gzip magic and the length
/// field counts the original member, not the two extra bytes.
pub fn frame_tagged(record: &[u8], index: u32) -> Result<Vec<u8>> {
    let len = ensure_member_header(record)?;

    let mut out = vec![0u8; record.len() + TAGGED_SHIFT];
    out[TAGGED_SHIFT..].copy_from_slice(record);
    out[TAGGED_LENGTH_OFFSET..TAGGED_LENGTH_OFFSET + 4].copy_from_slice(&len.to_be_bytes());
    out[..INDEX_TAG_SIZE].copy_from_slice(&index.to_be_bytes());
    Ok(out)
}

/// Reads one index-tagged record and rebuilds the gzip member it came from.
///
/// The magic bytes are restored synthetically and the MTIME field is left
/// zeroed. Returns `Ok(None)` when the stream is exhausted before the first byte.
///
/// # Errors
/// Fails with a format error on a short read or a declared length at or above
/// `alloc_limit`.
pub fn read_tagged<R: Read + ?Sized>(
    reader: &mut R,
    alloc_limit: u64,
) -> Result<Option<(u32, Vec<u8>)>> {
    let mut tag = [0u8; INDEX_TAG_SIZE];
    let got = read_up_to(reader, &mut tag)?;
    if got == 0 {
        return Ok(None);
    }
    if got != INDEX_TAG_SIZE {
        return Err(GzparError::Format("truncated block index"));
    }
    let index = u32::from_be_bytes(tag);

    let mut header = [GZIP_MAGIC[0], GZIP_MAGIC[1], 0, 0];
    if read_up_to(reader, &mut header[2..])? != 2 {
        return Err(GzparError::Format("truncated gzip method and flags"));
    }

    let mut length = [0u8; 4];
    if read_up_to(reader, &mut length)? != length.len() {
        return Err(GzparError::Format("truncated record length"));
    }
    let len = checked_record_len(u32::from_be_bytes(length), alloc_limit)?;

    let mut record = vec![0u8; len];
    record[..header.len()].copy_from_slice(&header);
    if read_up_to(reader, &mut record[RECORD_PREFIX_SIZE..])? != len - RECORD_PREFIX_SIZE {
        return Err(GzparError::Format("truncated gzip member body"));
    }

    Ok(Some((index, record)))
}
