use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::{GzparError, Result};

/// Default deflate level used by the codec.
pub const DEFAULT_LEVEL: u32 = 6;

/// Compresses `data` into one standalone gzip member.
///
/// The member carries the plain 10-byte header (no name, comment or extra
/// field), so bytes 4..8 are the MTIME field that framers repurpose.
pub fn apply(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(
        Vec::with_capacity(data.len() / 2 + 64),
        Compression::new(level.min(9)),
    );
    encoder
        .write_all(data)
        .map_err(|err| GzparError::Codec(format!("gzip encode failed: {err}")))?;
    encoder
        .finish()
        .map_err(|err| GzparError::Codec(format!("gzip encode failed: {err}")))
}

/// Inflates one gzip member back into the raw bytes.
///
/// The MTIME field is never checked, so repurposed length fields are harmless.
pub fn reverse(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut output = Vec::with_capacity(data.len().saturating_mul(2));
    decoder
        .read_to_end(&mut output)
        .map_err(|err| GzparError::Codec(format!("gzip decode failed: {err}")))?;
    Ok(output)
}
