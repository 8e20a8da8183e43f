use crate::Result;

pub mod gzip;

/// Single-block codec handed to every framer.
///
/// Each call is independent: no state is carried from one block to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GzipCodec {
    level: u32,
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self::new(gzip::DEFAULT_LEVEL)
    }
}

impl GzipCodec {
    /// Creates a codec with a deflate level in `0..=9`; larger values are clamped.
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        gzip::apply(data, self.level)
    }

    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        gzip::reverse(data)
    }
}
