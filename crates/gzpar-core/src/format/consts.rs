/// The two gzip identification bytes (ID1, ID2).
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
/// Size of the plain gzip member header emitted by the codec.
pub const GZIP_HEADER_SIZE: usize = 10;
/// Size of the CRC32 + ISIZE trailer of a gzip member.
pub const GZIP_TRAILER_SIZE: usize = 8;
/// Offset of the 4-byte MTIME field inside a gzip member.
pub const MTIME_OFFSET: usize = 4;
/// Bytes a decoder must see before it knows the record length
/// (ID1, ID2, CM, FLG and the repurposed MTIME field).
pub const RECORD_PREFIX_SIZE: usize = 8;
/// Size of the big-endian block index written by the index-tagged framing.
pub const INDEX_TAG_SIZE: usize = 4;
/// How far the index-tagged framing shifts a gzip member to make room for the tag.
pub const TAGGED_SHIFT: usize = INDEX_TAG_SIZE - GZIP_MAGIC.len();
