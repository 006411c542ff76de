//! Wire constants and security limits for decoding.
//!
//! Every count and length read from the wire is checked against one of these
//! bounds before anything is allocated.

/// Magic bytes for an uncompressed stream.
pub const MAGIC_UNCOMPRESSED: &[u8; 4] = b"TCCD";

/// Magic bytes for a zstd-compressed stream.
pub const MAGIC_COMPRESSED: &[u8; 5] = b"TCCDZ";

/// Stream header flag: every envelope carries a payload length prefix.
pub const FLAG_LENGTH_PREFIXED: u8 = 0x01;

/// Header flag bits that must be zero.
pub const HEADER_RESERVED_MASK: u8 = 0xFE;

/// Maximum bytes in a LEB128 varint encoding a u64.
pub const MAX_VARINT_BYTES: usize = 10;

/// Maximum length of any string field (bytes).
pub const MAX_STRING_LEN: usize = 1024 * 1024;

/// Maximum length of a raw value payload (bytes).
pub const MAX_BYTES_LEN: usize = 64 * 1024 * 1024;

/// Maximum entries in a properties map.
pub const MAX_MAP_ENTRIES: usize = 4096;

/// Maximum entries in a list field (libraries, group ids, parameters).
pub const MAX_LIST_LEN: usize = 65_536;

/// Maximum number of integers in a value's tag array (two per run).
pub const MAX_TAG_INTS: usize = 2 * 1024 * 1024;

/// Maximum children directly under one provenance tag node.
pub const MAX_TAG_CHILDREN: usize = 65_536;

/// Default nesting bound for provenance tag trees.
pub const DEFAULT_MAX_TAG_DEPTH: usize = 64;

/// Maximum per-byte tag expansion a decoder will allocate.
pub const MAX_EXPANDED_TAG_LEN: usize = 16 * 1024 * 1024;

/// Maximum size of one framed envelope payload.
pub const MAX_RECORD_SIZE: usize = 128 * 1024 * 1024;

/// Maximum size of a whole stream after decompression.
pub const MAX_STREAM_SIZE: usize = 1024 * 1024 * 1024;
