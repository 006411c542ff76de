//! Error types for CDM encoding/decoding, construction and validation.

use std::fmt;

use thiserror::Error;

use crate::model::Uuid;

/// How far the damage of a decode error reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// The offending record is bad; the caller may skip it and continue.
    Record,
    /// Byte alignment can no longer be trusted; the stream must be abandoned.
    Stream,
}

/// The specific way a value's run-length tag array is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLengthFault {
    /// Run lengths do not add up to the value size.
    SumMismatch { size: u64, total: u64 },
    /// A run of zero (or negative) bytes.
    EmptyRun { index: usize },
    /// The flat integer array has an odd element count.
    OddCount { count: usize },
    /// A run longer than the wire's 32-bit signed length.
    RunTooLong { index: usize },
}

impl fmt::Display for RunLengthFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunLengthFault::SumMismatch { size, total } => {
                write!(f, "runs cover {total} bytes but value size is {size}")
            }
            RunLengthFault::EmptyRun { index } => write!(f, "run {index} has non-positive length"),
            RunLengthFault::OddCount { count } => {
                write!(f, "tag array has odd length {count} (expected length/tag pairs)")
            }
            RunLengthFault::RunTooLong { index } => write!(f, "run {index} exceeds i32::MAX bytes"),
        }
    }
}

/// Error during binary decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    // === Stream framing ===
    #[error("invalid magic bytes: expected TCCD or TCCDZ, found {found:?}")]
    InvalidMagic { found: [u8; 4] },

    #[error("stream is zstd-compressed (TCCDZ); decompress it before iterating")]
    CompressedStream,

    #[error("unsupported schema version: {version}")]
    UnsupportedVersion { version: u8 },

    #[error("reserved bits are non-zero in {context}")]
    ReservedBitsSet { context: &'static str },

    #[error("stream truncated while reading {context}")]
    TruncatedStream { context: &'static str },

    #[error("varint exceeds maximum length (10 bytes)")]
    VarintTooLong,

    #[error("varint overflow (value exceeds u64)")]
    VarintOverflow,

    #[error("unknown datum kind: {kind}")]
    UnknownDatumKind { kind: u8 },

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("zstd decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("decompressed size {actual} doesn't match declared {declared}")]
    UncompressedSizeMismatch { declared: usize, actual: usize },

    // === Record structure ===
    #[error("{record} is missing required field {field}")]
    MissingRequiredField {
        record: &'static str,
        field: &'static str,
    },

    #[error("unknown {family} ordinal {ordinal}")]
    UnknownEnumValue { family: &'static str, ordinal: u64 },

    #[error("malformed run-length tag array: {detail}")]
    MalformedRunLength { detail: RunLengthFault },

    #[error("provenance tag tree contains a cycle through tag id {tag_id}")]
    CyclicTagTree { tag_id: i32 },

    #[error("provenance tag tree exceeds maximum depth {max}")]
    MaxDepthExceeded { max: usize },

    #[error("invalid presence marker {value:#04x} for {field} (expected 0x00 or 0x01)")]
    InvalidPresence { field: &'static str, value: u8 },

    #[error("invalid bool value {value:#04x} for {field}")]
    InvalidBool { field: &'static str, value: u8 },

    #[error("{field} value {value} does not fit in 32 bits")]
    IntegerOverflow { field: &'static str, value: i64 },

    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("duplicate key {key:?} in properties map")]
    DuplicateMapKey { key: String },

    #[error("invalid provenance tag value arm: {arm}")]
    InvalidTagArm { arm: u8 },

    #[error("datum kind {kind} declared {declared} payload bytes but {consumed} were decoded")]
    RecordLengthMismatch {
        kind: u8,
        declared: usize,
        consumed: usize,
    },
}

impl DecodeError {
    /// Returns whether the error is confined to one record or poisons the stream.
    ///
    /// In length-prefixed streams the record boundary is known independently
    /// of the payload, so [`crate::codec::DatumStream`] treats any error raised
    /// inside a framed payload as record-local regardless of this value.
    pub fn scope(&self) -> ErrorScope {
        match self {
            DecodeError::MissingRequiredField { .. }
            | DecodeError::UnknownEnumValue { .. }
            | DecodeError::MalformedRunLength { .. }
            | DecodeError::CyclicTagTree { .. }
            | DecodeError::MaxDepthExceeded { .. }
            | DecodeError::InvalidPresence { .. }
            | DecodeError::InvalidBool { .. }
            | DecodeError::IntegerOverflow { .. }
            | DecodeError::InvalidUtf8 { .. }
            | DecodeError::DuplicateMapKey { .. }
            | DecodeError::InvalidTagArm { .. }
            | DecodeError::RecordLengthMismatch { .. } => ErrorScope::Record,
            _ => ErrorScope::Stream,
        }
    }
}

/// Error during binary encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("malformed run-length tag array: {detail}")]
    MalformedRunLength { detail: RunLengthFault },

    #[error("provenance tag tree exceeds maximum depth {max}")]
    MaxDepthExceeded { max: usize },

    #[error("datum kind {kind} does not exist in schema version {version}")]
    UnknownDatumKind { kind: u8, version: u8 },

    #[error("{family} ordinal {ordinal} does not exist in schema version {version}")]
    UnknownEnumValue {
        family: &'static str,
        ordinal: u64,
        version: u8,
    },

    #[error("zstd compression failed: {0}")]
    CompressionFailed(String),

    #[error("write to sink failed: {0}")]
    Io(String),

    #[error("sink was left mid-record by an earlier write failure")]
    SinkPoisoned,
}

/// Error while building a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("{record} is missing required field {field}")]
    MissingRequiredField {
        record: &'static str,
        field: &'static str,
    },
}

/// Error during semantic validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("tag id {tag_id} is referenced but never defined")]
    UnresolvedTagReference { tag_id: i32 },

    #[error("tag id {tag_id} is defined more than once")]
    DuplicateTagId { tag_id: i32 },

    #[error("provenance tag tree contains a cycle through tag id {tag_id}")]
    CyclicTagTree { tag_id: i32 },

    #[error("provenance tag tree exceeds maximum depth {max}")]
    MaxDepthExceeded { max: usize },

    #[error("edge is not an EDGE_OBJECT_PREV_VERSION edge")]
    NotAPrevVersionEdge,

    #[error("version edge endpoints {from:?} -> {to:?} do not match the given objects")]
    VersionChainMismatch { from: Uuid, to: Uuid },

    #[error("file version {newer} does not increase on previous version {older}")]
    VersionNotIncreasing { older: i32, newer: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_classification() {
        let record = DecodeError::MissingRequiredField {
            record: "Subject",
            field: "start_timestamp",
        };
        assert_eq!(record.scope(), ErrorScope::Record);

        let stream = DecodeError::TruncatedStream { context: "kind" };
        assert_eq!(stream.scope(), ErrorScope::Stream);

        assert_eq!(DecodeError::UnknownDatumKind { kind: 42 }.scope(), ErrorScope::Stream);
        assert_eq!(DecodeError::CompressedStream.scope(), ErrorScope::Stream);
    }

    #[test]
    fn test_run_length_fault_messages() {
        let err = DecodeError::MalformedRunLength {
            detail: RunLengthFault::SumMismatch { size: 10, total: 9 },
        };
        assert_eq!(
            err.to_string(),
            "malformed run-length tag array: runs cover 9 bytes but value size is 10"
        );
    }
}
