//! TC-CDM: codec for the Common Data Model provenance graph.
//!
//! This crate provides the in-memory model, binary encoding/decoding and
//! validation for CDM streams: immutable vertices (subjects, events,
//! objects, principals) and typed edges, multiplexed on one channel as
//! self-describing envelope records.
//!
//! # Quick Start
//!
//! ```rust
//! use tc_cdm::codec::{decode_stream, encode_stream, EncodeOptions};
//! use tc_cdm::evolution::EvolutionPolicy;
//! use tc_cdm::model::{EdgeType, SimpleEdge, TcCdmDatum};
//!
//! let edge = SimpleEdge::builder()
//!     .from_uuid([1u8; 32])
//!     .to_uuid([2u8; 32])
//!     .edge_type(EdgeType::EventAffectsFile)
//!     .timestamp_micros(1000)
//!     .build()
//!     .unwrap();
//! let datums = vec![TcCdmDatum::from(edge)];
//!
//! let bytes = encode_stream(&datums, EncodeOptions::new()).unwrap();
//! let records = decode_stream(&bytes, &EvolutionPolicy::default()).unwrap();
//! assert_eq!(records[0].as_datum(), Some(&datums[0]));
//! ```
//!
//! # Modules
//!
//! - [`model`]: Records, enums, tag trees, values and builders
//! - [`codec`]: Binary encoding/decoding with compression support
//! - [`evolution`]: Schema versions and compatibility rules
//! - [`validate`]: Tag resolution and version-chain checks
//! - [`error`]: Error types
//! - [`limits`]: Wire constants and decode limits
//!
//! # Schema Evolution
//!
//! Producers and consumers may disagree on schema version. Decoding takes
//! an explicit [`EvolutionPolicy`]: ordinals past the consumer's range fall
//! back to a catch-all member where the family has one, fields the producer
//! predates take their documented defaults, and in length-prefixed streams
//! unknown record kinds and trailing fields are skipped.
//!
//! # Security
//!
//! The decoder is designed to safely handle untrusted input:
//! - All allocations are bounded by limits
//! - Varints are limited to prevent overflow
//! - Tag tree recursion is bounded by the policy's depth limit
//! - Invalid data is rejected with descriptive errors

pub mod codec;
pub mod error;
pub mod evolution;
pub mod limits;
pub mod model;
pub mod validate;

pub use codec::{
    decode_datum, decode_stream, decode_value_tag, encode_datum, encode_stream,
    encode_stream_compressed, encode_value_tag, DatumStream, EncodeOptions, Framing, Record,
    StreamWriter,
};
pub use error::{BuildError, DecodeError, EncodeError, ErrorScope, ValidationError};
pub use evolution::{DecodeContext, EvolutionPolicy, SchemaVersion};
pub use model::{DatumKind, TcCdmDatum, Uuid};
pub use validate::{validate_tag_tree, validate_version_chain, TagTable};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
