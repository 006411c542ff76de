//! Binary encoding/decoding for CDM records and streams.
//!
//! Layers, leaves first: primitives, tag trees and values, vertex/edge
//! records, the datum envelope, and whole streams with optional zstd
//! compression.

pub mod datum;
pub mod primitives;
pub mod record;
pub mod stream;
pub mod tag;
pub mod value;

pub use datum::{decode_datum, encode_datum, EncodeOptions, Framing, Record};
pub use primitives::{zigzag_decode, zigzag_encode, Reader, Writer};
pub use stream::{
    decode_stream, decompress, encode_stream, encode_stream_compressed, read_header,
    DatumStream, StreamHeader, StreamWriter,
};
pub use tag::{decode_tag_tree, encode_tag_tree};
pub use value::{decode_value, decode_value_tag, encode_value, encode_value_tag};
