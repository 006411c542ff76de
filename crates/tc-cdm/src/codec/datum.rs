//! Envelope encoding/decoding.
//!
//! An envelope is the datum kind byte followed by the arm's payload. In
//! length-prefixed framing a varint payload length sits between the two, so
//! a reader can step over records it cannot or will not decode.

use tracing::{debug, trace, warn};

use crate::codec::primitives::{Reader, Writer};
use crate::codec::record::{
    decode_event, decode_file_object, decode_memory_object, decode_net_flow_object,
    decode_principal, decode_simple_edge, decode_src_sink_object, decode_subject, encode_event,
    encode_file_object, encode_memory_object, encode_net_flow_object, encode_principal,
    encode_simple_edge, encode_src_sink_object, encode_subject,
};
use crate::codec::tag::{decode_tag_tree, encode_tag_tree};
use crate::error::{DecodeError, EncodeError};
use crate::evolution::{DecodeContext, SchemaVersion};
use crate::limits::{DEFAULT_MAX_TAG_DEPTH, MAX_RECORD_SIZE};
use crate::model::{DatumKind, TcCdmDatum};

/// How envelopes are delimited on a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// `[kind][length][payload]`; unknown kinds can be skipped.
    #[default]
    LengthPrefixed,
    /// `[kind][payload]`; an unknown kind ends the stream.
    Bare,
}

/// Options for encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Schema version to write. Members, kinds and fields the version lacks
    /// are rejected or omitted.
    pub version: SchemaVersion,
    pub framing: Framing,
    /// Deepest provenance tag tree the encoder will emit.
    pub max_tag_depth: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            version: SchemaVersion::CURRENT,
            framing: Framing::LengthPrefixed,
            max_tag_depth: DEFAULT_MAX_TAG_DEPTH,
        }
    }
}

impl EncodeOptions {
    /// Creates default options: current version, length-prefixed framing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options for the bare `[kind][payload]` layout.
    pub fn bare() -> Self {
        Self {
            framing: Framing::Bare,
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: SchemaVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_max_tag_depth(mut self, max_tag_depth: usize) -> Self {
        self.max_tag_depth = max_tag_depth;
        self
    }
}

/// One decoded envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Datum(TcCdmDatum),
    /// A length-prefixed record whose kind this consumer does not know.
    Opaque { kind: u8, payload: Vec<u8> },
}

impl Record {
    pub fn into_datum(self) -> Option<TcCdmDatum> {
        match self {
            Record::Datum(datum) => Some(datum),
            Record::Opaque { .. } => None,
        }
    }

    pub fn as_datum(&self) -> Option<&TcCdmDatum> {
        match self {
            Record::Datum(datum) => Some(datum),
            Record::Opaque { .. } => None,
        }
    }
}

/// The raw pieces of one envelope before its payload is interpreted.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame<'a> {
    pub kind: u8,
    /// The length-prefixed payload, or `None` in bare framing where the
    /// payload is only delimited by decoding it.
    pub payload: Option<&'a [u8]>,
}

// =============================================================================
// DECODING
// =============================================================================

/// Decodes one envelope at the reader's position.
pub fn decode_datum(
    reader: &mut Reader<'_>,
    ctx: &DecodeContext<'_>,
    framing: Framing,
) -> Result<Record, DecodeError> {
    let frame = read_frame(reader, framing)?;
    decode_frame(frame, reader, ctx)
}

/// Reads the kind byte and, when framed, the bounded payload.
///
/// Errors here lose track of record boundaries.
pub(crate) fn read_frame<'a>(
    reader: &mut Reader<'a>,
    framing: Framing,
) -> Result<Frame<'a>, DecodeError> {
    let kind = reader.read_byte("datum kind")?;
    let payload = match framing {
        Framing::Bare => None,
        Framing::LengthPrefixed => {
            let len = reader.read_count(MAX_RECORD_SIZE, "record length")?;
            Some(reader.read_bytes(len, "record payload")?)
        }
    };
    Ok(Frame { kind, payload })
}

/// Interprets a frame. For bare frames the payload is read from `reader`.
pub(crate) fn decode_frame(
    frame: Frame<'_>,
    reader: &mut Reader<'_>,
    ctx: &DecodeContext<'_>,
) -> Result<Record, DecodeError> {
    let known = DatumKind::from_code(frame.kind)
        .filter(|kind| ctx.policy().version().knows_kind(*kind));

    let Some(payload) = frame.payload else {
        let kind = known.ok_or(DecodeError::UnknownDatumKind { kind: frame.kind })?;
        trace!(kind = kind.name(), "decoding bare record");
        return decode_payload(reader, kind, ctx).map(Record::Datum);
    };

    let Some(kind) = known else {
        if ctx.policy().skip_unknown_kinds() {
            warn!(
                kind = frame.kind,
                len = payload.len(),
                "skipping record of unknown kind"
            );
            return Ok(Record::Opaque {
                kind: frame.kind,
                payload: payload.to_vec(),
            });
        }
        return Err(DecodeError::UnknownDatumKind { kind: frame.kind });
    };

    trace!(kind = kind.name(), len = payload.len(), "decoding framed record");
    let mut body = Reader::new(payload);
    let datum = decode_payload(&mut body, kind, ctx)?;
    if !body.is_empty() {
        if !ctx.writer_is_newer() {
            return Err(DecodeError::RecordLengthMismatch {
                kind: frame.kind,
                declared: payload.len(),
                consumed: body.position(),
            });
        }
        let skipped = body.skip_rest();
        debug!(
            kind = kind.name(),
            skipped,
            writer = %ctx.writer(),
            "skipped trailing fields from newer writer"
        );
    }
    Ok(Record::Datum(datum))
}

fn decode_payload(
    reader: &mut Reader<'_>,
    kind: DatumKind,
    ctx: &DecodeContext<'_>,
) -> Result<TcCdmDatum, DecodeError> {
    Ok(match kind {
        DatumKind::Subject => TcCdmDatum::Subject(decode_subject(reader, ctx)?),
        DatumKind::Event => TcCdmDatum::Event(decode_event(reader, ctx)?),
        DatumKind::NetFlowObject => TcCdmDatum::NetFlowObject(decode_net_flow_object(reader, ctx)?),
        DatumKind::FileObject => TcCdmDatum::FileObject(decode_file_object(reader, ctx)?),
        DatumKind::SrcSinkObject => TcCdmDatum::SrcSinkObject(decode_src_sink_object(reader, ctx)?),
        DatumKind::MemoryObject => TcCdmDatum::MemoryObject(decode_memory_object(reader, ctx)?),
        DatumKind::Principal => TcCdmDatum::Principal(decode_principal(reader, ctx)?),
        DatumKind::SimpleEdge => TcCdmDatum::SimpleEdge(decode_simple_edge(reader, ctx)?),
        DatumKind::ProvenanceTagNode => {
            reader.require("ProvenanceTagNode", "value")?;
            TcCdmDatum::ProvenanceTagNode(decode_tag_tree(reader, ctx)?)
        }
    })
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes one envelope. If encoding fails nothing is left in `writer`.
pub fn encode_datum(
    writer: &mut Writer,
    datum: &TcCdmDatum,
    options: &EncodeOptions,
) -> Result<(), EncodeError> {
    let kind = datum.kind();
    if !options.version.knows_kind(kind) {
        return Err(EncodeError::UnknownDatumKind {
            kind: kind.code(),
            version: options.version.as_u8(),
        });
    }

    // On error the writer is rolled back so later envelopes stay aligned.
    let start = writer.len();
    let result = encode_envelope(writer, kind, datum, options);
    if result.is_err() {
        writer.truncate(start);
    }
    result
}

fn encode_envelope(
    writer: &mut Writer,
    kind: DatumKind,
    datum: &TcCdmDatum,
    options: &EncodeOptions,
) -> Result<(), EncodeError> {
    writer.write_byte(kind.code());
    match options.framing {
        Framing::Bare => encode_payload(writer, datum, options),
        Framing::LengthPrefixed => {
            let mut payload = Writer::with_capacity(128);
            encode_payload(&mut payload, datum, options)?;
            writer.write_count(payload.len(), MAX_RECORD_SIZE, "record payload")?;
            writer.write_bytes(payload.as_bytes());
            Ok(())
        }
    }
}

fn encode_payload(
    writer: &mut Writer,
    datum: &TcCdmDatum,
    options: &EncodeOptions,
) -> Result<(), EncodeError> {
    match datum {
        TcCdmDatum::ProvenanceTagNode(node) => encode_tag_tree(writer, node, options),
        TcCdmDatum::Subject(subject) => encode_subject(writer, subject, options),
        TcCdmDatum::Event(event) => encode_event(writer, event, options),
        TcCdmDatum::NetFlowObject(flow) => encode_net_flow_object(writer, flow, options),
        TcCdmDatum::FileObject(file) => encode_file_object(writer, file, options),
        TcCdmDatum::SrcSinkObject(src_sink) => encode_src_sink_object(writer, src_sink, options),
        TcCdmDatum::MemoryObject(memory) => encode_memory_object(writer, memory, options),
        TcCdmDatum::Principal(principal) => encode_principal(writer, principal, options),
        TcCdmDatum::SimpleEdge(edge) => encode_simple_edge(writer, edge, options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::EvolutionPolicy;
    use crate::model::{
        EdgeType, Event, EventType, InstrumentationSource, ProvenanceTagNode, SimpleEdge, TagRun,
        TagRuns, TagValue, Value,
    };

    fn edge() -> TcCdmDatum {
        SimpleEdge::builder()
            .from_uuid([0x11; 32])
            .to_uuid([0x22; 32])
            .edge_type(EdgeType::EventAffectsFile)
            .timestamp_micros(1000)
            .build()
            .unwrap()
            .into()
    }

    fn decode_one(bytes: &[u8], policy: &EvolutionPolicy, framing: Framing) -> Result<Record, DecodeError> {
        let ctx = DecodeContext::new(policy, SchemaVersion::CURRENT);
        let mut reader = Reader::new(bytes);
        let record = decode_datum(&mut reader, &ctx, framing)?;
        assert!(reader.is_empty());
        Ok(record)
    }

    #[test]
    fn test_simple_edge_dispatch() {
        for options in [EncodeOptions::new(), EncodeOptions::bare()] {
            let mut writer = Writer::new();
            encode_datum(&mut writer, &edge(), &options).unwrap();
            assert_eq!(writer.as_bytes()[0], DatumKind::SimpleEdge.code());

            let record = decode_one(writer.as_bytes(), &EvolutionPolicy::default(), options.framing);
            assert_eq!(record, Ok(Record::Datum(edge())));
        }
    }

    #[test]
    fn test_bare_unknown_kind_is_fatal() {
        let bytes = [42u8, 0, 0, 0];
        let ctx_policy = EvolutionPolicy::default();
        let ctx = DecodeContext::new(&ctx_policy, SchemaVersion::CURRENT);
        assert_eq!(
            decode_datum(&mut Reader::new(&bytes), &ctx, Framing::Bare),
            Err(DecodeError::UnknownDatumKind { kind: 42 })
        );
    }

    #[test]
    fn test_framed_unknown_kind_is_opaque() {
        let bytes = [42u8, 3, 0xAA, 0xBB, 0xCC];
        let record = decode_one(&bytes, &EvolutionPolicy::default(), Framing::LengthPrefixed);
        assert_eq!(
            record,
            Ok(Record::Opaque {
                kind: 42,
                payload: vec![0xAA, 0xBB, 0xCC],
            })
        );

        let strict = EvolutionPolicy::default().with_skip_unknown_kinds(false);
        assert_eq!(
            decode_one(&bytes, &strict, Framing::LengthPrefixed),
            Err(DecodeError::UnknownDatumKind { kind: 42 })
        );
    }

    #[test]
    fn test_tag_node_kind_unknown_to_v12() {
        let node: TcCdmDatum = ProvenanceTagNode::leaf(TagValue::Ref(1)).into();
        let mut writer = Writer::new();
        assert_eq!(
            encode_datum(
                &mut writer,
                &node,
                &EncodeOptions::new().with_version(SchemaVersion::V12)
            ),
            Err(EncodeError::UnknownDatumKind { kind: 9, version: 12 })
        );

        encode_datum(&mut writer, &node, &EncodeOptions::new()).unwrap();
        let old = EvolutionPolicy::new(SchemaVersion::V12);
        let record = decode_one(writer.as_bytes(), &old, Framing::LengthPrefixed).unwrap();
        assert!(matches!(record, Record::Opaque { kind: 9, .. }));
    }

    #[test]
    fn test_same_version_trailing_bytes_rejected() {
        let mut payload = Writer::new();
        encode_payload(&mut payload, &edge(), &EncodeOptions::new()).unwrap();
        payload.write_byte(0xEE);

        let mut writer = Writer::new();
        writer.write_byte(DatumKind::SimpleEdge.code());
        writer.write_varint(payload.len() as u64);
        writer.write_bytes(payload.as_bytes());

        let declared = payload.len();
        assert_eq!(
            decode_one(writer.as_bytes(), &EvolutionPolicy::default(), Framing::LengthPrefixed),
            Err(DecodeError::RecordLengthMismatch {
                kind: 8,
                declared,
                consumed: declared - 1,
            })
        );
    }

    #[test]
    fn test_failed_encode_leaves_writer_untouched() {
        // Runs cover 4 of the 10 bytes, which the encoder refuses.
        let bad_parameter = Value::builder()
            .size(10)
            .tag(TagRuns::new(vec![TagRun::new(4, 0)]))
            .build()
            .unwrap();
        let event: TcCdmDatum = Event::builder()
            .uuid([0x33; 32])
            .event_type(EventType::Read)
            .thread_id(7)
            .source(InstrumentationSource::LinuxAuditTrace)
            .parameter(bad_parameter)
            .build()
            .unwrap()
            .into();

        for options in [EncodeOptions::new(), EncodeOptions::bare()] {
            let mut writer = Writer::new();
            encode_datum(&mut writer, &edge(), &options).unwrap();
            let before = writer.len();

            assert!(matches!(
                encode_datum(&mut writer, &event, &options),
                Err(EncodeError::MalformedRunLength { .. })
            ));
            assert_eq!(writer.len(), before);

            encode_datum(&mut writer, &edge(), &options).unwrap();
            let policy = EvolutionPolicy::default();
            let ctx = DecodeContext::new(&policy, SchemaVersion::CURRENT);
            let mut reader = Reader::new(writer.as_bytes());
            for _ in 0..2 {
                assert_eq!(
                    decode_datum(&mut reader, &ctx, options.framing),
                    Ok(Record::Datum(edge()))
                );
            }
            assert!(reader.is_empty());
        }
    }

    #[test]
    fn test_version_rejection_writes_nothing() {
        let node: TcCdmDatum = ProvenanceTagNode::leaf(TagValue::Ref(1)).into();
        let options = EncodeOptions::bare().with_version(SchemaVersion::V12);
        let mut writer = Writer::new();
        assert!(encode_datum(&mut writer, &node, &options).is_err());
        assert!(writer.is_empty());
    }

    #[test]
    fn test_framed_missing_required_field() {
        // SimpleEdge payload holding only the two uuids and the edge type.
        let mut payload = Writer::new();
        payload.write_uuid(&[1; 32]);
        payload.write_uuid(&[2; 32]);
        payload.write_varint(EdgeType::EventAffectsFile as u64);

        let mut writer = Writer::new();
        writer.write_byte(DatumKind::SimpleEdge.code());
        writer.write_varint(payload.len() as u64);
        writer.write_bytes(payload.as_bytes());

        assert_eq!(
            decode_one(writer.as_bytes(), &EvolutionPolicy::default(), Framing::LengthPrefixed),
            Err(DecodeError::MissingRequiredField {
                record: "SimpleEdge",
                field: "timestamp_micros",
            })
        );
    }
}
