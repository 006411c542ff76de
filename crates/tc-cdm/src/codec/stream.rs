//! Stream encoding/decoding.
//!
//! A stream is a header (magic `TCCD`, writer schema version, flags) followed
//! by envelopes until end of input. The compressed form is `TCCDZ`, the
//! uncompressed size as a varint, then one zstd frame holding a whole
//! uncompressed stream.

use std::io::{self, Read};

use tracing::{debug, trace, warn};

use crate::codec::datum::{decode_frame, encode_datum, read_frame, EncodeOptions, Framing, Record};
use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::evolution::{DecodeContext, EvolutionPolicy, SchemaVersion};
use crate::limits::{
    FLAG_LENGTH_PREFIXED, HEADER_RESERVED_MASK, MAGIC_COMPRESSED, MAGIC_UNCOMPRESSED,
    MAX_STREAM_SIZE,
};
use crate::model::TcCdmDatum;

/// Size of the uncompressed stream header.
pub const HEADER_LEN: usize = 6;

/// Parsed stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    /// Schema version the producer wrote.
    pub version: SchemaVersion,
    pub framing: Framing,
}

impl StreamHeader {
    fn flags(&self) -> u8 {
        match self.framing {
            Framing::LengthPrefixed => FLAG_LENGTH_PREFIXED,
            Framing::Bare => 0,
        }
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// Decompresses a `TCCDZ` stream, returning the uncompressed bytes.
///
/// Use this with [`DatumStream::new`] to iterate a compressed stream without
/// collecting it:
///
/// ```ignore
/// let raw = decompress(&compressed)?;
/// for record in DatumStream::new(&raw, &policy) {
///     // ...
/// }
/// ```
pub fn decompress(input: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if input.len() < MAGIC_COMPRESSED.len() {
        return Err(DecodeError::TruncatedStream { context: "magic" });
    }
    if &input[..MAGIC_COMPRESSED.len()] != MAGIC_COMPRESSED {
        return Err(DecodeError::InvalidMagic {
            found: first_four(input),
        });
    }
    decompress_zstd(&input[MAGIC_COMPRESSED.len()..])
}

fn decompress_zstd(compressed: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut reader = Reader::new(compressed);
    let declared_size = reader.read_count(MAX_STREAM_SIZE, "uncompressed_size")?;

    let mut decoder = zstd::Decoder::new(reader.remaining())
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;

    // Read one byte past the declared size so an oversized frame is caught
    // without inflating it completely.
    let mut decompressed = Vec::with_capacity(declared_size);
    (&mut decoder)
        .take(declared_size as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;

    if decompressed.len() != declared_size {
        return Err(DecodeError::UncompressedSizeMismatch {
            declared: declared_size,
            actual: decompressed.len(),
        });
    }

    Ok(decompressed)
}

fn first_four(input: &[u8]) -> [u8; 4] {
    let mut found = [0u8; 4];
    let n = input.len().min(4);
    found[..n].copy_from_slice(&input[..n]);
    found
}

/// Reads and checks the stream header.
///
/// Compressed input is refused with [`DecodeError::CompressedStream`]; pass
/// it through [`decompress`] first.
pub fn read_header(
    reader: &mut Reader<'_>,
    policy: &EvolutionPolicy,
) -> Result<StreamHeader, DecodeError> {
    if reader.remaining().starts_with(MAGIC_COMPRESSED) {
        return Err(DecodeError::CompressedStream);
    }
    let magic = reader.read_bytes(MAGIC_UNCOMPRESSED.len(), "magic")?;
    if magic != MAGIC_UNCOMPRESSED {
        return Err(DecodeError::InvalidMagic {
            found: first_four(magic),
        });
    }

    let raw_version = reader.read_byte("schema version")?;
    let version = SchemaVersion::from_u8(raw_version)
        .ok_or(DecodeError::UnsupportedVersion { version: raw_version })?;

    let flags = reader.read_byte("header flags")?;
    if flags & HEADER_RESERVED_MASK != 0 {
        return Err(DecodeError::ReservedBitsSet {
            context: "stream header flags",
        });
    }
    let framing = if flags & FLAG_LENGTH_PREFIXED != 0 {
        Framing::LengthPrefixed
    } else {
        Framing::Bare
    };

    // Without lengths there is no way past a field we do not know.
    if framing == Framing::Bare && version > policy.version() {
        return Err(DecodeError::UnsupportedVersion { version: raw_version });
    }

    debug!(
        writer = %version,
        local = %policy.version(),
        ?framing,
        "read stream header"
    );
    Ok(StreamHeader { version, framing })
}

/// Iterator over the records of an uncompressed stream.
///
/// Yields `Err` for a bad record and keeps going when the error stayed inside
/// a length-prefixed payload; after any other error the iterator is fused.
#[derive(Debug)]
pub struct DatumStream<'a, 'p> {
    reader: Reader<'a>,
    policy: &'p EvolutionPolicy,
    header: Option<StreamHeader>,
    done: bool,
}

impl<'a, 'p> DatumStream<'a, 'p> {
    pub fn new(input: &'a [u8], policy: &'p EvolutionPolicy) -> Self {
        Self {
            reader: Reader::new(input),
            policy,
            header: None,
            done: false,
        }
    }

    /// The stream header, once the first call to `next` has read it.
    pub fn header(&self) -> Option<StreamHeader> {
        self.header
    }

    /// Byte offset of the next unread record.
    pub fn position(&self) -> usize {
        self.reader.position()
    }

    fn fail(&mut self, err: DecodeError) -> Option<Result<Record, DecodeError>> {
        self.done = true;
        Some(Err(err))
    }
}

impl Iterator for DatumStream<'_, '_> {
    type Item = Result<Record, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let header = match self.header {
            Some(header) => header,
            None => match read_header(&mut self.reader, self.policy) {
                Ok(header) => {
                    self.header = Some(header);
                    header
                }
                Err(err) => return self.fail(err),
            },
        };

        if self.reader.is_empty() {
            self.done = true;
            return None;
        }

        let offset = self.reader.position();
        let frame = match read_frame(&mut self.reader, header.framing) {
            Ok(frame) => frame,
            Err(err) => return self.fail(err),
        };

        let ctx = DecodeContext::new(self.policy, header.version);
        match decode_frame(frame, &mut self.reader, &ctx) {
            Ok(record) => Some(Ok(record)),
            Err(err) if frame.payload.is_some() => {
                trace!(offset, error = %err, scope = ?err.scope(), "bad framed record");
                Some(Err(err))
            }
            Err(err) => self.fail(err),
        }
    }
}

/// Decodes a whole stream, compressed or not, stopping at the first error.
pub fn decode_stream(input: &[u8], policy: &EvolutionPolicy) -> Result<Vec<Record>, DecodeError> {
    if input.len() >= MAGIC_COMPRESSED.len() && &input[..MAGIC_COMPRESSED.len()] == MAGIC_COMPRESSED
    {
        let decompressed = decompress_zstd(&input[MAGIC_COMPRESSED.len()..])?;
        return DatumStream::new(&decompressed, policy).collect();
    }
    if input.len() > MAX_STREAM_SIZE {
        return Err(DecodeError::LengthExceedsLimit {
            field: "stream",
            len: input.len(),
            max: MAX_STREAM_SIZE,
        });
    }
    DatumStream::new(input, policy).collect()
}

// =============================================================================
// ENCODING
// =============================================================================

fn write_header(writer: &mut Writer, options: &EncodeOptions) {
    let header = StreamHeader {
        version: options.version,
        framing: options.framing,
    };
    writer.write_bytes(MAGIC_UNCOMPRESSED);
    writer.write_byte(header.version.as_u8());
    writer.write_byte(header.flags());
}

/// Encodes datums as one uncompressed stream.
pub fn encode_stream(datums: &[TcCdmDatum], options: EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    let mut writer = Writer::with_capacity(HEADER_LEN + datums.len() * 128);
    write_header(&mut writer, &options);
    for datum in datums {
        encode_datum(&mut writer, datum, &options)?;
    }
    Ok(writer.into_bytes())
}

/// Encodes datums as one zstd-compressed stream.
pub fn encode_stream_compressed(
    datums: &[TcCdmDatum],
    level: i32,
    options: EncodeOptions,
) -> Result<Vec<u8>, EncodeError> {
    let uncompressed = encode_stream(datums, options)?;

    let compressed = zstd::encode_all(uncompressed.as_slice(), level)
        .map_err(|e| EncodeError::CompressionFailed(e.to_string()))?;

    let mut writer = Writer::with_capacity(MAGIC_COMPRESSED.len() + 10 + compressed.len());
    writer.write_bytes(MAGIC_COMPRESSED);
    writer.write_varint(uncompressed.len() as u64);
    writer.write_bytes(&compressed);

    Ok(writer.into_bytes())
}

/// Incremental stream encoder over an `io::Write` sink.
///
/// The header goes out with the first datum (or on `finish` for an empty
/// stream). Each envelope is encoded in full before any of it is written, so
/// an encode error never leaves a partial record in the sink.
///
/// An io error can still strike halfway through `write_all`, leaving part of
/// a record in the sink. The writer is then poisoned: every later
/// `write_datum` and `finish` returns [`EncodeError::SinkPoisoned`].
#[derive(Debug)]
pub struct StreamWriter<W: io::Write> {
    sink: W,
    options: EncodeOptions,
    buf: Writer,
    header_written: bool,
    poisoned: bool,
    records: u64,
}

impl<W: io::Write> StreamWriter<W> {
    pub fn new(sink: W, options: EncodeOptions) -> Self {
        Self {
            sink,
            options,
            buf: Writer::with_capacity(256),
            header_written: false,
            poisoned: false,
            records: 0,
        }
    }

    /// Number of datums written so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// True once a failed write has left the sink in an unknown state.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn write_datum(&mut self, datum: &TcCdmDatum) -> Result<(), EncodeError> {
        if self.poisoned {
            return Err(EncodeError::SinkPoisoned);
        }
        self.buf.truncate(0);
        if !self.header_written {
            write_header(&mut self.buf, &self.options);
        }
        if let Err(err) = encode_datum(&mut self.buf, datum, &self.options) {
            self.buf.truncate(0);
            return Err(err);
        }
        self.flush_buf()?;
        self.header_written = true;
        self.records += 1;
        trace!(kind = datum.kind().name(), records = self.records, "wrote datum");
        Ok(())
    }

    /// Flushes the sink and returns it.
    pub fn finish(mut self) -> Result<W, EncodeError> {
        if self.poisoned {
            return Err(EncodeError::SinkPoisoned);
        }
        if !self.header_written {
            self.buf.truncate(0);
            write_header(&mut self.buf, &self.options);
            self.flush_buf()?;
        }
        self.sink
            .flush()
            .map_err(|e| EncodeError::Io(e.to_string()))?;
        Ok(self.sink)
    }

    fn flush_buf(&mut self) -> Result<(), EncodeError> {
        self.sink.write_all(self.buf.as_bytes()).map_err(|e| {
            self.poisoned = true;
            warn!(records = self.records, error = %e, "sink write failed, stream writer poisoned");
            EncodeError::Io(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AbstractObject, EdgeType, Event, EventType, FileObject, InstrumentationSource,
        MemoryObject, SimpleEdge,
    };

    const SOURCE: InstrumentationSource = InstrumentationSource::LinuxAuditTrace;

    fn file(uuid: u8) -> TcCdmDatum {
        FileObject::builder()
            .uuid([uuid; 32])
            .base(AbstractObject::builder().source(SOURCE).build().unwrap())
            .url("/tmp/x")
            .is_pipe(true)
            .version(2)
            .build()
            .unwrap()
            .into()
    }

    fn edge() -> TcCdmDatum {
        SimpleEdge::builder()
            .from_uuid([1; 32])
            .to_uuid([2; 32])
            .edge_type(EdgeType::EventAffectsFile)
            .timestamp_micros(1000)
            .build()
            .unwrap()
            .into()
    }

    fn blind_event() -> TcCdmDatum {
        Event::builder()
            .uuid([3; 32])
            .event_type(EventType::Blind)
            .thread_id(1)
            .source(SOURCE)
            .build()
            .unwrap()
            .into()
    }

    fn datums(records: Vec<Record>) -> Vec<TcCdmDatum> {
        records.into_iter().filter_map(Record::into_datum).collect()
    }

    #[test]
    fn test_stream_roundtrip() {
        let input = vec![file(9), edge(), blind_event()];
        let encoded = encode_stream(&input, EncodeOptions::new()).unwrap();
        assert_eq!(&encoded[..4], b"TCCD");
        assert_eq!(encoded[4], 13);
        assert_eq!(encoded[5], FLAG_LENGTH_PREFIXED);

        let decoded = decode_stream(&encoded, &EvolutionPolicy::default()).unwrap();
        assert_eq!(datums(decoded), input);
    }

    #[test]
    fn test_compressed_roundtrip() {
        let input: Vec<TcCdmDatum> = (0..50).map(file).collect();
        let compressed = encode_stream_compressed(&input, 3, EncodeOptions::new()).unwrap();
        assert_eq!(&compressed[..5], b"TCCDZ");

        let decoded = decode_stream(&compressed, &EvolutionPolicy::default()).unwrap();
        assert_eq!(datums(decoded), input);

        let raw = decompress(&compressed).unwrap();
        assert_eq!(raw, encode_stream(&input, EncodeOptions::new()).unwrap());
    }

    #[test]
    fn test_header_errors() {
        let policy = EvolutionPolicy::default();
        assert!(matches!(
            decode_stream(b"XXXX\x0d\x01", &policy),
            Err(DecodeError::InvalidMagic { found }) if &found == b"XXXX"
        ));
        assert_eq!(
            decode_stream(b"TCCD\x63\x01", &policy),
            Err(DecodeError::UnsupportedVersion { version: 99 })
        );
        assert_eq!(
            decode_stream(b"TCCD\x0d\x03", &policy),
            Err(DecodeError::ReservedBitsSet {
                context: "stream header flags",
            })
        );
        assert_eq!(
            decode_stream(b"TCC", &policy),
            Err(DecodeError::TruncatedStream { context: "magic" })
        );
    }

    #[test]
    fn test_iterator_refuses_compressed_input() {
        let policy = EvolutionPolicy::default();
        let compressed = encode_stream_compressed(&[edge()], 3, EncodeOptions::new()).unwrap();

        let results: Vec<_> = DatumStream::new(&compressed, &policy).collect();
        assert_eq!(results, vec![Err(DecodeError::CompressedStream)]);

        let raw = decompress(&compressed).unwrap();
        let results: Vec<_> = DatumStream::new(&raw, &policy).collect();
        assert_eq!(results, vec![Ok(Record::Datum(edge()))]);
    }

    #[test]
    fn test_empty_stream() {
        let encoded = encode_stream(&[], EncodeOptions::new()).unwrap();
        assert_eq!(encoded.len(), HEADER_LEN);
        assert_eq!(decode_stream(&encoded, &EvolutionPolicy::default()), Ok(vec![]));
    }

    #[test]
    fn test_old_reader_skips_new_fields_and_kinds() {
        let node = crate::model::ProvenanceTagNode::leaf(crate::model::TagValue::Ref(4));
        let input = vec![file(1), node.into(), blind_event(), edge()];
        let encoded = encode_stream(&input, EncodeOptions::new()).unwrap();

        let old = EvolutionPolicy::new(SchemaVersion::V12);
        let decoded = decode_stream(&encoded, &old).unwrap();
        assert_eq!(decoded.len(), 4);

        let Some(TcCdmDatum::FileObject(f)) = decoded[0].as_datum() else {
            panic!("expected file object, got {:?}", decoded[0]);
        };
        assert!(!f.is_pipe());
        assert_eq!(f.version(), 1);

        assert!(matches!(decoded[1], Record::Opaque { kind: 9, .. }));

        let Some(TcCdmDatum::Event(e)) = decoded[2].as_datum() else {
            panic!("expected event, got {:?}", decoded[2]);
        };
        assert_eq!(e.event_type(), EventType::Unknown);

        assert_eq!(decoded[3].as_datum(), Some(&edge()));
    }

    #[test]
    fn test_bare_stream_from_newer_writer_rejected() {
        let encoded = encode_stream(&[edge()], EncodeOptions::bare()).unwrap();
        assert_eq!(encoded[5], 0);

        let current = decode_stream(&encoded, &EvolutionPolicy::default()).unwrap();
        assert_eq!(datums(current), vec![edge()]);

        let old = EvolutionPolicy::new(SchemaVersion::V12);
        assert_eq!(
            decode_stream(&encoded, &old),
            Err(DecodeError::UnsupportedVersion { version: 13 })
        );
    }

    #[test]
    fn test_bare_unknown_kind_fuses_stream() {
        let mut encoded = encode_stream(&[edge()], EncodeOptions::bare()).unwrap();
        encoded.push(77);
        encoded.extend_from_slice(&[0u8; 8]);

        let policy = EvolutionPolicy::default();
        let mut stream = DatumStream::new(&encoded, &policy);
        assert_eq!(stream.next(), Some(Ok(Record::Datum(edge()))));
        assert_eq!(stream.next(), Some(Err(DecodeError::UnknownDatumKind { kind: 77 })));
        assert_eq!(stream.next(), None);
    }

    #[test]
    fn test_iterator_continues_after_record_error() {
        let mut writer = Writer::new();
        write_header(&mut writer, &EncodeOptions::new());
        encode_datum(&mut writer, &edge(), &EncodeOptions::new()).unwrap();

        // A SimpleEdge whose edge type ordinal is out of range.
        let mut payload = Writer::new();
        payload.write_uuid(&[1; 32]);
        payload.write_uuid(&[2; 32]);
        payload.write_varint(40);
        payload.write_i64(5);
        payload.write_byte(0);
        writer.write_byte(8);
        writer.write_varint(payload.len() as u64);
        writer.write_bytes(payload.as_bytes());

        encode_datum(&mut writer, &file(5), &EncodeOptions::new()).unwrap();

        let policy = EvolutionPolicy::default();
        let results: Vec<_> = DatumStream::new(writer.as_bytes(), &policy).collect();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Ok(Record::Datum(edge())));
        assert_eq!(
            results[1],
            Err(DecodeError::UnknownEnumValue {
                family: "EdgeType",
                ordinal: 40,
            })
        );
        assert_eq!(results[2], Ok(Record::Datum(file(5))));
    }

    #[test]
    fn test_truncated_frame_is_fatal() {
        let mut encoded = encode_stream(&[edge(), edge()], EncodeOptions::new()).unwrap();
        encoded.truncate(encoded.len() - 3);

        let policy = EvolutionPolicy::default();
        let results: Vec<_> = DatumStream::new(&encoded, &policy).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(
            results[1],
            Err(DecodeError::TruncatedStream {
                context: "record payload",
            })
        );
    }

    #[test]
    fn test_stream_writer_matches_batch_encoding() {
        let input = vec![edge(), file(2)];
        let mut sink = StreamWriter::new(Vec::new(), EncodeOptions::new());
        for datum in &input {
            sink.write_datum(datum).unwrap();
        }
        assert_eq!(sink.records(), 2);
        let bytes = sink.finish().unwrap();
        assert_eq!(bytes, encode_stream(&input, EncodeOptions::new()).unwrap());
    }

    #[test]
    fn test_stream_writer_error_leaves_sink_clean() {
        let v12 = EncodeOptions::new().with_version(SchemaVersion::V12);
        let mut sink = StreamWriter::new(Vec::new(), v12);
        assert!(sink.write_datum(&blind_event()).is_err());

        let memory: TcCdmDatum = MemoryObject::builder()
            .uuid([4; 32])
            .base(AbstractObject::builder().source(SOURCE).build().unwrap())
            .memory_address(0x1000)
            .build()
            .unwrap()
            .into();
        sink.write_datum(&memory).unwrap();
        let bytes = sink.finish().unwrap();
        assert_eq!(bytes, encode_stream(&[memory], v12).unwrap());
    }

    /// Accepts `budget` bytes, then fails every write.
    struct ShortSink {
        written: Vec<u8>,
        budget: usize,
    }

    impl io::Write for ShortSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::other("disk full"));
            }
            let n = buf.len().min(self.budget);
            self.written.extend_from_slice(&buf[..n]);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_stream_writer_poisoned_by_io_error() {
        let sink = ShortSink {
            written: Vec::new(),
            budget: HEADER_LEN + 10,
        };
        let mut writer = StreamWriter::new(sink, EncodeOptions::new());

        assert!(matches!(writer.write_datum(&edge()), Err(EncodeError::Io(_))));
        assert!(writer.is_poisoned());
        assert_eq!(writer.records(), 0);
        assert_eq!(writer.write_datum(&edge()), Err(EncodeError::SinkPoisoned));
        assert!(matches!(writer.finish(), Err(EncodeError::SinkPoisoned)));
    }

    #[test]
    fn test_stream_writer_empty() {
        let bytes = StreamWriter::new(Vec::new(), EncodeOptions::new())
            .finish()
            .unwrap();
        assert_eq!(bytes, encode_stream(&[], EncodeOptions::new()).unwrap());
    }
}
