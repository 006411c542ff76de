//! Primitive encoding/decoding for the CDM binary format.
//!
//! Implements varints, zigzag signed integers, fixed-width ids, optional
//! fields, strings, lists, properties maps and enum ordinals.

use crate::error::{DecodeError, EncodeError};
use crate::evolution::{check_writable, DecodeContext, SchemaVersion};
use crate::limits::{MAX_LIST_LEN, MAX_MAP_ENTRIES, MAX_STRING_LEN, MAX_VARINT_BYTES};
use crate::model::{CdmEnum, Permission, Properties, Uuid};

const ABSENT: u8 = 0x00;
const PRESENT: u8 = 0x01;

// =============================================================================
// DECODING
// =============================================================================

/// Reader for decoding binary data.
///
/// Wraps a byte slice and provides methods for reading primitives
/// with bounds checking and error handling. A reader over one framed record
/// payload is bounded by that payload, which is what lets
/// [`Reader::require`] tell a missing field from a truncated one.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the current position in the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the remaining bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns the number of remaining bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Consumes the rest of the input.
    pub fn skip_rest(&mut self) -> usize {
        let skipped = self.remaining_len();
        self.pos = self.data.len();
        skipped
    }

    /// Fails with `MissingRequiredField` if the input ends right where a
    /// required field should start.
    #[inline]
    pub fn require(&self, record: &'static str, field: &'static str) -> Result<(), DecodeError> {
        if self.is_empty() {
            return Err(DecodeError::MissingRequiredField { record, field });
        }
        Ok(())
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(DecodeError::TruncatedStream { context })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining_len() {
            return Err(DecodeError::TruncatedStream { context });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads a fixed-width 32-byte uuid.
    #[inline]
    pub fn read_uuid(&mut self, context: &'static str) -> Result<Uuid, DecodeError> {
        let mut id = [0u8; 32];
        id.copy_from_slice(self.read_bytes(32, context)?);
        Ok(id)
    }

    /// Reads the fixed-width 2-byte permission bits.
    pub fn read_permission(&mut self, context: &'static str) -> Result<Permission, DecodeError> {
        let bytes = self.read_bytes(2, context)?;
        Ok(Permission::from_bytes([bytes[0], bytes[1]]))
    }

    /// Reads an unsigned varint (LEB128).
    #[inline]
    pub fn read_varint(&mut self, context: &'static str) -> Result<u64, DecodeError> {
        let mut result: u64 = 0;
        let mut shift = 0;

        for _ in 0..MAX_VARINT_BYTES {
            let byte = self.read_byte(context)?;
            let value = (byte & 0x7F) as u64;

            if shift == 63 && value > 1 {
                return Err(DecodeError::VarintOverflow);
            }

            result |= value << shift;

            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }

        Err(DecodeError::VarintTooLong)
    }

    /// Reads a signed varint (zigzag encoded).
    pub fn read_signed_varint(&mut self, context: &'static str) -> Result<i64, DecodeError> {
        let unsigned = self.read_varint(context)?;
        Ok(zigzag_decode(unsigned))
    }

    /// Reads a zigzag `long`.
    #[inline]
    pub fn read_i64(&mut self, field: &'static str) -> Result<i64, DecodeError> {
        self.read_signed_varint(field)
    }

    /// Reads a zigzag `int`, rejecting values outside 32 bits.
    #[inline]
    pub fn read_i32(&mut self, field: &'static str) -> Result<i32, DecodeError> {
        let value = self.read_signed_varint(field)?;
        i32::try_from(value).map_err(|_| DecodeError::IntegerOverflow { field, value })
    }

    /// Reads a boolean byte (0x00 or 0x01).
    pub fn read_bool(&mut self, field: &'static str) -> Result<bool, DecodeError> {
        match self.read_byte(field)? {
            0x00 => Ok(false),
            0x01 => Ok(true),
            value => Err(DecodeError::InvalidBool { field, value }),
        }
    }

    /// Reads an optional field's presence byte.
    #[inline]
    pub fn read_presence(&mut self, field: &'static str) -> Result<bool, DecodeError> {
        match self.read_byte(field)? {
            ABSENT => Ok(false),
            PRESENT => Ok(true),
            value => Err(DecodeError::InvalidPresence { field, value }),
        }
    }

    /// Reads an optional field: presence byte, then the payload if present.
    pub fn read_optional<T>(
        &mut self,
        field: &'static str,
        read: impl FnOnce(&mut Self) -> Result<T, DecodeError>,
    ) -> Result<Option<T>, DecodeError> {
        if self.read_presence(field)? {
            read(self).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Reads a count prefix, checking it against `max`.
    pub fn read_count(&mut self, max: usize, field: &'static str) -> Result<usize, DecodeError> {
        let raw = self.read_varint(field)?;
        let len = usize::try_from(raw).unwrap_or(usize::MAX);
        if len > max {
            return Err(DecodeError::LengthExceedsLimit { field, len, max });
        }
        Ok(len)
    }

    /// Reads a length-prefixed UTF-8 string.
    #[inline]
    pub fn read_string(
        &mut self,
        max_len: usize,
        field: &'static str,
    ) -> Result<String, DecodeError> {
        let len = self.read_count(max_len, field)?;
        let bytes = self.read_bytes(len, field)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { field })
    }

    /// Reads a length-prefixed byte array.
    pub fn read_bytes_prefixed(
        &mut self,
        max_len: usize,
        field: &'static str,
    ) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_count(max_len, field)?;
        let bytes = self.read_bytes(len, field)?;
        Ok(bytes.to_vec())
    }

    /// Reads a count-prefixed list of strings.
    pub fn read_string_list(&mut self, field: &'static str) -> Result<Vec<String>, DecodeError> {
        let count = self.read_count(MAX_LIST_LEN, field)?;
        let mut items = Vec::with_capacity(count.min(self.remaining_len()));
        for _ in 0..count {
            items.push(self.read_string(MAX_STRING_LEN, field)?);
        }
        Ok(items)
    }

    /// Reads a count-prefixed properties map, rejecting duplicate keys.
    pub fn read_properties(&mut self) -> Result<Properties, DecodeError> {
        let count = self.read_count(MAX_MAP_ENTRIES, "properties")?;
        let mut map = Properties::new();
        for _ in 0..count {
            let key = self.read_string(MAX_STRING_LEN, "properties key")?;
            let value = self.read_string(MAX_STRING_LEN, "properties value")?;
            if map.contains_key(&key) {
                return Err(DecodeError::DuplicateMapKey { key });
            }
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Reads an enum ordinal and resolves it against the consumer's version.
    pub fn read_enum<E: CdmEnum>(
        &mut self,
        ctx: &DecodeContext<'_>,
        field: &'static str,
    ) -> Result<E, DecodeError> {
        let ordinal = self.read_varint(field)?;
        ctx.resolve_enum(ordinal)
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Writer for encoding binary data.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates a new writer with capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a reference to the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discards everything written after `len`.
    pub fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a fixed-width 32-byte uuid.
    #[inline]
    pub fn write_uuid(&mut self, id: &Uuid) {
        self.buf.extend_from_slice(id);
    }

    pub fn write_permission(&mut self, permission: Permission) {
        self.buf.extend_from_slice(permission.as_bytes());
    }

    /// Writes an unsigned varint (LEB128).
    #[inline]
    pub fn write_varint(&mut self, mut value: u64) {
        let mut buf = [0u8; MAX_VARINT_BYTES];
        let mut len = 0;
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            buf[len] = byte;
            len += 1;
            if value == 0 {
                break;
            }
        }
        self.buf.extend_from_slice(&buf[..len]);
    }

    /// Writes a signed varint (zigzag encoded).
    pub fn write_signed_varint(&mut self, value: i64) {
        self.write_varint(zigzag_encode(value));
    }

    #[inline]
    pub fn write_i64(&mut self, value: i64) {
        self.write_signed_varint(value);
    }

    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.write_signed_varint(value as i64);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    /// Writes an optional field: presence byte, then the payload if present.
    pub fn write_optional<T>(
        &mut self,
        value: Option<T>,
        write: impl FnOnce(&mut Self, T) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        match value {
            Some(v) => {
                self.buf.push(PRESENT);
                write(self, v)
            }
            None => {
                self.buf.push(ABSENT);
                Ok(())
            }
        }
    }

    /// Writes a count prefix, checking it against `max`.
    pub fn write_count(
        &mut self,
        len: usize,
        max: usize,
        field: &'static str,
    ) -> Result<(), EncodeError> {
        if len > max {
            return Err(EncodeError::LengthExceedsLimit { field, len, max });
        }
        self.write_varint(len as u64);
        Ok(())
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, s: &str, field: &'static str) -> Result<(), EncodeError> {
        self.write_count(s.len(), MAX_STRING_LEN, field)?;
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    /// Writes a length-prefixed byte array.
    pub fn write_bytes_prefixed(
        &mut self,
        bytes: &[u8],
        max_len: usize,
        field: &'static str,
    ) -> Result<(), EncodeError> {
        self.write_count(bytes.len(), max_len, field)?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    pub fn write_string_list(
        &mut self,
        items: &[String],
        field: &'static str,
    ) -> Result<(), EncodeError> {
        self.write_count(items.len(), MAX_LIST_LEN, field)?;
        for item in items {
            self.write_string(item, field)?;
        }
        Ok(())
    }

    /// Writes a properties map in key order.
    pub fn write_properties(&mut self, map: &Properties) -> Result<(), EncodeError> {
        self.write_count(map.len(), MAX_MAP_ENTRIES, "properties")?;
        for (key, value) in map {
            self.write_string(key, "properties key")?;
            self.write_string(value, "properties value")?;
        }
        Ok(())
    }

    /// Writes an enum ordinal, rejecting members the writer's version lacks.
    pub fn write_enum<E: CdmEnum>(
        &mut self,
        value: E,
        version: SchemaVersion,
    ) -> Result<(), EncodeError> {
        check_writable(value, version)?;
        self.write_varint(value.ordinal() as u64);
        Ok(())
    }
}

// =============================================================================
// ZIGZAG ENCODING
// =============================================================================

/// Encodes a signed integer using zigzag encoding.
///
/// Maps negative numbers to odd positive numbers:
/// 0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, 2 -> 4, ...
#[inline]
pub fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Decodes a zigzag-encoded unsigned integer back to signed.
#[inline]
pub fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ (-((n & 1) as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::EvolutionPolicy;
    use crate::model::{EdgeType, EventType};

    #[test]
    fn test_zigzag_values() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(2), 4);
        for v in [0i64, 1, -1, 127, -128, i64::MAX, i64::MIN] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }
    }

    #[test]
    fn test_varint_roundtrip() {
        for v in [0u64, 1, 127, 128, 255, 256, 16383, 16384, u64::MAX] {
            let mut writer = Writer::new();
            writer.write_varint(v);

            let mut reader = Reader::new(writer.as_bytes());
            assert_eq!(reader.read_varint("test").unwrap(), v, "failed for {}", v);
            assert!(reader.is_empty());
        }
    }

    #[test]
    fn test_varint_too_long_and_overflow() {
        let too_long = [0x80u8; 11];
        assert_eq!(
            Reader::new(&too_long).read_varint("test"),
            Err(DecodeError::VarintTooLong)
        );

        let mut overflow = [0xFFu8; 10];
        overflow[9] = 0x02;
        assert_eq!(
            Reader::new(&overflow).read_varint("test"),
            Err(DecodeError::VarintOverflow)
        );
    }

    #[test]
    fn test_i32_rejects_wide_values() {
        let mut writer = Writer::new();
        writer.write_i64(i32::MAX as i64 + 1);
        assert_eq!(
            Reader::new(writer.as_bytes()).read_i32("pid"),
            Err(DecodeError::IntegerOverflow {
                field: "pid",
                value: i32::MAX as i64 + 1,
            })
        );

        let mut writer = Writer::new();
        writer.write_i32(i32::MIN);
        assert_eq!(Reader::new(writer.as_bytes()).read_i32("pid"), Ok(i32::MIN));
    }

    #[test]
    fn test_optional_presence() {
        let mut writer = Writer::new();
        writer
            .write_optional(Some(42i64), |w, v| {
                w.write_i64(v);
                Ok(())
            })
            .unwrap();
        writer
            .write_optional(None::<i64>, |w, v| {
                w.write_i64(v);
                Ok(())
            })
            .unwrap();

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_optional("a", |r| r.read_i64("a")), Ok(Some(42)));
        assert_eq!(reader.read_optional("b", |r| r.read_i64("b")), Ok(None));
        assert!(reader.is_empty());

        assert_eq!(
            Reader::new(&[0x02]).read_optional("c", |r| r.read_i64("c")),
            Err(DecodeError::InvalidPresence {
                field: "c",
                value: 0x02,
            })
        );
    }

    #[test]
    fn test_uuid_and_permission_are_fixed_width() {
        let id = [9u8; 32];
        let mut writer = Writer::new();
        writer.write_uuid(&id);
        writer.write_permission(Permission::from_bits(0o755));
        assert_eq!(writer.len(), 34);

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_uuid("uuid"), Ok(id));
        assert_eq!(reader.read_permission("permission").unwrap().bits(), 0o755);

        assert_eq!(
            Reader::new(&[0u8; 31]).read_uuid("uuid"),
            Err(DecodeError::TruncatedStream { context: "uuid" })
        );
    }

    #[test]
    fn test_string_roundtrip_and_limits() {
        for s in ["", "hello", "unicode: \u{1F600}"] {
            let mut writer = Writer::new();
            writer.write_string(s, "test").unwrap();
            let mut reader = Reader::new(writer.as_bytes());
            assert_eq!(reader.read_string(1000, "test").unwrap(), s);
        }

        let mut writer = Writer::new();
        writer.write_string("abcdef", "name").unwrap();
        assert_eq!(
            Reader::new(writer.as_bytes()).read_string(3, "name"),
            Err(DecodeError::LengthExceedsLimit {
                field: "name",
                len: 6,
                max: 3,
            })
        );

        assert_eq!(
            Reader::new(&[0x02, 0xC3, 0x28]).read_string(10, "name"),
            Err(DecodeError::InvalidUtf8 { field: "name" })
        );
    }

    #[test]
    fn test_properties_duplicate_key() {
        let mut writer = Writer::new();
        writer.write_varint(2);
        for _ in 0..2 {
            writer.write_string("k", "key").unwrap();
            writer.write_string("v", "value").unwrap();
        }
        assert_eq!(
            Reader::new(writer.as_bytes()).read_properties(),
            Err(DecodeError::DuplicateMapKey { key: "k".into() })
        );

        let mut map = Properties::new();
        map.insert("b".into(), "2".into());
        map.insert("a".into(), "1".into());
        let mut writer = Writer::new();
        writer.write_properties(&map).unwrap();
        assert_eq!(Reader::new(writer.as_bytes()).read_properties(), Ok(map));
    }

    #[test]
    fn test_require_distinguishes_missing_from_truncated() {
        let reader = Reader::new(&[]);
        assert_eq!(
            reader.require("SimpleEdge", "timestamp_micros"),
            Err(DecodeError::MissingRequiredField {
                record: "SimpleEdge",
                field: "timestamp_micros",
            })
        );
        assert!(Reader::new(&[0x01]).require("SimpleEdge", "timestamp_micros").is_ok());
    }

    #[test]
    fn test_enum_read_write() {
        let policy = EvolutionPolicy::default();
        let ctx = DecodeContext::new(&policy, SchemaVersion::V13);

        let mut writer = Writer::new();
        writer.write_enum(EventType::Write, SchemaVersion::V13).unwrap();
        writer.write_varint(99);
        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_enum::<EventType>(&ctx, "type"), Ok(EventType::Write));
        assert_eq!(reader.read_enum::<EventType>(&ctx, "type"), Ok(EventType::Unknown));

        let mut writer = Writer::new();
        assert!(writer.write_enum(EdgeType::ObjectPrevVersion, SchemaVersion::V12).is_err());
        assert!(writer.is_empty());
    }
}
