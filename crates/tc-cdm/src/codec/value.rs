//! Value encoding/decoding, including the run-length tag array.
//!
//! The tag array is an optional list of zigzag ints read pairwise as
//! `(run_length, tag_id)`. Runs must be non-empty and cover exactly
//! `Value.size` bytes; anything else is rejected rather than padded.

use crate::codec::primitives::{Reader, Writer};
use crate::codec::EncodeOptions;
use crate::error::{DecodeError, EncodeError};
use crate::evolution::DecodeContext;
use crate::limits::{MAX_BYTES_LEN, MAX_EXPANDED_TAG_LEN, MAX_STRING_LEN, MAX_TAG_INTS};
use crate::model::{TagAssignment, TagRuns, Value};

// =============================================================================
// DECODING
// =============================================================================

/// Decodes an optional run-length tag array for a value of `size` bytes.
///
/// With `expand` set, the runs are unrolled into one tag id per byte.
pub fn decode_value_tag(
    reader: &mut Reader<'_>,
    size: u32,
    expand: bool,
) -> Result<Option<TagAssignment>, DecodeError> {
    let Some(runs) = read_tag_runs(reader, size)? else {
        return Ok(None);
    };
    if !expand {
        return Ok(Some(TagAssignment::Runs(runs)));
    }
    let tags = runs.expand().ok_or(DecodeError::LengthExceedsLimit {
        field: "expanded value tag",
        len: size as usize,
        max: MAX_EXPANDED_TAG_LEN,
    })?;
    Ok(Some(TagAssignment::PerByte(tags)))
}

fn read_tag_runs(reader: &mut Reader<'_>, size: u32) -> Result<Option<TagRuns>, DecodeError> {
    reader.read_optional("value tag", |r| {
        let count = r.read_count(MAX_TAG_INTS, "value tag")?;
        let mut ints = Vec::with_capacity(count.min(r.remaining_len()));
        for _ in 0..count {
            ints.push(r.read_i32("value tag")?);
        }
        let runs =
            TagRuns::from_pairs(&ints).map_err(|detail| DecodeError::MalformedRunLength { detail })?;
        runs.check(size)
            .map_err(|detail| DecodeError::MalformedRunLength { detail })?;
        Ok(runs)
    })
}

/// Decodes a [`Value`].
pub fn decode_value(reader: &mut Reader<'_>, _ctx: &DecodeContext<'_>) -> Result<Value, DecodeError> {
    let raw_size = reader.read_varint("value size")?;
    let size = u32::try_from(raw_size).map_err(|_| DecodeError::IntegerOverflow {
        field: "value size",
        value: i64::try_from(raw_size).unwrap_or(i64::MAX),
    })?;
    let type_name = reader.read_optional("value type", |r| r.read_string(MAX_STRING_LEN, "value type"))?;
    let bytes = reader.read_optional("value bytes", |r| {
        r.read_bytes_prefixed(MAX_BYTES_LEN, "value bytes")
    })?;
    let tag = read_tag_runs(reader, size)?;

    Ok(Value {
        size,
        type_name,
        bytes,
        tag,
    })
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes an optional run-length tag array for a value of `size` bytes.
pub fn encode_value_tag(
    writer: &mut Writer,
    tag: Option<&TagRuns>,
    size: u32,
) -> Result<(), EncodeError> {
    writer.write_optional(tag, |w, runs| {
        runs.check(size)
            .map_err(|detail| EncodeError::MalformedRunLength { detail })?;
        let ints = runs.to_pairs();
        w.write_count(ints.len(), MAX_TAG_INTS, "value tag")?;
        for int in ints {
            w.write_i32(int);
        }
        Ok(())
    })
}

/// Encodes a [`Value`].
pub fn encode_value(
    writer: &mut Writer,
    value: &Value,
    _options: &EncodeOptions,
) -> Result<(), EncodeError> {
    writer.write_varint(value.size as u64);
    writer.write_optional(value.type_name.as_deref(), |w, name| {
        w.write_string(name, "value type")
    })?;
    writer.write_optional(value.bytes.as_deref(), |w, bytes| {
        w.write_bytes_prefixed(bytes, MAX_BYTES_LEN, "value bytes")
    })?;
    encode_value_tag(writer, value.tag.as_ref(), value.size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunLengthFault;
    use crate::evolution::{EvolutionPolicy, SchemaVersion};
    use crate::model::TagRun;

    fn tag_bytes(ints: &[i32]) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_byte(1);
        writer.write_varint(ints.len() as u64);
        for i in ints {
            writer.write_i32(*i);
        }
        writer.into_bytes()
    }

    #[test]
    fn test_decode_runs() {
        let bytes = tag_bytes(&[4, 0, 6, 1]);
        let decoded = decode_value_tag(&mut Reader::new(&bytes), 10, false).unwrap();
        assert_eq!(
            decoded,
            Some(TagAssignment::Runs(TagRuns::new(vec![
                TagRun::new(4, 0),
                TagRun::new(6, 1),
            ])))
        );
    }

    #[test]
    fn test_decode_expanded() {
        let bytes = tag_bytes(&[2, 5, 1, 6]);
        let decoded = decode_value_tag(&mut Reader::new(&bytes), 3, true).unwrap();
        assert_eq!(decoded, Some(TagAssignment::PerByte(vec![5, 5, 6])));
    }

    #[test]
    fn test_sum_mismatch_rejected() {
        let bytes = tag_bytes(&[4, 0, 6, 1]);
        for size in [9u32, 11] {
            let result = decode_value_tag(&mut Reader::new(&bytes), size, false);
            assert_eq!(
                result,
                Err(DecodeError::MalformedRunLength {
                    detail: RunLengthFault::SumMismatch {
                        size: size as u64,
                        total: 10,
                    },
                })
            );
        }
    }

    #[test]
    fn test_odd_and_zero_runs_rejected() {
        let odd = tag_bytes(&[4, 0, 6]);
        assert!(matches!(
            decode_value_tag(&mut Reader::new(&odd), 10, false),
            Err(DecodeError::MalformedRunLength {
                detail: RunLengthFault::OddCount { count: 3 }
            })
        ));

        let zero = tag_bytes(&[0, 1, 10, 2]);
        assert!(matches!(
            decode_value_tag(&mut Reader::new(&zero), 10, false),
            Err(DecodeError::MalformedRunLength {
                detail: RunLengthFault::EmptyRun { index: 0 }
            })
        ));
    }

    #[test]
    fn test_expansion_over_limit_rejected() {
        let size = MAX_EXPANDED_TAG_LEN as u32 + 1;
        let bytes = tag_bytes(&[size as i32, 4]);
        assert_eq!(
            decode_value_tag(&mut Reader::new(&bytes), size, true),
            Err(DecodeError::LengthExceedsLimit {
                field: "expanded value tag",
                len: size as usize,
                max: MAX_EXPANDED_TAG_LEN,
            })
        );
        assert!(decode_value_tag(&mut Reader::new(&bytes), size, false).is_ok());
    }

    #[test]
    fn test_oversized_value_size_reported() {
        let policy = EvolutionPolicy::default();
        let ctx = DecodeContext::new(&policy, SchemaVersion::CURRENT);
        let cases = [(u32::MAX as u64 + 1, u32::MAX as i64 + 1), (u64::MAX, i64::MAX)];
        for (raw, reported) in cases {
            let mut writer = Writer::new();
            writer.write_varint(raw);
            assert_eq!(
                decode_value(&mut Reader::new(writer.as_bytes()), &ctx),
                Err(DecodeError::IntegerOverflow {
                    field: "value size",
                    value: reported,
                })
            );
        }
    }

    #[test]
    fn test_absent_tag() {
        assert_eq!(decode_value_tag(&mut Reader::new(&[0]), 10, true), Ok(None));
    }

    #[test]
    fn test_encode_rejects_bad_sum() {
        let runs = TagRuns::new(vec![TagRun::new(4, 0), TagRun::new(6, 1)]);
        let mut writer = Writer::new();
        assert_eq!(
            encode_value_tag(&mut writer, Some(&runs), 9),
            Err(EncodeError::MalformedRunLength {
                detail: RunLengthFault::SumMismatch { size: 9, total: 10 },
            })
        );
        let mut writer = Writer::new();
        encode_value_tag(&mut writer, Some(&runs), 10).unwrap();
        assert_eq!(writer.into_bytes(), tag_bytes(&[4, 0, 6, 1]));
    }

    #[test]
    fn test_value_roundtrip() {
        let value = Value::builder()
            .size(5)
            .type_name("char*")
            .bytes(b"hello".to_vec())
            .tag(TagRuns::new(vec![TagRun::new(5, 42)]))
            .build()
            .unwrap();
        let mut writer = Writer::new();
        encode_value(&mut writer, &value, &EncodeOptions::default()).unwrap();

        let policy = EvolutionPolicy::default();
        let ctx = DecodeContext::new(&policy, SchemaVersion::CURRENT);
        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(decode_value(&mut reader, &ctx), Ok(value));
        assert!(reader.is_empty());
    }
}
