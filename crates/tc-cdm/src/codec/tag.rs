//! Provenance tag tree encoding/decoding.
//!
//! Node layout: arm byte, arm payload, optional children (count then nodes),
//! optional tag id, optional properties.

use crate::codec::primitives::{Reader, Writer};
use crate::codec::EncodeOptions;
use crate::error::{DecodeError, EncodeError};
use crate::evolution::DecodeContext;
use crate::limits::MAX_TAG_CHILDREN;
use crate::model::{ProvenanceTagNode, TagValue};

const ARM_REF: u8 = 0;
const ARM_UUID: u8 = 1;
const ARM_OPCODE: u8 = 2;
const ARM_INTEGRITY: u8 = 3;
const ARM_CONFIDENTIALITY: u8 = 4;

// =============================================================================
// DECODING
// =============================================================================

/// Decodes a tag tree rooted at the reader's position.
///
/// Rejects trees deeper than the policy allows and trees in which a node
/// names one of its own ancestors. References are not resolved.
pub fn decode_tag_tree(
    reader: &mut Reader<'_>,
    ctx: &DecodeContext<'_>,
) -> Result<ProvenanceTagNode, DecodeError> {
    let root = decode_node(reader, ctx, 1)?;
    if let Some(tag_id) = root.find_cycle() {
        return Err(DecodeError::CyclicTagTree { tag_id });
    }
    Ok(root)
}

fn decode_node(
    reader: &mut Reader<'_>,
    ctx: &DecodeContext<'_>,
    depth: usize,
) -> Result<ProvenanceTagNode, DecodeError> {
    if depth > ctx.max_tag_depth() {
        return Err(DecodeError::MaxDepthExceeded {
            max: ctx.max_tag_depth(),
        });
    }

    let value = match reader.read_byte("tag value arm")? {
        ARM_REF => TagValue::Ref(reader.read_i32("tag reference")?),
        ARM_UUID => TagValue::Uuid(reader.read_uuid("tag uuid")?),
        ARM_OPCODE => TagValue::OpCode(reader.read_enum(ctx, "tag opcode")?),
        ARM_INTEGRITY => TagValue::Integrity(reader.read_enum(ctx, "integrity tag")?),
        ARM_CONFIDENTIALITY => {
            TagValue::Confidentiality(reader.read_enum(ctx, "confidentiality tag")?)
        }
        arm => return Err(DecodeError::InvalidTagArm { arm }),
    };

    let children = reader.read_optional("tag children", |r| {
        let count = r.read_count(MAX_TAG_CHILDREN, "tag children")?;
        let mut children = Vec::with_capacity(count.min(r.remaining_len()));
        for _ in 0..count {
            children.push(decode_node(r, ctx, depth + 1)?);
        }
        Ok(children)
    })?;
    let tag_id = reader.read_optional("tag_id", |r| r.read_i32("tag_id"))?;
    let properties = reader.read_optional("tag properties", Reader::read_properties)?;

    Ok(ProvenanceTagNode {
        value,
        children,
        tag_id,
        properties,
    })
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes a tag tree, enforcing the same depth bound the decoder applies.
pub fn encode_tag_tree(
    writer: &mut Writer,
    node: &ProvenanceTagNode,
    options: &EncodeOptions,
) -> Result<(), EncodeError> {
    encode_node(writer, node, options, 1)
}

fn encode_node(
    writer: &mut Writer,
    node: &ProvenanceTagNode,
    options: &EncodeOptions,
    depth: usize,
) -> Result<(), EncodeError> {
    if depth > options.max_tag_depth {
        return Err(EncodeError::MaxDepthExceeded {
            max: options.max_tag_depth,
        });
    }

    writer.write_byte(node.value.arm());
    match node.value {
        TagValue::Ref(id) => writer.write_i32(id),
        TagValue::Uuid(ref id) => writer.write_uuid(id),
        TagValue::OpCode(op) => writer.write_enum(op, options.version)?,
        TagValue::Integrity(tag) => writer.write_enum(tag, options.version)?,
        TagValue::Confidentiality(tag) => writer.write_enum(tag, options.version)?,
    }

    writer.write_optional(node.children.as_deref(), |w, children| {
        w.write_count(children.len(), MAX_TAG_CHILDREN, "tag children")?;
        for child in children {
            encode_node(w, child, options, depth + 1)?;
        }
        Ok(())
    })?;
    writer.write_optional(node.tag_id, |w, id| {
        w.write_i32(id);
        Ok(())
    })?;
    writer.write_optional(node.properties.as_ref(), Writer::write_properties)
}
