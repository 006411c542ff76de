//! Vertex and edge record encoding/decoding.
//!
//! Each record is laid out as its required fields in declaration order, then
//! its base optional fields behind presence bytes, then any fields added in a
//! later schema version. Late fields are written only when the writer's
//! version has them and read only when both sides know them.

use crate::codec::primitives::{Reader, Writer};
use crate::codec::tag::{decode_tag_tree, encode_tag_tree};
use crate::codec::value::{decode_value, encode_value};
use crate::codec::EncodeOptions;
use crate::error::{DecodeError, EncodeError};
use crate::evolution::{DecodeContext, EvolvableField};
use crate::limits::{MAX_LIST_LEN, MAX_STRING_LEN};
use crate::model::{
    AbstractObject, Event, FileObject, MemoryObject, NetFlowObject, Principal, SimpleEdge,
    SrcSinkObject, Subject,
};

fn write_i32(w: &mut Writer, v: i32) -> Result<(), EncodeError> {
    w.write_i32(v);
    Ok(())
}

fn write_i64(w: &mut Writer, v: i64) -> Result<(), EncodeError> {
    w.write_i64(v);
    Ok(())
}

// =============================================================================
// DECODING
// =============================================================================

pub fn decode_subject(reader: &mut Reader<'_>, ctx: &DecodeContext<'_>) -> Result<Subject, DecodeError> {
    const RECORD: &str = "Subject";
    reader.require(RECORD, "uuid")?;
    let uuid = reader.read_uuid("subject uuid")?;
    reader.require(RECORD, "type")?;
    let subject_type = reader.read_enum(ctx, "subject type")?;
    reader.require(RECORD, "source")?;
    let source = reader.read_enum(ctx, "subject source")?;
    reader.require(RECORD, "start_timestamp_micros")?;
    let start_timestamp_micros = reader.read_i64("start_timestamp_micros")?;

    let pid = reader.read_optional("pid", |r| r.read_i32("pid"))?;
    let ppid = reader.read_optional("ppid", |r| r.read_i32("ppid"))?;
    let end_timestamp_micros =
        reader.read_optional("end_timestamp_micros", |r| r.read_i64("end_timestamp_micros"))?;
    let unit_id = reader.read_optional("unit_id", |r| r.read_i32("unit_id"))?;
    let cmd_line = reader.read_optional("cmd_line", |r| r.read_string(MAX_STRING_LEN, "cmd_line"))?;
    let properties = reader.read_optional("properties", Reader::read_properties)?;

    let (imported_libraries, exported_libraries) =
        if ctx.reads_field(EvolvableField::SubjectLibraries) {
            (
                reader.read_optional("imported_libraries", |r| {
                    r.read_string_list("imported_libraries")
                })?,
                reader.read_optional("exported_libraries", |r| {
                    r.read_string_list("exported_libraries")
                })?,
            )
        } else {
            (None, None)
        };

    Ok(Subject {
        uuid,
        subject_type,
        pid,
        ppid,
        source,
        start_timestamp_micros,
        end_timestamp_micros,
        unit_id,
        cmd_line,
        imported_libraries,
        exported_libraries,
        properties,
    })
}

pub fn decode_event(reader: &mut Reader<'_>, ctx: &DecodeContext<'_>) -> Result<Event, DecodeError> {
    const RECORD: &str = "Event";
    reader.require(RECORD, "uuid")?;
    let uuid = reader.read_uuid("event uuid")?;
    reader.require(RECORD, "sequence")?;
    let sequence = reader.read_i64("sequence")?;
    reader.require(RECORD, "type")?;
    let event_type = reader.read_enum(ctx, "event type")?;
    reader.require(RECORD, "thread_id")?;
    let thread_id = reader.read_i32("thread_id")?;
    reader.require(RECORD, "source")?;
    let source = reader.read_enum(ctx, "event source")?;

    let timestamp_micros =
        reader.read_optional("timestamp_micros", |r| r.read_i64("timestamp_micros"))?;
    let name = reader.read_optional("name", |r| r.read_string(MAX_STRING_LEN, "name"))?;
    let parameters = reader.read_optional("parameters", |r| {
        let count = r.read_count(MAX_LIST_LEN, "parameters")?;
        let mut values = Vec::with_capacity(count.min(r.remaining_len()));
        for _ in 0..count {
            values.push(decode_value(r, ctx)?);
        }
        Ok(values)
    })?;
    let location = reader.read_optional("location", |r| r.read_i64("location"))?;
    let size = reader.read_optional("size", |r| r.read_i64("size"))?;
    let properties = reader.read_optional("properties", Reader::read_properties)?;

    let program_point = if ctx.reads_field(EvolvableField::EventProgramPoint) {
        reader.read_optional("program_point", |r| {
            r.read_string(MAX_STRING_LEN, "program_point")
        })?
    } else {
        None
    };

    Ok(Event {
        uuid,
        sequence,
        event_type,
        thread_id,
        source,
        timestamp_micros,
        name,
        parameters,
        location,
        size,
        program_point,
        properties,
    })
}

/// Decodes the shared object base embedded in every concrete object.
pub fn decode_abstract_object(
    reader: &mut Reader<'_>,
    ctx: &DecodeContext<'_>,
) -> Result<AbstractObject, DecodeError> {
    reader.require("AbstractObject", "source")?;
    let source = reader.read_enum(ctx, "object source")?;
    let permission = reader.read_optional("permission", |r| r.read_permission("permission"))?;
    let last_timestamp_micros = reader.read_optional("last_timestamp_micros", |r| {
        r.read_i64("last_timestamp_micros")
    })?;
    let tag = reader.read_optional("object tag", |r| decode_tag_tree(r, ctx))?;
    let properties = reader.read_optional("properties", Reader::read_properties)?;

    Ok(AbstractObject {
        source,
        permission,
        last_timestamp_micros,
        tag,
        properties,
    })
}

pub fn decode_file_object(
    reader: &mut Reader<'_>,
    ctx: &DecodeContext<'_>,
) -> Result<FileObject, DecodeError> {
    const RECORD: &str = "FileObject";
    reader.require(RECORD, "uuid")?;
    let uuid = reader.read_uuid("file uuid")?;
    reader.require(RECORD, "base")?;
    let base = decode_abstract_object(reader, ctx)?;
    reader.require(RECORD, "url")?;
    let url = reader.read_string(MAX_STRING_LEN, "url")?;
    let size = reader.read_optional("size", |r| r.read_i64("size"))?;

    let (is_pipe, version) = if ctx.reads_field(EvolvableField::FileVersioning) {
        (reader.read_bool("is_pipe")?, reader.read_i32("version")?)
    } else {
        (false, 1)
    };

    Ok(FileObject {
        uuid,
        base,
        url,
        is_pipe,
        version,
        size,
    })
}

pub fn decode_net_flow_object(
    reader: &mut Reader<'_>,
    ctx: &DecodeContext<'_>,
) -> Result<NetFlowObject, DecodeError> {
    const RECORD: &str = "NetFlowObject";
    reader.require(RECORD, "uuid")?;
    let uuid = reader.read_uuid("netflow uuid")?;
    reader.require(RECORD, "base")?;
    let base = decode_abstract_object(reader, ctx)?;
    reader.require(RECORD, "src_address")?;
    let src_address = reader.read_string(MAX_STRING_LEN, "src_address")?;
    reader.require(RECORD, "src_port")?;
    let src_port = reader.read_i32("src_port")?;
    reader.require(RECORD, "dest_address")?;
    let dest_address = reader.read_string(MAX_STRING_LEN, "dest_address")?;
    reader.require(RECORD, "dest_port")?;
    let dest_port = reader.read_i32("dest_port")?;

    Ok(NetFlowObject {
        uuid,
        base,
        src_address,
        src_port,
        dest_address,
        dest_port,
    })
}

pub fn decode_memory_object(
    reader: &mut Reader<'_>,
    ctx: &DecodeContext<'_>,
) -> Result<MemoryObject, DecodeError> {
    const RECORD: &str = "MemoryObject";
    reader.require(RECORD, "uuid")?;
    let uuid = reader.read_uuid("memory uuid")?;
    reader.require(RECORD, "base")?;
    let base = decode_abstract_object(reader, ctx)?;
    reader.require(RECORD, "memory_address")?;
    let memory_address = reader.read_i64("memory_address")?;
    let page_number = reader.read_optional("page_number", |r| r.read_i64("page_number"))?;

    Ok(MemoryObject {
        uuid,
        base,
        memory_address,
        page_number,
    })
}

pub fn decode_src_sink_object(
    reader: &mut Reader<'_>,
    ctx: &DecodeContext<'_>,
) -> Result<SrcSinkObject, DecodeError> {
    const RECORD: &str = "SrcSinkObject";
    reader.require(RECORD, "uuid")?;
    let uuid = reader.read_uuid("srcsink uuid")?;
    reader.require(RECORD, "base")?;
    let base = decode_abstract_object(reader, ctx)?;
    reader.require(RECORD, "type")?;
    let src_sink_type = reader.read_enum(ctx, "srcsink type")?;

    Ok(SrcSinkObject {
        uuid,
        base,
        src_sink_type,
    })
}

pub fn decode_principal(
    reader: &mut Reader<'_>,
    ctx: &DecodeContext<'_>,
) -> Result<Principal, DecodeError> {
    const RECORD: &str = "Principal";
    reader.require(RECORD, "uuid")?;
    let uuid = reader.read_uuid("principal uuid")?;
    reader.require(RECORD, "type")?;
    let principal_type = reader.read_enum(ctx, "principal type")?;
    reader.require(RECORD, "user_id")?;
    let user_id = reader.read_string(MAX_STRING_LEN, "user_id")?;
    reader.require(RECORD, "group_ids")?;
    let group_ids = reader.read_string_list("group_ids")?;
    reader.require(RECORD, "source")?;
    let source = reader.read_enum(ctx, "principal source")?;
    let properties = reader.read_optional("properties", Reader::read_properties)?;

    Ok(Principal {
        uuid,
        principal_type,
        user_id,
        group_ids,
        source,
        properties,
    })
}

pub fn decode_simple_edge(
    reader: &mut Reader<'_>,
    ctx: &DecodeContext<'_>,
) -> Result<SimpleEdge, DecodeError> {
    const RECORD: &str = "SimpleEdge";
    reader.require(RECORD, "from_uuid")?;
    let from_uuid = reader.read_uuid("from_uuid")?;
    reader.require(RECORD, "to_uuid")?;
    let to_uuid = reader.read_uuid("to_uuid")?;
    reader.require(RECORD, "type")?;
    let edge_type = reader.read_enum(ctx, "edge type")?;
    reader.require(RECORD, "timestamp_micros")?;
    let timestamp_micros = reader.read_i64("timestamp_micros")?;
    let properties = reader.read_optional("properties", Reader::read_properties)?;

    Ok(SimpleEdge {
        from_uuid,
        to_uuid,
        edge_type,
        timestamp_micros,
        properties,
    })
}

// =============================================================================
// ENCODING
// =============================================================================

pub fn encode_subject(
    writer: &mut Writer,
    subject: &Subject,
    options: &EncodeOptions,
) -> Result<(), EncodeError> {
    writer.write_uuid(&subject.uuid);
    writer.write_enum(subject.subject_type, options.version)?;
    writer.write_enum(subject.source, options.version)?;
    writer.write_i64(subject.start_timestamp_micros);

    writer.write_optional(subject.pid, write_i32)?;
    writer.write_optional(subject.ppid, write_i32)?;
    writer.write_optional(subject.end_timestamp_micros, write_i64)?;
    writer.write_optional(subject.unit_id, write_i32)?;
    writer.write_optional(subject.cmd_line.as_deref(), |w, s| w.write_string(s, "cmd_line"))?;
    writer.write_optional(subject.properties.as_ref(), Writer::write_properties)?;

    if options.version.has_field(EvolvableField::SubjectLibraries) {
        writer.write_optional(subject.imported_libraries.as_deref(), |w, libs| {
            w.write_string_list(libs, "imported_libraries")
        })?;
        writer.write_optional(subject.exported_libraries.as_deref(), |w, libs| {
            w.write_string_list(libs, "exported_libraries")
        })?;
    }
    Ok(())
}

pub fn encode_event(
    writer: &mut Writer,
    event: &Event,
    options: &EncodeOptions,
) -> Result<(), EncodeError> {
    writer.write_uuid(&event.uuid);
    writer.write_i64(event.sequence);
    writer.write_enum(event.event_type, options.version)?;
    writer.write_i32(event.thread_id);
    writer.write_enum(event.source, options.version)?;

    writer.write_optional(event.timestamp_micros, write_i64)?;
    writer.write_optional(event.name.as_deref(), |w, s| w.write_string(s, "name"))?;
    writer.write_optional(event.parameters.as_deref(), |w, values| {
        w.write_count(values.len(), MAX_LIST_LEN, "parameters")?;
        for value in values {
            encode_value(w, value, options)?;
        }
        Ok(())
    })?;
    writer.write_optional(event.location, write_i64)?;
    writer.write_optional(event.size, write_i64)?;
    writer.write_optional(event.properties.as_ref(), Writer::write_properties)?;

    if options.version.has_field(EvolvableField::EventProgramPoint) {
        writer.write_optional(event.program_point.as_deref(), |w, s| {
            w.write_string(s, "program_point")
        })?;
    }
    Ok(())
}

pub fn encode_abstract_object(
    writer: &mut Writer,
    base: &AbstractObject,
    options: &EncodeOptions,
) -> Result<(), EncodeError> {
    writer.write_enum(base.source, options.version)?;
    writer.write_optional(base.permission, |w, p| {
        w.write_permission(p);
        Ok(())
    })?;
    writer.write_optional(base.last_timestamp_micros, write_i64)?;
    writer.write_optional(base.tag.as_ref(), |w, tag| encode_tag_tree(w, tag, options))?;
    writer.write_optional(base.properties.as_ref(), Writer::write_properties)
}

pub fn encode_file_object(
    writer: &mut Writer,
    file: &FileObject,
    options: &EncodeOptions,
) -> Result<(), EncodeError> {
    writer.write_uuid(&file.uuid);
    encode_abstract_object(writer, &file.base, options)?;
    writer.write_string(&file.url, "url")?;
    writer.write_optional(file.size, write_i64)?;

    if options.version.has_field(EvolvableField::FileVersioning) {
        writer.write_bool(file.is_pipe);
        writer.write_i32(file.version);
    }
    Ok(())
}

pub fn encode_net_flow_object(
    writer: &mut Writer,
    flow: &NetFlowObject,
    options: &EncodeOptions,
) -> Result<(), EncodeError> {
    writer.write_uuid(&flow.uuid);
    encode_abstract_object(writer, &flow.base, options)?;
    writer.write_string(&flow.src_address, "src_address")?;
    writer.write_i32(flow.src_port);
    writer.write_string(&flow.dest_address, "dest_address")?;
    writer.write_i32(flow.dest_port);
    Ok(())
}

pub fn encode_memory_object(
    writer: &mut Writer,
    memory: &MemoryObject,
    options: &EncodeOptions,
) -> Result<(), EncodeError> {
    writer.write_uuid(&memory.uuid);
    encode_abstract_object(writer, &memory.base, options)?;
    writer.write_i64(memory.memory_address);
    writer.write_optional(memory.page_number, write_i64)
}

pub fn encode_src_sink_object(
    writer: &mut Writer,
    src_sink: &SrcSinkObject,
    options: &EncodeOptions,
) -> Result<(), EncodeError> {
    writer.write_uuid(&src_sink.uuid);
    encode_abstract_object(writer, &src_sink.base, options)?;
    writer.write_enum(src_sink.src_sink_type, options.version)
}

pub fn encode_principal(
    writer: &mut Writer,
    principal: &Principal,
    options: &EncodeOptions,
) -> Result<(), EncodeError> {
    writer.write_uuid(&principal.uuid);
    writer.write_enum(principal.principal_type, options.version)?;
    writer.write_string(&principal.user_id, "user_id")?;
    writer.write_string_list(&principal.group_ids, "group_ids")?;
    writer.write_enum(principal.source, options.version)?;
    writer.write_optional(principal.properties.as_ref(), Writer::write_properties)
}

pub fn encode_simple_edge(
    writer: &mut Writer,
    edge: &SimpleEdge,
    options: &EncodeOptions,
) -> Result<(), EncodeError> {
    writer.write_uuid(&edge.from_uuid);
    writer.write_uuid(&edge.to_uuid);
    writer.write_enum(edge.edge_type, options.version)?;
    writer.write_i64(edge.timestamp_micros);
    writer.write_optional(edge.properties.as_ref(), Writer::write_properties)
}
