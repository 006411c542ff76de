//! Vertex and edge records of the provenance graph.
//!
//! Records are immutable: fields are private, there are no setters, and the
//! only ways to obtain one are the builders in [`crate::model::builder`] and
//! the decoder. A changed file is a new [`FileObject`] with a higher version,
//! linked to its predecessor by an `EDGE_OBJECT_PREV_VERSION` edge.

use std::collections::BTreeMap;

use crate::model::builder::{
    AbstractObjectBuilder, EventBuilder, FileObjectBuilder, MemoryObjectBuilder,
    NetFlowObjectBuilder, PrincipalBuilder, SimpleEdgeBuilder, SrcSinkObjectBuilder,
    SubjectBuilder,
};
use crate::model::{
    EdgeType, EventType, InstrumentationSource, PrincipalType, ProvenanceTagNode, SrcSinkType,
    SubjectType, Uuid, Value,
};

/// Free-form string properties attached to a record. Keys are unique.
pub type Properties = BTreeMap<String, String>;

/// POSIX-style permission bits, stored as two big-endian bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permission(pub(crate) [u8; 2]);

impl Permission {
    pub fn from_bits(bits: u16) -> Self {
        Self(bits.to_be_bytes())
    }

    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(bytes)
    }

    pub fn bits(&self) -> u16 {
        u16::from_be_bytes(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 2] {
        &self.0
    }
}

/// An execution context: a process, thread or unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub(crate) uuid: Uuid,
    pub(crate) subject_type: SubjectType,
    pub(crate) pid: Option<i32>,
    pub(crate) ppid: Option<i32>,
    pub(crate) source: InstrumentationSource,
    pub(crate) start_timestamp_micros: i64,
    pub(crate) end_timestamp_micros: Option<i64>,
    pub(crate) unit_id: Option<i32>,
    pub(crate) cmd_line: Option<String>,
    pub(crate) imported_libraries: Option<Vec<String>>,
    pub(crate) exported_libraries: Option<Vec<String>>,
    pub(crate) properties: Option<Properties>,
}

impl Subject {
    pub fn builder() -> SubjectBuilder {
        SubjectBuilder::new()
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn subject_type(&self) -> SubjectType {
        self.subject_type
    }

    pub fn pid(&self) -> Option<i32> {
        self.pid
    }

    pub fn ppid(&self) -> Option<i32> {
        self.ppid
    }

    pub fn source(&self) -> InstrumentationSource {
        self.source
    }

    pub fn start_timestamp_micros(&self) -> i64 {
        self.start_timestamp_micros
    }

    pub fn end_timestamp_micros(&self) -> Option<i64> {
        self.end_timestamp_micros
    }

    pub fn unit_id(&self) -> Option<i32> {
        self.unit_id
    }

    pub fn cmd_line(&self) -> Option<&str> {
        self.cmd_line.as_deref()
    }

    pub fn imported_libraries(&self) -> Option<&[String]> {
        self.imported_libraries.as_deref()
    }

    pub fn exported_libraries(&self) -> Option<&[String]> {
        self.exported_libraries.as_deref()
    }

    pub fn properties(&self) -> Option<&Properties> {
        self.properties.as_ref()
    }
}

/// An action performed by a subject.
///
/// `sequence` orders events of one subject only; it says nothing about the
/// relative order of events from different subjects or hosts, and the record
/// itself does not name its subject (that link is an edge).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub(crate) uuid: Uuid,
    pub(crate) sequence: i64,
    pub(crate) event_type: EventType,
    pub(crate) thread_id: i32,
    pub(crate) source: InstrumentationSource,
    pub(crate) timestamp_micros: Option<i64>,
    pub(crate) name: Option<String>,
    pub(crate) parameters: Option<Vec<Value>>,
    pub(crate) location: Option<i64>,
    pub(crate) size: Option<i64>,
    pub(crate) program_point: Option<String>,
    pub(crate) properties: Option<Properties>,
}

impl Event {
    pub fn builder() -> EventBuilder {
        EventBuilder::new()
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn thread_id(&self) -> i32 {
        self.thread_id
    }

    pub fn source(&self) -> InstrumentationSource {
        self.source
    }

    /// Absent for synthetic events whose time is unknown.
    pub fn timestamp_micros(&self) -> Option<i64> {
        self.timestamp_micros
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parameters(&self) -> Option<&[Value]> {
        self.parameters.as_deref()
    }

    /// File offset or similar position the event acted on.
    pub fn location(&self) -> Option<i64> {
        self.location
    }

    pub fn size(&self) -> Option<i64> {
        self.size
    }

    pub fn program_point(&self) -> Option<&str> {
        self.program_point.as_deref()
    }

    pub fn properties(&self) -> Option<&Properties> {
        self.properties.as_ref()
    }
}

/// Fields shared by every object record, embedded by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractObject {
    pub(crate) source: InstrumentationSource,
    pub(crate) permission: Option<Permission>,
    pub(crate) last_timestamp_micros: Option<i64>,
    pub(crate) tag: Option<ProvenanceTagNode>,
    pub(crate) properties: Option<Properties>,
}

impl AbstractObject {
    pub fn builder() -> AbstractObjectBuilder {
        AbstractObjectBuilder::new()
    }

    pub fn source(&self) -> InstrumentationSource {
        self.source
    }

    pub fn permission(&self) -> Option<Permission> {
        self.permission
    }

    pub fn last_timestamp_micros(&self) -> Option<i64> {
        self.last_timestamp_micros
    }

    pub fn tag(&self) -> Option<&ProvenanceTagNode> {
        self.tag.as_ref()
    }

    pub fn properties(&self) -> Option<&Properties> {
        self.properties.as_ref()
    }
}

/// A file, or one version of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileObject {
    pub(crate) uuid: Uuid,
    pub(crate) base: AbstractObject,
    pub(crate) url: String,
    pub(crate) is_pipe: bool,
    pub(crate) version: i32,
    pub(crate) size: Option<i64>,
}

impl FileObject {
    pub fn builder() -> FileObjectBuilder {
        FileObjectBuilder::new()
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn base(&self) -> &AbstractObject {
        &self.base
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_pipe(&self) -> bool {
        self.is_pipe
    }

    /// Content version, starting at 1.
    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn size(&self) -> Option<i64> {
        self.size
    }
}

/// A network flow identified by its 4-tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetFlowObject {
    pub(crate) uuid: Uuid,
    pub(crate) base: AbstractObject,
    pub(crate) src_address: String,
    pub(crate) src_port: i32,
    pub(crate) dest_address: String,
    pub(crate) dest_port: i32,
}

impl NetFlowObject {
    pub fn builder() -> NetFlowObjectBuilder {
        NetFlowObjectBuilder::new()
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn base(&self) -> &AbstractObject {
        &self.base
    }

    pub fn src_address(&self) -> &str {
        &self.src_address
    }

    pub fn src_port(&self) -> i32 {
        self.src_port
    }

    pub fn dest_address(&self) -> &str {
        &self.dest_address
    }

    pub fn dest_port(&self) -> i32 {
        self.dest_port
    }
}

/// A memory region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryObject {
    pub(crate) uuid: Uuid,
    pub(crate) base: AbstractObject,
    pub(crate) memory_address: i64,
    pub(crate) page_number: Option<i64>,
}

impl MemoryObject {
    pub fn builder() -> MemoryObjectBuilder {
        MemoryObjectBuilder::new()
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn base(&self) -> &AbstractObject {
        &self.base
    }

    pub fn memory_address(&self) -> i64 {
        self.memory_address
    }

    pub fn page_number(&self) -> Option<i64> {
        self.page_number
    }
}

/// A source or sink that is not a file, flow or memory region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcSinkObject {
    pub(crate) uuid: Uuid,
    pub(crate) base: AbstractObject,
    pub(crate) src_sink_type: SrcSinkType,
}

impl SrcSinkObject {
    pub fn builder() -> SrcSinkObjectBuilder {
        SrcSinkObjectBuilder::new()
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn base(&self) -> &AbstractObject {
        &self.base
    }

    pub fn src_sink_type(&self) -> SrcSinkType {
        self.src_sink_type
    }
}

/// A local or remote actor on whose behalf subjects run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub(crate) uuid: Uuid,
    pub(crate) principal_type: PrincipalType,
    pub(crate) user_id: String,
    pub(crate) group_ids: Vec<String>,
    pub(crate) source: InstrumentationSource,
    pub(crate) properties: Option<Properties>,
}

impl Principal {
    pub fn builder() -> PrincipalBuilder {
        PrincipalBuilder::new()
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn principal_type(&self) -> PrincipalType {
        self.principal_type
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn group_ids(&self) -> &[String] {
        &self.group_ids
    }

    pub fn source(&self) -> InstrumentationSource {
        self.source
    }

    pub fn properties(&self) -> Option<&Properties> {
        self.properties.as_ref()
    }
}

/// A typed, directed edge. Direction and meaning come from the edge type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleEdge {
    pub(crate) from_uuid: Uuid,
    pub(crate) to_uuid: Uuid,
    pub(crate) edge_type: EdgeType,
    pub(crate) timestamp_micros: i64,
    pub(crate) properties: Option<Properties>,
}

impl SimpleEdge {
    pub fn builder() -> SimpleEdgeBuilder {
        SimpleEdgeBuilder::new()
    }

    pub fn from_uuid(&self) -> &Uuid {
        &self.from_uuid
    }

    pub fn to_uuid(&self) -> &Uuid {
        &self.to_uuid
    }

    pub fn edge_type(&self) -> EdgeType {
        self.edge_type
    }

    pub fn timestamp_micros(&self) -> i64 {
        self.timestamp_micros
    }

    pub fn properties(&self) -> Option<&Properties> {
        self.properties.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_bits() {
        let perm = Permission::from_bits(0o644);
        assert_eq!(perm.bits(), 0o644);
        assert_eq!(perm.as_bytes(), &[0x01, 0xA4]);
        assert_eq!(Permission::from_bytes([0x01, 0xA4]), perm);
    }

    #[test]
    fn test_records_are_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Subject>();
        assert_send_sync::<Event>();
        assert_send_sync::<FileObject>();
        assert_send_sync::<SimpleEdge>();
        assert_send_sync::<ProvenanceTagNode>();
    }
}
