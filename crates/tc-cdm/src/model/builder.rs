//! Builder API for record construction.
//!
//! Every record is created through a fluent builder. `build()` checks all
//! required fields before producing anything, so a record is either complete
//! or never exists.
//!
//! # Example
//!
//! ```rust
//! use tc_cdm::model::{EdgeType, SimpleEdge};
//!
//! let edge = SimpleEdge::builder()
//!     .from_uuid([1u8; 32])
//!     .to_uuid([2u8; 32])
//!     .edge_type(EdgeType::EventAffectsFile)
//!     .timestamp_micros(1000)
//!     .build()
//!     .unwrap();
//! assert_eq!(edge.timestamp_micros(), 1000);
//! ```

use crate::error::BuildError;
use crate::model::{
    AbstractObject, EdgeType, Event, EventType, FileObject, InstrumentationSource, MemoryObject,
    NetFlowObject, Permission, Principal, PrincipalType, Properties, ProvenanceTagNode,
    SimpleEdge, SrcSinkObject, SrcSinkType, Subject, SubjectType, TagRuns, TagValue, Uuid, Value,
};

fn require<T>(value: Option<T>, record: &'static str, field: &'static str) -> Result<T, BuildError> {
    value.ok_or(BuildError::MissingRequiredField { record, field })
}

/// Builder for [`Subject`].
#[derive(Debug, Clone, Default)]
pub struct SubjectBuilder {
    uuid: Option<Uuid>,
    subject_type: Option<SubjectType>,
    pid: Option<i32>,
    ppid: Option<i32>,
    source: Option<InstrumentationSource>,
    start_timestamp_micros: Option<i64>,
    end_timestamp_micros: Option<i64>,
    unit_id: Option<i32>,
    cmd_line: Option<String>,
    imported_libraries: Option<Vec<String>>,
    exported_libraries: Option<Vec<String>>,
    properties: Option<Properties>,
}

impl SubjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn subject_type(mut self, subject_type: SubjectType) -> Self {
        self.subject_type = Some(subject_type);
        self
    }

    pub fn pid(mut self, pid: i32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn ppid(mut self, ppid: i32) -> Self {
        self.ppid = Some(ppid);
        self
    }

    pub fn source(mut self, source: InstrumentationSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn start_timestamp_micros(mut self, micros: i64) -> Self {
        self.start_timestamp_micros = Some(micros);
        self
    }

    pub fn end_timestamp_micros(mut self, micros: i64) -> Self {
        self.end_timestamp_micros = Some(micros);
        self
    }

    pub fn unit_id(mut self, unit_id: i32) -> Self {
        self.unit_id = Some(unit_id);
        self
    }

    pub fn cmd_line(mut self, cmd_line: impl Into<String>) -> Self {
        self.cmd_line = Some(cmd_line.into());
        self
    }

    pub fn imported_libraries(mut self, libs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.imported_libraries = Some(libs.into_iter().map(Into::into).collect());
        self
    }

    pub fn exported_libraries(mut self, libs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exported_libraries = Some(libs.into_iter().map(Into::into).collect());
        self
    }

    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Adds one property, creating the map if needed.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties
            .get_or_insert_with(Properties::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<Subject, BuildError> {
        const RECORD: &str = "Subject";
        Ok(Subject {
            uuid: require(self.uuid, RECORD, "uuid")?,
            subject_type: require(self.subject_type, RECORD, "type")?,
            pid: self.pid,
            ppid: self.ppid,
            source: require(self.source, RECORD, "source")?,
            start_timestamp_micros: require(
                self.start_timestamp_micros,
                RECORD,
                "start_timestamp_micros",
            )?,
            end_timestamp_micros: self.end_timestamp_micros,
            unit_id: self.unit_id,
            cmd_line: self.cmd_line,
            imported_libraries: self.imported_libraries,
            exported_libraries: self.exported_libraries,
            properties: self.properties,
        })
    }
}

/// Builder for [`Event`]. `sequence` defaults to 0.
#[derive(Debug, Clone, Default)]
pub struct EventBuilder {
    uuid: Option<Uuid>,
    sequence: i64,
    event_type: Option<EventType>,
    thread_id: Option<i32>,
    source: Option<InstrumentationSource>,
    timestamp_micros: Option<i64>,
    name: Option<String>,
    parameters: Option<Vec<Value>>,
    location: Option<i64>,
    size: Option<i64>,
    program_point: Option<String>,
    properties: Option<Properties>,
}

impl EventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn sequence(mut self, sequence: i64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    pub fn thread_id(mut self, thread_id: i32) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    pub fn source(mut self, source: InstrumentationSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn timestamp_micros(mut self, micros: i64) -> Self {
        self.timestamp_micros = Some(micros);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Appends a parameter, creating the list if needed.
    pub fn parameter(mut self, value: Value) -> Self {
        self.parameters.get_or_insert_with(Vec::new).push(value);
        self
    }

    pub fn parameters(mut self, values: Vec<Value>) -> Self {
        self.parameters = Some(values);
        self
    }

    pub fn location(mut self, location: i64) -> Self {
        self.location = Some(location);
        self
    }

    pub fn size(mut self, size: i64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn program_point(mut self, program_point: impl Into<String>) -> Self {
        self.program_point = Some(program_point.into());
        self
    }

    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties
            .get_or_insert_with(Properties::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<Event, BuildError> {
        const RECORD: &str = "Event";
        Ok(Event {
            uuid: require(self.uuid, RECORD, "uuid")?,
            sequence: self.sequence,
            event_type: require(self.event_type, RECORD, "type")?,
            thread_id: require(self.thread_id, RECORD, "thread_id")?,
            source: require(self.source, RECORD, "source")?,
            timestamp_micros: self.timestamp_micros,
            name: self.name,
            parameters: self.parameters,
            location: self.location,
            size: self.size,
            program_point: self.program_point,
            properties: self.properties,
        })
    }
}

/// Builder for [`AbstractObject`].
#[derive(Debug, Clone, Default)]
pub struct AbstractObjectBuilder {
    source: Option<InstrumentationSource>,
    permission: Option<Permission>,
    last_timestamp_micros: Option<i64>,
    tag: Option<ProvenanceTagNode>,
    properties: Option<Properties>,
}

impl AbstractObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: InstrumentationSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn permission(mut self, permission: Permission) -> Self {
        self.permission = Some(permission);
        self
    }

    pub fn last_timestamp_micros(mut self, micros: i64) -> Self {
        self.last_timestamp_micros = Some(micros);
        self
    }

    pub fn tag(mut self, tag: ProvenanceTagNode) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties
            .get_or_insert_with(Properties::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<AbstractObject, BuildError> {
        Ok(AbstractObject {
            source: require(self.source, "AbstractObject", "source")?,
            permission: self.permission,
            last_timestamp_micros: self.last_timestamp_micros,
            tag: self.tag,
            properties: self.properties,
        })
    }
}

/// Builder for [`FileObject`]. `is_pipe` defaults to false, `version` to 1.
#[derive(Debug, Clone)]
pub struct FileObjectBuilder {
    uuid: Option<Uuid>,
    base: Option<AbstractObject>,
    url: Option<String>,
    is_pipe: bool,
    version: i32,
    size: Option<i64>,
}

impl Default for FileObjectBuilder {
    fn default() -> Self {
        Self {
            uuid: None,
            base: None,
            url: None,
            is_pipe: false,
            version: 1,
            size: None,
        }
    }
}

impl FileObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn base(mut self, base: AbstractObject) -> Self {
        self.base = Some(base);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn is_pipe(mut self, is_pipe: bool) -> Self {
        self.is_pipe = is_pipe;
        self
    }

    pub fn version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn size(mut self, size: i64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn build(self) -> Result<FileObject, BuildError> {
        const RECORD: &str = "FileObject";
        Ok(FileObject {
            uuid: require(self.uuid, RECORD, "uuid")?,
            base: require(self.base, RECORD, "base")?,
            url: require(self.url, RECORD, "url")?,
            is_pipe: self.is_pipe,
            version: self.version,
            size: self.size,
        })
    }
}

/// Builder for [`NetFlowObject`].
#[derive(Debug, Clone, Default)]
pub struct NetFlowObjectBuilder {
    uuid: Option<Uuid>,
    base: Option<AbstractObject>,
    src_address: Option<String>,
    src_port: Option<i32>,
    dest_address: Option<String>,
    dest_port: Option<i32>,
}

impl NetFlowObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn base(mut self, base: AbstractObject) -> Self {
        self.base = Some(base);
        self
    }

    pub fn src(mut self, address: impl Into<String>, port: i32) -> Self {
        self.src_address = Some(address.into());
        self.src_port = Some(port);
        self
    }

    pub fn dest(mut self, address: impl Into<String>, port: i32) -> Self {
        self.dest_address = Some(address.into());
        self.dest_port = Some(port);
        self
    }

    pub fn build(self) -> Result<NetFlowObject, BuildError> {
        const RECORD: &str = "NetFlowObject";
        Ok(NetFlowObject {
            uuid: require(self.uuid, RECORD, "uuid")?,
            base: require(self.base, RECORD, "base")?,
            src_address: require(self.src_address, RECORD, "src_address")?,
            src_port: require(self.src_port, RECORD, "src_port")?,
            dest_address: require(self.dest_address, RECORD, "dest_address")?,
            dest_port: require(self.dest_port, RECORD, "dest_port")?,
        })
    }
}

/// Builder for [`MemoryObject`].
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectBuilder {
    uuid: Option<Uuid>,
    base: Option<AbstractObject>,
    memory_address: Option<i64>,
    page_number: Option<i64>,
}

impl MemoryObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn base(mut self, base: AbstractObject) -> Self {
        self.base = Some(base);
        self
    }

    pub fn memory_address(mut self, address: i64) -> Self {
        self.memory_address = Some(address);
        self
    }

    pub fn page_number(mut self, page: i64) -> Self {
        self.page_number = Some(page);
        self
    }

    pub fn build(self) -> Result<MemoryObject, BuildError> {
        const RECORD: &str = "MemoryObject";
        Ok(MemoryObject {
            uuid: require(self.uuid, RECORD, "uuid")?,
            base: require(self.base, RECORD, "base")?,
            memory_address: require(self.memory_address, RECORD, "memory_address")?,
            page_number: self.page_number,
        })
    }
}

/// Builder for [`SrcSinkObject`].
#[derive(Debug, Clone, Default)]
pub struct SrcSinkObjectBuilder {
    uuid: Option<Uuid>,
    base: Option<AbstractObject>,
    src_sink_type: Option<SrcSinkType>,
}

impl SrcSinkObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn base(mut self, base: AbstractObject) -> Self {
        self.base = Some(base);
        self
    }

    pub fn src_sink_type(mut self, src_sink_type: SrcSinkType) -> Self {
        self.src_sink_type = Some(src_sink_type);
        self
    }

    pub fn build(self) -> Result<SrcSinkObject, BuildError> {
        const RECORD: &str = "SrcSinkObject";
        Ok(SrcSinkObject {
            uuid: require(self.uuid, RECORD, "uuid")?,
            base: require(self.base, RECORD, "base")?,
            src_sink_type: require(self.src_sink_type, RECORD, "type")?,
        })
    }
}

/// Builder for [`Principal`]. The type defaults to `PRINCIPAL_LOCAL` and the
/// group list to empty.
#[derive(Debug, Clone, Default)]
pub struct PrincipalBuilder {
    uuid: Option<Uuid>,
    principal_type: PrincipalType,
    user_id: Option<String>,
    group_ids: Vec<String>,
    source: Option<InstrumentationSource>,
    properties: Option<Properties>,
}

impl PrincipalBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn principal_type(mut self, principal_type: PrincipalType) -> Self {
        self.principal_type = principal_type;
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_ids.push(group_id.into());
        self
    }

    pub fn source(mut self, source: InstrumentationSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn build(self) -> Result<Principal, BuildError> {
        const RECORD: &str = "Principal";
        Ok(Principal {
            uuid: require(self.uuid, RECORD, "uuid")?,
            principal_type: self.principal_type,
            user_id: require(self.user_id, RECORD, "user_id")?,
            group_ids: self.group_ids,
            source: require(self.source, RECORD, "source")?,
            properties: self.properties,
        })
    }
}

/// Builder for [`SimpleEdge`].
#[derive(Debug, Clone, Default)]
pub struct SimpleEdgeBuilder {
    from_uuid: Option<Uuid>,
    to_uuid: Option<Uuid>,
    edge_type: Option<EdgeType>,
    timestamp_micros: Option<i64>,
    properties: Option<Properties>,
}

impl SimpleEdgeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_uuid(mut self, uuid: Uuid) -> Self {
        self.from_uuid = Some(uuid);
        self
    }

    pub fn to_uuid(mut self, uuid: Uuid) -> Self {
        self.to_uuid = Some(uuid);
        self
    }

    pub fn edge_type(mut self, edge_type: EdgeType) -> Self {
        self.edge_type = Some(edge_type);
        self
    }

    pub fn timestamp_micros(mut self, micros: i64) -> Self {
        self.timestamp_micros = Some(micros);
        self
    }

    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn build(self) -> Result<SimpleEdge, BuildError> {
        const RECORD: &str = "SimpleEdge";
        Ok(SimpleEdge {
            from_uuid: require(self.from_uuid, RECORD, "from_uuid")?,
            to_uuid: require(self.to_uuid, RECORD, "to_uuid")?,
            edge_type: require(self.edge_type, RECORD, "type")?,
            timestamp_micros: require(self.timestamp_micros, RECORD, "timestamp_micros")?,
            properties: self.properties,
        })
    }
}

/// Builder for [`ProvenanceTagNode`].
#[derive(Debug, Clone, Default)]
pub struct ProvenanceTagNodeBuilder {
    value: Option<TagValue>,
    children: Option<Vec<ProvenanceTagNode>>,
    tag_id: Option<i32>,
    properties: Option<Properties>,
}

impl ProvenanceTagNodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, value: TagValue) -> Self {
        self.value = Some(value);
        self
    }

    /// Appends a child, creating the child list if needed.
    pub fn child(mut self, child: ProvenanceTagNode) -> Self {
        self.children.get_or_insert_with(Vec::new).push(child);
        self
    }

    pub fn children(mut self, children: Vec<ProvenanceTagNode>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn tag_id(mut self, tag_id: i32) -> Self {
        self.tag_id = Some(tag_id);
        self
    }

    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn build(self) -> Result<ProvenanceTagNode, BuildError> {
        Ok(ProvenanceTagNode {
            value: require(self.value, "ProvenanceTagNode", "value")?,
            children: self.children,
            tag_id: self.tag_id,
            properties: self.properties,
        })
    }
}

/// Builder for [`Value`].
///
/// The tag runs are not checked against `size` here; the encoder rejects a
/// mismatch, since that is where a bad assignment would leak onto the wire.
#[derive(Debug, Clone, Default)]
pub struct ValueBuilder {
    size: Option<u32>,
    type_name: Option<String>,
    bytes: Option<Vec<u8>>,
    tag: Option<TagRuns>,
}

impl ValueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.bytes = Some(bytes.into());
        self
    }

    pub fn tag(mut self, tag: TagRuns) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn build(self) -> Result<Value, BuildError> {
        Ok(Value {
            size: require(self.size, "Value", "size")?,
            type_name: self.type_name,
            bytes: self.bytes,
            tag: self.tag,
        })
    }
}
