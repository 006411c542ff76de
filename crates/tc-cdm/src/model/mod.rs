//! Data model types for the CDM provenance graph.
//!
//! This module contains all the core types:
//! - Identifiers (256-bit uuids)
//! - Enumerations (event, edge, object kinds and tag labels)
//! - Provenance tag trees and run-length value tags
//! - Vertex and edge records, and their builders
//! - The envelope datum

pub mod builder;
pub mod datum;
pub mod entity;
pub mod enums;
pub mod id;
pub mod tag;
pub mod value;

pub use builder::{
    AbstractObjectBuilder, EventBuilder, FileObjectBuilder, MemoryObjectBuilder,
    NetFlowObjectBuilder, PrincipalBuilder, ProvenanceTagNodeBuilder, SimpleEdgeBuilder,
    SrcSinkObjectBuilder, SubjectBuilder, ValueBuilder,
};
pub use datum::{DatumKind, TcCdmDatum};
pub use entity::{
    AbstractObject, Event, FileObject, MemoryObject, NetFlowObject, Permission, Principal,
    Properties, SimpleEdge, SrcSinkObject, Subject,
};
pub use enums::{
    CdmEnum, ConfidentialityTag, EdgeType, EnumFamily, EventType, InstrumentationSource,
    IntegrityTag, PrincipalType, SrcSinkType, SubjectType, TagOpCode,
};
pub use id::{derived_uuid, format_uuid, parse_uuid, subject_uuid, Uuid, NIL_UUID};
pub use tag::{ProvenanceTagNode, TagValue, Walk};
pub use value::{TagAssignment, TagRun, TagRuns, Value};
