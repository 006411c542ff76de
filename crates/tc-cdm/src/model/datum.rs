//! The envelope record multiplexing every record kind on one stream.

use crate::model::{
    Event, FileObject, MemoryObject, NetFlowObject, Principal, ProvenanceTagNode, SimpleEdge,
    SrcSinkObject, Subject,
};

/// Stable wire discriminant of an envelope arm.
///
/// Codes are fixed per kind and unrelated to the order of arms in
/// [`TcCdmDatum`]; new kinds only ever take new codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DatumKind {
    Subject = 1,
    Event = 2,
    NetFlowObject = 3,
    FileObject = 4,
    SrcSinkObject = 5,
    MemoryObject = 6,
    Principal = 7,
    SimpleEdge = 8,
    ProvenanceTagNode = 9,
}

impl DatumKind {
    pub const ALL: [DatumKind; 9] = [
        DatumKind::Subject,
        DatumKind::Event,
        DatumKind::NetFlowObject,
        DatumKind::FileObject,
        DatumKind::SrcSinkObject,
        DatumKind::MemoryObject,
        DatumKind::Principal,
        DatumKind::SimpleEdge,
        DatumKind::ProvenanceTagNode,
    ];

    /// Returns the wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Creates a DatumKind from its wire code.
    pub fn from_code(code: u8) -> Option<DatumKind> {
        match code {
            1 => Some(DatumKind::Subject),
            2 => Some(DatumKind::Event),
            3 => Some(DatumKind::NetFlowObject),
            4 => Some(DatumKind::FileObject),
            5 => Some(DatumKind::SrcSinkObject),
            6 => Some(DatumKind::MemoryObject),
            7 => Some(DatumKind::Principal),
            8 => Some(DatumKind::SimpleEdge),
            9 => Some(DatumKind::ProvenanceTagNode),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DatumKind::Subject => "Subject",
            DatumKind::Event => "Event",
            DatumKind::NetFlowObject => "NetFlowObject",
            DatumKind::FileObject => "FileObject",
            DatumKind::SrcSinkObject => "SrcSinkObject",
            DatumKind::MemoryObject => "MemoryObject",
            DatumKind::Principal => "Principal",
            DatumKind::SimpleEdge => "SimpleEdge",
            DatumKind::ProvenanceTagNode => "ProvenanceTagNode",
        }
    }
}

/// One record on a CDM stream (closed union; exactly one arm per instance).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TcCdmDatum {
    ProvenanceTagNode(ProvenanceTagNode),
    Subject(Subject),
    Event(Event),
    NetFlowObject(NetFlowObject),
    FileObject(FileObject),
    SrcSinkObject(SrcSinkObject),
    MemoryObject(MemoryObject),
    Principal(Principal),
    SimpleEdge(SimpleEdge),
}

impl TcCdmDatum {
    pub fn kind(&self) -> DatumKind {
        match self {
            TcCdmDatum::ProvenanceTagNode(_) => DatumKind::ProvenanceTagNode,
            TcCdmDatum::Subject(_) => DatumKind::Subject,
            TcCdmDatum::Event(_) => DatumKind::Event,
            TcCdmDatum::NetFlowObject(_) => DatumKind::NetFlowObject,
            TcCdmDatum::FileObject(_) => DatumKind::FileObject,
            TcCdmDatum::SrcSinkObject(_) => DatumKind::SrcSinkObject,
            TcCdmDatum::MemoryObject(_) => DatumKind::MemoryObject,
            TcCdmDatum::Principal(_) => DatumKind::Principal,
            TcCdmDatum::SimpleEdge(_) => DatumKind::SimpleEdge,
        }
    }

    /// Returns the vertex uuid, or `None` for edges and tag nodes.
    pub fn vertex_uuid(&self) -> Option<&crate::model::Uuid> {
        match self {
            TcCdmDatum::Subject(s) => Some(s.uuid()),
            TcCdmDatum::Event(e) => Some(e.uuid()),
            TcCdmDatum::NetFlowObject(o) => Some(o.uuid()),
            TcCdmDatum::FileObject(o) => Some(o.uuid()),
            TcCdmDatum::SrcSinkObject(o) => Some(o.uuid()),
            TcCdmDatum::MemoryObject(o) => Some(o.uuid()),
            TcCdmDatum::Principal(p) => Some(p.uuid()),
            TcCdmDatum::SimpleEdge(_) | TcCdmDatum::ProvenanceTagNode(_) => None,
        }
    }
}

macro_rules! impl_from_arm {
    ($($arm:ident),+ $(,)?) => {
        $(
            impl From<$arm> for TcCdmDatum {
                fn from(record: $arm) -> Self {
                    TcCdmDatum::$arm(record)
                }
            }
        )+
    };
}

impl_from_arm!(
    ProvenanceTagNode,
    Subject,
    Event,
    NetFlowObject,
    FileObject,
    SrcSinkObject,
    MemoryObject,
    Principal,
    SimpleEdge,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_roundtrip() {
        for kind in DatumKind::ALL {
            assert_eq!(DatumKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(DatumKind::from_code(0), None);
        assert_eq!(DatumKind::from_code(10), None);
    }

    #[test]
    fn test_tag_node_code_is_not_declaration_order() {
        assert_eq!(DatumKind::ProvenanceTagNode.code(), 9);
        assert_eq!(DatumKind::Subject.code(), 1);
    }
}
