//! Semantic validation for CDM records.
//!
//! Structural checks happen during decode. The checks here need context the
//! codec does not keep: which tag ids a stream has defined so far, or which
//! two file objects an edge connects.

use rustc_hash::FxHashMap;

use crate::error::ValidationError;
use crate::model::{EdgeType, FileObject, ProvenanceTagNode, SimpleEdge, TagValue};

/// Tag ids defined so far on a stream, for resolving reference arms.
///
/// The codec never resolves references itself; consumers that need them feed
/// every decoded tag tree through [`TagTable::define`] in stream order.
#[derive(Debug, Clone, Default)]
pub struct TagTable {
    nodes: FxHashMap<i32, ProvenanceTagNode>,
}

impl TagTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Registers every node of `tree` that carries a tag id.
    ///
    /// Fails without registering anything if any id is already defined,
    /// either earlier on the stream or twice within `tree`.
    pub fn define(&mut self, tree: &ProvenanceTagNode) -> Result<(), ValidationError> {
        let mut pending: FxHashMap<i32, &ProvenanceTagNode> = FxHashMap::default();
        for node in tree.walk() {
            let Some(tag_id) = node.tag_id() else {
                continue;
            };
            if self.nodes.contains_key(&tag_id) || pending.insert(tag_id, node).is_some() {
                return Err(ValidationError::DuplicateTagId { tag_id });
            }
        }
        self.nodes
            .extend(pending.into_iter().map(|(id, node)| (id, node.clone())));
        Ok(())
    }

    /// Looks up a defined tag id.
    pub fn resolve(&self, tag_id: i32) -> Result<&ProvenanceTagNode, ValidationError> {
        self.nodes
            .get(&tag_id)
            .ok_or(ValidationError::UnresolvedTagReference { tag_id })
    }

    /// Checks that every reference arm in `tree` names a defined tag id.
    pub fn resolve_references(&self, tree: &ProvenanceTagNode) -> Result<(), ValidationError> {
        for node in tree.walk() {
            if let TagValue::Ref(tag_id) = *node.value() {
                self.resolve(tag_id)?;
            }
        }
        Ok(())
    }
}

/// Checks a tag tree's shape: no deeper than `max_depth` and no node naming
/// one of its own ancestors.
pub fn validate_tag_tree(tree: &ProvenanceTagNode, max_depth: usize) -> Result<(), ValidationError> {
    if tree.exceeds_depth(max_depth) {
        return Err(ValidationError::MaxDepthExceeded { max: max_depth });
    }
    if let Some(tag_id) = tree.find_cycle() {
        return Err(ValidationError::CyclicTagTree { tag_id });
    }
    Ok(())
}

/// Checks an `EDGE_OBJECT_PREV_VERSION` edge between two file versions.
///
/// The edge runs from the newer version to the one it replaces, and the
/// version number must strictly increase along it.
pub fn validate_version_chain(
    edge: &SimpleEdge,
    newer: &FileObject,
    older: &FileObject,
) -> Result<(), ValidationError> {
    if edge.edge_type() != EdgeType::ObjectPrevVersion {
        return Err(ValidationError::NotAPrevVersionEdge);
    }
    if edge.from_uuid() != newer.uuid() || edge.to_uuid() != older.uuid() {
        return Err(ValidationError::VersionChainMismatch {
            from: *edge.from_uuid(),
            to: *edge.to_uuid(),
        });
    }
    if newer.version() <= older.version() {
        return Err(ValidationError::VersionNotIncreasing {
            older: older.version(),
            newer: newer.version(),
        });
    }
    Ok(())
}
