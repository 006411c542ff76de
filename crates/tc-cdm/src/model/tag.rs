//! Provenance tag trees.
//!
//! A tag tree records how a piece of data was derived: interior nodes carry
//! an operation code, leaves carry the uuid of a source object or a security
//! label, and any node may instead point at a previously defined node by its
//! integer tag id.

use rustc_hash::FxHashSet;

use crate::model::builder::ProvenanceTagNodeBuilder;
use crate::model::{ConfidentialityTag, IntegrityTag, Properties, TagOpCode, Uuid};

/// Payload of a provenance tag node (closed union).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagValue {
    /// Reference to the node defined earlier in the stream with this tag id.
    Ref(i32),
    /// The uuid of the vertex the data came from.
    Uuid(Uuid),
    /// How the children combine.
    OpCode(TagOpCode),
    /// Integrity label.
    Integrity(IntegrityTag),
    /// Confidentiality label.
    Confidentiality(ConfidentialityTag),
}

impl TagValue {
    /// Returns the union arm discriminant used on the wire.
    pub fn arm(&self) -> u8 {
        match self {
            TagValue::Ref(_) => 0,
            TagValue::Uuid(_) => 1,
            TagValue::OpCode(_) => 2,
            TagValue::Integrity(_) => 3,
            TagValue::Confidentiality(_) => 4,
        }
    }

    /// Returns the referenced tag id if this is the reference arm.
    pub fn as_ref_id(&self) -> Option<i32> {
        match self {
            TagValue::Ref(id) => Some(*id),
            _ => None,
        }
    }
}

/// One node of a provenance tag tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceTagNode {
    pub(crate) value: TagValue,
    pub(crate) children: Option<Vec<ProvenanceTagNode>>,
    pub(crate) tag_id: Option<i32>,
    pub(crate) properties: Option<Properties>,
}

impl ProvenanceTagNode {
    /// Starts building a node.
    pub fn builder() -> ProvenanceTagNodeBuilder {
        ProvenanceTagNodeBuilder::new()
    }

    /// Shorthand for a childless node carrying `value`.
    pub fn leaf(value: TagValue) -> Self {
        Self {
            value,
            children: None,
            tag_id: None,
            properties: None,
        }
    }

    pub fn value(&self) -> &TagValue {
        &self.value
    }

    /// Child nodes in order; `None` when the list was absent on the wire.
    pub fn children(&self) -> Option<&[ProvenanceTagNode]> {
        self.children.as_deref()
    }

    pub fn tag_id(&self) -> Option<i32> {
        self.tag_id
    }

    pub fn properties(&self) -> Option<&Properties> {
        self.properties.as_ref()
    }

    /// Returns the height of the tree rooted here (a leaf has depth 1).
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            for child in node.children().unwrap_or_default() {
                stack.push((child, depth + 1));
            }
        }
        deepest
    }

    /// Returns true if some path from here is longer than `max` nodes. Stops
    /// at the first node past the limit.
    pub fn exceeds_depth(&self, max: usize) -> bool {
        let mut stack = vec![(self, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            if depth > max {
                return true;
            }
            for child in node.children().unwrap_or_default() {
                stack.push((child, depth + 1));
            }
        }
        false
    }

    /// Visits every node in pre-order (parents before children).
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Finds a node that names one of its own ancestors.
    ///
    /// Returns the offending tag id when a node's `tag_id`, or the id its
    /// reference arm points at, is already defined on the path from the root
    /// (a reference to the node's own id counts too).
    pub fn find_cycle(&self) -> Option<i32> {
        enum Step<'a> {
            Enter(&'a ProvenanceTagNode),
            Leave(Option<i32>),
        }

        let mut ancestors = FxHashSet::default();
        let mut stack = vec![Step::Enter(self)];
        while let Some(step) = stack.pop() {
            let node = match step {
                Step::Leave(Some(id)) => {
                    ancestors.remove(&id);
                    continue;
                }
                Step::Leave(None) => continue,
                Step::Enter(node) => node,
            };

            if let Some(id) = node.tag_id.filter(|id| ancestors.contains(id)) {
                return Some(id);
            }
            if let Some(target) = node.value.as_ref_id() {
                if ancestors.contains(&target) || node.tag_id == Some(target) {
                    return Some(target);
                }
            }

            stack.push(Step::Leave(node.tag_id));
            if let Some(id) = node.tag_id {
                ancestors.insert(id);
            }
            for child in node.children().unwrap_or_default().iter().rev() {
                stack.push(Step::Enter(child));
            }
        }
        None
    }
}

// Builders impose no depth limit, so tear long chains down without recursing.
impl Drop for ProvenanceTagNode {
    fn drop(&mut self) {
        let Some(mut pending) = self.children.take() else {
            return;
        };
        while let Some(mut node) = pending.pop() {
            if let Some(children) = node.children.take() {
                pending.extend(children);
            }
        }
    }
}

/// Pre-order iterator over a tag tree, see [`ProvenanceTagNode::walk`].
#[derive(Debug, Clone)]
pub struct Walk<'a> {
    stack: Vec<&'a ProvenanceTagNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a ProvenanceTagNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let Some(children) = node.children() {
            self.stack.extend(children.iter().rev());
        }
        Some(node)
    }
}
