// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the attribute graph.

use crate::value::Value;
use indexmap::IndexMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Transient identity of a node.
///
/// Unique within the process for the lifetime of the program. Identities are
/// never written to a stream as-is; the serializer numbers nodes per stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate a fresh node ID
    pub fn new() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Characters that would make an attribute line ambiguous
const RESERVED_NAME_CHARS: &[char] = &['(', ')', ':', '{', '}', '\t', '\r', '\n'];

/// Check whether `name` can be used as an attribute name.
///
/// Surrounding whitespace is rejected since lenient indentation strips it.
pub fn is_valid_attribute_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(RESERVED_NAME_CHARS) && name.trim() == name
}

/// A node: an ordered set of named attributes
#[derive(Debug, Clone)]
pub struct Node {
    /// Identity of this node
    id: NodeId,
    /// Attributes in order of first assignment
    attributes: IndexMap<String, Value>,
}

impl Node {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            attributes: IndexMap::new(),
        }
    }

    /// Identity of this node
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get an attribute by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Whether the node has an attribute called `name`
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Attribute names in order
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Attributes in order
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attributes.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Attribute at a position
    pub fn attribute_at(&self, index: usize) -> Option<(&str, &Value)> {
        self.attributes
            .get_index(index)
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the node has no attributes
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Insert or overwrite. An existing name keeps its position.
    pub(crate) fn insert(&mut self, name: String, value: Value) {
        self.attributes.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ids_are_unique() {
        let a = NodeId::new();
        let b = NodeId::new();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn test_reassignment_keeps_position() {
        let mut node = Node::new(NodeId::new());
        node.insert("a".to_string(), Value::Int(1));
        node.insert("b".to_string(), Value::Int(2));
        node.insert("a".to_string(), Value::Int(3));

        let names: Vec<_> = node.attribute_names().collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(node.get("a"), Some(&Value::Int(3)));
        assert_eq!(node.attribute_at(1), Some(("b", &Value::Int(2))));
    }

    #[test]
    fn test_attribute_names() {
        assert!(is_valid_attribute_name("some_float"));
        assert!(is_valid_attribute_name("with space"));
        assert!(!is_valid_attribute_name(""));
        assert!(!is_valid_attribute_name("bad(name"));
        assert!(!is_valid_attribute_name("bad:name"));
        assert!(!is_valid_attribute_name("line\nbreak"));
        assert!(!is_valid_attribute_name(" lead"));
        assert!(!is_valid_attribute_name("trail "));
    }
}
