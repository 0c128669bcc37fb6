// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure owning all nodes.
//!
//! Nodes live in an arena keyed by [`NodeId`]. A node-valued attribute stores
//! the id of its target, so shared and cyclic structure needs no shared
//! ownership.

use crate::deserializer::{DeserializeError, Deserializer};
use crate::equality;
use crate::node::{is_valid_attribute_name, Node, NodeId};
use crate::registry::{SharedRegistry, TypeRegistry};
use crate::serializer::{SerializeError, Serializer};
use crate::value::Value;
use indexmap::IndexMap;
use std::path::Path;

/// An attribute graph
#[derive(Debug, Clone)]
pub struct Graph {
    /// Nodes in creation order
    nodes: IndexMap<NodeId, Node>,
    /// Extension types accepted by the type guard
    registry: SharedRegistry,
}

impl Graph {
    /// Create an empty graph using the process-wide type registry
    pub fn new() -> Self {
        Self::with_registry(TypeRegistry::global())
    }

    /// Create an empty graph using a specific type registry
    pub fn with_registry(registry: SharedRegistry) -> Self {
        Self {
            nodes: IndexMap::new(),
            registry,
        }
    }

    /// Type registry used by this graph
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Add an empty node
    pub fn add_node(&mut self) -> NodeId {
        let id = NodeId::new();
        self.nodes.insert(id, Node::new(id));
        id
    }

    /// Add a node populated from ordered pairs.
    ///
    /// Every pair goes through the type guard first; no node is added if any
    /// of them is rejected.
    pub fn add_node_with<I, K, V>(&mut self, pairs: I) -> Result<NodeId, AttributeError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let pairs: Vec<(String, Value)> = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        for (name, value) in &pairs {
            self.check_attribute(name, value)?;
        }

        let id = NodeId::new();
        let mut node = Node::new(id);
        for (name, value) in pairs {
            node.insert(name, value);
        }
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Drop every node added after the graph held `count` nodes.
    ///
    /// Used to undo a failed bulk construction. Nodes added since then must
    /// only be referenced by each other.
    pub(crate) fn truncate(&mut self, count: usize) {
        self.nodes.truncate(count);
    }

    /// Get a node by ID
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Whether the node belongs to this graph
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get an attribute value
    pub fn get(&self, node: NodeId, name: &str) -> Result<&Value, AttributeError> {
        self.node(node)
            .ok_or(AttributeError::UnknownNode(node))?
            .get(name)
            .ok_or_else(|| AttributeError::NotFound {
                node,
                name: name.to_string(),
            })
    }

    /// Follow a node-valued attribute
    pub fn child(&self, node: NodeId, name: &str) -> Result<NodeId, AttributeError> {
        let value = self.get(node, name)?;
        value.as_node().ok_or_else(|| AttributeError::NotANode {
            node,
            name: name.to_string(),
        })
    }

    /// Set an attribute.
    ///
    /// A new name is appended after the existing attributes; an existing name
    /// keeps its position and only the value changes.
    pub fn set(
        &mut self,
        node: NodeId,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), AttributeError> {
        let name = name.into();
        let value = value.into();
        self.check_attribute(&name, &value)?;
        self.nodes
            .get_mut(&node)
            .ok_or(AttributeError::UnknownNode(node))?
            .insert(name, value);
        Ok(())
    }

    /// Attribute names of a node in order
    pub fn attribute_names(
        &self,
        node: NodeId,
    ) -> Result<impl Iterator<Item = &str>, AttributeError> {
        Ok(self
            .node(node)
            .ok_or(AttributeError::UnknownNode(node))?
            .attribute_names())
    }

    /// Type guard applied to every assignment
    fn check_attribute(&self, name: &str, value: &Value) -> Result<(), AttributeError> {
        if !is_valid_attribute_name(name) {
            return Err(AttributeError::InvalidName(name.to_string()));
        }
        match value {
            Value::Node(target) if !self.contains(*target) => {
                Err(AttributeError::UnknownNode(*target))
            }
            Value::Custom(custom) if !self.registry.read().contains_type_id(custom.value_type_id()) => {
                Err(AttributeError::UnsupportedType {
                    name: name.to_string(),
                    type_name: custom.type_name(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Serialize the graph reachable from `root` with default options
    pub fn serialize(&self, root: NodeId) -> Result<String, SerializeError> {
        Serializer::new(self).serialize(root)
    }

    /// Deserialize a graph with default options.
    ///
    /// Returns the new graph and its root.
    pub fn deserialize(text: &str) -> Result<(Self, NodeId), DeserializeError> {
        Deserializer::new().deserialize(text)
    }

    /// Serialize the graph reachable from `root` to a file
    pub fn write(&self, root: NodeId, path: &Path) -> Result<(), SerializeError> {
        Serializer::new(self).write(root, path)
    }

    /// Load a graph from a file
    pub fn load(path: &Path) -> Result<(Self, NodeId), DeserializeError> {
        Deserializer::new().load(path)
    }

    /// Structural equality between `a` in this graph and `b` in `other`
    pub fn structurally_eq(&self, a: NodeId, other: &Graph, b: NodeId) -> bool {
        equality::equals(self, a, other, b)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

/// Error when reading or assigning an attribute
#[derive(Debug, thiserror::Error)]
pub enum AttributeError {
    /// Node has no attribute with this name
    #[error("Attribute `{name}` not found on node {node}")]
    NotFound {
        /// Node that was queried
        node: NodeId,
        /// Missing attribute
        name: String,
    },

    /// Attribute exists but does not reference a node
    #[error("Attribute `{name}` on node {node} is not a node reference")]
    NotANode {
        /// Node that was queried
        node: NodeId,
        /// Attribute name
        name: String,
    },

    /// Value type is neither built in nor registered
    #[error("Unsupported type {type_name} for attribute `{name}`")]
    UnsupportedType {
        /// Attribute name
        name: String,
        /// Rust type of the rejected value
        type_name: &'static str,
    },

    /// Node does not belong to this graph
    #[error("Node not found: {0}")]
    UnknownNode(NodeId),

    /// Name cannot be written unambiguously
    #[error("Invalid attribute name: {0:?}")]
    InvalidName(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeCodec;
    use num_bigint::BigInt;

    fn isolated_graph() -> Graph {
        Graph::with_registry(TypeRegistry::new().into_shared())
    }

    #[test]
    fn test_set_and_get() {
        let mut graph = isolated_graph();
        let node = graph.add_node();
        graph.set(node, "apple", 0).unwrap();
        graph.set(node, "banana", 1).unwrap();
        graph.set(node, "apple", 5).unwrap();

        assert_eq!(graph.get(node, "apple").unwrap(), &Value::Int(5));
        let names: Vec<_> = graph.attribute_names(node).unwrap().collect();
        assert_eq!(names, ["apple", "banana"]);
        assert!(matches!(
            graph.get(node, "cherry"),
            Err(AttributeError::NotFound { .. })
        ));
    }

    #[test]
    fn test_primitives_and_nodes_are_accepted() {
        let mut graph = isolated_graph();
        let node = graph.add_node();
        let other = graph.add_node();

        graph.set(node, "text", "hello").unwrap();
        graph.set(node, "integer", 42).unwrap();
        graph.set(node, "float", 1.5).unwrap();
        graph.set(node, "boolean", true).unwrap();
        graph.set(node, "big", BigInt::from(7u8).pow(60)).unwrap();
        graph.set(node, "child", other).unwrap();
        graph.set(node, "self", node).unwrap();

        assert_eq!(graph.node(node).unwrap().len(), 7);
        assert_eq!(graph.child(node, "self").unwrap(), node);
    }

    #[test]
    fn test_unsupported_type_is_rejected() {
        let mut graph = isolated_graph();
        let node = graph.add_node();

        let err = graph.set(node, "list", Value::custom(vec![1, 2, 3])).unwrap_err();
        assert!(matches!(err, AttributeError::UnsupportedType { .. }));
        assert!(graph.node(node).unwrap().is_empty());
    }

    #[test]
    fn test_registered_type_is_accepted() {
        let registry = TypeRegistry::new().into_shared();
        registry
            .write()
            .register(TypeCodec::display::<u16>("port"))
            .unwrap();
        let mut graph = Graph::with_registry(registry);
        let node = graph.add_node();

        graph.set(node, "port", Value::custom(8080u16)).unwrap();
        assert_eq!(
            graph.get(node, "port").unwrap().as_custom().unwrap().downcast_ref::<u16>(),
            Some(&8080)
        );
    }

    #[test]
    fn test_foreign_node_is_rejected() {
        let mut graph = isolated_graph();
        let mut other = isolated_graph();
        let node = graph.add_node();
        let foreign = other.add_node();

        assert!(matches!(
            graph.set(node, "foreign", foreign),
            Err(AttributeError::UnknownNode(id)) if id == foreign
        ));
    }

    #[test]
    fn test_invalid_name_is_rejected() {
        let mut graph = isolated_graph();
        let node = graph.add_node();
        assert!(matches!(
            graph.set(node, "a(b)", 1),
            Err(AttributeError::InvalidName(_))
        ));
    }

    #[test]
    fn test_add_node_with_pairs() {
        let mut graph = isolated_graph();
        let node = graph
            .add_node_with([("x", Value::from(1)), ("y", Value::from("two"))])
            .unwrap();
        let names: Vec<_> = graph.attribute_names(node).unwrap().collect();
        assert_eq!(names, ["x", "y"]);

        let before = graph.node_count();
        let rejected = graph.add_node_with([("ok", Value::from(1)), ("bad", Value::custom(0u64))]);
        assert!(rejected.is_err());
        assert_eq!(graph.node_count(), before);
    }
}
