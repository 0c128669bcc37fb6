// SPDX-License-Identifier: MIT OR Apache-2.0
//! Conversion between graphs and generic nested mappings.
//!
//! [`Mapping`] is a shared, ordered key/value map with identity. Like nodes,
//! mappings can be shared between several parents or form cycles, and both
//! conversion directions preserve that topology: every source object is
//! converted once and the result reused wherever the source appears again.

use crate::graph::{AttributeError, Graph};
use crate::node::NodeId;
use crate::value::{CustomValue, Value};
use indexmap::IndexMap;
use num_bigint::BigInt;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

/// Value stored in a [`Mapping`]
#[derive(Debug, Clone)]
pub enum MapValue {
    /// Text string
    Str(String),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Arbitrary-precision integer
    BigInt(BigInt),
    /// Extension value
    Custom(CustomValue),
    /// Nested mapping
    Map(Mapping),
}

impl MapValue {
    /// Split into a scalar attribute value or the nested mapping
    fn into_value(self) -> Result<Value, Mapping> {
        Ok(match self {
            Self::Str(v) => Value::Str(v),
            Self::Int(v) => Value::Int(v),
            Self::Float(v) => Value::Float(v),
            Self::Bool(v) => Value::Bool(v),
            Self::BigInt(v) => Value::BigInt(v),
            Self::Custom(v) => Value::Custom(v),
            Self::Map(map) => return Err(map),
        })
    }

    /// Convert a scalar attribute value, or hand back the referenced node
    fn from_value(value: &Value) -> Result<Self, NodeId> {
        Ok(match value {
            Value::Str(v) => Self::Str(v.clone()),
            Value::Int(v) => Self::Int(*v),
            Value::Float(v) => Self::Float(*v),
            Value::Bool(v) => Self::Bool(*v),
            Value::BigInt(v) => Self::BigInt(v.clone()),
            Value::Custom(v) => Self::Custom(v.clone()),
            Value::Node(id) => return Err(*id),
        })
    }

    /// Get the nested mapping, if this is one
    pub fn as_map(&self) -> Option<&Mapping> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl From<&str> for MapValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for MapValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for MapValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for MapValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for MapValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MapValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<BigInt> for MapValue {
    fn from(value: BigInt) -> Self {
        Self::BigInt(value)
    }
}

impl From<Mapping> for MapValue {
    fn from(value: Mapping) -> Self {
        Self::Map(value)
    }
}

/// Shared, ordered mapping with identity.
///
/// Cloning a `Mapping` clones the handle, not the contents. Cycles between
/// mappings are reference cycles and are only freed when broken by the owner.
#[derive(Clone, Default)]
pub struct Mapping(Rc<RefCell<IndexMap<String, MapValue>>>);

impl Mapping {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry. Existing keys keep their position.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<MapValue>) -> Option<MapValue> {
        self.0.borrow_mut().insert(key.into(), value.into())
    }

    /// Get an entry
    pub fn get(&self, key: &str) -> Option<MapValue> {
        self.0.borrow().get(key).cloned()
    }

    /// Keys in order
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    /// Entries in order
    pub fn entries(&self) -> Vec<(String, MapValue)> {
        self.0
            .borrow()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Whether the mapping is empty
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Whether both handles refer to the same mapping
    pub fn ptr_eq(&self, other: &Mapping) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Structural equality, terminating on cycles.
    ///
    /// Same keys in the same order with equal values; nested mappings are
    /// compared the same way, guarded on visited pairs.
    pub fn structurally_eq(&self, other: &Mapping) -> bool {
        let mut visited: HashSet<(usize, usize)> = HashSet::new();
        let mut pending = vec![(self.clone(), other.clone())];

        while let Some((a, b)) = pending.pop() {
            if !visited.insert((a.identity(), b.identity())) {
                continue;
            }
            let (entries_a, entries_b) = (a.entries(), b.entries());
            if entries_a.len() != entries_b.len() {
                return false;
            }
            for ((key_a, value_a), (key_b, value_b)) in entries_a.into_iter().zip(entries_b) {
                if key_a != key_b {
                    return false;
                }
                match (value_a.into_value(), value_b.into_value()) {
                    (Err(child_a), Err(child_b)) => pending.push((child_a, child_b)),
                    (Ok(a), Ok(b)) if a == b => {}
                    _ => return false,
                }
            }
        }
        true
    }

    /// Build a mapping tree from a JSON object.
    ///
    /// Objects become mappings; strings, booleans and numbers become scalars.
    /// Integers outside `i64` become big integers. Arrays and nulls have no
    /// counterpart and are rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, BridgeError> {
        match value {
            serde_json::Value::Object(object) => {
                let mapping = Mapping::new();
                for (key, value) in object {
                    let value = match value {
                        serde_json::Value::Object(_) => MapValue::Map(Self::from_json(value)?),
                        serde_json::Value::String(s) => MapValue::Str(s.clone()),
                        serde_json::Value::Bool(b) => MapValue::Bool(*b),
                        serde_json::Value::Number(n) => json_number(n),
                        serde_json::Value::Array(_) => {
                            return Err(BridgeError::UnsupportedJson {
                                key: key.clone(),
                                kind: "array",
                            })
                        }
                        serde_json::Value::Null => {
                            return Err(BridgeError::UnsupportedJson {
                                key: key.clone(),
                                kind: "null",
                            })
                        }
                    };
                    mapping.insert(key.clone(), value);
                }
                Ok(mapping)
            }
            _ => Err(BridgeError::UnsupportedJson {
                key: String::new(),
                kind: "non-object root",
            }),
        }
    }

    /// Convert to a JSON object.
    ///
    /// Shared mappings are written out at every occurrence. Cycles cannot be
    /// represented and fail with [`BridgeError::Cycle`].
    pub fn to_json(&self) -> Result<serde_json::Value, BridgeError> {
        let mut ancestors = Vec::new();
        self.to_json_inner(&mut ancestors)
    }

    fn to_json_inner(&self, ancestors: &mut Vec<usize>) -> Result<serde_json::Value, BridgeError> {
        ancestors.push(self.identity());
        let mut object = serde_json::Map::new();
        for (key, value) in self.entries() {
            let json = match &value {
                MapValue::Map(child) => {
                    if ancestors.contains(&child.identity()) {
                        return Err(BridgeError::Cycle { key });
                    }
                    child.to_json_inner(ancestors)?
                }
                MapValue::Str(s) => serde_json::Value::from(s.as_str()),
                MapValue::Int(i) => serde_json::Value::from(*i),
                MapValue::Bool(b) => serde_json::Value::from(*b),
                MapValue::Float(f) => serde_json::Number::from_f64(*f)
                    .map(serde_json::Value::Number)
                    .ok_or_else(|| BridgeError::Unrepresentable {
                        key: key.clone(),
                        reason: "non-finite float",
                    })?,
                MapValue::BigInt(big) => i64::try_from(big)
                    .map(serde_json::Value::from)
                    .map_err(|_| BridgeError::Unrepresentable {
                        key: key.clone(),
                        reason: "integer out of range",
                    })?,
                MapValue::Custom(_) => {
                    return Err(BridgeError::Unrepresentable {
                        key,
                        reason: "extension value",
                    })
                }
            };
            object.insert(key, json);
        }
        ancestors.pop();
        Ok(serde_json::Value::Object(object))
    }
}

fn json_number(n: &serde_json::Number) -> MapValue {
    if let Some(i) = n.as_i64() {
        MapValue::Int(i)
    } else if let Some(u) = n.as_u64() {
        MapValue::BigInt(BigInt::from(u))
    } else {
        MapValue::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

impl fmt::Debug for Mapping {
    // Contents may be cyclic, so only identity and size are shown
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("id", &format_args!("{:#x}", self.identity()))
            .field("keys", &self.keys())
            .finish()
    }
}

/// Convert a mapping (and everything reachable from it) into nodes of `graph`.
///
/// On error no node is added to `graph`.
pub fn from_mapping(graph: &mut Graph, mapping: &Mapping) -> Result<NodeId, AttributeError> {
    let count = graph.node_count();
    let result = build_nodes(graph, mapping);
    if result.is_err() {
        graph.truncate(count);
    }
    result
}

fn build_nodes(graph: &mut Graph, mapping: &Mapping) -> Result<NodeId, AttributeError> {
    let mut memo: HashMap<usize, NodeId> = HashMap::new();
    let root = graph.add_node();
    memo.insert(mapping.identity(), root);
    let mut pending = vec![(mapping.clone(), root)];

    while let Some((source, target)) = pending.pop() {
        for (key, value) in source.entries() {
            let value = match value.into_value() {
                Ok(scalar) => scalar,
                Err(child) => {
                    let id = match memo.get(&child.identity()) {
                        Some(id) => *id,
                        None => {
                            let id = graph.add_node();
                            memo.insert(child.identity(), id);
                            pending.push((child, id));
                            id
                        }
                    };
                    Value::Node(id)
                }
            };
            graph.set(target, key, value)?;
        }
    }

    tracing::debug!(nodes = memo.len(), "Converted mapping to graph");
    Ok(root)
}

/// Convert a node (and everything reachable from it) into mappings
pub fn to_mapping(graph: &Graph, node: NodeId) -> Result<Mapping, AttributeError> {
    let mut memo: HashMap<NodeId, Mapping> = HashMap::new();
    let root = Mapping::new();
    memo.insert(node, root.clone());
    let mut pending = vec![(node, root.clone())];

    while let Some((source, target)) = pending.pop() {
        let source_node = graph.node(source).ok_or(AttributeError::UnknownNode(source))?;
        for (name, value) in source_node.attributes() {
            let value = match MapValue::from_value(value) {
                Ok(scalar) => scalar,
                Err(child) => {
                    let mapping = match memo.get(&child) {
                        Some(mapping) => mapping.clone(),
                        None => {
                            let mapping = Mapping::new();
                            memo.insert(child, mapping.clone());
                            pending.push((child, mapping.clone()));
                            mapping
                        }
                    };
                    MapValue::Map(mapping)
                }
            };
            target.insert(name, value);
        }
    }

    tracing::debug!(mappings = memo.len(), "Converted graph to mapping");
    Ok(root)
}

/// Error when converting a mapping from or to JSON
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Mapping refers back to one of its ancestors
    #[error("Cyclic reference at key `{key}` cannot be represented as JSON")]
    Cycle {
        /// Key holding the back reference
        key: String,
    },

    /// JSON value has no mapping counterpart
    #[error("Unsupported JSON {kind} at key `{key}`")]
    UnsupportedJson {
        /// Key holding the value
        key: String,
        /// JSON kind
        kind: &'static str,
    },

    /// Value cannot be represented as JSON
    #[error("Value at key `{key}` cannot be represented as JSON: {reason}")]
    Unrepresentable {
        /// Key holding the value
        key: String,
        /// Why
        reason: &'static str,
    },
}
