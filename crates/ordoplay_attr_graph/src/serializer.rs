// SPDX-License-Identifier: MIT OR Apache-2.0
//! Text encoding of an attribute graph.
//!
//! The graph is walked depth first in attribute order. The first time a node
//! is reached its body is written as
//!
//! ```text
//! 0 {
//! 	apple(int)  :0
//! 	child(*)    :1 {
//! 		back(*):0
//! 	}
//! }
//! ```
//!
//! and every later encounter writes only its number. Numbers are assigned per
//! stream in emission order, so output is deterministic for a given graph.

use crate::config::FormatOptions;
use crate::escape::escape;
use crate::graph::Graph;
use crate::node::{Node, NodeId};
use crate::registry::CodecError;
use crate::value::{Value, ValueKind};
use std::collections::HashMap;
use std::path::Path;

/// Writes a graph to the text format
pub struct Serializer<'g> {
    /// Graph being written
    graph: &'g Graph,
    /// Formatting options
    options: FormatOptions,
}

/// A node whose attributes are being written
struct Frame {
    node: NodeId,
    /// Next attribute index
    next: usize,
    /// Nesting level of the node; its attributes are indented one deeper
    depth: usize,
    /// Width of the widest `name(tag)` prefix, for alignment
    width: usize,
}

impl<'g> Serializer<'g> {
    /// Create a serializer with default options
    pub fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            options: FormatOptions::default(),
        }
    }

    /// Use specific options
    pub fn with_options(mut self, options: FormatOptions) -> Self {
        self.options = options;
        self
    }

    /// Serialize everything reachable from `root`
    pub fn serialize(&self, root: NodeId) -> Result<String, SerializeError> {
        let root_node = self.node(root)?;
        let mut out = String::new();
        let mut tokens: HashMap<NodeId, usize> = HashMap::new();
        let mut attributes = 0usize;

        Self::open(&mut out, &mut tokens, root);
        let mut stack = vec![self.frame(root_node, 0)];

        while let Some(frame) = stack.last_mut() {
            let (node_id, depth, width) = (frame.node, frame.depth, frame.width);
            let index = frame.next;
            frame.next += 1;

            let node = self.node(node_id)?;
            let Some((name, value)) = node.attribute_at(index) else {
                indent(&mut out, depth);
                out.push_str("}\n");
                stack.pop();
                continue;
            };
            attributes += 1;

            match value {
                Value::Custom(custom) => {
                    // Cloned out so the lock is released while the writer runs
                    let writer = self
                        .graph
                        .registry()
                        .read()
                        .codec_for_type(custom.value_type_id())
                        .and_then(|codec| codec.writer().cloned())
                        .ok_or_else(|| SerializeError::UnregisteredType {
                            name: name.to_string(),
                            type_name: custom.type_name(),
                        })?;
                    writer
                        .write(&mut out, depth + 1, name, custom)
                        .map_err(|source| SerializeError::Codec {
                            name: name.to_string(),
                            source,
                        })?;
                }
                Value::Node(child) => {
                    self.prefix(&mut out, depth + 1, width, name, ValueKind::NODE_TAG);
                    if let Some(token) = tokens.get(child) {
                        out.push_str(&token.to_string());
                        out.push('\n');
                    } else {
                        let child_node = self.node(*child)?;
                        Self::open(&mut out, &mut tokens, *child);
                        stack.push(self.frame(child_node, depth + 1));
                    }
                }
                scalar => {
                    self.prefix(&mut out, depth + 1, width, name, scalar.kind().tag());
                    write_scalar(&mut out, scalar);
                    out.push('\n');
                }
            }
        }

        tracing::debug!(
            nodes = tokens.len(),
            attributes,
            bytes = out.len(),
            "Serialized attribute graph"
        );
        Ok(out)
    }

    /// Serialize everything reachable from `root` into a file
    pub fn write(&self, root: NodeId, path: &Path) -> Result<(), SerializeError> {
        let text = self.serialize(root)?;
        std::fs::write(path, text)?;
        tracing::info!("Saved attribute graph to {:?}", path);
        Ok(())
    }

    fn node(&self, id: NodeId) -> Result<&'g Node, SerializeError> {
        self.graph.node(id).ok_or(SerializeError::UnknownNode(id))
    }

    fn frame(&self, node: &Node, depth: usize) -> Frame {
        let width = if self.options.align_values {
            node.attributes()
                .filter_map(|(name, value)| match value {
                    Value::Custom(_) => None,
                    _ => Some(name.len() + value.kind().tag().len() + 2),
                })
                .max()
                .unwrap_or(0)
        } else {
            0
        };
        Frame {
            node: node.id(),
            next: 0,
            depth,
            width,
        }
    }

    /// Write `<token> {` and assign the node its token
    fn open(out: &mut String, tokens: &mut HashMap<NodeId, usize>, node: NodeId) {
        let token = tokens.len();
        tokens.insert(node, token);
        tracing::trace!(%node, token, "Opening node");
        out.push_str(&token.to_string());
        out.push_str(" {\n");
    }

    /// Write `name(tag)`, alignment padding and `:`
    fn prefix(&self, out: &mut String, depth: usize, width: usize, name: &str, tag: &str) {
        indent(out, depth);
        out.push_str(name);
        out.push('(');
        out.push_str(tag);
        out.push(')');
        let used = name.len() + tag.len() + 2;
        for _ in used..width {
            out.push(' ');
        }
        out.push(':');
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn write_scalar(out: &mut String, value: &Value) {
    match value {
        Value::Str(text) => out.push_str(&escape(text)),
        Value::Int(v) => out.push_str(&v.to_string()),
        // Debug keeps the fractional part (`200.0`) and round-trips exactly
        Value::Float(v) => out.push_str(&format!("{v:?}")),
        Value::Bool(v) => out.push_str(if *v { "true" } else { "false" }),
        Value::BigInt(v) => out.push_str(&v.to_string()),
        Value::Node(_) | Value::Custom(_) => {}
    }
}

/// Error when serializing a graph
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// Node is not part of the graph
    #[error("Node not found: {0}")]
    UnknownNode(NodeId),

    /// Extension value whose type is no longer registered
    #[error("Attribute `{name}` holds unregistered type {type_name}")]
    UnregisteredType {
        /// Attribute name
        name: String,
        /// Rust type of the value
        type_name: &'static str,
    },

    /// Registered writer failed
    #[error("Failed to write attribute `{name}`: {source}")]
    Codec {
        /// Attribute name
        name: String,
        /// Writer error
        #[source]
        source: CodecError,
    },

    /// File could not be written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
