// SPDX-License-Identifier: MIT OR Apache-2.0
//! Streaming parser for the text format.
//!
//! A node is allocated and registered under its stream token as soon as its
//! opening line is read, before any of its attributes. References met while
//! the node is still being populated (cycles back to an ancestor or to the
//! node itself) therefore resolve to the same instance.

use crate::config::FormatOptions;
use crate::escape::{unescape, InvalidEscape};
use crate::graph::{AttributeError, Graph};
use crate::node::NodeId;
use crate::registry::{CodecError, SharedRegistry, TypeRegistry};
use crate::value::{Value, ValueKind};
use num_bigint::BigInt;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Reads graphs from the text format
#[derive(Debug, Clone)]
pub struct Deserializer {
    /// Formatting options
    options: FormatOptions,
    /// Registry given to new graphs, and used to decode extension values
    registry: SharedRegistry,
}

/// Line currently being parsed, for error reporting
#[derive(Clone, Copy)]
struct Line<'a> {
    number: usize,
    text: &'a str,
}

impl Line<'_> {
    fn error(&self, kind: ParseErrorKind) -> DeserializeError {
        DeserializeError::Parse(ParseError {
            line: self.number,
            text: self.text.to_string(),
            kind,
        })
    }
}

/// Parser state for one stream
struct State {
    /// Stream token -> node
    tokens: HashMap<u64, NodeId>,
    /// Nodes being populated, innermost last
    stack: Vec<NodeId>,
    /// Root node once opened
    root: Option<NodeId>,
}

impl Deserializer {
    /// Create a deserializer with default options and the global registry
    pub fn new() -> Self {
        Self {
            options: FormatOptions::default(),
            registry: TypeRegistry::global(),
        }
    }

    /// Use specific options
    pub fn with_options(mut self, options: FormatOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a specific registry for decoding and for the resulting graph
    pub fn with_registry(mut self, registry: SharedRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Parse a complete stream into a new graph. Returns the graph and its root.
    pub fn deserialize(&self, text: &str) -> Result<(Graph, NodeId), DeserializeError> {
        let mut graph = Graph::with_registry(self.registry.clone());
        let root = self.deserialize_into(&mut graph, text)?;
        Ok((graph, root))
    }

    /// Parse a stream, adding its nodes to an existing graph
    ///
    /// On error the graph is left as it was.
    pub fn deserialize_into(&self, graph: &mut Graph, text: &str) -> Result<NodeId, DeserializeError> {
        let count = graph.node_count();
        let result = self.parse(graph, text.lines().map(|line| Ok(Cow::Borrowed(line))));
        if result.is_err() {
            graph.truncate(count);
        }
        result
    }

    /// Parse a stream line by line from a reader
    pub fn deserialize_reader<R: BufRead>(&self, reader: R) -> Result<(Graph, NodeId), DeserializeError> {
        let mut graph = Graph::with_registry(self.registry.clone());
        let lines = reader.split(b'\n').enumerate().map(
            |(index, line): (usize, io::Result<Vec<u8>>)| -> Result<Cow<'static, str>, DeserializeError> {
                String::from_utf8(line?).map(Cow::Owned).map_err(|e| {
                    DeserializeError::Parse(ParseError {
                        line: index + 1,
                        text: String::from_utf8_lossy(e.as_bytes()).into_owned(),
                        kind: ParseErrorKind::InvalidUtf8(e.utf8_error()),
                    })
                })
            },
        );
        let root = self.parse(&mut graph, lines)?;
        Ok((graph, root))
    }

    /// Load a graph from a file
    pub fn load(&self, path: &Path) -> Result<(Graph, NodeId), DeserializeError> {
        let file = File::open(path)?;
        let (graph, root) = self.deserialize_reader(BufReader::new(file))?;
        tracing::info!("Loaded attribute graph from {:?} ({} nodes)", path, graph.node_count());
        Ok((graph, root))
    }

    fn parse<'a, I>(&self, graph: &mut Graph, lines: I) -> Result<NodeId, DeserializeError>
    where
        I: Iterator<Item = Result<Cow<'a, str>, DeserializeError>>,
    {
        let mut state = State {
            tokens: HashMap::new(),
            stack: Vec::new(),
            root: None,
        };
        let mut last_line = 0;

        for (index, text) in lines.enumerate() {
            let text = text?;
            let text = text.strip_suffix('\r').unwrap_or(&text);
            let line = Line {
                number: index + 1,
                text,
            };
            last_line = line.number;

            match (state.root, state.stack.last().copied()) {
                (None, _) => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    let content = self.strip_indent(line, 0)?;
                    let token = parse_opening(content).ok_or_else(|| line.error(ParseErrorKind::ExpectedOpening))?;
                    let token = parse_token(token, line)?;
                    let root = open(graph, &mut state, token, line)?;
                    state.root = Some(root);
                }
                (Some(_), None) => {
                    if !text.trim().is_empty() {
                        return Err(line.error(ParseErrorKind::TrailingContent));
                    }
                }
                (Some(_), Some(current)) => {
                    let depth = state.stack.len();
                    if text.trim() == "}" {
                        self.strip_indent(line, depth - 1)?;
                        state.stack.pop();
                        continue;
                    }
                    let content = self.strip_indent(line, depth)?;
                    self.parse_attribute(graph, &mut state, current, content, line)?;
                }
            }
        }

        match (state.root, state.stack.is_empty()) {
            (Some(root), true) => {
                tracing::debug!(
                    nodes = state.tokens.len(),
                    lines = last_line,
                    "Deserialized attribute graph"
                );
                Ok(root)
            }
            (Some(_), false) => Err(DeserializeError::Parse(ParseError {
                line: last_line,
                text: String::new(),
                kind: ParseErrorKind::UnterminatedNode,
            })),
            (None, _) => Err(DeserializeError::Parse(ParseError {
                line: last_line,
                text: String::new(),
                kind: ParseErrorKind::EmptyInput,
            })),
        }
    }

    /// Remove the indentation expected at `depth`
    fn strip_indent<'t>(&self, line: Line<'t>, depth: usize) -> Result<&'t str, DeserializeError> {
        if !self.options.strict_indentation {
            return Ok(line.text.trim_start());
        }
        let content = line.text.trim_start_matches('\t');
        let found = line.text.len() - content.len();
        if found != depth {
            return Err(line.error(ParseErrorKind::Indentation {
                expected: depth,
                found,
            }));
        }
        Ok(content)
    }

    fn parse_attribute(
        &self,
        graph: &mut Graph,
        state: &mut State,
        current: NodeId,
        content: &str,
        line: Line<'_>,
    ) -> Result<(), DeserializeError> {
        let (name, tag, payload) =
            split_attribute(content).ok_or_else(|| line.error(ParseErrorKind::MalformedAttribute))?;

        let value = match ValueKind::from_builtin_tag(tag) {
            Some(ValueKind::Node) => {
                if let Some(token) = parse_opening(payload) {
                    let token = parse_token(token, line)?;
                    let child = open(graph, state, token, line)?;
                    Value::Node(child)
                } else {
                    let token = parse_token(payload.trim(), line)?;
                    let target = state
                        .tokens
                        .get(&token)
                        .copied()
                        .ok_or_else(|| line.error(ParseErrorKind::DanglingReference(token)))?;
                    Value::Node(target)
                }
            }
            Some(kind) => parse_scalar(&kind, payload, line)?,
            None => self.parse_custom(tag, payload, line)?,
        };

        graph
            .set(current, name, value)
            .map_err(|e| line.error(ParseErrorKind::Attribute(e)))
    }

    fn parse_custom(&self, tag: &str, payload: &str, line: Line<'_>) -> Result<Value, DeserializeError> {
        // Clone the reader out so the lock is released before `Graph::set`
        let reader = self
            .registry
            .read()
            .codec_for_tag(tag)
            .and_then(|codec| codec.reader().cloned())
            .ok_or_else(|| DeserializeError::UnknownType {
                tag: tag.to_string(),
                line: line.number,
                text: line.text.to_string(),
            })?;
        let payload = unescape(payload).map_err(|e| line.error(ParseErrorKind::InvalidEscape(e)))?;
        let value = reader.read(&payload).map_err(|source| {
            line.error(ParseErrorKind::InvalidCustom {
                tag: tag.to_string(),
                source,
            })
        })?;
        Ok(Value::Custom(value))
    }
}

impl Default for Deserializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Two-phase construction: allocate and register before populating
fn open(graph: &mut Graph, state: &mut State, token: u64, line: Line<'_>) -> Result<NodeId, DeserializeError> {
    if state.tokens.contains_key(&token) {
        return Err(line.error(ParseErrorKind::DuplicateIdentity(token)));
    }
    let node = graph.add_node();
    state.tokens.insert(token, node);
    state.stack.push(node);
    tracing::trace!(token, %node, "Opened node");
    Ok(node)
}

/// `<token> {` -> `<token>`
fn parse_opening(content: &str) -> Option<&str> {
    content.strip_suffix('{').map(str::trim)
}

fn parse_token(token: &str, line: Line<'_>) -> Result<u64, DeserializeError> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(line.error(ParseErrorKind::InvalidToken(token.to_string())));
    }
    token
        .parse()
        .map_err(|_| line.error(ParseErrorKind::InvalidToken(token.to_string())))
}

/// `name(tag)<pad>:payload` -> `(name, tag, payload)`
fn split_attribute(content: &str) -> Option<(&str, &str, &str)> {
    let open = content.find('(')?;
    let name = &content[..open];
    let rest = &content[open + 1..];
    let close = rest.find(')')?;
    let tag = &rest[..close];
    let payload = rest[close + 1..].trim_start_matches(' ').strip_prefix(':')?;
    if name.is_empty() || tag.is_empty() {
        return None;
    }
    Some((name, tag, payload))
}

fn parse_scalar(kind: &ValueKind, payload: &str, line: Line<'_>) -> Result<Value, DeserializeError> {
    let invalid = |reason: String| {
        line.error(ParseErrorKind::InvalidScalar {
            tag: kind.tag().to_string(),
            reason,
        })
    };
    let value = match kind {
        ValueKind::Str => {
            let text = unescape(payload).map_err(|e| line.error(ParseErrorKind::InvalidEscape(e)))?;
            Value::Str(text.into_owned())
        }
        ValueKind::Int => Value::Int(payload.parse().map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?),
        ValueKind::Float => {
            Value::Float(payload.parse().map_err(|e: std::num::ParseFloatError| invalid(e.to_string()))?)
        }
        ValueKind::Bool => {
            Value::Bool(payload.parse().map_err(|e: std::str::ParseBoolError| invalid(e.to_string()))?)
        }
        ValueKind::BigInt => Value::BigInt(
            payload
                .parse::<BigInt>()
                .map_err(|e| invalid(e.to_string()))?,
        ),
        ValueKind::Node | ValueKind::Custom(_) => {
            return Err(invalid("not a scalar tag".to_string()));
        }
    };
    Ok(value)
}

/// Malformed input, with the offending line
#[derive(Debug, thiserror::Error)]
#[error("line {line}: {kind}: {text:?}")]
pub struct ParseError {
    /// 1-based line number
    pub line: usize,
    /// Offending line (empty when the input ended early)
    pub text: String,
    /// What went wrong
    pub kind: ParseErrorKind,
}

/// Kinds of malformed input
#[derive(Debug, thiserror::Error)]
pub enum ParseErrorKind {
    /// No node in the input
    #[error("input contains no node")]
    EmptyInput,

    /// Root line is not `<id> {`
    #[error("expected `<id> {{`")]
    ExpectedOpening,

    /// Identity token is not a non-negative integer
    #[error("invalid identity token {0:?}")]
    InvalidToken(String),

    /// Identity opened a second time
    #[error("identity {0} opened twice")]
    DuplicateIdentity(u64),

    /// Reference to an identity that was never opened
    #[error("reference to unknown identity {0}")]
    DanglingReference(u64),

    /// Line is not `name(tag):value`
    #[error("expected `name(type):value`")]
    MalformedAttribute,

    /// Leading tabs do not match the nesting depth
    #[error("expected {expected} tabs of indentation, found {found}")]
    Indentation {
        /// Tabs expected
        expected: usize,
        /// Tabs found
        found: usize,
    },

    /// Scalar does not parse as its tag
    #[error("invalid {tag} value: {reason}")]
    InvalidScalar {
        /// Tag of the value
        tag: String,
        /// Decoder message
        reason: String,
    },

    /// Line is not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(std::str::Utf8Error),

    /// Bad escape in a text value
    #[error("{0}")]
    InvalidEscape(InvalidEscape),

    /// Registered reader rejected the payload
    #[error("invalid {tag} value: {source}")]
    InvalidCustom {
        /// Tag of the value
        tag: String,
        /// Reader error
        source: CodecError,
    },

    /// Decoded attribute was rejected by the graph
    #[error("{0}")]
    Attribute(AttributeError),

    /// Input ended before a node was closed
    #[error("unterminated node at end of input")]
    UnterminatedNode,

    /// Content after the root node was closed
    #[error("unexpected content after the root node")]
    TrailingContent,
}

/// Error when deserializing a graph
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    /// Malformed input
    #[error("Parse error at {0}")]
    Parse(#[from] ParseError),

    /// Type tag is neither built in nor registered
    #[error("Unknown type tag `{tag}` at line {line}: {text:?}")]
    UnknownType {
        /// Unrecognised tag
        tag: String,
        /// 1-based line number
        line: usize,
        /// Offending line
        text: String,
    },

    /// Input could not be read
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DeserializeError {
    /// Line number the error refers to, if any
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Parse(e) => Some(e.line),
            Self::UnknownType { line, .. } => Some(*line),
            Self::Io(_) => None,
        }
    }
}
