// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of extension value types.
//!
//! Built-in scalars and node references are always accepted on a node. Any
//! other value type must be registered here together with a writer and a
//! reader so it can make a full round trip through the text format.

use crate::escape::escape;
use crate::value::{CustomValue, ExtensionValue, ValueKind};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

/// Registry handle shared between graphs
pub type SharedRegistry = Arc<RwLock<TypeRegistry>>;

static GLOBAL_REGISTRY: LazyLock<SharedRegistry> =
    LazyLock::new(|| Arc::new(RwLock::new(TypeRegistry::new())));

/// Error raised by a value writer or reader
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct CodecError(pub String);

impl CodecError {
    /// Create a codec error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Writes attribute lines for an extension value
pub trait ValueWriter: Send + Sync {
    /// Write the complete line for attribute `name` at indentation `depth`.
    ///
    /// The line must have the shape `name(tag):payload` (see
    /// [`write_attribute_line`]) for the reader to receive it back.
    fn write(
        &self,
        out: &mut String,
        depth: usize,
        name: &str,
        value: &CustomValue,
    ) -> Result<(), CodecError>;
}

impl<F> ValueWriter for F
where
    F: Fn(&mut String, usize, &str, &CustomValue) -> Result<(), CodecError> + Send + Sync,
{
    fn write(
        &self,
        out: &mut String,
        depth: usize,
        name: &str,
        value: &CustomValue,
    ) -> Result<(), CodecError> {
        self(out, depth, name, value)
    }
}

/// Reads an extension value back from the payload of its line
pub trait ValueReader: Send + Sync {
    /// Decode an already unescaped payload
    fn read(&self, payload: &str) -> Result<CustomValue, CodecError>;
}

impl<F> ValueReader for F
where
    F: Fn(&str) -> Result<CustomValue, CodecError> + Send + Sync,
{
    fn read(&self, payload: &str) -> Result<CustomValue, CodecError> {
        self(payload)
    }
}

/// Write `depth` tabs, then `name(tag):payload` and a newline.
///
/// The payload is escaped the same way text values are.
pub fn write_attribute_line(out: &mut String, depth: usize, name: &str, tag: &str, payload: &str) {
    for _ in 0..depth {
        out.push('\t');
    }
    out.push_str(name);
    out.push('(');
    out.push_str(tag);
    out.push_str("):");
    out.push_str(&escape(payload));
    out.push('\n');
}

/// Encoder/decoder pair for one extension type
#[derive(Clone)]
pub struct TypeCodec {
    /// Tag written in the `(tag)` column
    tag: String,
    /// Type handled by this codec
    type_id: TypeId,
    /// Rust type name, for diagnostics
    type_name: &'static str,
    /// Write capability
    writer: Option<Arc<dyn ValueWriter>>,
    /// Read capability
    reader: Option<Arc<dyn ValueReader>>,
}

impl TypeCodec {
    /// Start a codec for `T` under `tag`. Writer and reader must be attached
    /// before registration.
    pub fn new<T: Any>(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            writer: None,
            reader: None,
        }
    }

    /// Codec that writes `T` with `Display` and reads it with `FromStr`
    pub fn display<T>(tag: impl Into<String>) -> Self
    where
        T: ExtensionValue + fmt::Display + FromStr,
        T::Err: fmt::Display,
    {
        let tag = tag.into();
        let line_tag = tag.clone();
        Self::new::<T>(tag)
            .with_writer(
                move |out: &mut String,
                      depth: usize,
                      name: &str,
                      value: &CustomValue|
                      -> Result<(), CodecError> {
                    let value = value.downcast_ref::<T>().ok_or_else(|| {
                        CodecError::new(format!("expected {}", std::any::type_name::<T>()))
                    })?;
                    write_attribute_line(out, depth, name, &line_tag, &value.to_string());
                    Ok(())
                },
            )
            .with_reader(|payload: &str| {
                payload
                    .parse::<T>()
                    .map(CustomValue::new)
                    .map_err(|e| CodecError::new(e.to_string()))
            })
    }

    /// Attach the write capability
    pub fn with_writer(mut self, writer: impl ValueWriter + 'static) -> Self {
        self.writer = Some(Arc::new(writer));
        self
    }

    /// Attach the read capability
    pub fn with_reader(mut self, reader: impl ValueReader + 'static) -> Self {
        self.reader = Some(Arc::new(reader));
        self
    }

    /// Tag written to the stream
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Type handled by this codec
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name handled by this codec
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Write capability
    pub fn writer(&self) -> Option<&Arc<dyn ValueWriter>> {
        self.writer.as_ref()
    }

    /// Read capability
    pub fn reader(&self) -> Option<&Arc<dyn ValueReader>> {
        self.reader.as_ref()
    }
}

impl fmt::Debug for TypeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCodec")
            .field("tag", &self.tag)
            .field("type_name", &self.type_name)
            .field("writer", &self.writer.is_some())
            .field("reader", &self.reader.is_some())
            .finish()
    }
}

/// Registry of extension types by `TypeId` and by tag
#[derive(Default)]
pub struct TypeRegistry {
    /// Codecs by handled type
    codecs: IndexMap<TypeId, TypeCodec>,
    /// Tag lookup for decoding
    tags: HashMap<String, TypeId>,
}

impl TypeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by graphs created with `Graph::new`
    pub fn global() -> SharedRegistry {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Wrap this registry in a shareable handle
    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    /// Register a codec.
    ///
    /// Registering a type again replaces its codec. The registry is unchanged
    /// on error.
    pub fn register(&mut self, codec: TypeCodec) -> Result<(), RegistrationError> {
        if codec.writer.is_none() {
            return Err(RegistrationError::MissingCapability {
                type_name: codec.type_name,
                capability: Capability::Write,
            });
        }
        if codec.reader.is_none() {
            return Err(RegistrationError::MissingCapability {
                type_name: codec.type_name,
                capability: Capability::Read,
            });
        }
        if !is_valid_tag(&codec.tag) {
            return Err(RegistrationError::InvalidTag(codec.tag));
        }
        if let Some(existing) = self.tags.get(&codec.tag) {
            if *existing != codec.type_id {
                let existing = self
                    .codecs
                    .get(existing)
                    .map_or("<unknown>", TypeCodec::type_name);
                return Err(RegistrationError::TagConflict {
                    tag: codec.tag,
                    existing,
                });
            }
        }

        if let Some(previous) = self.codecs.get(&codec.type_id) {
            tracing::warn!(
                "Replacing codec for {} (tag `{}` -> `{}`)",
                codec.type_name,
                previous.tag,
                codec.tag
            );
            self.tags.remove(&previous.tag);
        } else {
            tracing::debug!("Registered codec for {} as `{}`", codec.type_name, codec.tag);
        }

        self.tags.insert(codec.tag.clone(), codec.type_id);
        self.codecs.insert(codec.type_id, codec);
        Ok(())
    }

    /// Whether `T` is registered
    pub fn contains<T: Any>(&self) -> bool {
        self.contains_type_id(TypeId::of::<T>())
    }

    /// Whether the type is registered
    pub fn contains_type_id(&self, type_id: TypeId) -> bool {
        self.codecs.contains_key(&type_id)
    }

    /// Codec for a type
    pub fn codec_for_type(&self, type_id: TypeId) -> Option<&TypeCodec> {
        self.codecs.get(&type_id)
    }

    /// Codec for a stream tag
    pub fn codec_for_tag(&self, tag: &str) -> Option<&TypeCodec> {
        self.tags.get(tag).and_then(|type_id| self.codecs.get(type_id))
    }

    /// Registered tags in registration order
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.codecs.values().map(TypeCodec::tag)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Remove every registration
    pub fn clear(&mut self) {
        self.codecs.clear();
        self.tags.clear();
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tags()).finish()
    }
}

fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && ValueKind::from_builtin_tag(tag).is_none()
        && !tag
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | ':' | '{' | '}'))
}

/// Capability a codec must provide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Encoding to the stream
    Write,
    /// Decoding from the stream
    Read,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write => f.write_str("write"),
            Self::Read => f.write_str("read"),
        }
    }
}

/// Error when registering an extension type
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// Codec lacks a required capability
    #[error("Codec for {type_name} has no {capability} capability")]
    MissingCapability {
        /// Type the codec was for
        type_name: &'static str,
        /// Missing capability
        capability: Capability,
    },

    /// Tag is empty, reserved or contains grammar characters
    #[error("Invalid type tag: {0:?}")]
    InvalidTag(String),

    /// Tag already used by another type
    #[error("Tag `{tag}` is already registered for {existing}")]
    TagConflict {
        /// Requested tag
        tag: String,
        /// Type currently holding the tag
        existing: &'static str,
    },
}
