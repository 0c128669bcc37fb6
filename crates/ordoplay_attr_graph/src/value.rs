// SPDX-License-Identifier: MIT OR Apache-2.0
//! Attribute values that can be stored on a node.

use crate::node::NodeId;
use num_bigint::BigInt;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Kind of value an attribute holds, as written in the `(tag)` column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Text string
    Str,
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// Boolean
    Bool,
    /// Arbitrary-precision integer
    BigInt,
    /// Reference to another node
    Node,
    /// Registered extension type (carries its registered tag)
    Custom(String),
}

impl ValueKind {
    /// Tag for text values
    pub const STR_TAG: &'static str = "str";
    /// Tag for integer values
    pub const INT_TAG: &'static str = "int";
    /// Tag for float values
    pub const FLOAT_TAG: &'static str = "float";
    /// Tag for boolean values
    pub const BOOL_TAG: &'static str = "bool";
    /// Tag for big integer values
    pub const BIGINT_TAG: &'static str = "bigint";
    /// Marker tag for node-valued attributes
    pub const NODE_TAG: &'static str = "*";

    /// Get the tag written to the stream for this kind
    pub fn tag(&self) -> &str {
        match self {
            Self::Str => Self::STR_TAG,
            Self::Int => Self::INT_TAG,
            Self::Float => Self::FLOAT_TAG,
            Self::Bool => Self::BOOL_TAG,
            Self::BigInt => Self::BIGINT_TAG,
            Self::Node => Self::NODE_TAG,
            Self::Custom(tag) => tag,
        }
    }

    /// Resolve one of the built-in tags. Extension tags return `None`.
    pub fn from_builtin_tag(tag: &str) -> Option<Self> {
        match tag {
            Self::STR_TAG => Some(Self::Str),
            Self::INT_TAG => Some(Self::Int),
            Self::FLOAT_TAG => Some(Self::Float),
            Self::BOOL_TAG => Some(Self::Bool),
            Self::BIGINT_TAG => Some(Self::BigInt),
            Self::NODE_TAG => Some(Self::Node),
            _ => None,
        }
    }

    /// Whether this is one of the scalar primitive kinds
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Self::Node | Self::Custom(_))
    }
}

/// Object-safe view of a value of an extension type.
///
/// Implemented for every `Any + Debug + PartialEq + Send + Sync` type, so any
/// such type can be wrapped in a [`CustomValue`]. Whether it may actually be
/// stored on a node is decided by the type registry.
pub trait ExtensionValue: Any + fmt::Debug + Send + Sync {
    /// Upcast for downcasting
    fn as_any(&self) -> &dyn Any;
    /// Compare with another extension value of possibly different type
    fn dyn_eq(&self, other: &dyn ExtensionValue) -> bool;
}

impl<T> ExtensionValue for T
where
    T: Any + fmt::Debug + PartialEq + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn ExtensionValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

/// A shared, type-erased value of an extension type
#[derive(Clone)]
pub struct CustomValue {
    inner: Arc<dyn ExtensionValue>,
    type_id: TypeId,
    type_name: &'static str,
}

impl CustomValue {
    /// Wrap a value
    pub fn new<T: ExtensionValue>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// `TypeId` of the wrapped value
    pub fn value_type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the wrapped value
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the wrapped value as `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.inner.dyn_eq(other.inner.as_ref())
    }
}

/// Value of a node attribute
#[derive(Debug, Clone)]
pub enum Value {
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
    /// Reference to a node in the same graph
    Node(NodeId),
    /// Value of a registered extension type
    Custom(CustomValue),
}

impl Value {
    /// Wrap an extension value
    pub fn custom<T: ExtensionValue>(value: T) -> Self {
        Self::Custom(CustomValue::new(value))
    }

    /// Get the kind of this value.
    ///
    /// Custom values report their Rust type name here; the stream tag comes
    /// from the registry.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Str(_) => ValueKind::Str,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Bool(_) => ValueKind::Bool,
            Self::BigInt(_) => ValueKind::BigInt,
            Self::Node(_) => ValueKind::Node,
            Self::Custom(value) => ValueKind::Custom(value.type_name().to_string()),
        }
    }

    /// Get the text, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Get the integer, if this is an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Get the float, if this is a float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Get the boolean, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Get the big integer, if this is one
    pub fn as_bigint(&self) -> Option<&BigInt> {
        match self {
            Self::BigInt(value) => Some(value),
            _ => None,
        }
    }

    /// Get the referenced node, if this is a node reference
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            _ => None,
        }
    }

    /// Get the extension value, if this is one
    pub fn as_custom(&self) -> Option<&CustomValue> {
        match self {
            Self::Custom(value) => Some(value),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            // NaN must survive a round trip as "equal"
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::BigInt(a), Self::BigInt(b)) => a == b,
            (Self::Node(a), Self::Node(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        Self::BigInt(value)
    }
}

impl From<NodeId> for Value {
    fn from(value: NodeId) -> Self {
        Self::Node(value)
    }
}

impl From<CustomValue> for Value {
    fn from(value: CustomValue) -> Self {
        Self::Custom(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tags() {
        for kind in [
            ValueKind::Str,
            ValueKind::Int,
            ValueKind::Float,
            ValueKind::Bool,
            ValueKind::BigInt,
            ValueKind::Node,
        ] {
            assert_eq!(ValueKind::from_builtin_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ValueKind::from_builtin_tag("Vec3"), None);
        assert!(ValueKind::Float.is_primitive());
        assert!(!ValueKind::Node.is_primitive());
    }

    #[test]
    fn test_custom_value_equality() {
        let a = CustomValue::new(vec![1, 2, 3]);
        let b = CustomValue::new(vec![1, 2, 3]);
        let c = CustomValue::new(vec![1u8, 2, 3]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.downcast_ref::<Vec<i32>>(), Some(&vec![1, 2, 3]));
        assert!(a.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_nan_equality() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(1.0), Value::Int(1));
    }
}
