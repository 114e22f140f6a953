//! Values stored in the cache
//!
//! [`CacheValue`] is a closed set of value kinds so the size estimator can walk
//! it without runtime reflection. JSON documents convert directly through
//! `From<serde_json::Value>`; arbitrary Rust values can be stored as
//! [`CacheValue::Opaque`] and recovered with [`CacheValue::downcast_ref`].

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A cacheable value
#[derive(Clone)]
pub enum CacheValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Binary blob (sprites, encoded images)
    Bytes(Vec<u8>),
    Array(Vec<CacheValue>),
    Object(BTreeMap<String, CacheValue>),
    /// Subtree shared between several values; estimated once per walk
    Shared(Arc<CacheValue>),
    /// Any other Rust value; estimated at a fixed default cost
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl CacheValue {
    /// Wrap an arbitrary value
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        CacheValue::Opaque(Arc::new(value))
    }

    /// Share a subtree
    pub fn shared(value: CacheValue) -> Self {
        CacheValue::Shared(Arc::new(value))
    }

    /// Borrow an opaque payload as `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            CacheValue::Opaque(inner) => inner.downcast_ref::<T>(),
            CacheValue::Shared(inner) => inner.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CacheValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CacheValue::String(s) => Some(s),
            CacheValue::Shared(inner) => inner.as_str(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CacheValue::Number(n) => Some(*n),
            CacheValue::Shared(inner) => inner.as_f64(),
            _ => None,
        }
    }

    /// Field of an object value
    pub fn get(&self, field: &str) -> Option<&CacheValue> {
        match self {
            CacheValue::Object(map) => map.get(field),
            CacheValue::Shared(inner) => inner.get(field),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            CacheValue::Null => "null",
            CacheValue::Bool(_) => "bool",
            CacheValue::Number(_) => "number",
            CacheValue::String(_) => "string",
            CacheValue::Bytes(_) => "bytes",
            CacheValue::Array(_) => "array",
            CacheValue::Object(_) => "object",
            CacheValue::Shared(_) => "shared",
            CacheValue::Opaque(_) => "opaque",
        }
    }
}

impl fmt::Debug for CacheValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheValue::Null => f.write_str("Null"),
            CacheValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            CacheValue::Number(n) => f.debug_tuple("Number").field(n).finish(),
            CacheValue::String(s) => f.debug_tuple("String").field(s).finish(),
            CacheValue::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            CacheValue::Array(items) => f.debug_tuple("Array").field(items).finish(),
            CacheValue::Object(map) => f.debug_tuple("Object").field(map).finish(),
            CacheValue::Shared(inner) => f.debug_tuple("Shared").field(inner).finish(),
            CacheValue::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

/// Structural equality; opaque payloads compare by identity.
impl PartialEq for CacheValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CacheValue::Null, CacheValue::Null) => true,
            (CacheValue::Bool(a), CacheValue::Bool(b)) => a == b,
            (CacheValue::Number(a), CacheValue::Number(b)) => a == b,
            (CacheValue::String(a), CacheValue::String(b)) => a == b,
            (CacheValue::Bytes(a), CacheValue::Bytes(b)) => a == b,
            (CacheValue::Array(a), CacheValue::Array(b)) => a == b,
            (CacheValue::Object(a), CacheValue::Object(b)) => a == b,
            (CacheValue::Shared(a), CacheValue::Shared(b)) => Arc::ptr_eq(a, b) || a == b,
            (CacheValue::Opaque(a), CacheValue::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for CacheValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheValue::String(s) => f.write_str(s),
            CacheValue::Number(n) => write!(f, "{}", n),
            CacheValue::Bool(b) => write!(f, "{}", b),
            other => write!(f, "<{}>", other.kind()),
        }
    }
}

impl From<bool> for CacheValue {
    fn from(value: bool) -> Self {
        CacheValue::Bool(value)
    }
}

impl From<f64> for CacheValue {
    fn from(value: f64) -> Self {
        CacheValue::Number(value)
    }
}

impl From<i64> for CacheValue {
    fn from(value: i64) -> Self {
        CacheValue::Number(value as f64)
    }
}

impl From<u32> for CacheValue {
    fn from(value: u32) -> Self {
        CacheValue::Number(f64::from(value))
    }
}

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        CacheValue::String(value.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        CacheValue::String(value)
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(value: Vec<u8>) -> Self {
        CacheValue::Bytes(value)
    }
}

impl From<Vec<CacheValue>> for CacheValue {
    fn from(value: Vec<CacheValue>) -> Self {
        CacheValue::Array(value)
    }
}

impl From<BTreeMap<String, CacheValue>> for CacheValue {
    fn from(value: BTreeMap<String, CacheValue>) -> Self {
        CacheValue::Object(value)
    }
}

impl<T: Into<CacheValue>> From<Option<T>> for CacheValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CacheValue::Null, Into::into)
    }
}

impl From<serde_json::Value> for CacheValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => CacheValue::Null,
            Value::Bool(b) => CacheValue::Bool(b),
            Value::Number(n) => CacheValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => CacheValue::String(s),
            Value::Array(items) => CacheValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                CacheValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}
