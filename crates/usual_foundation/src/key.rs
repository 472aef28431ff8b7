//! Member keys and per-instance tracking ids.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::Type;
use crate::value::Value;

/// The key a member is indexed under, and the identity of an entity.
///
/// Keys are strings. Numeric identity values are keyed by their decimal
/// form, so `1` and `"1"` address the same member.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Arc<str>);

impl Key {
    /// Creates a key from a string.
    #[must_use]
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// Derives a key from an attribute value.
    ///
    /// Only truthy strings and numbers qualify; everything else (nil, false,
    /// zero, the empty string, arrays, maps, entities) means "no key".
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_truthy() {
            return None;
        }
        match value {
            Value::String(s) => Some(Self(Arc::clone(s))),
            Value::Int(n) => Some(Self(n.to_string().into())),
            Value::Float(n) if n.is_finite() => Some(Self(n.to_string().into())),
            _ => None,
        }
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the key as a string value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::String(Arc::clone(&self.0))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:?})", &*self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Self(n.to_string().into())
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Self(n.to_string().into())
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        Self::String(key.0)
    }
}

impl TryFrom<&Value> for Key {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self> {
        Self::from_value(value).ok_or_else(|| Error::type_mismatch(Type::Key, value.value_type()))
    }
}

/// Per-instance tracking id.
///
/// Every entity gets one at construction. Cross-entity bookkeeping is keyed
/// by it, never by the user-visible identity, which need not be unique.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackingId(Uuid);

impl TrackingId {
    /// Creates a fresh random tracking id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TrackingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrackingId({})", self.0.simple())
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "iid-{}", self.0.simple())
    }
}
