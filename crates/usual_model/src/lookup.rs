//! Addressing collection members.

use usual_foundation::{Key, Value};

use crate::entity::Entity;

/// Something a collection member can be looked up by.
///
/// Keys address a member directly. Map and entity values are resolved
/// through the collection's id property first; string and number values are
/// treated as keys.
#[derive(Clone, Debug)]
pub enum Lookup<'a> {
    /// A member key.
    Key(Key),
    /// A value: a key-like scalar, or a map or entity carrying the id property.
    Value(&'a Value),
    /// An entity carrying the id property.
    Entity(&'a Entity),
}

impl<'a> Lookup<'a> {
    /// Resolves the key this lookup addresses under `id_property`.
    #[must_use]
    pub fn resolve(&self, id_property: &str) -> Option<Key> {
        match self {
            Self::Key(key) => Some(key.clone()),
            Self::Value(value) => match value {
                Value::Map(_) | Value::Entity(_) => {
                    value.attr(id_property).as_ref().and_then(Key::from_value)
                }
                _ => Key::from_value(value),
            },
            Self::Entity(entity) => entity.get(id_property).as_ref().and_then(Key::from_value),
        }
    }
}

impl From<Key> for Lookup<'_> {
    fn from(key: Key) -> Self {
        Self::Key(key)
    }
}

impl From<&Key> for Lookup<'_> {
    fn from(key: &Key) -> Self {
        Self::Key(key.clone())
    }
}

impl From<&str> for Lookup<'_> {
    fn from(key: &str) -> Self {
        Self::Key(Key::from(key))
    }
}

impl From<String> for Lookup<'_> {
    fn from(key: String) -> Self {
        Self::Key(Key::from(key))
    }
}

impl From<i64> for Lookup<'_> {
    fn from(key: i64) -> Self {
        Self::Key(Key::from(key))
    }
}

impl From<i32> for Lookup<'_> {
    fn from(key: i32) -> Self {
        Self::Key(Key::from(key))
    }
}

impl<'a> From<&'a Value> for Lookup<'a> {
    fn from(value: &'a Value) -> Self {
        Self::Value(value)
    }
}

impl<'a> From<&'a Entity> for Lookup<'a> {
    fn from(entity: &'a Entity) -> Self {
        Self::Entity(entity)
    }
}
