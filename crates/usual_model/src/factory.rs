//! Member factories.
//!
//! A collection with a factory coerces every raw attribute map it is given
//! into a member before storing it. Entities already constructed pass through
//! untouched.

use std::fmt;

use usual_foundation::{Attributes, Value};

use crate::collection::WeakCollection;
use crate::config::EntityConfig;
use crate::entity::Entity;

/// Builds collection members from raw attribute maps.
pub trait MemberFactory {
    /// Constructs a member from `raw`.
    ///
    /// `owner` is the collection the member is being built for. Returning
    /// [`Value::Nil`] drops the entry.
    fn construct(&self, raw: Attributes, owner: &WeakCollection) -> Value;
}

/// Builds [`Entity`] members.
///
/// The raw map is the first construction layer, followed by the factory's
/// base layers, so raw attributes override the base. The back-reference to
/// the owning collection is set only once the entity is actually stored.
#[derive(Clone, Debug, Default)]
pub struct EntityFactory {
    config: EntityConfig,
    base: Vec<Attributes>,
}

impl EntityFactory {
    /// Creates a factory building entities with `config`.
    #[must_use]
    pub fn new(config: EntityConfig) -> Self {
        Self {
            config,
            base: Vec::new(),
        }
    }

    /// Appends a base layer. Earlier base layers override later ones.
    #[must_use]
    pub fn with_base(mut self, layer: Attributes) -> Self {
        self.base.push(layer);
        self
    }
}

impl MemberFactory for EntityFactory {
    fn construct(&self, raw: Attributes, _owner: &WeakCollection) -> Value {
        let layers = std::iter::once(raw).chain(self.base.iter().cloned());
        Entity::with_config(self.config.clone(), layers).into()
    }
}

/// Adapts a closure into a [`MemberFactory`].
pub struct FnFactory<F>(pub F);

impl<F> MemberFactory for FnFactory<F>
where
    F: Fn(Attributes) -> Value,
{
    fn construct(&self, raw: Attributes, _owner: &WeakCollection) -> Value {
        (self.0)(raw)
    }
}

impl<F> fmt::Debug for FnFactory<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnFactory(..)")
    }
}
