//! Entity and collection configuration.
//!
//! Both configurations are typed and built with `with_*` methods. An entity
//! may additionally carry a reserved `usual` attribute whose entries override
//! its typed configuration at construction.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tracing::warn;
use usual_events::ChannelConfig;
use usual_foundation::{Attributes, IdGenerator, UuidIds, Value};

use crate::factory::MemberFactory;

/// Attribute mirroring an entity's identity.
pub const ID_KEY: &str = "id";

/// Reserved attribute carrying per-entity configuration.
pub const RESERVED_KEY: &str = "usual";

/// Reserved collection attribute; never treated as seed members.
pub const ITEMS_KEY: &str = "items";

/// Prefix of generated entity identities.
pub const ENTITY_ID_PREFIX: &str = "m-";

/// Prefix of generated member keys.
pub const MEMBER_ID_PREFIX: &str = "cid-";

/// Orders two members.
pub type Comparator = Rc<dyn Fn(&Value, &Value) -> Ordering>;

/// Configuration for an [`Entity`](crate::Entity).
#[derive(Clone)]
pub struct EntityConfig {
    /// Attribute whose truthy value becomes the identity in place of `id`.
    pub id_property: Option<Arc<str>>,
    /// Configuration of the entity's event channel.
    pub channel: ChannelConfig,
    /// Identity source when no identity attribute is present.
    pub id_generator: Rc<dyn IdGenerator>,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            id_property: None,
            channel: ChannelConfig::default(),
            id_generator: Rc::new(UuidIds),
        }
    }
}

impl EntityConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the alternate identity attribute.
    #[must_use]
    pub fn with_id_property(mut self, property: impl Into<Arc<str>>) -> Self {
        self.id_property = Some(property.into());
        self
    }

    /// Sets the event channel configuration.
    #[must_use]
    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    /// Sets the identity generator.
    #[must_use]
    pub fn with_id_generator(mut self, generator: Rc<dyn IdGenerator>) -> Self {
        self.id_generator = generator;
        self
    }

    /// Applies the entries of a reserved `usual` attribute.
    ///
    /// Recognized entries are `idProperty` (string, or nil to clear) and
    /// `eventConfig` (a map of `wildcard`, `maxListeners`, `delimiter`).
    /// Anything else is ignored with a warning.
    pub fn apply_reserved(&mut self, reserved: &Attributes) {
        for (key, value) in reserved.iter() {
            match (&**key, value) {
                ("idProperty", Value::String(property)) => {
                    self.id_property = Some(Arc::clone(property));
                }
                ("idProperty", Value::Nil) => self.id_property = None,
                ("eventConfig", Value::Map(events)) => self.apply_event_config(events),
                (key, value) => {
                    warn!(key, value = %value, "ignoring malformed reserved configuration");
                }
            }
        }
    }

    fn apply_event_config(&mut self, events: &Attributes) {
        for (key, value) in events.iter() {
            match (&**key, value) {
                ("wildcard", Value::Bool(enabled)) => self.channel.wildcard = *enabled,
                ("maxListeners", Value::Int(max)) if *max >= 0 => {
                    self.channel.max_listeners = usize::try_from(*max).unwrap_or(usize::MAX);
                }
                ("delimiter", Value::String(s)) if s.chars().count() == 1 => {
                    if let Some(delimiter) = s.chars().next() {
                        self.channel.delimiter = delimiter;
                    }
                }
                (key, value) => {
                    warn!(key, value = %value, "ignoring malformed event configuration");
                }
            }
        }
    }
}

impl fmt::Debug for EntityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityConfig")
            .field("id_property", &self.id_property)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

/// Configuration for a [`Collection`](crate::Collection).
#[derive(Clone)]
pub struct CollectionConfig {
    /// Attribute members are keyed by.
    pub id_property: Arc<str>,
    /// Coerces raw maps into members. With a factory set, values other than
    /// maps and entities are dropped.
    pub factory: Option<Rc<dyn MemberFactory>>,
    /// Re-sorts members after every add.
    pub comparator: Option<Comparator>,
    /// Key source for members without one.
    pub id_generator: Rc<dyn IdGenerator>,
    /// Configuration of the collection's backing entity.
    pub entity: EntityConfig,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            id_property: ID_KEY.into(),
            factory: None,
            comparator: None,
            id_generator: Rc::new(UuidIds),
            entity: EntityConfig::default(),
        }
    }
}

impl CollectionConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key attribute.
    #[must_use]
    pub fn with_id_property(mut self, property: impl Into<Arc<str>>) -> Self {
        self.id_property = property.into();
        self
    }

    /// Sets the member factory.
    #[must_use]
    pub fn with_factory(mut self, factory: impl MemberFactory + 'static) -> Self {
        self.factory = Some(Rc::new(factory));
        self
    }

    /// Sets the member comparator.
    #[must_use]
    pub fn with_comparator<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&Value, &Value) -> Ordering + 'static,
    {
        self.comparator = Some(Rc::new(comparator));
        self
    }

    /// Sets the member key generator.
    #[must_use]
    pub fn with_id_generator(mut self, generator: Rc<dyn IdGenerator>) -> Self {
        self.id_generator = generator;
        self
    }

    /// Sets the backing entity configuration.
    #[must_use]
    pub fn with_entity(mut self, entity: EntityConfig) -> Self {
        self.entity = entity;
        self
    }
}

impl fmt::Debug for CollectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionConfig")
            .field("id_property", &self.id_property)
            .field("factory", &self.factory.is_some())
            .field("comparator", &self.comparator.is_some())
            .field("entity", &self.entity)
            .finish_non_exhaustive()
    }
}
