//! Ordered, uniquely-keyed containers of members.
//!
//! A [`Collection`] keeps its members in insertion order (or comparator order
//! when one is configured) and indexes them by key. Members are arbitrary
//! [`Value`]s; entity members are followed through their `destroy` and
//! `update` events so the collection removes them on destruction and
//! re-announces their updates as `modelUpdate`.
//!
//! No internal borrow is held while an event is delivered, so listeners may
//! mutate the collection that notified them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tracing::debug;
use usual_events::{Event, EventChannel, ListenerId};
use usual_foundation::{Attributes, Key, TrackingId, Value, merge_values};

use crate::config::{CollectionConfig, ID_KEY, ITEMS_KEY, MEMBER_ID_PREFIX};
use crate::entity::{Entity, SubscriptionHandle};
use crate::events;
use crate::lookup::Lookup;

struct Slot {
    member: Value,
    subscriptions: Vec<SubscriptionHandle>,
}

#[derive(Default)]
struct Members {
    order: Vec<Key>,
    slots: HashMap<Key, Slot>,
    /// Keys entity members were stored under, by instance.
    tracked: HashMap<TrackingId, Key>,
}

struct CollectionInner {
    model: Entity,
    config: CollectionConfig,
    members: RefCell<Members>,
}

/// An ordered, uniquely-keyed container.
///
/// Cloning yields another handle to the same collection.
#[derive(Clone)]
pub struct Collection {
    inner: Rc<CollectionInner>,
}

/// A non-owning reference to a [`Collection`].
#[derive(Clone, Default)]
pub struct WeakCollection(Weak<CollectionInner>);

impl WeakCollection {
    /// Returns the collection if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Collection> {
        self.0.upgrade().map(|inner| Collection { inner })
    }

    /// Returns true if the collection is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Returns true if both references point at the same collection.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for WeakCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(collection) => write!(f, "WeakCollection({})", collection.identity()),
            None => f.write_str("WeakCollection(dead)"),
        }
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::with_config(CollectionConfig::default())
    }
}

impl Collection {
    /// Creates a collection.
    ///
    /// `layers` build the backing entity the way [`Entity::with_config`]
    /// does, except that an `items` attribute is removed: `seed` is the only
    /// way to supply initial members.
    #[must_use]
    pub fn new<S, L>(seed: S, config: CollectionConfig, layers: L) -> Self
    where
        S: IntoIterator<Item = Value>,
        L: IntoIterator<Item = Attributes>,
    {
        let layers = layers.into_iter().map(|mut layer| {
            layer.remove(ITEMS_KEY);
            layer
        });
        let model = Entity::with_config(config.entity.clone(), layers);
        let collection = Self {
            inner: Rc::new(CollectionInner {
                model,
                config,
                members: RefCell::new(Members::default()),
            }),
        };
        collection.add_all(seed);
        collection
    }

    /// Creates an empty collection.
    #[must_use]
    pub fn with_config(config: CollectionConfig) -> Self {
        Self::new(std::iter::empty(), config, std::iter::empty())
    }

    /// Creates a collection seeded with `seed`.
    #[must_use]
    pub fn seeded<S>(seed: S, config: CollectionConfig) -> Self
    where
        S: IntoIterator<Item = Value>,
    {
        Self::new(seed, config, std::iter::empty())
    }

    /// Creates a collection around members that need no coercion.
    ///
    /// Members are keyed and followed as usual, but never passed through the
    /// factory. This is the constructor [`Collection::filter`] uses.
    #[must_use]
    pub fn from_parts<S>(members: S, config: CollectionConfig, attributes: Attributes) -> Self
    where
        S: IntoIterator<Item = Value>,
    {
        let collection = Self::new(std::iter::empty(), config, [attributes]);
        collection.insert_all(members, false);
        collection
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CollectionConfig {
        &self.inner.config
    }

    /// Returns the backing entity carrying the collection's own identity,
    /// attributes, and event channel.
    #[must_use]
    pub fn entity(&self) -> &Entity {
        &self.inner.model
    }

    /// Returns the collection's identity.
    #[must_use]
    pub fn identity(&self) -> &Key {
        self.inner.model.identity()
    }

    /// Returns the collection's event channel.
    #[must_use]
    pub fn events(&self) -> &EventChannel {
        self.inner.model.events()
    }

    /// Registers a listener on the collection's channel.
    pub fn on<F>(&self, pattern: &str, callback: F) -> ListenerId
    where
        F: Fn(&Event<'_>) + 'static,
    {
        self.inner.model.on(pattern, callback)
    }

    /// Registers a one-time listener on the collection's channel.
    pub fn once<F>(&self, pattern: &str, callback: F) -> ListenerId
    where
        F: Fn(&Event<'_>) + 'static,
    {
        self.inner.model.once(pattern, callback)
    }

    /// Removes a listener from the collection's channel.
    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.model.off(id)
    }

    /// Returns a non-owning reference.
    #[must_use]
    pub fn downgrade(&self) -> WeakCollection {
        WeakCollection(Rc::downgrade(&self.inner))
    }

    /// Adds one value. Returns the resulting member, or `None` if the value
    /// was dropped.
    ///
    /// A nil value is a no-op and emits nothing. Otherwise behaves like
    /// [`Collection::add_all`] with one entry.
    pub fn add(&self, value: Value) -> Option<Value> {
        if value.is_nil() {
            return None;
        }
        self.add_all([value]).pop()
    }

    /// Adds a batch of values. Returns every resulting member in input order.
    ///
    /// For each entry:
    /// - nil entries are skipped;
    /// - with a factory set, only maps and entities are accepted;
    /// - an entry whose key matches a member updates that member in place;
    /// - a new map passes through the factory, if any;
    /// - a member without a key gets a generated one, written back under the
    ///   id property when the member is a map or entity.
    ///
    /// The comparator then re-sorts, and `add` fires once with the new
    /// members only.
    pub fn add_all<I>(&self, values: I) -> Vec<Value>
    where
        I: IntoIterator<Item = Value>,
    {
        self.insert_all(values, true)
    }

    fn insert_all<I>(&self, values: I, coerce: bool) -> Vec<Value>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut results = Vec::new();
        let mut added = Vec::new();
        for value in values {
            if let Some((member, fresh)) = self.insert_one(value, coerce) {
                if fresh {
                    added.push(member.clone());
                }
                results.push(member);
            }
        }

        self.sort();
        debug!(
            collection = %self.identity(),
            added = added.len(),
            updated = results.len() - added.len(),
            "members added"
        );
        self.inner
            .model
            .emit(events::ADD, &[added.into_iter().collect()]);
        results
    }

    fn insert_one(&self, value: Value, coerce: bool) -> Option<(Value, bool)> {
        let config = &self.inner.config;
        match &value {
            Value::Nil => return None,
            Value::Entity(_) => {
                if Entity::from_value(&value).is_some_and(|e| e.is_destroyed()) {
                    return None;
                }
            }
            Value::Map(_) => {}
            _ if coerce && config.factory.is_some() => return None,
            _ => {}
        }

        if let Some(key) = self.member_key(&value) {
            if self.contains(&key) {
                let member = self.update_member(&key, &value);
                return member.map(|m| (m, false));
            }
        }

        let mut member = match (&config.factory, value) {
            (Some(factory), Value::Map(raw)) if coerce => factory.construct(raw, &self.downgrade()),
            (_, value) => value,
        };
        if member.is_nil() {
            return None;
        }

        let key = match self.key_of(&member) {
            Some(key) => key,
            None => {
                let key = config.id_generator.generate(MEMBER_ID_PREFIX);
                self.write_key(&mut member, &key);
                key
            }
        };
        if self.contains(&key) {
            let member = self.update_member(&key, &member);
            return member.map(|m| (m, false));
        }

        let entity = Entity::from_value(&member);
        let subscriptions = match &entity {
            Some(entity) => {
                entity.claim_collection(&self.downgrade());
                self.follow(entity, &key)
            }
            None => Vec::new(),
        };

        let mut members = self.inner.members.borrow_mut();
        if let Some(entity) = entity {
            members.tracked.insert(entity.tracking_id(), key.clone());
        }
        members.order.push(key.clone());
        members.slots.insert(
            key,
            Slot {
                member: member.clone(),
                subscriptions,
            },
        );
        Some((member, true))
    }

    /// Returns the key `value` is stored under if it is an entity member.
    fn tracked_key(&self, value: &Value) -> Option<Key> {
        let entity = Entity::from_value(value)?;
        self.tracked_key_of(entity.tracking_id())
    }

    fn tracked_key_of(&self, tracking: TrackingId) -> Option<Key> {
        self.inner.members.borrow().tracked.get(&tracking).cloned()
    }

    fn member_key(&self, value: &Value) -> Option<Key> {
        self.tracked_key(value).or_else(|| self.key_of(value))
    }

    fn key_of(&self, value: &Value) -> Option<Key> {
        value
            .attr(&self.inner.config.id_property)
            .as_ref()
            .and_then(Key::from_value)
    }

    fn write_key(&self, member: &mut Value, key: &Key) {
        let property = &self.inner.config.id_property;
        if let Some(entity) = Entity::from_value(member) {
            entity.write_attribute(property, key.to_value());
        } else if let Value::Map(map) = member {
            map.insert(Arc::clone(property), key.to_value());
        }
    }

    /// Merges `incoming` into the member under `key` and returns the member.
    fn update_member(&self, key: &Key, incoming: &Value) -> Option<Value> {
        let existing = self.get(key)?;
        let mut data = match incoming {
            Value::Map(map) => map.clone(),
            Value::Entity(_) if *incoming == existing => return Some(existing),
            Value::Entity(_) => Entity::from_value(incoming)?.serialize(),
            _ => return Some(existing),
        };
        data.remove(&self.inner.config.id_property);

        if let Some(entity) = Entity::from_value(&existing) {
            entity.update(data);
            return Some(existing);
        }

        let mut members = self.inner.members.borrow_mut();
        let slot = members.slots.get_mut(key)?;
        if slot.member.is_map() {
            merge_values(&mut slot.member, &Value::Map(data));
        }
        Some(slot.member.clone())
    }

    /// Subscribes the backing entity to a member's `destroy` and `update`.
    fn follow(&self, entity: &Entity, key: &Key) -> Vec<SubscriptionHandle> {
        let collection = self.downgrade();
        let member_key = key.clone();
        let on_destroy = self
            .inner
            .model
            .listen_to(entity, events::DESTROY, move |_| {
                if let Some(collection) = collection.upgrade() {
                    collection.remove(&member_key);
                }
            });

        let collection = self.downgrade();
        let member = entity.downgrade();
        let on_update = self.inner.model.listen_to(entity, events::UPDATE, move |event| {
            let (Some(collection), Some(member)) = (collection.upgrade(), member.upgrade()) else {
                return;
            };
            let diff = event.arg(1).cloned().unwrap_or_default();
            collection
                .inner
                .model
                .emit(events::MODEL_UPDATE, &[Value::from(member), diff]);
        });

        vec![on_destroy, on_update]
    }

    fn sort(&self) {
        let Some(comparator) = self.inner.config.comparator.clone() else {
            return;
        };
        // The comparator may touch the collection; retry until it holds still.
        loop {
            let mut snapshot: Vec<(Key, Value)> = {
                let members = self.inner.members.borrow();
                members
                    .order
                    .iter()
                    .filter_map(|k| members.slots.get(k).map(|s| (k.clone(), s.member.clone())))
                    .collect()
            };
            snapshot.sort_by(|(_, a), (_, b)| comparator(a, b));

            let mut members = self.inner.members.borrow_mut();
            let unchanged = snapshot.len() == members.order.len()
                && snapshot.iter().all(|(k, _)| members.slots.contains_key(k));
            if unchanged {
                members.order = snapshot.into_iter().map(|(k, _)| k).collect();
                return;
            }
        }
    }

    /// Returns the member addressed by `lookup`.
    pub fn get<'a>(&self, lookup: impl Into<Lookup<'a>>) -> Option<Value> {
        let key = self.resolve(lookup.into())?;
        self.inner
            .members
            .borrow()
            .slots
            .get(&key)
            .map(|slot| slot.member.clone())
    }

    /// Returns true if a member is addressed by `lookup`.
    pub fn contains<'a>(&self, lookup: impl Into<Lookup<'a>>) -> bool {
        self.resolve(lookup.into())
            .is_some_and(|key| self.inner.members.borrow().slots.contains_key(&key))
    }

    /// Removes the member addressed by `lookup` and emits `remove` with it.
    ///
    /// The member is not destroyed. Returns false, emitting nothing, if no
    /// member matched.
    pub fn remove<'a>(&self, lookup: impl Into<Lookup<'a>>) -> bool {
        let Some(key) = self.resolve(lookup.into()) else {
            return false;
        };
        let slot = {
            let mut members = self.inner.members.borrow_mut();
            let slot = members.slots.remove(&key);
            if let Some(slot) = &slot {
                members.order.retain(|k| *k != key);
                if let Some(entity) = Entity::from_value(&slot.member) {
                    members.tracked.remove(&entity.tracking_id());
                }
            }
            slot
        };
        let Some(slot) = slot else {
            return false;
        };

        self.release(&slot);
        debug!(collection = %self.identity(), %key, "member removed");
        self.inner.model.emit(events::REMOVE, &[slot.member]);
        true
    }

    fn release(&self, slot: &Slot) {
        for handle in &slot.subscriptions {
            // Already gone when the member itself was destroyed
            let _ = self.inner.model.stop_listening(*handle);
        }
        if let Some(entity) = Entity::from_value(&slot.member) {
            entity.release_collection(&self.downgrade());
        }
    }

    /// Updates the member `value` addresses, or adds `value` if none does.
    pub fn update(&self, value: Value) -> Option<Value> {
        match self.member_key(&value) {
            Some(key) if self.contains(&key) => self.update_member(&key, &value),
            _ => self.add(value),
        }
    }

    /// Empties the collection, then adds `values`.
    pub fn reset<I>(&self, values: I) -> Vec<Value>
    where
        I: IntoIterator<Item = Value>,
    {
        self.empty();
        self.add_all(values)
    }

    /// Removes every member without emitting events or destroying members.
    pub fn empty(&self) {
        let slots: Vec<Slot> = {
            let mut members = self.inner.members.borrow_mut();
            members.order.clear();
            members.tracked.clear();
            members.slots.drain().map(|(_, slot)| slot).collect()
        };
        for slot in &slots {
            self.release(slot);
        }
    }

    /// Returns a new collection with the same configuration and attributes,
    /// holding the members that satisfy `predicate`.
    #[must_use]
    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&Value) -> bool,
    {
        self.filter_with(predicate, Self::from_parts)
    }

    /// Like [`Collection::filter`], matching members against a shape.
    #[must_use]
    pub fn filter_by(&self, shape: &Attributes) -> Self {
        self.filter(|member| matches_shape(member, shape))
    }

    /// Hands the matching members, a copy of the configuration, and the
    /// collection's attributes (without `id`) to `construct`.
    ///
    /// Wrapper types use this to filter into their own type.
    pub fn filter_with<P, C, T>(&self, predicate: P, construct: C) -> T
    where
        P: Fn(&Value) -> bool,
        C: FnOnce(Vec<Value>, CollectionConfig, Attributes) -> T,
    {
        let matches: Vec<Value> = self.members().into_iter().filter(|m| predicate(m)).collect();
        let mut attributes = self.inner.model.attributes();
        attributes.remove(ID_KEY);
        construct(matches, self.inner.config.clone(), attributes)
    }

    /// Returns the first member satisfying `predicate`.
    pub fn find<P>(&self, predicate: P) -> Option<Value>
    where
        P: Fn(&Value) -> bool,
    {
        self.members().into_iter().find(|m| predicate(m))
    }

    /// Returns the first member matching `shape`.
    ///
    /// A member matches when, for every key of the shape, it has an equal
    /// value under that key.
    #[must_use]
    pub fn find_by(&self, shape: &Attributes) -> Option<Value> {
        self.find(|member| matches_shape(member, shape))
    }

    /// Returns the members whose key starts with `query`, ignoring ASCII case.
    ///
    /// A case-sensitive exact match comes first; the rest follow in member
    /// order.
    #[must_use]
    pub fn search_keys(&self, query: &str) -> Vec<Value> {
        let members = self.inner.members.borrow();
        let lowered = query.to_ascii_lowercase();
        let mut exact = Vec::new();
        let mut prefixed = Vec::new();
        for key in &members.order {
            let Some(slot) = members.slots.get(key) else {
                continue;
            };
            if key.as_str() == query {
                exact.push(slot.member.clone());
            } else if key.as_str().to_ascii_lowercase().starts_with(&lowered) {
                prefixed.push(slot.member.clone());
            }
        }
        exact.extend(prefixed);
        exact
    }

    /// Returns the member at `index`; negative indices count from the end.
    #[must_use]
    pub fn at(&self, index: isize) -> Option<Value> {
        let members = self.inner.members.borrow();
        let position = if index < 0 {
            members.order.len().checked_sub(index.unsigned_abs())?
        } else {
            index.unsigned_abs()
        };
        let key = members.order.get(position)?;
        members.slots.get(key).map(|slot| slot.member.clone())
    }

    /// Returns the first member.
    #[must_use]
    pub fn first(&self) -> Option<Value> {
        self.at(0)
    }

    /// Returns the last member.
    #[must_use]
    pub fn last(&self) -> Option<Value> {
        self.at(-1)
    }

    /// Returns the position of the member addressed by `lookup`.
    pub fn index_of<'a>(&self, lookup: impl Into<Lookup<'a>>) -> Option<usize> {
        let key = self.resolve(lookup.into())?;
        self.inner
            .members
            .borrow()
            .order
            .iter()
            .position(|k| *k == key)
    }

    /// Returns the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.members.borrow().order.len()
    }

    /// Returns true if the collection has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.members.borrow().order.is_empty()
    }

    /// Returns the member keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<Key> {
        self.inner.members.borrow().order.clone()
    }

    /// Returns a snapshot of the members in order.
    #[must_use]
    pub fn members(&self) -> Vec<Value> {
        let members = self.inner.members.borrow();
        members
            .order
            .iter()
            .filter_map(|k| members.slots.get(k).map(|slot| slot.member.clone()))
            .collect()
    }

    /// Iterates over a snapshot of the members.
    pub fn iter(&self) -> std::vec::IntoIter<Value> {
        self.members().into_iter()
    }

    /// Calls `f` with each member and its position until it breaks.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Value, usize) -> ControlFlow<()>,
    {
        for (index, member) in self.members().iter().enumerate() {
            if f(member, index).is_break() {
                return;
            }
        }
    }

    /// Maps every member in order.
    pub fn map<T, F>(&self, f: F) -> Vec<T>
    where
        F: FnMut(&Value) -> T,
    {
        self.members().iter().map(f).collect()
    }

    /// Serializes every member in order; entity members become their
    /// visible attributes.
    #[must_use]
    pub fn serialize(&self) -> Vec<Value> {
        self.map(|member| match Entity::from_value(member) {
            Some(entity) => Value::Map(entity.serialize()),
            None => member.clone(),
        })
    }

    /// Entity members resolve by instance first, so a later change to
    /// their id property does not detach them.
    fn resolve(&self, lookup: Lookup<'_>) -> Option<Key> {
        let tracking = match &lookup {
            Lookup::Entity(entity) => Some(entity.tracking_id()),
            Lookup::Value(value) => Entity::from_value(value).map(|e| e.tracking_id()),
            Lookup::Key(_) => None,
        };
        tracking
            .and_then(|t| self.tracked_key_of(t))
            .or_else(|| lookup.resolve(&self.inner.config.id_property))
    }
}

fn matches_shape(member: &Value, shape: &Attributes) -> bool {
    shape
        .iter()
        .all(|(key, expected)| member.attr(key).is_some_and(|actual| actual == *expected))
}

impl IntoIterator for &Collection {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("identity", self.identity())
            .field("members", &self.members())
            .finish()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Collection {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serde::Serialize::serialize(&Collection::serialize(self), serializer)
    }
}
