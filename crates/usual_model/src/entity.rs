//! Self-identifying, observable records.
//!
//! An [`Entity`] is a cheap handle to shared state: cloning it yields another
//! handle to the same record. Its identity is fixed at construction, its
//! attributes change through [`Entity::update`], and every change is
//! announced on its event channel.
//!
//! # Cross-entity subscriptions
//!
//! [`Entity::listen_to`] registers a callback on another entity's channel and
//! records it in a generational arena owned by the listener. The first
//! subscription against a remote also installs a one-time hook on the
//! remote's `destroy` that forgets every subscription against it. Destroying
//! the listener unregisters its callbacks from every remote. Either way no
//! callback outlives either party.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;
use usual_events::{Event, EventChannel, ListenerId};
use usual_foundation::{
    Attributes, Diff, EntityRef, Error, Handle, HandleArena, Key, Record, Result, TrackingId,
    Value, merge_into,
};

use crate::collection::{Collection, WeakCollection};
use crate::config::{ENTITY_ID_PREFIX, EntityConfig, ID_KEY, RESERVED_KEY};
use crate::events;

/// Identifies one subscription created by [`Entity::listen_to`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(Handle);

impl SubscriptionHandle {
    /// Returns the handle that names no subscription.
    #[must_use]
    pub const fn null() -> Self {
        Self(Handle::null())
    }

    /// Returns true if this handle names no subscription.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0.is_null()
    }

    /// Returns the underlying arena handle.
    #[must_use]
    pub const fn handle(self) -> Handle {
        self.0
    }
}

struct Subscription {
    remote: TrackingId,
    listener: ListenerId,
}

struct RemoteLink {
    entity: WeakEntity,
    purge: ListenerId,
}

struct EntityState {
    attributes: Attributes,
    subscriptions: HandleArena<Subscription>,
    remotes: HashMap<TrackingId, RemoteLink>,
    collection: Option<WeakCollection>,
    destroyed: bool,
}

struct EntityInner {
    tracking: TrackingId,
    identity: Key,
    config: EntityConfig,
    channel: EventChannel,
    state: RefCell<EntityState>,
}

impl Record for EntityInner {
    fn tracking_id(&self) -> TrackingId {
        self.tracking
    }

    fn identity(&self) -> Key {
        self.identity.clone()
    }

    fn attr(&self, key: &str) -> Option<Value> {
        self.state.borrow().attributes.get(key).cloned()
    }

    fn snapshot(&self) -> Attributes {
        visible(&self.state.borrow().attributes)
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// An observable record with a fixed identity.
#[derive(Clone)]
pub struct Entity {
    inner: Rc<EntityInner>,
}

/// A non-owning reference to an [`Entity`].
#[derive(Clone, Default)]
pub struct WeakEntity(Weak<EntityInner>);

impl WeakEntity {
    /// Returns the entity if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Entity> {
        self.0.upgrade().map(|inner| Entity { inner })
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

impl Entity {
    /// Creates an entity from attribute layers with the default configuration.
    ///
    /// See [`Entity::with_config`].
    #[must_use]
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Attributes>,
    {
        Self::with_config(EntityConfig::default(), layers)
    }

    /// Creates an entity from attribute layers.
    ///
    /// Layers are merged last to first: the last layer is the base and
    /// earlier layers override it. A reserved `usual` map among the merged
    /// attributes overrides `config`. The identity is the value of the
    /// configured id property if truthy, else a truthy `id`, else a freshly
    /// generated key. The value the identity came from is written back as
    /// `id` unchanged, so a numeric id stays a number.
    #[must_use]
    pub fn with_config<I>(mut config: EntityConfig, layers: I) -> Self
    where
        I: IntoIterator<Item = Attributes>,
    {
        let layers: Vec<Attributes> = layers.into_iter().collect();
        let mut attributes = Attributes::new();
        merge_into(&mut attributes, layers.iter().rev());

        if let Some(Value::Map(reserved)) = attributes.get(RESERVED_KEY) {
            config.apply_reserved(reserved);
        }

        let source = config
            .id_property
            .as_deref()
            .and_then(|property| attributes.get(property))
            .filter(|value| Key::from_value(value).is_some())
            .or_else(|| attributes.get(ID_KEY).filter(|v| Key::from_value(v).is_some()))
            .cloned();
        let identity = match source.as_ref().and_then(Key::from_value) {
            Some(identity) => identity,
            None => config.id_generator.generate(ENTITY_ID_PREFIX),
        };
        attributes.insert(ID_KEY, source.unwrap_or_else(|| identity.to_value()));

        let tracking = TrackingId::new();
        debug!(%identity, %tracking, "entity created");

        Self {
            inner: Rc::new(EntityInner {
                tracking,
                identity,
                channel: EventChannel::new(config.channel.clone()),
                config,
                state: RefCell::new(EntityState {
                    attributes,
                    subscriptions: HandleArena::new(),
                    remotes: HashMap::new(),
                    collection: None,
                    destroyed: false,
                }),
            }),
        }
    }

    /// Returns the entity behind an entity value.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let record = Rc::clone(value.as_entity()?.record());
        record
            .into_any()
            .downcast::<EntityInner>()
            .ok()
            .map(|inner| Self { inner })
    }

    /// Returns the identity.
    #[must_use]
    pub fn identity(&self) -> &Key {
        &self.inner.identity
    }

    /// Returns the per-instance tracking id.
    #[must_use]
    pub fn tracking_id(&self) -> TrackingId {
        self.inner.tracking
    }

    /// Returns the configuration in effect.
    #[must_use]
    pub fn config(&self) -> &EntityConfig {
        &self.inner.config
    }

    /// Reads one attribute.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.state.borrow().attributes.get(key).cloned()
    }

    /// Returns a snapshot of every attribute, internal ones included.
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        self.inner.state.borrow().attributes.clone()
    }

    /// Returns a snapshot of the visible attributes.
    ///
    /// Keys starting with `_` and the reserved `usual` key are excluded.
    /// Entity-valued attributes stay references.
    #[must_use]
    pub fn serialize(&self) -> Attributes {
        visible(&self.inner.state.borrow().attributes)
    }

    /// Returns true once [`Entity::destroy`] has run.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.state.borrow().destroyed
    }

    /// Merges `data` into the attributes and emits `update`.
    ///
    /// `id`, the configured id property, and the reserved `usual` key are
    /// stripped first, so the identity never changes. The event carries the
    /// stripped data and the diff (nil when nothing changed) and fires even
    /// for an empty update. A destroyed entity ignores updates.
    pub fn update(&self, mut data: Attributes) -> Option<Diff> {
        if self.is_destroyed() {
            return None;
        }
        data.remove(ID_KEY);
        data.remove(RESERVED_KEY);
        if let Some(property) = self.inner.config.id_property.as_deref() {
            data.remove(property);
        }

        let diff = merge_into(&mut self.inner.state.borrow_mut().attributes, [&data]);
        self.inner
            .channel
            .emit(events::UPDATE, &[Value::Map(data), Value::from(diff.clone())]);
        diff
    }

    /// Returns the entity's event channel.
    #[must_use]
    pub fn events(&self) -> &EventChannel {
        &self.inner.channel
    }

    /// Registers a listener on this entity's channel.
    pub fn on<F>(&self, pattern: &str, callback: F) -> ListenerId
    where
        F: Fn(&Event<'_>) + 'static,
    {
        self.inner.channel.on(pattern, callback)
    }

    /// Registers a one-time listener on this entity's channel.
    pub fn once<F>(&self, pattern: &str, callback: F) -> ListenerId
    where
        F: Fn(&Event<'_>) + 'static,
    {
        self.inner.channel.once(pattern, callback)
    }

    /// Removes a listener from this entity's channel.
    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.channel.off(id)
    }

    /// Emits an event on this entity's channel.
    pub fn emit(&self, name: &str, args: &[Value]) -> bool {
        self.inner.channel.emit(name, args)
    }

    /// Subscribes `callback` to `event` on `remote`'s channel.
    ///
    /// The subscription is released automatically when either entity is
    /// destroyed. Returns a null handle, registering nothing, if either is
    /// already destroyed.
    pub fn listen_to<F>(&self, remote: &Entity, event: &str, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Event<'_>) + 'static,
    {
        if self.is_destroyed() || remote.is_destroyed() {
            return SubscriptionHandle::null();
        }

        let remote_id = remote.tracking_id();
        let linked = self.inner.state.borrow().remotes.contains_key(&remote_id);
        if !linked {
            let listener = self.downgrade();
            let purge = remote.inner.channel.once(events::DESTROY, move |_| {
                if let Some(listener) = listener.upgrade() {
                    listener.forget_remote(remote_id);
                }
            });
            self.inner.state.borrow_mut().remotes.insert(
                remote_id,
                RemoteLink {
                    entity: remote.downgrade(),
                    purge,
                },
            );
        }

        let listener = remote.inner.channel.on(event, callback);
        let handle = self.inner.state.borrow_mut().subscriptions.insert(Subscription {
            remote: remote_id,
            listener,
        });
        SubscriptionHandle(handle)
    }

    /// Releases one subscription created by [`Entity::listen_to`].
    ///
    /// # Errors
    ///
    /// Returns `Destroyed` if this entity has been destroyed, and
    /// `StaleHandle` or `HandleNotFound` if the subscription was already
    /// released, including by the remote's destruction.
    pub fn stop_listening(&self, handle: SubscriptionHandle) -> Result<()> {
        let (listener, remote, purge) = {
            let mut state = self.inner.state.borrow_mut();
            if state.destroyed {
                return Err(Error::destroyed(self.inner.identity.as_str()));
            }
            let subscription = state.subscriptions.remove(handle.0)?;
            let shared = state
                .subscriptions
                .iter()
                .any(|(_, s)| s.remote == subscription.remote);
            if shared {
                let remote = state
                    .remotes
                    .get(&subscription.remote)
                    .map(|link| link.entity.clone());
                (subscription.listener, remote, None)
            } else {
                match state.remotes.remove(&subscription.remote) {
                    Some(link) => (subscription.listener, Some(link.entity), Some(link.purge)),
                    None => (subscription.listener, None, None),
                }
            }
        };

        if let Some(remote) = remote.and_then(|w| w.upgrade()) {
            remote.inner.channel.off(listener);
            if let Some(purge) = purge {
                remote.inner.channel.off(purge);
            }
        }
        Ok(())
    }

    /// Releases every subscription against `remote`. Returns how many.
    pub fn stop_listening_to(&self, remote: &Entity) -> usize {
        let remote_id = remote.tracking_id();
        let mut released = Vec::new();
        let link = {
            let mut state = self.inner.state.borrow_mut();
            state.subscriptions.retain(|s| {
                if s.remote == remote_id {
                    released.push(s.listener);
                    false
                } else {
                    true
                }
            });
            state.remotes.remove(&remote_id)
        };

        for listener in &released {
            remote.inner.channel.off(*listener);
        }
        if let Some(link) = link {
            remote.inner.channel.off(link.purge);
        }
        released.len()
    }

    /// Returns the number of live subscriptions this entity holds.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.state.borrow().subscriptions.len()
    }

    /// Returns true if this entity holds a subscription against `remote`.
    #[must_use]
    pub fn is_listening_to(&self, remote: &Entity) -> bool {
        self.inner
            .state
            .borrow()
            .remotes
            .contains_key(&remote.tracking_id())
    }

    /// Emits `destroy`, then drops every local listener and every
    /// subscription on other entities. Later calls do nothing.
    pub fn destroy(&self) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
        }
        debug!(identity = %self.inner.identity, "entity destroyed");

        self.inner.channel.emit(events::DESTROY, &[]);
        self.inner.channel.close();

        let (subscriptions, remotes) = {
            let mut state = self.inner.state.borrow_mut();
            (
                state.subscriptions.drain(),
                std::mem::take(&mut state.remotes),
            )
        };
        for subscription in subscriptions {
            let remote = remotes
                .get(&subscription.remote)
                .and_then(|link| link.entity.upgrade());
            if let Some(remote) = remote {
                remote.inner.channel.off(subscription.listener);
            }
        }
        for link in remotes.into_values() {
            if let Some(remote) = link.entity.upgrade() {
                remote.inner.channel.off(link.purge);
            }
        }
    }

    /// Returns the collection holding this entity, if it is still alive.
    #[must_use]
    pub fn collection(&self) -> Option<Collection> {
        self.inner
            .state
            .borrow()
            .collection
            .as_ref()
            .and_then(WeakCollection::upgrade)
    }

    /// Removes this entity from its collection. Returns false if it has none.
    pub fn remove_from_collection(&self) -> bool {
        match self.collection() {
            Some(collection) => collection.remove(self),
            None => false,
        }
    }

    /// Returns a non-owning reference.
    #[must_use]
    pub fn downgrade(&self) -> WeakEntity {
        WeakEntity(Rc::downgrade(&self.inner))
    }

    /// Records `owner` as the back-reference unless a live one is set.
    pub(crate) fn claim_collection(&self, owner: &WeakCollection) -> bool {
        let mut state = self.inner.state.borrow_mut();
        let claimed = state
            .collection
            .as_ref()
            .is_some_and(WeakCollection::is_alive);
        if claimed || !owner.is_alive() {
            return false;
        }
        state.collection = Some(owner.clone());
        true
    }

    /// Clears the back-reference if it points at `owner`.
    pub(crate) fn release_collection(&self, owner: &WeakCollection) {
        let mut state = self.inner.state.borrow_mut();
        if state.collection.as_ref().is_some_and(|c| c.ptr_eq(owner)) {
            state.collection = None;
        }
    }

    /// Writes an attribute without merging or emitting.
    pub(crate) fn write_attribute(&self, key: &str, value: Value) {
        self.inner.state.borrow_mut().attributes.insert(key, value);
    }

    fn forget_remote(&self, remote: TrackingId) {
        let mut state = self.inner.state.borrow_mut();
        state.remotes.remove(&remote);
        state.subscriptions.retain(|s| s.remote != remote);
    }
}

fn visible(attributes: &Attributes) -> Attributes {
    let mut visible = attributes.clone();
    visible.retain(|key, _| !key.starts_with('_') && key != RESERVED_KEY);
    visible
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Entity {}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.inner.identity)
    }
}

impl From<Entity> for Value {
    fn from(entity: Entity) -> Self {
        Self::Entity(EntityRef::new(entity.inner))
    }
}

impl From<&Entity> for Value {
    fn from(entity: &Entity) -> Self {
        Self::Entity(EntityRef::new(Rc::clone(&entity.inner) as Rc<dyn Record>))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Entity {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serde::Serialize::serialize(&Entity::serialize(self), serializer)
    }
}
