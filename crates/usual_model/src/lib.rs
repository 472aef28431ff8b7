//! Observable entities and keyed collections for usual.
//!
//! This crate provides:
//! - [`Entity`] - A self-identifying, mutable, observable record
//! - [`Collection`] - An ordered, uniquely-keyed container of members
//! - [`MemberFactory`] - Coercion of raw attribute maps into members
//! - [`EntityConfig`] and [`CollectionConfig`] - Typed configuration
//! - [`Lookup`] - The ways a member can be addressed
//!
//! # Lifecycle
//!
//! Entities subscribe to each other with [`Entity::listen_to`]. Every such
//! subscription is released when either side is destroyed. A collection is
//! itself backed by an entity and uses the same mechanism to follow the
//! `destroy` and `update` events of its entity members.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collection;
pub mod config;
pub mod entity;
pub mod factory;
pub mod lookup;

pub use collection::{Collection, WeakCollection};
pub use config::{CollectionConfig, Comparator, EntityConfig};
pub use entity::{Entity, SubscriptionHandle, WeakEntity};
pub use factory::{EntityFactory, FnFactory, MemberFactory};
pub use lookup::Lookup;

/// Names of the events emitted by entities and collections.
pub mod events {
    /// Collection: new members were added. Args: `[Array(members)]`.
    pub const ADD: &str = "add";
    /// Collection: a member was removed. Args: `[member]`.
    pub const REMOVE: &str = "remove";
    /// Collection: a member entity was updated. Args: `[member, diff or nil]`.
    pub const MODEL_UPDATE: &str = "modelUpdate";
    /// Entity: attributes were updated. Args: `[Map(data), diff or nil]`.
    pub const UPDATE: &str = "update";
    /// Entity: the entity is being destroyed. No args.
    pub const DESTROY: &str = "destroy";
}
