//! Usual - Observable entities and keyed collections
//!
//! This crate re-exports all layers of the usual system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 2: usual_model      — Entity, Collection, factories, configuration
//! Layer 1: usual_events     — Event channels with wildcard patterns
//! Layer 0: usual_foundation — Core types (Value, Attributes, Key, merge/diff)
//! ```

pub use usual_events as events;
pub use usual_foundation as foundation;
pub use usual_model as model;

pub use usual_foundation::{Attributes, Diff, Key, Value, attrs};
pub use usual_model::{Collection, CollectionConfig, Entity, EntityConfig, EntityFactory};
