//! Synchronous named-event channels for usual.
//!
//! This crate provides:
//! - [`EventChannel`] - Ordered, synchronous delivery of named events to listeners
//! - [`ChannelConfig`] - Wildcard, delimiter, and listener-limit settings
//! - [`pattern`] - Hierarchical name matching with `*` and `**`
//!
//! Every entity owns one channel; collections reuse their backing entity's.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod channel;
pub mod config;
pub mod pattern;

pub use channel::{Event, EventChannel, Listener, ListenerId};
pub use config::ChannelConfig;
