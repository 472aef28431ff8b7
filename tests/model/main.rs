//! Integration tests for Layer 2: Model
//!
//! Tests for entities, collections, and the lifecycle protocol between them.

mod collections;
mod entities;
