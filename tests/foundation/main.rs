//! Integration tests for Layer 0: Foundation
//!
//! Tests for core types: Value, Attributes, Key, merge/diff, and handles.
