//! Error types for usual.
//!
//! Ordinary entity and collection operations never fail: misses are reported
//! through `Option`/`bool` returns. These errors cover the handle-based APIs
//! and explicit conversions, where a caller asked for something specific.

use thiserror::Error;

use crate::handle::Handle;
use crate::types::Type;

/// The main error type for usual operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind }
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: Type, actual: Type) -> Self {
        Self::new(ErrorKind::TypeMismatch { expected, actual })
    }

    /// Creates a handle not found error.
    #[must_use]
    pub fn handle_not_found(handle: Handle) -> Self {
        Self::new(ErrorKind::HandleNotFound(handle))
    }

    /// Creates a stale handle error.
    #[must_use]
    pub fn stale_handle(handle: Handle) -> Self {
        Self::new(ErrorKind::StaleHandle(handle))
    }

    /// Creates an error for an operation on a destroyed entity.
    #[must_use]
    pub fn destroyed(identity: impl Into<String>) -> Self {
        Self::new(ErrorKind::Destroyed(identity.into()))
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A value had the wrong type for the requested conversion.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type.
        expected: Type,
        /// The actual type encountered.
        actual: Type,
    },

    /// The handle was never issued by this arena, or its slot is free.
    #[error("handle not found: {0:?}")]
    HandleNotFound(Handle),

    /// The handle's slot was released and reused (generation mismatch).
    #[error("stale handle: {0:?}")]
    StaleHandle(Handle),

    /// The entity has been destroyed.
    #[error("entity destroyed: {0}")]
    Destroyed(String),
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
