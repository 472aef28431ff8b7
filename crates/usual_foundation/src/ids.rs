//! Id generation strategies.
//!
//! Entities and collections generate a key when none was supplied. The
//! strategy is injected through configuration; nothing here keeps
//! process-wide state.

use std::cell::Cell;
use std::fmt;

use uuid::Uuid;

use crate::key::Key;

/// Produces unique keys.
///
/// The only contract is uniqueness among the keys one generator hands out
/// during the process lifetime.
pub trait IdGenerator {
    /// Generates a fresh key starting with `prefix`.
    fn generate(&self, prefix: &str) -> Key;
}

/// Random UUID v4 keys: `prefix` followed by 32 hex digits.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn generate(&self, prefix: &str) -> Key {
        Key::from(format!("{prefix}{}", Uuid::new_v4().simple()))
    }
}

/// Monotonic counter keys: `prefix` followed by 1, 2, 3, ...
///
/// Share one instance (behind an `Rc`) between everything that must not
/// collide.
#[derive(Debug)]
pub struct SequentialIds {
    next: Cell<u64>,
}

impl SequentialIds {
    /// Creates a counter starting at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates a counter starting at `first`.
    #[must_use]
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: Cell::new(first),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIds {
    fn generate(&self, prefix: &str) -> Key {
        let n = self.next.get();
        self.next.set(n + 1);
        Key::from(format!("{prefix}{n}"))
    }
}

/// Adapts a closure into an [`IdGenerator`].
pub struct IdFn<F>(pub F);

impl<F> IdGenerator for IdFn<F>
where
    F: Fn(&str) -> Key,
{
    fn generate(&self, prefix: &str) -> Key {
        (self.0)(prefix)
    }
}

impl<F> fmt::Debug for IdFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdFn(..)")
    }
}
