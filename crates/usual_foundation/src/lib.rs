//! Values, attribute maps, and identity primitives for usual.
//!
//! This crate provides:
//! - [`Value`] - The tagged value type stored in every attribute
//! - [`Attributes`] - Ordered string-keyed attribute maps with structural sharing
//! - [`merge_into`] and [`Diff`] - Recursive merging that reports what changed
//! - [`Key`] and [`TrackingId`] - Member keys and per-instance tracking ids
//! - [`Handle`] and [`HandleArena`] - Generational handles for releasable registrations
//! - [`IdGenerator`] - Injectable id generation strategies
//! - [`Error`] - Error types for the handle-based APIs

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod attributes;
pub mod error;
pub mod handle;
pub mod ids;
pub mod key;
pub mod merge;
pub mod types;
pub mod value;

pub use attributes::Attributes;
pub use error::{Error, ErrorKind, Result};
pub use handle::{Handle, HandleArena};
pub use ids::{IdFn, IdGenerator, SequentialIds, UuidIds};
pub use key::{Key, TrackingId};
pub use merge::{Diff, merge_into, merge_values};
pub use types::Type;
pub use value::{EntityRef, Record, Value};

/// Builds an [`Attributes`] map from `key => value` pairs.
///
/// ```
/// use usual_foundation::{attrs, Value};
///
/// let a = attrs! { "id" => "one", "index" => 1 };
/// assert_eq!(a.get("index"), Some(&Value::Int(1)));
/// ```
#[macro_export]
macro_rules! attrs {
    () => {
        $crate::Attributes::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Attributes::new();
        $(
            map.insert($key, $value);
        )+
        map
    }};
}
