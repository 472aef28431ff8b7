//! Recursive attribute merging with change reporting.
//!
//! Sources are applied left to right onto a target in place. For each key:
//! equal values are skipped, a map merged onto a map recurses, and anything
//! else overwrites wholesale. The returned [`Diff`] names exactly the keys
//! that changed, nested wherever the merge recursed.

use std::sync::Arc;

use crate::attributes::Attributes;
use crate::value::Value;

/// Structural description of what a merge changed.
///
/// A diff is never empty; "nothing changed" is `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diff(Attributes);

impl Diff {
    /// Returns the changed keys and their new values.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.0
    }

    /// Consumes the diff, returning the changed keys and their new values.
    #[must_use]
    pub fn into_attributes(self) -> Attributes {
        self.0
    }

    /// Returns the new value recorded for a top-level key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns true if the key changed.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns the number of changed top-level keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no key changed. Never the case for a merge result.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replays this diff onto `target`.
    ///
    /// Applying the diff of a merge to a copy of the pre-merge target yields
    /// the post-merge target.
    pub fn apply_to(&self, target: &mut Attributes) {
        let mut scratch = Attributes::new();
        merge_source(target, &self.0, &mut scratch);
    }
}

impl From<Diff> for Value {
    fn from(diff: Diff) -> Self {
        Self::Map(diff.0)
    }
}

/// Merges `sources` into `target` in order and reports what changed.
///
/// Returns `None` when no key changed, including when every source is empty.
///
/// # Example
///
/// ```
/// use usual_foundation::{attrs, merge_into, Value};
///
/// let mut target = attrs! { "a" => 1, "nested" => attrs! { "x" => 1, "y" => 2 } };
/// let diff = merge_into(&mut target, [&attrs! { "nested" => attrs! { "y" => 3 } }]).unwrap();
///
/// assert_eq!(diff.get("nested"), Some(&Value::Map(attrs! { "y" => 3 })));
/// assert_eq!(target.get("a"), Some(&Value::Int(1)));
/// ```
pub fn merge_into<'a, I>(target: &mut Attributes, sources: I) -> Option<Diff>
where
    I: IntoIterator<Item = &'a Attributes>,
{
    let mut diff = Attributes::new();
    for source in sources {
        merge_source(target, source, &mut diff);
    }
    if diff.is_empty() {
        None
    } else {
        Some(Diff(diff))
    }
}

/// Merges one value onto another.
///
/// A map onto a map merges key by key; any other pair replaces `target`
/// unless the two are already equal. Returns the change: the nested diff as a
/// map for map pairs, the incoming value for a replacement.
pub fn merge_values(target: &mut Value, source: &Value) -> Option<Value> {
    if target == source {
        return None;
    }
    if let (Value::Map(existing), Value::Map(incoming)) = (&mut *target, source) {
        return merge_into(existing, [incoming]).map(Value::from);
    }
    *target = source.clone();
    Some(source.clone())
}

fn merge_source(target: &mut Attributes, source: &Attributes, diff: &mut Attributes) {
    for (key, incoming) in source.iter() {
        let recurse = match target.get(key) {
            Some(existing) if existing == incoming => continue,
            Some(Value::Map(_)) => incoming.is_map(),
            _ => false,
        };

        if recurse {
            let (Some(Value::Map(existing)), Value::Map(incoming)) = (target.get_mut(key), incoming)
            else {
                continue;
            };
            // An earlier source may already have recorded this key
            let mut nested = match diff.get(key) {
                Some(Value::Map(recorded)) => recorded.clone(),
                _ => Attributes::new(),
            };
            merge_source(existing, incoming, &mut nested);
            if !nested.is_empty() {
                diff.insert(Arc::clone(key), Value::Map(nested));
            }
        } else {
            target.insert(Arc::clone(key), incoming.clone());
            diff.insert(Arc::clone(key), incoming.clone());
        }
    }
}
