//! Recursive merge of YAML values.
//!
//! Merging is right-biased: keys from the overlay replace keys in the base.
//! Only when both sides hold a mapping for the same key are the two mappings
//! merged recursively. Lists are replaced, never concatenated.

use serde_yaml::{Mapping, Value};

/// Merges `overlay` into `base` in place.
pub fn merge_into(base: &mut Mapping, overlay: &Mapping) {
    for (key, value) in overlay {
        if let (Some(Value::Mapping(existing)), Value::Mapping(incoming)) =
            (base.get_mut(key), value)
        {
            merge_into(existing, incoming);
            continue;
        }
        base.insert(key.clone(), value.clone());
    }
}

/// Returns `base` merged with `overlay`, leaving both untouched.
#[must_use]
pub fn merged(base: &Mapping, overlay: &Mapping) -> Mapping {
    let mut out = base.clone();
    merge_into(&mut out, overlay);
    out
}
