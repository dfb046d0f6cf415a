//! Structural operations over mappings: deep merge, intersection and
//! difference
//!
//! Each operation handles mapping inputs only. Any other top-level shape is
//! reported as `NotApplicable` (or `None`) so the caller can fall back to
//! its own handling; below the top level, the operations recurse where both
//! sides are mappings and replace otherwise.

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::interpolation::{Outcome, DEFAULT_MAX_DEPTH};
use crate::mapping::MappingAccess;
use crate::value::Value;

/// Deep-merge `src` into `dest`
///
/// Keys present on both sides whose values are both mappings merge
/// recursively; any other key from `src` is written when `overwrite` is set
/// or `dest` lacks it. Writes go through [`MappingAccess::store`], so
/// variable cells in `dest` are updated in place.
///
/// ```
/// use attrconf_core::{merge, Outcome, Value};
///
/// let mut dest: Value = serde_yaml::from_str("model: {dim: 64, act: relu}").unwrap();
/// let src: Value = serde_yaml::from_str("model: {dim: 128}\nlr: 0.1").unwrap();
///
/// assert_eq!(merge(&mut dest, &src, true).unwrap(), Outcome::Applied);
/// assert_eq!(dest.get_path("model.dim").unwrap(), &Value::Integer(128));
/// assert_eq!(dest.get_path("model.act").unwrap(), &Value::from("relu"));
/// ```
pub fn merge(dest: &mut Value, src: &Value, overwrite: bool) -> Result<Outcome> {
    match (dest, src) {
        (Value::Mapping(dest), Value::Mapping(src)) => {
            merge_entries(dest, src, overwrite, DEFAULT_MAX_DEPTH)?;
            Ok(Outcome::Applied)
        }
        _ => Ok(Outcome::NotApplicable),
    }
}

/// Deep-merge `src` into any mapping, refusing nesting deeper than
/// `max_depth`
pub fn merge_entries<M: MappingAccess + ?Sized>(
    dest: &mut M,
    src: &IndexMap<String, Value>,
    overwrite: bool,
    max_depth: usize,
) -> Result<()> {
    merge_level(dest, src, overwrite, 0, max_depth)
}

fn merge_level<M: MappingAccess + ?Sized>(
    dest: &mut M,
    src: &IndexMap<String, Value>,
    overwrite: bool,
    depth: usize,
    max_depth: usize,
) -> Result<()> {
    if depth > max_depth {
        return Err(Error::depth_exceeded(max_depth));
    }

    for (key, value) in src {
        if let Value::Mapping(src_inner) = value {
            if let Some(Value::Mapping(dest_inner)) = dest.lookup_mut(key) {
                merge_level(dest_inner, src_inner, overwrite, depth + 1, max_depth)
                    .map_err(|e| match e.path {
                        Some(_) => e,
                        None => e.with_path(key.as_str()),
                    })?;
                continue;
            }
        }
        if overwrite || !dest.contains(key) {
            dest.store(key, value.clone())?;
        }
    }

    Ok(())
}

/// Entries of `other` that `this` holds with an equal value
///
/// `None` when either side is not a mapping.
pub fn intersect(this: &Value, other: &Value) -> Option<IndexMap<String, Value>> {
    match (this, other) {
        (Value::Mapping(this), Value::Mapping(other)) => Some(intersect_entries(this, other)),
        _ => None,
    }
}

/// Entries of `other` that `this` holds with an equal value
pub fn intersect_entries<M: MappingAccess + ?Sized>(
    this: &M,
    other: &IndexMap<String, Value>,
) -> IndexMap<String, Value> {
    other
        .iter()
        .filter(|(key, value)| this.lookup(key).is_some_and(|mine| mine == *value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Entries of `other` that `this` lacks or holds with a different value
///
/// `None` when either side is not a mapping.
pub fn difference(this: &Value, other: &Value) -> Option<IndexMap<String, Value>> {
    match (this, other) {
        (Value::Mapping(this), Value::Mapping(other)) => Some(difference_entries(this, other)),
        _ => None,
    }
}

/// Entries of `other` that `this` lacks or holds with a different value
pub fn difference_entries<M: MappingAccess + ?Sized>(
    this: &M,
    other: &IndexMap<String, Value>,
) -> IndexMap<String, Value> {
    other
        .iter()
        .filter(|(key, value)| !this.lookup(key).is_some_and(|mine| mine == *value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Read a mapping, or a sequence of `[key, value]` pairs, as entries
pub fn entries_of(value: &Value) -> Result<IndexMap<String, Value>> {
    let pair_error = || {
        Error::type_mismatch(
            "mapping or sequence of [key, value] pairs",
            format!("{} ({})", value.type_name(), value),
        )
    };

    match value.unwrapped() {
        Value::Mapping(map) => Ok(map),
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| match item.unwrapped() {
                Value::Sequence(pair) => match <[Value; 2]>::try_from(pair) {
                    Ok([key, value]) => match key.unwrapped() {
                        Value::String(key) => Ok((key, value)),
                        _ => Err(pair_error()),
                    },
                    Err(_) => Err(pair_error()),
                },
                _ => Err(pair_error()),
            })
            .collect(),
        _ => Err(pair_error()),
    }
}
