//! Mapping access used by the resolver and the structural operations
//!
//! [`MappingAccess`] is the seam between the algorithms and the containers
//! they run on: a plain `IndexMap`, the [`Config`](crate::Config) façade,
//! or a [`NestedView`] that exposes every leaf of a nested value under its
//! dotted path.

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::value::Value;

/// Keyed, ordered, mutable access to a mapping
pub trait MappingAccess {
    /// All keys, in order
    fn keys(&self) -> Vec<String>;

    /// The value stored under `key`
    fn lookup(&self, key: &str) -> Option<&Value>;

    /// Mutable access to the value stored under `key`
    fn lookup_mut(&mut self, key: &str) -> Option<&mut Value>;

    /// Write `value` under `key`
    ///
    /// When the existing entry is a variable cell the cell is updated in
    /// place rather than replaced.
    fn store(&mut self, key: &str, value: Value) -> Result<()>;

    /// Remove and return the value under `key`
    fn remove(&mut self, key: &str) -> Option<Value>;

    /// Rendering of the whole mapping for error messages
    fn describe(&self) -> String;

    /// Whether `key` is present
    fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Whether every key already addresses a leaf
    ///
    /// Flat interpolation treats a container held by such a mapping as a
    /// plain value instead of refusing the mapping.
    fn is_flattened(&self) -> bool {
        false
    }
}

impl MappingAccess for IndexMap<String, Value> {
    fn keys(&self) -> Vec<String> {
        IndexMap::keys(self).cloned().collect()
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }

    fn lookup_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.get_mut(key)
    }

    fn store(&mut self, key: &str, value: Value) -> Result<()> {
        if let Some(Value::Variable(cell)) = self.get(key) {
            return cell.set(value).map_err(|e| e.with_path(key));
        }
        self.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        self.shift_remove(key)
    }

    fn describe(&self) -> String {
        let mut out = String::from("{");
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&format!("{}: {}", k, v));
        }
        out.push('}');
        out
    }
}

/// Flat view over a nested value
///
/// Every scalar leaf (and every empty sequence or mapping) appears as a key
/// built from its path: `model.dim`, `layers[0]`, `layers[1].name`. Lookups
/// accept any path, including ones naming an intermediate mapping.
pub struct NestedView<'a> {
    root: &'a mut Value,
    leaves: Vec<String>,
}

impl<'a> NestedView<'a> {
    /// Build a view over `root`, refusing nesting deeper than `max_depth`
    pub fn new(root: &'a mut Value, max_depth: usize) -> Result<Self> {
        let mut leaves = Vec::new();
        collect_leaves(root, "", 0, max_depth, &mut leaves)?;
        Ok(Self { root, leaves })
    }
}

fn collect_leaves(
    value: &Value,
    prefix: &str,
    depth: usize,
    max_depth: usize,
    out: &mut Vec<String>,
) -> Result<()> {
    if depth > max_depth {
        return Err(Error::depth_exceeded(max_depth).with_path(prefix));
    }
    match value {
        Value::Mapping(map) if !map.is_empty() => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                collect_leaves(child, &path, depth + 1, max_depth, out)?;
            }
        }
        Value::Sequence(seq) if !seq.is_empty() => {
            for (i, child) in seq.iter().enumerate() {
                collect_leaves(child, &format!("{}[{}]", prefix, i), depth + 1, max_depth, out)?;
            }
        }
        _ if !prefix.is_empty() => out.push(prefix.to_string()),
        _ => {}
    }
    Ok(())
}

impl MappingAccess for NestedView<'_> {
    fn keys(&self) -> Vec<String> {
        self.leaves.clone()
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        self.root.get_path(key).ok()
    }

    fn lookup_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.root.get_path_mut(key).ok()
    }

    fn store(&mut self, key: &str, value: Value) -> Result<()> {
        let cell = match self.root.get_path(key) {
            Ok(Value::Variable(cell)) => Some(cell.clone()),
            _ => None,
        };
        match cell {
            Some(cell) => cell.set(value).map_err(|e| e.with_path(key)),
            None => {
                if !self.leaves.iter().any(|leaf| leaf == key) {
                    self.leaves.push(key.to_string());
                }
                self.root.set_path(key, value)
            }
        }
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        let (parent, last) = match key.rsplit_once('.') {
            Some((parent, last)) => (self.root.get_path_mut(parent).ok()?, last),
            None => (&mut *self.root, key),
        };
        let removed = match parent {
            Value::Mapping(map) => map.shift_remove(last),
            _ => None,
        };
        if removed.is_some() {
            self.leaves.retain(|leaf| leaf != key);
        }
        removed
    }

    fn describe(&self) -> String {
        self.root.to_string()
    }

    fn is_flattened(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::variable::Variable;
    use pretty_assertions::assert_eq;

    fn nested() -> Value {
        serde_yaml::from_str(
            "model:\n  dim: 256\n  act: gelu\nlayers:\n  - conv\n  - name: pool\n    size: 2\nempty: {}\n",
        )
        .unwrap()
    }

    #[test]
    fn test_indexmap_store_updates_cell_in_place() {
        let cell = Variable::new(1);
        let mut map: IndexMap<String, Value> = IndexMap::new();
        map.insert("a".into(), Value::Variable(cell.clone()));
        map.insert("b".into(), Value::Variable(cell.clone()));

        map.store("a", Value::Integer(5)).unwrap();
        assert_eq!(cell.get(), Value::Integer(5));
        assert_eq!(map["b"], Value::Integer(5));
    }

    #[test]
    fn test_indexmap_store_propagates_cell_rejection() {
        let cell = Variable::new(1).with_choices([1, 2]);
        let mut map: IndexMap<String, Value> = IndexMap::new();
        map.insert("a".into(), Value::Variable(cell));

        let err = map.store("a", Value::Integer(3)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.path.as_deref(), Some("a"));
    }

    #[test]
    fn test_indexmap_remove_keeps_order() {
        let mut map: IndexMap<String, Value> = IndexMap::new();
        for (k, v) in [("a", 1), ("b", 2), ("c", 3)] {
            map.insert(k.into(), v.into());
        }
        assert_eq!(MappingAccess::remove(&mut map, "b"), Some(Value::Integer(2)));
        assert_eq!(MappingAccess::keys(&map), vec!["a", "c"]);
        assert_eq!(map.describe(), "{a: 1, c: 3}");
    }

    #[test]
    fn test_nested_view_keys_are_leaf_paths() {
        let mut root = nested();
        let view = NestedView::new(&mut root, 64).unwrap();
        assert_eq!(
            view.keys(),
            vec![
                "model.dim",
                "model.act",
                "layers[0]",
                "layers[1].name",
                "layers[1].size",
                "empty"
            ]
        );
    }

    #[test]
    fn test_only_nested_view_is_flattened() {
        let mut root = nested();
        assert!(NestedView::new(&mut root, 64).unwrap().is_flattened());
        assert!(!IndexMap::<String, Value>::new().is_flattened());
    }

    #[test]
    fn test_nested_view_lookup_intermediate() {
        let mut root = nested();
        let view = NestedView::new(&mut root, 64).unwrap();
        assert!(view.lookup("model").unwrap().is_mapping());
        assert_eq!(view.lookup("layers[1].size"), Some(&Value::Integer(2)));
        assert!(view.lookup("model.missing").is_none());
    }

    #[test]
    fn test_nested_view_store_and_remove() {
        let mut root = nested();
        {
            let mut view = NestedView::new(&mut root, 64).unwrap();
            view.store("model.act", "relu".into()).unwrap();
            view.store("model.heads", Value::Integer(8)).unwrap();
            assert!(view.keys().contains(&"model.heads".to_string()));
            assert_eq!(view.remove("model.dim"), Some(Value::Integer(256)));
            assert!(!view.keys().contains(&"model.dim".to_string()));
        }
        assert_eq!(root.get_path("model.act").unwrap(), &Value::from("relu"));
        assert_eq!(root.get_path("model.heads").unwrap(), &Value::Integer(8));
    }

    #[test]
    fn test_nested_view_store_updates_cell() {
        let cell = Variable::new(1);
        let mut map = IndexMap::new();
        let mut inner = IndexMap::new();
        inner.insert("x".to_string(), Value::Variable(cell.clone()));
        map.insert("a".to_string(), Value::Mapping(inner));
        let mut root = Value::Mapping(map);

        let mut view = NestedView::new(&mut root, 64).unwrap();
        view.store("a.x", Value::Integer(2)).unwrap();
        assert_eq!(cell.get(), Value::Integer(2));
    }

    #[test]
    fn test_nested_view_depth_guard() {
        let mut root = Value::Integer(1);
        for _ in 0..5 {
            let mut map = IndexMap::new();
            map.insert("k".to_string(), root);
            root = Value::Mapping(map);
        }
        let err = NestedView::new(&mut root, 3).err().unwrap();
        assert_eq!(err.kind, ErrorKind::DepthExceeded);
        assert!(NestedView::new(&mut root, 5).is_ok());
    }
}
