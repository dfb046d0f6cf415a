//! The Config container
//!
//! An ordered mapping with attribute-style access, write-time type
//! coercion, shared variable cells and placeholder interpolation.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use log::{debug, warn};

use crate::algebra::{difference_entries, entries_of, intersect_entries, merge_entries};
use crate::annotation::{AnnotationLookup, Coerce, NoAnnotations, StandardCoercer};
use crate::error::{Error, Result};
use crate::eval::{ArithmeticEvaluator, Evaluate};
use crate::interpolation::{InterpolateOptions, Interpolator, Outcome, DEFAULT_MAX_DEPTH};
use crate::mapping::MappingAccess;
use crate::value::Value;

/// Names that always refer to the container itself, never to an entry
const RESERVED_NAMES: &[&str] = &[
    "keys",
    "values",
    "items",
    "getattr",
    "setattr",
    "delattr",
    "hasattr",
    "repr",
    "extra_repr",
];

/// Whether `name` is reserved for the container's own behaviour
///
/// Dunder names (`__name__`) and the operation names in
/// [`RESERVED_NAMES`] are reserved.
pub fn is_reserved(name: &str) -> bool {
    (name.len() > 4 && name.starts_with("__") && name.ends_with("__"))
        || RESERVED_NAMES.contains(&name)
}

/// Options for a [`Config`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOptions {
    /// Key text that marks an absent value and is never accepted as a key
    pub null_key: String,
    /// Recursion guard for merging and nested interpolation
    pub max_depth: usize,
    /// Options used by [`Config::interpolate`]
    pub interpolate: InterpolateOptions,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            null_key: "Null".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            interpolate: InterpolateOptions::default(),
        }
    }
}

/// Ordered configuration mapping
///
/// ```
/// use attrconf_core::{Config, Value};
///
/// let mut config = Config::from_yaml("dim: 64\nhidden: ${dim}\nname: net-${dim}").unwrap();
/// config.interpolate().unwrap();
///
/// assert_eq!(config.get("hidden").unwrap(), &Value::Integer(64));
/// assert_eq!(config.get("name").unwrap(), &Value::from("net-64"));
///
/// // `hidden` shares a cell with `dim`
/// config.set("dim", 128).unwrap();
/// assert_eq!(config.get("hidden").unwrap(), &Value::Integer(128));
/// ```
#[derive(Clone)]
pub struct Config {
    entries: IndexMap<String, Value>,
    attrs: IndexMap<String, Value>,
    annotations: Rc<dyn AnnotationLookup>,
    coercer: Rc<dyn Coerce>,
    evaluator: Rc<dyn Evaluate>,
    options: ConfigOptions,
}

impl Config {
    /// Create an empty Config
    pub fn new() -> Self {
        Self::with_options(ConfigOptions::default())
    }

    /// Create an empty Config with custom options
    pub fn with_options(options: ConfigOptions) -> Self {
        Self {
            entries: IndexMap::new(),
            attrs: IndexMap::new(),
            annotations: Rc::new(NoAnnotations),
            coercer: Rc::new(StandardCoercer),
            evaluator: Rc::new(ArithmeticEvaluator),
            options,
        }
    }

    /// Use `annotations` to find the declared type of each key
    pub fn with_annotations(mut self, annotations: impl AnnotationLookup + 'static) -> Self {
        self.annotations = Rc::new(annotations);
        self
    }

    /// Use `coercer` to convert values to their declared type
    pub fn with_coercer(mut self, coercer: impl Coerce + 'static) -> Self {
        self.coercer = Rc::new(coercer);
        self
    }

    /// Use `evaluator` for `unsafe_eval` interpolation
    pub fn with_evaluator(mut self, evaluator: impl Evaluate + 'static) -> Self {
        self.evaluator = Rc::new(evaluator);
        self
    }

    /// Create a Config holding the entries of a mapping value
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut config = Self::new();
        config.update(value)?;
        Ok(config)
    }

    /// Load a Config from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml).map_err(|e| Error::parse(e.to_string()))?;
        if value.is_null() {
            return Ok(Self::new());
        }
        Self::from_value(&value)
    }

    /// Load a Config from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| Error::parse(e.to_string()))?;
        Self::from_value(&value)
    }

    /// The options this Config was created with
    pub fn options(&self) -> &ConfigOptions {
        &self.options
    }

    /// Get the value stored under `key`
    pub fn get(&self, key: &str) -> Result<&Value> {
        self.entries
            .get(key)
            .ok_or_else(|| Error::key_not_found(key))
    }

    /// Get the value under `key`, or `default` when it is absent
    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.into())
    }

    /// Get the current value under `key`, looking through a variable cell
    pub fn get_value(&self, key: &str) -> Result<Value> {
        self.get(key).map(Value::unwrapped)
    }

    /// Store `value` under `key`
    ///
    /// The null key is rejected. An existing variable cell is updated in
    /// place (and may reject the value). Otherwise the value is coerced to
    /// the key's declared type, if it has one, and stored.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();

        if key == self.options.null_key {
            return Err(Error::invalid_key(key));
        }
        if let Some(Value::Variable(cell)) = self.entries.get(&key) {
            return cell.set(value).map_err(|e| e.with_path(key));
        }
        let value = match self.annotations.annotation(&key) {
            Some(annotation) => self
                .coercer
                .coerce(value, &annotation)
                .map_err(|e| e.with_path(key.as_str()))?,
            None => value,
        };
        self.entries.insert(key, value);
        Ok(())
    }

    /// Remove and return the value under `key`
    pub fn delete(&mut self, key: &str) -> Result<Value> {
        self.entries
            .shift_remove(key)
            .ok_or_else(|| Error::key_not_found(key))
    }

    /// Store every entry of a mapping (or sequence of pairs) with [`set`](Self::set)
    pub fn update(&mut self, other: &Value) -> Result<()> {
        for (key, value) in entries_of(other)? {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Whether `key` has an entry
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Entry keys, in order
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Entry values, in order
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }

    /// Entries, in order
    pub fn items(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attribute-style read
    ///
    /// Reserved names only see the container's own attributes; other names
    /// see the entry first.
    pub fn attr(&self, name: &str) -> Result<&Value> {
        let found = if is_reserved(name) {
            self.attrs.get(name)
        } else {
            self.entries.get(name).or_else(|| self.attrs.get(name))
        };
        found.ok_or_else(|| Error::key_not_found(name))
    }

    /// Attribute-style write; the same as [`set`](Self::set) for
    /// non-reserved names
    pub fn set_attr(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if is_reserved(name) {
            self.attrs.insert(name.to_string(), value.into());
            return Ok(());
        }
        self.set(name, value)
    }

    /// Attribute-style delete; the same as [`delete`](Self::delete) for
    /// non-reserved names
    pub fn del_attr(&mut self, name: &str) -> Result<Value> {
        if is_reserved(name) {
            return self
                .attrs
                .shift_remove(name)
                .ok_or_else(|| Error::key_not_found(name));
        }
        self.delete(name)
    }

    /// Read a container attribute, bypassing entries
    pub fn getattr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    /// Write a container attribute, bypassing entries
    pub fn setattr(&mut self, name: &str, value: impl Into<Value>) {
        if self.entries.contains_key(name) {
            warn!(
                "Attribute '{}' shadows an entry of the same name; the entry stays reachable by key",
                name
            );
        }
        self.attrs.insert(name.to_string(), value.into());
    }

    /// Remove a container attribute
    pub fn delattr(&mut self, name: &str) -> Option<Value> {
        self.attrs.shift_remove(name)
    }

    /// Whether a container attribute exists
    pub fn hasattr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Check every entry against its declared type and every cell against
    /// its constraints
    pub fn validate(&self) -> Result<()> {
        for (key, value) in &self.entries {
            if let Some(annotation) = self.annotations.annotation(key) {
                if *value != Value::Null && !annotation.conforms(value) {
                    return Err(Error::type_mismatch(
                        annotation.to_string(),
                        format!("{} ({})", value.type_name(), value),
                    )
                    .with_path(key.as_str()));
                }
            }
            if let Value::Variable(cell) = value {
                cell.validate().map_err(|e| e.with_path(key.as_str()))?;
            }
        }
        Ok(())
    }

    /// Interpolate placeholders with this Config's options
    pub fn interpolate(&mut self) -> Result<()> {
        let options = self.options.interpolate;
        self.interpolate_with(options)
    }

    /// Interpolate placeholders
    ///
    /// Flat Configs are handled directly. When an entry holds a mapping or
    /// sequence, every nested leaf is interpolated under its dotted path.
    pub fn interpolate_with(&mut self, options: InterpolateOptions) -> Result<()> {
        let evaluator = Rc::clone(&self.evaluator);
        let interpolator = Interpolator::new(options).with_evaluator(evaluator.as_ref());

        if interpolator.run(self)? == Outcome::Applied {
            return Ok(());
        }

        debug!("Falling back to nested interpolation");
        let max_depth = self.options.max_depth;
        let mut root = Value::Mapping(std::mem::take(&mut self.entries));
        let outcome = interpolator.run_nested(&mut root, max_depth);
        if let Value::Mapping(entries) = root {
            self.entries = entries;
        }
        match outcome? {
            Outcome::Applied => self.coerce_entries(),
            Outcome::NotApplicable => Err(Error::internal(
                "Nested interpolation rejected a mapping root",
            )),
        }
    }

    /// Deep-merge `other` (a mapping or a sequence of pairs) into this Config
    pub fn merge(&mut self, other: &Value, overwrite: bool) -> Result<()> {
        let max_depth = self.options.max_depth;
        match other {
            Value::Mapping(src) => merge_entries(self, src, overwrite, max_depth),
            _ => {
                debug!("Merging non-mapping {} as key/value pairs", other.type_name());
                let src = entries_of(other)?;
                merge_entries(self, &src, overwrite, max_depth)
            }
        }
    }

    /// Deep-merge `other`, overwriting existing values
    pub fn union(&mut self, other: &Value) -> Result<()> {
        self.merge(other, true)
    }

    /// Deep-merge another Config into this one
    pub fn merge_config(&mut self, other: &Config, overwrite: bool) -> Result<()> {
        let max_depth = self.options.max_depth;
        merge_entries(self, &other.entries, overwrite, max_depth)
    }

    /// Entries of `other` this Config holds with an equal value
    pub fn intersect(&self, other: &Value) -> Result<Config> {
        let entries = match other {
            Value::Mapping(other) => intersect_entries(self, other),
            _ => {
                debug!("Intersecting non-mapping {} as key/value pairs", other.type_name());
                intersect_entries(self, &entries_of(other)?)
            }
        };
        self.collect(entries)
    }

    /// Alias for [`intersect`](Self::intersect)
    pub fn inter(&self, other: &Value) -> Result<Config> {
        self.intersect(other)
    }

    /// Entries of `other` this Config lacks or holds with a different value
    pub fn difference(&self, other: &Value) -> Result<Config> {
        let entries = match other {
            Value::Mapping(other) => difference_entries(self, other),
            _ => {
                debug!("Diffing non-mapping {} as key/value pairs", other.type_name());
                difference_entries(self, &entries_of(other)?)
            }
        };
        self.collect(entries)
    }

    /// Alias for [`difference`](Self::difference)
    pub fn diff(&self, other: &Value) -> Result<Config> {
        self.difference(other)
    }

    /// A copy without null entries
    pub fn dropnull(&self) -> Config {
        let mut out = self.empty_like();
        out.entries = self
            .entries
            .iter()
            .filter(|(_, v)| **v != Value::Null)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        out
    }

    /// Entries as a mapping value (cells are kept)
    pub fn to_value(&self) -> Value {
        Value::Mapping(self.entries.clone())
    }

    /// Serialize entries to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.entries).map_err(|e| Error::parse(e.to_string()))
    }

    /// Serialize entries to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.entries).map_err(|e| Error::parse(e.to_string()))
    }

    /// Indented, one entry per line rendering
    pub fn repr(&self) -> String {
        if self.entries.is_empty() {
            return "Config()".to_string();
        }
        let mut out = String::from("Config(\n");
        repr_entries(&self.entries, 1, &mut out);
        out.push(')');
        out
    }

    /// Re-apply declared types to top-level entries written around `set`
    fn coerce_entries(&mut self) -> Result<()> {
        for (key, value) in self.entries.iter_mut() {
            if let Some(annotation) = self.annotations.annotation(key) {
                *value = self
                    .coercer
                    .coerce(value.clone(), &annotation)
                    .map_err(|e| e.with_path(key.as_str()))?;
            }
        }
        Ok(())
    }

    fn empty_like(&self) -> Config {
        Config {
            entries: IndexMap::new(),
            attrs: IndexMap::new(),
            annotations: Rc::clone(&self.annotations),
            coercer: Rc::clone(&self.coercer),
            evaluator: Rc::clone(&self.evaluator),
            options: self.options.clone(),
        }
    }

    fn collect(&self, entries: IndexMap<String, Value>) -> Result<Config> {
        let mut out = self.empty_like();
        for (key, value) in entries {
            out.set(key, value)?;
        }
        Ok(out)
    }
}

fn repr_entries(entries: &IndexMap<String, Value>, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    for (key, value) in entries {
        out.push_str(&format!("{}('{}'): ", pad, key));
        repr_value(&value.unwrapped(), indent, out);
        out.push('\n');
    }
}

fn repr_value(value: &Value, indent: usize, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(&format!("'{}'", s)),
        Value::Mapping(map) if !map.is_empty() => {
            out.push_str("{\n");
            repr_entries(map, indent + 1, out);
            out.push_str(&"  ".repeat(indent));
            out.push('}');
        }
        Value::Sequence(seq) => {
            out.push('[');
            for (i, item) in seq.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                repr_value(&item.unwrapped(), indent, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Config {
    fn eq(&self, other: &Config) -> bool {
        self.entries == other.entries
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("entries", &self.entries)
            .field("attrs", &self.attrs)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl MappingAccess for Config {
    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    fn lookup_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    fn store(&mut self, key: &str, value: Value) -> Result<()> {
        self.set(key, value)
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    fn describe(&self) -> String {
        self.repr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Annotation;
    use crate::error::ErrorKind;
    use crate::eval::EvalError;
    use crate::variable::Variable;
    use pretty_assertions::assert_eq;

    fn annotated() -> Config {
        let mut annotations = IndexMap::new();
        annotations.insert("epochs".to_string(), Annotation::Integer);
        annotations.insert("lr".to_string(), Annotation::Float);
        annotations.insert("name".to_string(), Annotation::String);
        Config::new().with_annotations(annotations)
    }

    #[test]
    fn test_load_yaml() {
        let config = Config::from_yaml("a: 1\nb: text\nc: [1, 2]").unwrap();
        assert_eq!(config.len(), 3);
        assert_eq!(config.get("a").unwrap(), &Value::Integer(1));
        assert_eq!(config.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_load_empty_yaml() {
        assert!(Config::from_yaml("").unwrap().is_empty());
    }

    #[test]
    fn test_load_invalid_input() {
        assert_eq!(Config::from_yaml("a: [1").unwrap_err().kind, ErrorKind::Parse);
        assert_eq!(Config::from_json("[1, 2]").unwrap_err().kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_get_missing_key() {
        let config = Config::new();
        let err = config.get("missing").unwrap_err();
        assert_eq!(err.kind, ErrorKind::KeyNotFound);
        assert_eq!(config.get_or("missing", 3), Value::Integer(3));
    }

    #[test]
    fn test_null_key_rejected() {
        let mut config = Config::new();
        let err = config.set("Null", 1).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidKey);
        assert!(config.is_empty());
    }

    #[test]
    fn test_custom_null_key() {
        let mut config = Config::with_options(ConfigOptions {
            null_key: "~".into(),
            ..ConfigOptions::default()
        });
        config.set("Null", 1).unwrap();
        assert_eq!(config.set("~", 1).unwrap_err().kind, ErrorKind::InvalidKey);
    }

    #[test]
    fn test_set_coerces_to_annotation() {
        let mut config = annotated();
        config.set("epochs", "10").unwrap();
        config.set("lr", 1).unwrap();
        config.set("name", 42).unwrap();
        config.set("other", "10").unwrap();

        assert_eq!(config.get("epochs").unwrap(), &Value::Integer(10));
        assert!(config.get("lr").unwrap().is_float());
        assert_eq!(config.get("name").unwrap(), &Value::from("42"));
        assert_eq!(config.get("other").unwrap(), &Value::from("10"));
    }

    #[test]
    fn test_set_coercion_failure() {
        let mut config = annotated();
        let err = config.set("epochs", "ten").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
        assert_eq!(err.path.as_deref(), Some("epochs"));
        assert!(!config.contains_key("epochs"));
    }

    #[test]
    fn test_set_updates_existing_cell() {
        let mut config = Config::new();
        let cell = Variable::new(1).with_choices([1, 2]);
        config.set("a", cell.clone()).unwrap();
        config.set("b", cell.clone()).unwrap();

        config.set("a", 2).unwrap();
        assert_eq!(config.get("b").unwrap(), &Value::Integer(2));
        assert!(config.get("a").unwrap().is_variable());

        let err = config.set("b", 3).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(cell.get(), Value::Integer(2));
    }

    #[test]
    fn test_delete() {
        let mut config = Config::from_yaml("a: 1\nb: 2").unwrap();
        assert_eq!(config.delete("a").unwrap(), Value::Integer(1));
        assert_eq!(config.delete("a").unwrap_err().kind, ErrorKind::KeyNotFound);
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn test_dual_access_sees_same_entry() {
        let mut config = Config::new();
        config.set_attr("lr", 0.1).unwrap();
        assert_eq!(config.get("lr").unwrap(), &Value::Float(0.1));

        config.set("lr", 0.2).unwrap();
        assert_eq!(config.attr("lr").unwrap(), &Value::Float(0.2));

        config.del_attr("lr").unwrap();
        assert!(!config.contains_key("lr"));
    }

    #[test]
    fn test_reserved_names_bypass_entries() {
        let mut config = Config::new();
        config.set("keys", 1).unwrap();
        assert_eq!(config.attr("keys").unwrap_err().kind, ErrorKind::KeyNotFound);

        config.set_attr("keys", "attr").unwrap();
        assert_eq!(config.attr("keys").unwrap(), &Value::from("attr"));
        assert_eq!(config.get("keys").unwrap(), &Value::Integer(1));

        config.set_attr("__doc__", "docs").unwrap();
        assert!(!config.contains_key("__doc__"));
        assert!(config.hasattr("__doc__"));
    }

    #[test]
    fn test_is_reserved() {
        assert!(is_reserved("__class__"));
        assert!(is_reserved("extra_repr"));
        assert!(!is_reserved("__"));
        assert!(!is_reserved("model"));
    }

    #[test]
    fn test_container_attributes() {
        let mut config = Config::from_yaml("name: entry").unwrap();
        config.setattr("name", "attribute");
        assert_eq!(config.getattr("name"), Some(&Value::from("attribute")));
        assert_eq!(config.get("name").unwrap(), &Value::from("entry"));
        assert_eq!(config.attr("name").unwrap(), &Value::from("entry"));
        assert_eq!(config.delattr("name"), Some(Value::from("attribute")));
        assert!(!config.hasattr("name"));
    }

    #[test]
    fn test_validate() {
        let mut config = annotated();
        config.set("epochs", 3).unwrap();
        config.set("lr", Value::Null).unwrap();
        config.validate().unwrap();

        config.entries.insert("epochs".into(), Value::from("three"));
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
        assert_eq!(err.path.as_deref(), Some("epochs"));
    }

    #[test]
    fn test_validate_required_cell() {
        let mut config = Config::new();
        config.set("data", Variable::new(Value::Null).required(true)).unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.path.as_deref(), Some("data"));
    }

    #[test]
    fn test_interpolate_flat() {
        let mut config = Config::from_yaml("a: 1\nb: ${a}\nc: ${a}.${b}").unwrap();
        config.interpolate().unwrap();
        assert_eq!(config.get("b").unwrap(), &Value::Integer(1));
        assert_eq!(config.get("c").unwrap(), &Value::from("1.1"));
        assert!(config.get("b").unwrap().is_variable());
    }

    #[test]
    fn test_interpolate_coerces_through_annotations() {
        let mut annotations = IndexMap::new();
        annotations.insert("port".to_string(), Annotation::Integer);
        let mut config = Config::new().with_annotations(annotations);
        config.set("base", 8000).unwrap();
        config.entries.insert("port".into(), Value::from("${base}1"));

        config.interpolate().unwrap();
        assert_eq!(config.get("port").unwrap(), &Value::Integer(80001));
    }

    #[test]
    fn test_nested_interpolation_coerces_through_annotations() {
        let mut annotations = IndexMap::new();
        annotations.insert("port".to_string(), Annotation::Integer);
        let mut config = Config::new().with_annotations(annotations);
        config.set("base", 8000).unwrap();
        config.set("nested", Config::from_yaml("x: 1").unwrap().to_value()).unwrap();
        config.entries.insert("port".into(), Value::from("${base}1"));

        config.interpolate().unwrap();
        assert_eq!(config.get("port").unwrap(), &Value::Integer(80001));
        assert!(config.get("port").unwrap().is_integer());
    }

    #[test]
    fn test_interpolate_with_empty_containers() {
        let mut config = Config::from_yaml("a: 1\nb: ${a}\ntags: []\nextra: {}").unwrap();
        config.interpolate().unwrap();
        assert_eq!(config.get("b").unwrap(), &Value::Integer(1));
        assert_eq!(config.get("tags").unwrap(), &Value::Sequence(vec![]));
    }

    #[test]
    fn test_interpolate_falls_back_to_nested() {
        let mut config =
            Config::from_yaml("model:\n  dim: 32\n  hidden: ${.dim}\nname: net-${model.dim}")
                .unwrap();
        config.interpolate().unwrap();
        assert_eq!(
            config.get("model").unwrap().get_path("hidden").unwrap(),
            &Value::Integer(32)
        );
        assert_eq!(config.get("name").unwrap(), &Value::from("net-32"));
    }

    #[test]
    fn test_interpolate_errors() {
        let mut config = Config::from_yaml("self: ${self}").unwrap();
        assert_eq!(config.interpolate().unwrap_err().kind, ErrorKind::SelfReference);

        let mut config = Config::from_yaml("a: ${b}\nb: ${a}").unwrap();
        let err = config.interpolate().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::CircularReference { .. }));

        let mut config = Config::from_yaml("c: ${d}").unwrap();
        let err = config.interpolate().unwrap_err();
        assert!(err.to_string().contains("d is not found in Config("));
    }

    #[test]
    fn test_interpolate_with_custom_evaluator() {
        struct Reject;
        impl Evaluate for Reject {
            fn evaluate(
                &self,
                _expression: &str,
                _names: &dyn Fn(&str) -> Option<Value>,
            ) -> std::result::Result<Value, EvalError> {
                Err(EvalError::Syntax("never".into()))
            }
        }

        let mut config = Config::from_yaml("a: 2\nb: ${a} * 2").unwrap().with_evaluator(Reject);
        config
            .interpolate_with(InterpolateOptions {
                use_variable: false,
                unsafe_eval: true,
            })
            .unwrap();
        assert_eq!(config.get("b").unwrap(), &Value::from("2 * 2"));
    }

    #[test]
    fn test_merge_and_union() {
        let mut config = Config::from_yaml("a: 1\nn: {x: 1}").unwrap();
        let other: Value = serde_yaml::from_str("a: 2\nn: {y: 2}\nb: 3").unwrap();

        config.merge(&other, false).unwrap();
        assert_eq!(config.get("a").unwrap(), &Value::Integer(1));
        assert_eq!(config.get("b").unwrap(), &Value::Integer(3));

        config.union(&other).unwrap();
        assert_eq!(config.get("a").unwrap(), &Value::Integer(2));
        assert_eq!(
            config.get("n").unwrap(),
            &serde_yaml::from_str::<Value>("{x: 1, y: 2}").unwrap()
        );
    }

    #[test]
    fn test_merge_pairs_and_config() {
        let mut config = Config::new();
        config
            .merge(&Value::from(vec![Value::from(vec![Value::from("k"), Value::Integer(1)])]), true)
            .unwrap();
        assert_eq!(config.get("k").unwrap(), &Value::Integer(1));

        let other = Config::from_yaml("k: 2\nj: 3").unwrap();
        config.merge_config(&other, false).unwrap();
        assert_eq!(config.get("k").unwrap(), &Value::Integer(1));
        assert_eq!(config.get("j").unwrap(), &Value::Integer(3));

        assert_eq!(
            config.merge(&Value::Integer(1), true).unwrap_err().kind,
            ErrorKind::TypeMismatch
        );
    }

    #[test]
    fn test_merge_applies_annotations() {
        let mut config = annotated();
        config.merge(&serde_yaml::from_str("epochs: '5'").unwrap(), true).unwrap();
        assert_eq!(config.get("epochs").unwrap(), &Value::Integer(5));
    }

    #[test]
    fn test_intersect_and_difference() {
        let config = Config::from_yaml("a: 1\nb: 2\nc: 3").unwrap();
        let other: Value = serde_yaml::from_str("c: 3\nd: 4\nb: 5").unwrap();

        let both = config.intersect(&other).unwrap();
        assert_eq!(both, Config::from_yaml("c: 3").unwrap());
        assert_eq!(config.inter(&other).unwrap(), both);

        let diff = config.difference(&other).unwrap();
        assert_eq!(diff, Config::from_yaml("d: 4\nb: 5").unwrap());
        assert_eq!(config.diff(&other).unwrap(), diff);
    }

    #[test]
    fn test_intersect_pairs() {
        let config = Config::from_yaml("a: 1\nb: 2\nc: 3").unwrap();
        let pairs = Value::from(vec![
            Value::from(vec![Value::from("c"), Value::Integer(3)]),
            Value::from(vec![Value::from("d"), Value::Integer(4)]),
        ]);
        assert_eq!(config.intersect(&pairs).unwrap(), Config::from_yaml("c: 3").unwrap());
        assert_eq!(config.difference(&pairs).unwrap(), Config::from_yaml("d: 4").unwrap());
    }

    #[test]
    fn test_dropnull() {
        let mut config = Config::from_yaml("a: 1\nb: null").unwrap();
        config.set("c", Variable::new(Value::Null)).unwrap();
        let dropped = config.dropnull();
        assert_eq!(dropped.keys().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(config.len(), 3);
    }

    #[test]
    fn test_serialize() {
        let mut config = Config::from_yaml("a: 1\nb: ${a}").unwrap();
        config.interpolate().unwrap();
        assert_eq!(config.to_yaml().unwrap(), "a: 1\nb: 1\n");
        assert_eq!(config.to_json().unwrap(), "{\n  \"a\": 1,\n  \"b\": 1\n}");
    }

    #[test]
    fn test_repr() {
        let config = Config::from_yaml("a: 1\nb: text\nn:\n  x: [1, 'y']").unwrap();
        assert_eq!(
            config.repr(),
            "Config(\n  ('a'): 1\n  ('b'): 'text'\n  ('n'): {\n    ('x'): [1, 'y']\n  }\n)"
        );
        assert_eq!(Config::new().to_string(), "Config()");
    }
}
