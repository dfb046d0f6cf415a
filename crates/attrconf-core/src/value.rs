//! Configuration value types
//!
//! Values are scalars (string, int, float, bool, null), sequences,
//! mappings, or shared [`Variable`] cells.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::variable::Variable;

/// A configuration value
///
/// Text values may contain `${name}` placeholders until the mapping is
/// interpolated.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Null value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value (may contain placeholders like ${model.dim})
    String(String),
    /// Sequence of values
    Sequence(Vec<Value>),
    /// Mapping of string keys to values
    Mapping(IndexMap<String, Value>),
    /// Shared mutable cell; serializes as the value it holds
    #[serde(skip_deserializing)]
    Variable(Variable),
}

impl Value {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is a boolean
    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    /// Check if this value is an integer
    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_))
    }

    /// Check if this value is a float
    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    /// Check if this value is a string
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Check if this value is a sequence
    pub fn is_sequence(&self) -> bool {
        matches!(self, Value::Sequence(_))
    }

    /// Check if this value is a mapping
    pub fn is_mapping(&self) -> bool {
        matches!(self, Value::Mapping(_))
    }

    /// Check if this value is a variable cell
    pub fn is_variable(&self) -> bool {
        matches!(self, Value::Variable(_))
    }

    /// Sequences and mappings; these are never interpolation targets
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Sequence(_) | Value::Mapping(_))
    }

    /// Get as boolean if this is a Bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an Integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float or Integer
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as str if this is a String
    ///
    /// Cells are not looked through; use [`Value::unwrapped`] first.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as slice if this is a Sequence
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Get as mapping if this is a Mapping
    pub fn as_mapping(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Get the cell if this is a Variable
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Value::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// The value with a top-level cell replaced by its current contents
    pub fn unwrapped(&self) -> Value {
        match self {
            Value::Variable(cell) => cell.get(),
            other => other.clone(),
        }
    }

    /// A copy with every cell, at any depth, replaced by its contents
    pub fn unwrap_variables(&self) -> Value {
        match self {
            Value::Variable(cell) => cell.get().unwrap_variables(),
            Value::Sequence(seq) => {
                Value::Sequence(seq.iter().map(Value::unwrap_variables).collect())
            }
            Value::Mapping(map) => Value::Mapping(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.unwrap_variables()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Text held directly or inside a cell
    pub fn text(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Variable(cell) => cell.with_value(|v| v.as_str().map(str::to_string)),
            _ => None,
        }
    }

    /// Get a value by path (e.g., "model.encoder" or "layers[0].dim")
    ///
    /// Paths do not descend into variable cells.
    pub fn get_path(&self, path: &str) -> Result<&Value> {
        if path.is_empty() {
            return Ok(self);
        }

        let segments = parse_path(path)?;
        let mut current = self;

        for segment in &segments {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Mapping(map)) => map
                    .get(key.as_str())
                    .ok_or_else(|| Error::key_not_found(path))?,
                (PathSegment::Index(idx), Value::Sequence(seq)) => {
                    seq.get(*idx).ok_or_else(|| Error::key_not_found(path))?
                }
                _ => return Err(Error::key_not_found(path)),
            };
        }

        Ok(current)
    }

    /// Get a mutable value by path
    pub fn get_path_mut(&mut self, path: &str) -> Result<&mut Value> {
        if path.is_empty() {
            return Ok(self);
        }

        let segments = parse_path(path)?;
        let mut current = self;

        for segment in segments {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Mapping(map)) => map
                    .get_mut(&key)
                    .ok_or_else(|| Error::key_not_found(path))?,
                (PathSegment::Index(idx), Value::Sequence(seq)) => seq
                    .get_mut(idx)
                    .ok_or_else(|| Error::key_not_found(path))?,
                _ => return Err(Error::key_not_found(path)),
            };
        }

        Ok(current)
    }

    /// Set a value at a path, creating intermediate mappings as needed
    ///
    /// Sequence indices must already exist.
    pub fn set_path(&mut self, path: &str, value: Value) -> Result<()> {
        let segments = parse_path(path)?;
        let Some((last, parents)) = segments.split_last() else {
            *self = value;
            return Ok(());
        };

        let mut current = self;
        for (i, segment) in parents.iter().enumerate() {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Mapping(map)) => {
                    let next_is_index = matches!(
                        segments.get(i + 1),
                        Some(PathSegment::Index(_))
                    );
                    map.entry(key.clone()).or_insert_with(|| {
                        if next_is_index {
                            Value::Sequence(vec![])
                        } else {
                            Value::Mapping(IndexMap::new())
                        }
                    })
                }
                (PathSegment::Index(idx), Value::Sequence(seq)) => seq
                    .get_mut(*idx)
                    .ok_or_else(|| Error::key_not_found(path))?,
                _ => return Err(Error::key_not_found(path)),
            };
        }

        match (last, current) {
            (PathSegment::Key(key), Value::Mapping(map)) => {
                map.insert(key.clone(), value);
                Ok(())
            }
            (PathSegment::Index(idx), Value::Sequence(seq)) if *idx < seq.len() => {
                seq[*idx] = value;
                Ok(())
            }
            _ => Err(Error::key_not_found(path)),
        }
    }

    /// Returns the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::Variable(_) => "variable",
        }
    }
}

/// Equality looks through variable cells, and integers compare equal to
/// floats of the same numeric value.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Variable(a), Value::Variable(b)) => a.ptr_eq(b) || a.get() == b.get(),
            (Value::Variable(a), b) => a.with_value(|a| a == b),
            (a, Value::Variable(b)) => b.with_value(|b| a == b),
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Mapping(a), Value::Mapping(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            // Keep a fractional part so 1.0 does not render as an integer
            Value::Float(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 => {
                write!(f, "{:.1}", n)
            }
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Sequence(seq) => {
                write!(f, "[")?;
                for (i, v) in seq.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Variable(cell) => cell.with_value(|v| write!(f, "{}", v)),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Sequence(v.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(m: IndexMap<String, Value>) -> Self {
        Value::Mapping(m)
    }
}

impl From<Variable> for Value {
    fn from(v: Variable) -> Self {
        Value::Variable(v)
    }
}

/// A segment in a path expression
#[derive(Debug, Clone, PartialEq)]
enum PathSegment {
    /// A key in a mapping (e.g., "model" in "model.dim")
    Key(String),
    /// An index in a sequence (e.g., 0 in "layers[0]")
    Index(usize),
}

/// Parse a path string into segments
/// Supports: "key", "key.subkey", "key[0]", "key[0].subkey"
fn parse_path(path: &str) -> Result<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut current_key = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' | '[' if !current_key.is_empty() => {
                segments.push(PathSegment::Key(std::mem::take(&mut current_key)));
                if c == '[' {
                    segments.push(parse_index(&mut chars)?);
                }
            }
            '.' => {}
            '[' => segments.push(parse_index(&mut chars)?),
            ']' => return Err(Error::parse("Unexpected ']' in path")),
            _ => current_key.push(c),
        }
    }

    if !current_key.is_empty() {
        segments.push(PathSegment::Key(current_key));
    }

    Ok(segments)
}

fn parse_index(chars: &mut std::str::Chars<'_>) -> Result<PathSegment> {
    let mut index_str = String::new();
    let mut closed = false;
    for c in chars.by_ref() {
        if c == ']' {
            closed = true;
            break;
        }
        index_str.push(c);
    }
    if !closed {
        return Err(Error::parse(format!("Unclosed '[' in path: [{}", index_str)));
    }
    index_str
        .parse()
        .map(PathSegment::Index)
        .map_err(|_| Error::parse(format!("Invalid sequence index in path: {}", index_str)))
}
