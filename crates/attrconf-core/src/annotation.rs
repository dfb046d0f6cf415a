//! Declared types and write-time coercion
//!
//! An [`Annotation`] declares the expected type of a key. The container looks
//! annotations up through an [`AnnotationLookup`] and converts incoming values
//! with a [`Coerce`] implementation before storing them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::value::Value;

/// A declared type for a configuration key
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// Any value is accepted
    Any,
    /// Only null
    Null,
    /// Boolean
    Bool,
    /// Integer
    Integer,
    /// Floating point
    Float,
    /// String
    String,
    /// Sequence whose items all have the inner type
    Sequence(Box<Annotation>),
    /// Mapping whose values all have the inner type
    Mapping(Box<Annotation>),
    /// Null or the inner type
    Optional(Box<Annotation>),
    /// Any one of the member types
    Union(Vec<Annotation>),
}

impl Annotation {
    /// Check whether `value` already has this type
    ///
    /// Variable cells are checked by the value they currently hold.
    pub fn conforms(&self, value: &Value) -> bool {
        if let Value::Variable(cell) = value {
            return cell.with_value(|inner| self.conforms(inner));
        }
        match self {
            Annotation::Any => true,
            Annotation::Null => value.is_null(),
            Annotation::Bool => value.is_bool(),
            Annotation::Integer => value.is_integer(),
            Annotation::Float => value.is_float(),
            Annotation::String => value.is_string(),
            Annotation::Sequence(item) => match value {
                Value::Sequence(items) => items.iter().all(|v| item.conforms(v)),
                _ => false,
            },
            Annotation::Mapping(item) => match value {
                Value::Mapping(map) => map.values().all(|v| item.conforms(v)),
                _ => false,
            },
            Annotation::Optional(inner) => value.is_null() || inner.conforms(value),
            Annotation::Union(members) => members.iter().any(|m| m.conforms(value)),
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Annotation::Any => write!(f, "Any"),
            Annotation::Null => write!(f, "None"),
            Annotation::Bool => write!(f, "bool"),
            Annotation::Integer => write!(f, "int"),
            Annotation::Float => write!(f, "float"),
            Annotation::String => write!(f, "str"),
            Annotation::Sequence(item) => write!(f, "list[{}]", item),
            Annotation::Mapping(item) => write!(f, "dict[str, {}]", item),
            Annotation::Optional(inner) => write!(f, "Optional[{}]", inner),
            Annotation::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", m)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Annotation {
    type Err = Error;

    /// Parse annotation text such as `int`, `list[int]`, `dict[str, float]`,
    /// `Optional[str]` or `int | str`
    fn from_str(s: &str) -> Result<Self> {
        parse_annotation(s.trim())
    }
}

fn parse_annotation(text: &str) -> Result<Annotation> {
    if text.is_empty() {
        return Err(Error::parse("Empty type annotation"));
    }

    let members = split_top_level(text, '|');
    if members.len() > 1 {
        let members = members
            .into_iter()
            .map(|m| parse_annotation(m.trim()))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Annotation::Union(members));
    }

    if let Some(open) = text.find('[') {
        if !text.ends_with(']') {
            return Err(Error::parse(format!("Unclosed '[' in annotation: {}", text)));
        }
        let head = text[..open].trim();
        let args: Vec<&str> = split_top_level(&text[open + 1..text.len() - 1], ',')
            .into_iter()
            .map(str::trim)
            .collect();

        return match (head, args.as_slice()) {
            ("list" | "List" | "Sequence", [item]) => {
                Ok(Annotation::Sequence(Box::new(parse_annotation(item)?)))
            }
            ("dict" | "Dict" | "Mapping", [key, item]) => {
                if parse_annotation(key)? != Annotation::String {
                    return Err(Error::parse(format!(
                        "Mapping keys must be str, got '{}'",
                        key
                    )));
                }
                Ok(Annotation::Mapping(Box::new(parse_annotation(item)?)))
            }
            ("Optional", [inner]) => Ok(Annotation::Optional(Box::new(parse_annotation(inner)?))),
            ("Union", members) if !members.is_empty() => Ok(Annotation::Union(
                members
                    .iter()
                    .map(|m| parse_annotation(m))
                    .collect::<Result<Vec<_>>>()?,
            )),
            _ => Err(Error::parse(format!("Unsupported annotation: {}", text))),
        };
    }

    match text {
        "Any" | "any" => Ok(Annotation::Any),
        "None" | "NoneType" | "null" => Ok(Annotation::Null),
        "bool" => Ok(Annotation::Bool),
        "int" | "integer" => Ok(Annotation::Integer),
        "float" => Ok(Annotation::Float),
        "str" | "string" => Ok(Annotation::String),
        "list" | "List" => Ok(Annotation::Sequence(Box::new(Annotation::Any))),
        "dict" | "Dict" => Ok(Annotation::Mapping(Box::new(Annotation::Any))),
        _ => Err(Error::parse(format!("Unknown type annotation: {}", text))),
    }
}

/// Split on `sep` outside of square brackets
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Source of per-key annotations, supplied by the surrounding container
pub trait AnnotationLookup {
    /// Declared type for `key`, if any
    fn annotation(&self, key: &str) -> Option<Annotation>;
}

/// Lookup that never has an annotation
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnnotations;

impl AnnotationLookup for NoAnnotations {
    fn annotation(&self, _key: &str) -> Option<Annotation> {
        None
    }
}

impl AnnotationLookup for IndexMap<String, Annotation> {
    fn annotation(&self, key: &str) -> Option<Annotation> {
        self.get(key).cloned()
    }
}

impl AnnotationLookup for HashMap<String, Annotation> {
    fn annotation(&self, key: &str) -> Option<Annotation> {
        self.get(key).cloned()
    }
}

/// Converts a value to match an annotation on write
pub trait Coerce {
    /// Return `value` converted to `annotation`, or a `TypeMismatch` error
    fn coerce(&self, value: Value, annotation: &Annotation) -> Result<Value>;
}

/// Default coercion rules
///
/// - Values that already conform are returned unchanged
/// - Null passes through every annotation
/// - Strings parse to integers, floats and (strictly, "true"/"false") booleans
/// - Integers widen to floats; integral floats narrow to integers
/// - Scalars render to strings
/// - Sequences and mappings are coerced element-wise
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCoercer;

impl Coerce for StandardCoercer {
    fn coerce(&self, value: Value, annotation: &Annotation) -> Result<Value> {
        if annotation.conforms(&value) || value.is_null() {
            return Ok(value);
        }
        if let Value::Variable(cell) = &value {
            return self.coerce(cell.get(), annotation);
        }

        let mismatch = |value: &Value| {
            Error::type_mismatch(
                annotation.to_string(),
                format!("{} ({})", value.type_name(), value),
            )
        };

        match annotation {
            // Conforming values returned above
            Annotation::Any | Annotation::Null => Err(mismatch(&value)),
            Annotation::Bool => match &value {
                Value::String(s) => match s.trim().to_lowercase().as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(mismatch(&value)),
                },
                Value::Integer(0) => Ok(Value::Bool(false)),
                Value::Integer(1) => Ok(Value::Bool(true)),
                _ => Err(mismatch(&value)),
            },
            Annotation::Integer => match &value {
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Integer)
                    .map_err(|_| mismatch(&value)),
                Value::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                    Ok(Value::Integer(*f as i64))
                }
                Value::Bool(b) => Ok(Value::Integer(i64::from(*b))),
                _ => Err(mismatch(&value)),
            },
            Annotation::Float => match &value {
                Value::Integer(i) => Ok(Value::Float(*i as f64)),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| mismatch(&value)),
                _ => Err(mismatch(&value)),
            },
            Annotation::String => match &value {
                Value::Bool(_) | Value::Integer(_) | Value::Float(_) => {
                    Ok(Value::String(value.to_string()))
                }
                _ => Err(mismatch(&value)),
            },
            Annotation::Sequence(item) => match value {
                Value::Sequence(items) => items
                    .into_iter()
                    .map(|v| self.coerce(v, item))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Sequence),
                other => Err(mismatch(&other)),
            },
            Annotation::Mapping(item) => match value {
                Value::Mapping(map) => map
                    .into_iter()
                    .map(|(k, v)| self.coerce(v, item).map(|v| (k, v)))
                    .collect::<Result<IndexMap<_, _>>>()
                    .map(Value::Mapping),
                other => Err(mismatch(&other)),
            },
            Annotation::Optional(inner) => self.coerce(value, inner),
            Annotation::Union(members) => {
                for member in members.iter().filter(|m| **m != Annotation::Null) {
                    if let Ok(coerced) = self.coerce(value.clone(), member) {
                        return Ok(coerced);
                    }
                }
                Err(mismatch(&value))
            }
        }
    }
}
