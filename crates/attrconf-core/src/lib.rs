//! attrconf-core: Hierarchical configuration mappings with interpolation
//!
//! This crate provides an ordered configuration mapping with attribute-style
//! access, typed coercion on write, shared variable cells, `${name}`
//! placeholder interpolation and deep merge / intersection / difference.
//!
//! # Example
//!
//! ```rust
//! use attrconf_core::{Config, Value};
//!
//! let yaml = r#"
//! dim: 256
//! hidden: ${dim}
//! name: transformer-${dim}
//! "#;
//!
//! let mut config = Config::from_yaml(yaml).unwrap();
//! config.interpolate().unwrap();
//! assert_eq!(config.get("hidden").unwrap(), &Value::Integer(256));
//! assert_eq!(config.get("name").unwrap().as_str(), Some("transformer-256"));
//! ```

pub mod algebra;
pub mod annotation;
pub mod error;
pub mod eval;
pub mod graph;
pub mod interpolation;
pub mod mapping;
pub mod placeholder;
pub mod value;
pub mod variable;

mod config;

pub use algebra::{difference, intersect, merge};
pub use annotation::{Annotation, AnnotationLookup, Coerce, NoAnnotations, StandardCoercer};
pub use config::{is_reserved, Config, ConfigOptions};
pub use error::{Error, ErrorKind, Result};
pub use eval::{ArithmeticEvaluator, EvalError, Evaluate};
pub use graph::{build_graph, find_cycle, PlaceholderGraph};
pub use interpolation::{
    interpolate, interpolate_nested, interpolate_value, InterpolateOptions, Interpolator, Outcome,
};
pub use mapping::{MappingAccess, NestedView};
pub use placeholder::find_placeholders;
pub use value::Value;
pub use variable::Variable;
