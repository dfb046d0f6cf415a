//! Placeholder interpolation
//!
//! Rewrites every `${name}` in a mapping's text values with the value of
//! `name`:
//!
//! - `${a}` on its own is replaced by the value of `a` itself, keeping its
//!   type; with `use_variable` the two entries then share one cell
//! - `${a}` inside longer text is replaced by the text form of `a`
//! - `${.b}` refers to `b` next to the owning key (`model.c` → `model.b`)
//! - `${model_${kind}}` resolves `kind` first and then the composed name
//!
//! Cycles, self references and unknown names are errors. Mappings whose
//! entries hold sequences or nested mappings are reported as
//! [`Outcome::NotApplicable`] by [`Interpolator::run`]; use
//! [`Interpolator::run_nested`] for those.

use std::collections::HashSet;

use indexmap::IndexMap;
use log::{debug, trace};

use crate::error::{Error, Result};
use crate::eval::{ArithmeticEvaluator, EvalError, Evaluate};
use crate::graph::{build_graph, find_cycle, PlaceholderGraph};
use crate::mapping::{MappingAccess, NestedView};
use crate::placeholder::{is_dynamic, pure_reference, render, resolve_relative};
use crate::value::Value;
use crate::variable::Variable;

/// Default recursion guard for nested interpolation
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Interpolation switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpolateOptions {
    /// Box referenced values in shared cells so later writes propagate
    pub use_variable: bool,
    /// Evaluate substituted text as an arithmetic expression
    pub unsafe_eval: bool,
}

impl Default for InterpolateOptions {
    fn default() -> Self {
        Self {
            use_variable: true,
            unsafe_eval: false,
        }
    }
}

/// Result of an operation that only handles some input shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operation ran
    Applied,
    /// The input is outside what this operation handles; nothing changed
    NotApplicable,
}

/// Interpolates mappings with a fixed set of options
pub struct Interpolator<'a> {
    options: InterpolateOptions,
    evaluator: &'a dyn Evaluate,
}

impl<'a> Interpolator<'a> {
    /// Create an interpolator using [`ArithmeticEvaluator`] for `unsafe_eval`
    pub fn new(options: InterpolateOptions) -> Self {
        Self {
            options,
            evaluator: &ArithmeticEvaluator,
        }
    }

    /// Use a different expression evaluator
    pub fn with_evaluator(mut self, evaluator: &'a dyn Evaluate) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Interpolate a flat mapping in place
    ///
    /// Returns `NotApplicable`, without touching anything, when an entry
    /// holds a sequence or a mapping. On error the mapping may be partially
    /// interpolated.
    pub fn run<M: MappingAccess + ?Sized>(&self, mapping: &mut M) -> Result<Outcome> {
        let keys = mapping.keys();
        if !mapping.is_flattened() {
            if let Some(key) = keys
                .iter()
                .find(|k| mapping.lookup(k).is_some_and(Value::is_container))
            {
                debug!("Flat interpolation not applicable: '{}' holds a container", key);
                return Ok(Outcome::NotApplicable);
            }
        }

        let graph = build_graph(
            keys.iter()
                .filter_map(|k| mapping.lookup(k).map(|v| (k.as_str(), v))),
        )?;
        if graph.is_empty() {
            return Ok(Outcome::Applied);
        }
        debug!("Interpolating {} entries with placeholders", graph.len());

        if let Some(chain) = find_cycle(&graph) {
            return Err(Error::circular_reference(chain));
        }

        // Leaf references: names that are not themselves graph entries
        let mut leaves: IndexMap<&str, &str> = IndexMap::new();
        for (owner, names) in &graph {
            for name in names {
                if !graph.contains_key(name) && !is_dynamic(name) {
                    leaves.entry(name.as_str()).or_insert(owner.as_str());
                }
            }
        }
        for (name, owner) in leaves {
            let value = match mapping.lookup(name) {
                Some(value) => value,
                None => {
                    return Err(Error::missing_reference(
                        name,
                        Some(owner.to_string()),
                        mapping.describe(),
                    ))
                }
            };
            if self.options.use_variable && !value.is_variable() && !value.is_container() {
                trace!("Boxing '{}' in a shared cell", name);
                let cell = Variable::new(value.clone());
                mapping.store(name, Value::Variable(cell))?;
            }
        }

        let mut progress = Progress::default();
        for key in graph.keys() {
            self.resolve_entry(mapping, &graph, key, &mut progress)?;
        }

        debug!("Interpolation applied");
        Ok(Outcome::Applied)
    }

    /// Interpolate a nested mapping in place
    ///
    /// Every leaf is addressed by its dotted path, so `${model.dim}` and
    /// `${.dim}` work across levels. A non-mapping root is `NotApplicable`.
    pub fn run_nested(&self, root: &mut Value, max_depth: usize) -> Result<Outcome> {
        if !root.is_mapping() {
            return Ok(Outcome::NotApplicable);
        }
        let mut view = NestedView::new(root, max_depth)?;
        self.run(&mut view)
    }

    /// Substitute `key` after every graph entry it refers to
    ///
    /// Dynamic names are rendered once their static parts are final, and the
    /// entry they name is substituted first.
    fn resolve_entry<M: MappingAccess + ?Sized>(
        &self,
        mapping: &mut M,
        graph: &PlaceholderGraph,
        key: &str,
        progress: &mut Progress,
    ) -> Result<()> {
        if progress.done.contains(key) {
            return Ok(());
        }
        if let Some(start) = progress.active.iter().position(|k| k == key) {
            let mut chain = progress.active[start..].to_vec();
            chain.push(key.to_string());
            return Err(Error::circular_reference(chain));
        }
        let Some(names) = graph.get(key) else {
            return Ok(());
        };

        progress.active.push(key.to_string());
        let (fixed, dynamic): (Vec<&String>, Vec<&String>) =
            names.iter().partition(|name| !is_dynamic(name));
        for name in fixed {
            self.resolve_entry(mapping, graph, name, progress)?;
        }
        for name in dynamic {
            let target = render(name, |raw| fetch(&*mapping, key, raw).map(Value::to_string))?;
            self.resolve_entry(mapping, graph, &target, progress)?;
        }
        progress.active.pop();

        if let Some(text) = mapping.lookup(key).and_then(Value::text) {
            let substituted = self.substitute(&*mapping, key, &text)?;
            trace!("Substituted '{}': {:?} -> {}", key, text, substituted);
            mapping.store(key, substituted)?;
        }
        progress.done.insert(key.to_string());
        Ok(())
    }

    fn substitute<M: MappingAccess + ?Sized>(
        &self,
        mapping: &M,
        key: &str,
        text: &str,
    ) -> Result<Value> {
        if let Some(name) = pure_reference(text) {
            return fetch(mapping, key, name).cloned();
        }

        let rendered = render(text, |raw| fetch(mapping, key, raw).map(Value::to_string))?;

        if self.options.unsafe_eval {
            let names = |name: &str| mapping.lookup(name).map(Value::unwrapped);
            match self.evaluator.evaluate(&rendered, &names) {
                Ok(value) => return Ok(value),
                Err(EvalError::Syntax(reason)) => {
                    trace!("Keeping '{}' as text: {}", key, reason);
                }
                Err(e) => return Err(Error::eval(rendered, e.to_string()).with_path(key)),
            }
        }

        Ok(Value::String(rendered))
    }
}

/// Entries substituted so far, and the chain being substituted
#[derive(Default)]
struct Progress {
    done: HashSet<String>,
    active: Vec<String>,
}

/// Look up a placeholder name on behalf of `key`
fn fetch<'m, M: MappingAccess + ?Sized>(mapping: &'m M, key: &str, raw: &str) -> Result<&'m Value> {
    let name = resolve_relative(key, raw);
    if name == key {
        return Err(Error::self_reference(key));
    }
    mapping
        .lookup(&name)
        .ok_or_else(|| Error::missing_reference(name, Some(key.to_string()), mapping.describe()))
}

/// Interpolate a flat mapping in place with default collaborators
///
/// ```
/// use attrconf_core::{interpolate, InterpolateOptions, Outcome, Value};
/// use indexmap::IndexMap;
///
/// let mut map: IndexMap<String, Value> = IndexMap::new();
/// map.insert("dim".into(), 256.into());
/// map.insert("hidden".into(), "${dim}".into());
/// map.insert("name".into(), "net-${dim}".into());
///
/// let outcome = interpolate(&mut map, InterpolateOptions::default()).unwrap();
/// assert_eq!(outcome, Outcome::Applied);
/// assert_eq!(map["hidden"], Value::Integer(256));
/// assert_eq!(map["name"], Value::from("net-256"));
/// ```
pub fn interpolate<M: MappingAccess + ?Sized>(
    mapping: &mut M,
    options: InterpolateOptions,
) -> Result<Outcome> {
    Interpolator::new(options).run(mapping)
}

/// Interpolate a value when it is a flat mapping
pub fn interpolate_value(value: &mut Value, options: InterpolateOptions) -> Result<Outcome> {
    match value {
        Value::Mapping(map) => interpolate(map, options),
        _ => Ok(Outcome::NotApplicable),
    }
}

/// Interpolate a nested mapping in place with default collaborators
pub fn interpolate_nested(root: &mut Value, options: InterpolateOptions) -> Result<Outcome> {
    Interpolator::new(options).run_nested(root, DEFAULT_MAX_DEPTH)
}
