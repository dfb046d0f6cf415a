//! Placeholder dependency graph and cycle detection

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::placeholder::{find_placeholders, is_dynamic, resolve_relative};
use crate::value::Value;

/// Owning key → names its text refers to, in first-seen order
///
/// Only keys whose text holds at least one placeholder appear. Relative
/// names are already resolved against their owner.
pub type PlaceholderGraph = IndexMap<String, Vec<String>>;

/// Build the placeholder graph for a set of entries
///
/// Text values (including text held in a variable cell) are scanned;
/// everything else is skipped. A name that resolves to its own owning key
/// is a `SelfReference` error.
pub fn build_graph<'a, I>(entries: I) -> Result<PlaceholderGraph>
where
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    let mut graph = PlaceholderGraph::new();

    for (key, value) in entries {
        let Some(text) = value.text() else {
            continue;
        };
        if !text.contains('$') {
            continue;
        }

        let mut names: Vec<String> = Vec::new();
        for name in find_placeholders(&text) {
            let name = resolve_relative(key, &name);
            if name == key {
                return Err(Error::self_reference(key));
            }
            if !names.contains(&name) {
                names.push(name);
            }
        }

        if !names.is_empty() {
            graph.insert(key.to_string(), names);
        }
    }

    Ok(graph)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Active,
    Done,
}

/// Find a cycle in the graph, if there is one
///
/// Returns the keys along the cycle with the first key repeated at the end
/// (`["a", "b", "a"]`). Traversal follows insertion order, so the result is
/// deterministic. Names that are not graph keys, and dynamic names, end a
/// path.
pub fn find_cycle(graph: &PlaceholderGraph) -> Option<Vec<String>> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut path: Vec<&str> = Vec::new();

    for key in graph.keys() {
        if marks.contains_key(key.as_str()) {
            continue;
        }
        if let Some(cycle) = visit(key, graph, &mut marks, &mut path) {
            return Some(cycle);
        }
    }

    None
}

fn visit<'g>(
    node: &'g str,
    graph: &'g PlaceholderGraph,
    marks: &mut HashMap<&'g str, Mark>,
    path: &mut Vec<&'g str>,
) -> Option<Vec<String>> {
    match marks.get(node) {
        Some(Mark::Done) => return None,
        Some(Mark::Active) => {
            let start = path.iter().position(|n| *n == node)?;
            let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        None => {}
    }

    let names = graph.get(node)?;

    marks.insert(node, Mark::Active);
    path.push(node);
    for name in names.iter().filter(|n| !is_dynamic(n)) {
        if let Some(cycle) = visit(name, graph, marks, path) {
            return Some(cycle);
        }
    }
    path.pop();
    marks.insert(node, Mark::Done);

    None
}
