//! The narrow query interface onto the hierarchical system configuration.
//!
//! The bridge selector only ever asks two things of a configuration: "which
//! nodes match this path pattern" and "what is the value of this scalar
//! field". [`ConfigQuery`] captures exactly that surface, so any
//! configuration system can drive the bridge. [`ConfigTree`] is the
//! implementation shipped with the crate, backed by a YAML document.

use std::collections::BTreeMap;

use serde_yaml::Value;

use crate::config::ConfigError;

/// An opaque handle onto one node of a queried configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub(crate) usize);

/// The query surface the bridge selector depends on.
pub trait ConfigQuery {
    /// Returns all nodes whose path matches `pattern`.
    ///
    /// Patterns are `/` separated segment lists; `*` matches one segment,
    /// `**` matches any number of segments (including none).
    fn find(&self, pattern: &str) -> Vec<NodeHandle>;

    /// Reads the scalar field `name` of `node`, if present.
    fn field(&self, node: NodeHandle, name: &str) -> Option<String>;
}

#[derive(Debug, Clone)]
struct Node {
    path: String,
    fields: BTreeMap<String, String>,
}

/// A hierarchical configuration parsed from a YAML document.
///
/// Mappings become nodes addressed by their `/` separated path; scalar
/// entries become the fields of the enclosing node.
#[derive(Debug, Clone)]
pub struct ConfigTree {
    nodes: Vec<Node>,
}

impl ConfigTree {
    /// Parses a YAML document into a queryable tree.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_yaml::from_str(text)?;
        let mut nodes = Vec::new();
        if let Value::Mapping(mapping) = &root {
            flatten(&mut nodes, "", mapping);
        }
        Ok(Self { nodes })
    }

    /// The path of `node`, mainly useful in diagnostics.
    pub fn path(&self, node: NodeHandle) -> Option<&str> {
        self.nodes.get(node.0).map(|node| node.path.as_str())
    }
}

impl ConfigQuery for ConfigTree {
    fn find(&self, pattern: &str) -> Vec<NodeHandle> {
        let pattern: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| {
                let path: Vec<&str> = node.path.split('/').filter(|s| !s.is_empty()).collect();
                matches_pattern(&pattern, &path)
            })
            .map(|(index, _)| NodeHandle(index))
            .collect()
    }

    fn field(&self, node: NodeHandle, name: &str) -> Option<String> {
        self.nodes.get(node.0)?.fields.get(name).cloned()
    }
}

fn flatten(nodes: &mut Vec<Node>, path: &str, mapping: &serde_yaml::Mapping) {
    let mut fields = BTreeMap::new();
    for (key, value) in mapping {
        let Some(key) = key.as_str() else { continue };
        match value {
            Value::Mapping(child) => {
                let child_path = if path.is_empty() {
                    key.to_string()
                } else {
                    format!("{path}/{key}")
                };
                flatten(nodes, &child_path, child);
            }
            Value::String(s) => {
                fields.insert(key.to_string(), s.clone());
            }
            Value::Number(n) => {
                fields.insert(key.to_string(), n.to_string());
            }
            Value::Bool(b) => {
                fields.insert(key.to_string(), b.to_string());
            }
            // Sequences and nulls carry no scalar value to query.
            _ => {}
        }
    }
    nodes.push(Node {
        path: path.to_string(),
        fields,
    });
}

fn matches_pattern(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", rest)) => {
            matches_pattern(rest, path)
                || path
                    .split_first()
                    .is_some_and(|(_, tail)| matches_pattern(pattern, tail))
        }
        Some((&segment, rest)) => path
            .split_first()
            .is_some_and(|(&head, tail)| (segment == "*" || segment == head) && matches_pattern(rest, tail)),
    }
}
