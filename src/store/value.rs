//! Typed tree for store documents
//!
//! Every JSON document the store loads is converted into a [`Value`] so that the
//! recursive operations (search, delete, merge) match on a closed set of shapes.
//! Maps are kept in key order, which fixes the traversal order of the deep
//! operations: own keys first, then children in ascending key order, depth first.

use serde_json::Number;
use std::collections::BTreeMap;

/// A scalar leaf of the tree
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
}

/// A node of the store tree
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Leaf(Scalar),
    Node(BTreeMap<String, Value>),
    List(Vec<Value>),
}

impl Value {
    /// An empty mapping
    pub fn empty_node() -> Self {
        Value::Node(BTreeMap::new())
    }

    /// Shorthand for a text leaf
    pub fn text(s: impl Into<String>) -> Self {
        Value::Leaf(Scalar::Text(s.into()))
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Value::Node(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Leaf(Scalar::Null))
    }

    pub fn as_node(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Node(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Node(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Leaf(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Leaf(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Looks up a direct child of a mapping
    pub fn child(&self, key: &str) -> Option<&Value> {
        self.as_node().and_then(|map| map.get(key))
    }

    /// Finds the first value stored under `key` anywhere in the tree
    ///
    /// A mapping answers with its own entry before looking into its children, so
    /// the shallowest match along the first branch wins.
    pub fn find(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Node(map) => map
                .get(key)
                .or_else(|| map.values().find_map(|child| child.find(key))),
            Value::List(items) => items.iter().find_map(|item| item.find(key)),
            Value::Leaf(_) => None,
        }
    }

    /// Removes the first entry stored under `key` anywhere in the tree
    ///
    /// Uses the same traversal order as [`Value::find`] and returns the removed
    /// value. At most one entry is removed.
    pub fn remove_first(&mut self, key: &str) -> Option<Value> {
        match self {
            Value::Node(map) => {
                if let Some(removed) = map.remove(key) {
                    return Some(removed);
                }
                map.values_mut().find_map(|child| child.remove_first(key))
            }
            Value::List(items) => items.iter_mut().find_map(|item| item.remove_first(key)),
            Value::Leaf(_) => None,
        }
    }

    /// Merges `other` into `self`
    ///
    /// Two mappings merge key by key, recursively. Any other combination replaces
    /// the current value with `other`.
    pub fn merge(&mut self, other: Value) {
        match (self, other) {
            (Value::Node(target), Value::Node(source)) => {
                for (key, incoming) in source {
                    let both_nodes =
                        incoming.is_node() && target.get(&key).is_some_and(Value::is_node);
                    if both_nodes {
                        if let Some(existing) = target.get_mut(&key) {
                            existing.merge(incoming);
                        }
                    } else {
                        target.insert(key, incoming);
                    }
                }
            }
            (target, other) => *target = other,
        }
    }

    /// Number of entries in a mapping or list, zero for leaves
    pub fn len(&self) -> usize {
        match self {
            Value::Node(map) => map.len(),
            Value::List(items) => items.len(),
            Value::Leaf(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Leaf(Scalar::Null),
            serde_json::Value::Bool(b) => Value::Leaf(Scalar::Bool(b)),
            serde_json::Value::Number(n) => Value::Leaf(Scalar::Number(n)),
            serde_json::Value::String(s) => Value::Leaf(Scalar::Text(s)),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Node(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Leaf(Scalar::Null) => serde_json::Value::Null,
            Value::Leaf(Scalar::Bool(b)) => serde_json::Value::Bool(*b),
            Value::Leaf(Scalar::Number(n)) => serde_json::Value::Number(n.clone()),
            Value::Leaf(Scalar::Text(s)) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Node(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), serde_json::Value::from(value)))
                    .collect(),
            ),
        }
    }
}
