//! Normalized structural value.
//!
//! Every YAML value the engines inspect is converted once into a [`Node`]:
//! mapping keys become strings, tags are dropped, and scalar comparison goes
//! through a single textual form so `300` and `"300"` compare equal.

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

/// Tagged structural value with string keys.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Null, bool, number or string, kept as parsed so it re-serializes unchanged
    Scalar(Value),
    Sequence(Vec<Node>),
    Mapping(IndexMap<String, Node>),
}

impl Node {
    /// Parse YAML text into a node.
    pub fn parse(text: &str) -> Result<Node, serde_yaml::Error> {
        let value: Value = serde_yaml::from_str(text)?;
        Ok(Node::from_value(value))
    }

    /// Normalize a `serde_yaml` value.
    pub fn from_value(value: Value) -> Node {
        match value {
            Value::Sequence(items) => Node::Sequence(items.into_iter().map(Node::from_value).collect()),
            Value::Mapping(map) => Node::Mapping(
                map.into_iter()
                    .map(|(k, v)| (key_text(&k), Node::from_value(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Node::from_value(tagged.value),
            scalar => Node::Scalar(scalar),
        }
    }

    /// Convert back into a `serde_yaml` value for serialization.
    pub fn to_value(&self) -> Value {
        match self {
            Node::Scalar(v) => v.clone(),
            Node::Sequence(items) => Value::Sequence(items.iter().map(Node::to_value).collect()),
            Node::Mapping(map) => {
                let mut out = Mapping::new();
                for (k, v) in map {
                    out.insert(Value::String(k.clone()), v.to_value());
                }
                Value::Mapping(out)
            }
        }
    }

    /// Single-entry mapping `{key: value}`.
    pub fn entry(key: &str, value: Node) -> Node {
        let mut map = IndexMap::new();
        map.insert(key.to_string(), value);
        Node::Mapping(map)
    }

    pub fn null() -> Node {
        Node::Scalar(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Scalar(Value::Null))
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, Node>> {
        match self {
            Node::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a mapping field.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Canonical text used for scalar comparison.
    pub fn scalar_text(&self) -> String {
        match self {
            Node::Scalar(v) => scalar_value_text(v),
            other => serde_yaml::to_string(&other.to_value())
                .map(|s| s.trim_end().to_string())
                .unwrap_or_default(),
        }
    }

    /// Structural equality: mapping order is ignored, scalars compare as text.
    pub fn structurally_eq(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Scalar(a), Node::Scalar(b)) => scalar_value_text(a) == scalar_value_text(b),
            (Node::Sequence(a), Node::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structurally_eq(y))
            }
            (Node::Mapping(a), Node::Mapping(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.structurally_eq(w)))
            }
            _ => false,
        }
    }

    /// Serialize to YAML lines (no trailing newline, no document marker).
    pub fn to_yaml_lines(&self) -> Vec<String> {
        match serde_yaml::to_string(&self.to_value()) {
            Ok(text) => text
                .trim_end_matches('\n')
                .split('\n')
                .map(str::to_string)
                .collect(),
            Err(e) => {
                log::warn!("Failed to serialize YAML fragment: {}", e);
                Vec::new()
            }
        }
    }
}

fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => scalar_value_text(other),
    }
}

fn scalar_value_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Tagged(t) => scalar_value_text(&t.value),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Re-indent serialized lines by `indent` spaces, leaving blank lines empty.
pub fn indent_lines(lines: &[String], indent: usize) -> Vec<String> {
    let pad = " ".repeat(indent);
    lines
        .iter()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, l)
            }
        })
        .collect()
}

/// Render `key: value` (or `key:` plus a nested body) at `indent`.
pub fn render_entry(key: &str, value: &Node, indent: usize) -> Vec<String> {
    indent_lines(&Node::entry(key, value.clone()).to_yaml_lines(), indent)
}

/// Render sequence items with their `- ` markers at `indent`.
pub fn render_items(items: &[Node], indent: usize) -> Vec<String> {
    if items.is_empty() {
        return Vec::new();
    }
    indent_lines(&Node::Sequence(items.to_vec()).to_yaml_lines(), indent)
}
