//! Entity model shared by loaders, updaters and the cache store.
//!
//! Entities arrive from the API client as JSON documents, so they are kept as
//! `serde_json::Value` and addressed through dotted field paths.

use std::fmt;

use serde_json::{Map, Value};

/// A cached entity (normally a JSON object).
pub type Entity = Value;

/// Request parameters passed to loaders, updaters and selectors.
pub type Params = Map<String, Value>;

/// Field path (or composite of paths) identifying an entity in a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UniqueIdentifier {
    Path(String),
    Composite(Vec<String>),
}

impl UniqueIdentifier {
    pub fn paths(&self) -> Vec<&str> {
        match self {
            UniqueIdentifier::Path(path) => vec![path.as_str()],
            UniqueIdentifier::Composite(paths) => paths.iter().map(String::as_str).collect(),
        }
    }

    /// Resolved identifier values, or `None` when any component is missing.
    pub fn values<'a>(&self, entity: &'a Value) -> Option<Vec<&'a Value>> {
        self.paths()
            .into_iter()
            .map(|path| lookup(entity, path).filter(|value| !value.is_null()))
            .collect()
    }

    /// True when both entities carry equal, non-null values on every path.
    pub fn matches(&self, left: &Value, right: &Value) -> bool {
        match (self.values(left), self.values(right)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Human-readable identifier value used in outcome messages.
    pub fn describe(&self, entity: &Value) -> String {
        self.paths()
            .into_iter()
            .map(|path| match lookup(entity, path) {
                Some(Value::String(text)) => text.clone(),
                Some(Value::Null) | None => "unknown".to_string(),
                Some(other) => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for UniqueIdentifier {
    fn default() -> Self {
        Self::Path("id".to_string())
    }
}

impl From<&str> for UniqueIdentifier {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for UniqueIdentifier {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl From<Vec<&str>> for UniqueIdentifier {
    fn from(paths: Vec<&str>) -> Self {
        Self::Composite(paths.into_iter().map(str::to_string).collect())
    }
}

impl fmt::Display for UniqueIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.paths().join(", "))
    }
}

/// Resolve a dotted path (`metadata.name`) inside a JSON document.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.as_object()?.get(segment))
}

/// Merge `tags` into an entity; fields already on the entity win.
pub fn tag_entity(mut entity: Entity, tags: &Params) -> Entity {
    if let Value::Object(fields) = &mut entity {
        for (key, value) in tags {
            fields.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    entity
}

/// Deterministic JSON text with object keys sorted at every depth.
///
/// `serde_json::to_string` only sorts while `Map` is a `BTreeMap`; any crate in
/// the build enabling `preserve_order` switches it to insertion order.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(fields) => {
            let mut keys: Vec<&String> = fields.keys().collect();
            keys.sort();
            out.push('{');
            for (index, key) in keys.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(inner) = fields.get(key) {
                    write_canonical(inner, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
