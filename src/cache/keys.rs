//! Cache key definitions.
//!
//! Defines `CacheKey` for entity collections, `IndexedParams` for the loaded
//! subsets inside a collection, and `PendingKey` for in-flight requests.

use std::borrow::Borrow;
use std::fmt;

use serde_json::Value;

use crate::domain::entity::{Entity, Params, canonical_json, lookup};
use crate::domain::types::Operation;

/// Tag recorded when a load covered the whole collection.
pub const ALL_TAG: &str = "__all__";

/// Identifies one entity collection (e.g. `pods`, `clusters`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `indexBy` subset of request parameters.
///
/// Null values and the sentinel all-value are dropped, so `{clusterId: "__all__"}`
/// and `{}` both describe the full collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedParams(Params);

impl IndexedParams {
    pub fn from_params(params: &Params, index_by: &[String], all_key: &str) -> Self {
        let mut indexed = Params::new();
        for key in index_by {
            match params.get(key) {
                None | Some(Value::Null) => {}
                Some(Value::String(value)) if value == all_key => {}
                Some(value) => {
                    indexed.insert(key.clone(), value.clone());
                }
            }
        }
        Self(indexed)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_params(&self) -> &Params {
        &self.0
    }

    /// Serialized form used in the params index and in pending-request keys.
    pub fn tag(&self) -> String {
        if self.0.is_empty() {
            ALL_TAG.to_string()
        } else {
            canonical_json(&Value::Object(self.0.clone()))
        }
    }

    /// True when the entity carries every indexed value.
    pub fn matches(&self, entity: &Entity) -> bool {
        self.0
            .iter()
            .all(|(key, expected)| lookup(entity, key) == Some(expected))
    }
}

/// Key of an in-flight request in the dedup registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingKey {
    cache_key: CacheKey,
    scope: String,
    params: String,
}

impl PendingKey {
    pub fn load(cache_key: &CacheKey, indexed: &IndexedParams) -> Self {
        Self {
            cache_key: cache_key.clone(),
            scope: "load".to_string(),
            params: indexed.tag(),
        }
    }

    pub fn update(cache_key: &CacheKey, operation: &Operation, params: &Params) -> Self {
        let scope = match operation {
            Operation::Custom(name) => format!("update:custom:{name}"),
            builtin => format!("update:{builtin}"),
        };
        Self {
            cache_key: cache_key.clone(),
            scope,
            params: canonical_json(&Value::Object(params.clone())),
        }
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.cache_key
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => Params::new(),
        }
    }

    #[test]
    fn indexed_params_drop_nil_and_all_values() {
        let index_by = vec!["clusterId".to_string(), "namespace".to_string()];
        let indexed = IndexedParams::from_params(
            &params(json!({ "clusterId": "__all__", "namespace": null, "orderBy": "name" })),
            &index_by,
            ALL_TAG,
        );
        assert!(indexed.is_empty());
        assert_eq!(indexed.tag(), ALL_TAG);
    }

    #[test]
    fn indexed_tag_is_order_independent() {
        let index_by = vec!["namespace".to_string(), "clusterId".to_string()];
        let a = IndexedParams::from_params(
            &params(json!({ "clusterId": "a", "namespace": "kube-system" })),
            &index_by,
            ALL_TAG,
        );
        let b = IndexedParams::from_params(
            &params(json!({ "namespace": "kube-system", "clusterId": "a" })),
            &index_by,
            ALL_TAG,
        );
        assert_eq!(a.tag(), b.tag());
        assert_eq!(a.tag(), r#"{"clusterId":"a","namespace":"kube-system"}"#);
    }

    #[test]
    fn indexed_params_match_tagged_entities() {
        let index_by = vec!["clusterId".to_string()];
        let indexed =
            IndexedParams::from_params(&params(json!({ "clusterId": "a" })), &index_by, ALL_TAG);
        assert!(indexed.matches(&json!({ "id": 1, "clusterId": "a" })));
        assert!(!indexed.matches(&json!({ "id": 2, "clusterId": "b" })));
        assert!(!indexed.matches(&json!({ "id": 3 })));
    }

    #[test]
    fn pending_keys_separate_scopes() {
        let key = CacheKey::from("pods");
        let load = PendingKey::load(&key, &IndexedParams::default());
        let update = PendingKey::update(&key, &Operation::Create, &Params::new());
        assert_ne!(load, update);
        assert_eq!(update.scope(), "update:create");
        assert_eq!(load.cache_key().as_str(), "pods");
    }

    #[test]
    fn custom_operations_never_share_a_builtin_scope() {
        let key = CacheKey::from("pods");
        let builtin = PendingKey::update(&key, &Operation::Create, &Params::new());
        let custom = PendingKey::update(&key, &Operation::custom("create"), &Params::new());
        assert_ne!(builtin, custom);
        assert_eq!(custom.scope(), "update:custom:create");
    }
}
