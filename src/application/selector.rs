//! Memoized derived views over a cached collection.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::cache::{CacheKey, CacheStore, IndexedParams, mutex_lock};
use crate::domain::entity::{Entity, Params};

use super::sorter::Sorter;

const SOURCE: &str = "application::selector";

/// Derives the view a caller sees from the raw collection and its params.
pub type DeriveFn = Arc<dyn Fn(&[Entity], &Params) -> Vec<Entity> + Send + Sync>;

/// Filter to the request's `index_by` subset, then sort by `orderBy`.
pub fn default_derive(index_by: Vec<String>, all_key: String) -> DeriveFn {
    Arc::new(move |items: &[Entity], params: &Params| {
        let indexed = IndexedParams::from_params(params, &index_by, &all_key);
        let filtered = items
            .iter()
            .filter(|item| indexed.matches(item))
            .cloned()
            .collect();
        Sorter::from_params(params).sort(filtered)
    })
}

struct Memo {
    raw: Arc<Vec<Entity>>,
    params: Params,
    output: Arc<Vec<Entity>>,
}

/// Returns the same `Arc` for as long as the collection and the params are
/// unchanged, so callers can compare views by pointer.
pub struct Selector {
    cache_key: CacheKey,
    derive: DeriveFn,
    memo: Mutex<Option<Memo>>,
}

impl Selector {
    pub fn new(cache_key: CacheKey, derive: DeriveFn) -> Self {
        Self {
            cache_key,
            derive,
            memo: Mutex::new(None),
        }
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.cache_key
    }

    pub fn select(&self, store: &CacheStore, params: &Params) -> Arc<Vec<Entity>> {
        let raw = store.collection(&self.cache_key);
        let mut memo = mutex_lock(&self.memo, SOURCE, "select");

        if let Some(last) = memo.as_ref()
            && Arc::ptr_eq(&last.raw, &raw)
            && last.params == *params
        {
            return Arc::clone(&last.output);
        }

        let output = Arc::new((self.derive)(&raw, params));
        *memo = Some(Memo {
            raw,
            params: params.clone(),
            output: Arc::clone(&output),
        });
        output
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("cache_key", &self.cache_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::{Value, json};

    use super::*;
    use crate::cache::{ALL_TAG, CacheAction};

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => Params::new(),
        }
    }

    fn seeded_store(key: &CacheKey) -> CacheStore {
        let store = CacheStore::new();
        store.dispatch(CacheAction::ReplaceAll {
            cache_key: key.clone(),
            items: vec![
                json!({ "id": 1, "clusterId": "a", "name": "web" }),
                json!({ "id": 2, "clusterId": "b", "name": "api" }),
                json!({ "id": 3, "clusterId": "a", "name": "db" }),
            ],
            params: None,
        });
        store
    }

    fn counting(calls: Arc<AtomicUsize>) -> DeriveFn {
        let inner = default_derive(vec!["clusterId".into()], ALL_TAG.into());
        Arc::new(move |items: &[Entity], params: &Params| {
            calls.fetch_add(1, Ordering::SeqCst);
            inner(items, params)
        })
    }

    #[test]
    fn default_view_filters_then_sorts() {
        let key = CacheKey::from("pods");
        let store = seeded_store(&key);
        let selector = Selector::new(
            key,
            default_derive(vec!["clusterId".into()], ALL_TAG.into()),
        );

        let view = selector.select(&store, &params(json!({ "clusterId": "a", "orderBy": "name" })));
        let names: Vec<&str> = view.iter().filter_map(|item| item["name"].as_str()).collect();
        assert_eq!(names, vec!["db", "web"]);

        let everything = selector.select(&store, &params(json!({ "clusterId": ALL_TAG })));
        assert_eq!(everything.len(), 3);
    }

    #[test]
    fn repeated_reads_reuse_the_same_view() {
        let key = CacheKey::from("pods");
        let store = seeded_store(&key);
        let calls = Arc::new(AtomicUsize::new(0));
        let selector = Selector::new(key, counting(Arc::clone(&calls)));
        let query = params(json!({ "clusterId": "a" }));

        let first = selector.select(&store, &query);
        let second = selector.select(&store, &query);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn store_mutation_or_new_params_recompute() {
        let key = CacheKey::from("pods");
        let store = seeded_store(&key);
        let calls = Arc::new(AtomicUsize::new(0));
        let selector = Selector::new(key.clone(), counting(Arc::clone(&calls)));
        let query = params(json!({ "clusterId": "a" }));

        let first = selector.select(&store, &query);
        store.dispatch(CacheAction::AddItem {
            cache_key: key,
            item: json!({ "id": 4, "name": "cache" }),
            params: IndexedParams::from_params(&query, &["clusterId".to_string()], ALL_TAG),
        });
        let second = selector.select(&store, &query);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 3);

        selector.select(&store, &params(json!({ "clusterId": "b" })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn unknown_collection_selects_nothing() {
        let store = CacheStore::new();
        let selector = Selector::new(
            CacheKey::from("volumes"),
            default_derive(Vec::new(), ALL_TAG.into()),
        );
        assert!(selector.select(&store, &Params::new()).is_empty());
    }
}
