//! Cache store.
//!
//! Process-wide table of entity collections keyed by [`CacheKey`]. Readers
//! get shared snapshots; writers go through [`CacheStore::dispatch`].

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use metrics::counter;
use serde_json::Value;
use tracing::debug;

use crate::domain::entity::{Entity, UniqueIdentifier, tag_entity};

use super::actions::{CacheAction, Epoch};
use super::keys::{ALL_TAG, CacheKey, IndexedParams};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";
const METRIC_STORE_MUTATION: &str = "fleetview_store_mutation_total";

/// Marks a subset of a collection as loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTag {
    pub epoch: Epoch,
}

/// One cached collection.
///
/// `items` is swapped for a fresh `Arc` on every mutation, so pointer
/// equality tells selectors whether the collection changed.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    pub items: Arc<Vec<Entity>>,
    pub params_index: BTreeMap<String, LoadTag>,
}

pub struct CacheStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    epoch_counter: AtomicU64,
    empty: Arc<Vec<Entity>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            epoch_counter: AtomicU64::new(0),
            empty: Arc::new(Vec::new()),
        }
    }

    /// Apply one action and return its epoch.
    pub fn dispatch(&self, action: CacheAction) -> Epoch {
        let epoch = self.epoch_counter.fetch_add(1, Ordering::SeqCst);
        let kind = action.kind();
        let cache_key = action.cache_key().clone();

        let len = {
            let mut entries = rw_write(&self.entries, SOURCE, "dispatch");
            let entry = entries.entry(cache_key.clone()).or_default();
            apply(entry, action, epoch);
            entry.items.len()
        };

        counter!(METRIC_STORE_MUTATION, "operation" => kind).increment(1);
        debug!(
            cache_key = %cache_key,
            operation = kind,
            epoch,
            items = len,
            "Cache action applied"
        );
        epoch
    }

    /// Current snapshot of a collection (empty when never loaded).
    pub fn collection(&self, cache_key: &CacheKey) -> Arc<Vec<Entity>> {
        rw_read(&self.entries, SOURCE, "collection")
            .get(cache_key)
            .map(|entry| Arc::clone(&entry.items))
            .unwrap_or_else(|| Arc::clone(&self.empty))
    }

    /// True when the subset, or the whole collection, has been loaded.
    pub fn is_loaded(&self, cache_key: &CacheKey, indexed: &IndexedParams) -> bool {
        self.loaded_epoch(cache_key, indexed).is_some()
    }

    /// Epoch of the load covering the subset; a whole-collection load wins.
    pub fn loaded_epoch(&self, cache_key: &CacheKey, indexed: &IndexedParams) -> Option<Epoch> {
        let entries = rw_read(&self.entries, SOURCE, "loaded_epoch");
        let entry = entries.get(cache_key)?;
        entry
            .params_index
            .get(ALL_TAG)
            .or_else(|| entry.params_index.get(&indexed.tag()))
            .map(|tag| tag.epoch)
    }

    pub fn loaded_tags(&self, cache_key: &CacheKey) -> Vec<String> {
        rw_read(&self.entries, SOURCE, "loaded_tags")
            .get(cache_key)
            .map(|entry| entry.params_index.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, cache_key: &CacheKey) -> usize {
        rw_read(&self.entries, SOURCE, "len")
            .get(cache_key)
            .map_or(0, |entry| entry.items.len())
    }

    pub fn is_empty(&self, cache_key: &CacheKey) -> bool {
        self.len(cache_key) == 0
    }

    /// Epoch the next dispatched action will receive.
    pub fn epoch(&self) -> Epoch {
        self.epoch_counter.load(Ordering::SeqCst)
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

fn apply(entry: &mut CacheEntry, action: CacheAction, epoch: Epoch) {
    match action {
        CacheAction::ReplaceAll { items, params, .. } => {
            let tag = params.map_or_else(|| ALL_TAG.to_string(), |params| params.tag());
            entry.items = Arc::new(items);
            entry.params_index = BTreeMap::from([(tag, LoadTag { epoch })]);
        }
        CacheAction::UpsertAll {
            unique_identifier,
            items,
            params,
            ..
        } => {
            entry.items = Arc::new(upsert(&entry.items, items, &unique_identifier, &params));
            entry.params_index.insert(params.tag(), LoadTag { epoch });
        }
        CacheAction::AddItem { item, params, .. } => {
            let mut items = entry.items.as_ref().clone();
            items.push(tag_entity(item, params.as_params()));
            entry.items = Arc::new(items);
        }
        CacheAction::UpdateItem {
            unique_identifier,
            cache_key,
            item,
            params,
        } => {
            let item = tag_entity(item, params.as_params());
            let Some(position) = entry
                .items
                .iter()
                .position(|existing| unique_identifier.matches(existing, &item))
            else {
                debug!(
                    cache_key = %cache_key,
                    identifier = %unique_identifier.describe(&item),
                    "Update skipped: entity not cached"
                );
                return;
            };
            let mut items = entry.items.as_ref().clone();
            items[position] = item;
            entry.items = Arc::new(items);
        }
        CacheAction::RemoveItem {
            unique_identifier,
            params,
            ..
        } => {
            let target = Value::Object(params);
            let items: Vec<Entity> = entry
                .items
                .iter()
                .filter(|existing| !unique_identifier.matches(existing, &target))
                .cloned()
                .collect();
            entry.items = Arc::new(items);
        }
    }
}

/// Merge a fetched subset into the cached collection.
///
/// Cached items with a fresh counterpart are replaced in place. Cached items
/// inside the subset but missing from the response are dropped. Items outside
/// the subset are kept as they are, and new items are appended.
fn upsert(
    cached: &[Entity],
    fresh: Vec<Entity>,
    unique_identifier: &UniqueIdentifier,
    subset: &IndexedParams,
) -> Vec<Entity> {
    let mut fresh: Vec<Option<Entity>> = fresh.into_iter().map(Some).collect();
    let mut merged = Vec::with_capacity(cached.len() + fresh.len());

    for existing in cached {
        let replacement = fresh
            .iter_mut()
            .find(|slot| {
                slot.as_ref()
                    .is_some_and(|candidate| unique_identifier.matches(existing, candidate))
            })
            .and_then(Option::take);

        match replacement {
            Some(item) => merged.push(item),
            None if subset.matches(existing) => {}
            None => merged.push(existing.clone()),
        }
    }

    merged.extend(fresh.into_iter().flatten());
    merged
}
