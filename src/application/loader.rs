//! Loaders: fetch entity collections into the cache store.
//!
//! A loader owns one [`CacheKey`]. Each call:
//!
//! 1. skips the fetch and yields `[]` when a required param is missing
//! 2. answers from the cache when the subset is already loaded
//! 3. otherwise joins the in-flight fetch for the same subset, or starts one
//! 4. tags fetched items with the subset params and writes them with
//!    `ReplaceAll` (cache disabled, invalidated or refetch) or `UpsertAll`
//!
//! The caller always receives the selector view for its own params.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use futures::FutureExt;
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{
    CacheAction, CacheConfig, CacheKey, CacheStore, IndexedParams, PendingKey, PendingRequests,
};
use crate::domain::entity::{Entity, Params, UniqueIdentifier, tag_entity};
use crate::domain::error::ApiError;

use super::selector::{DeriveFn, Selector, default_derive};
use super::sources::EntityFetcher;

const METRIC_FETCH: &str = "fleetview_loader_fetch_total";
const METRIC_CACHE_HIT: &str = "fleetview_loader_cache_hit_total";
const METRIC_DEDUP: &str = "fleetview_loader_dedup_total";
const METRIC_GATE_SKIP: &str = "fleetview_loader_gate_skip_total";
const METRIC_FETCH_MS: &str = "fleetview_loader_fetch_ms";

/// Post-fetch transformation applied before items are tagged and stored.
pub type DataMapper = Arc<dyn Fn(Vec<Entity>, &Params) -> Vec<Entity> + Send + Sync>;

/// Per-loader settings. Unset fields fall back to the registry's [`CacheConfig`].
#[derive(Clone, Default)]
pub struct LoaderOptions {
    pub unique_identifier: Option<UniqueIdentifier>,
    /// Name used in updater messages; defaults to the cache key.
    pub entity_name: Option<String>,
    pub index_by: Vec<String>,
    /// Defaults to `index_by`.
    pub required_params: Option<Vec<String>>,
    pub cache: Option<bool>,
    /// Replaces the default filter-then-sort view.
    pub selector: Option<DeriveFn>,
    pub data_mapper: Option<DataMapper>,
}

/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Loader {
    inner: Arc<LoaderInner>,
}

struct LoaderInner {
    cache_key: CacheKey,
    entity_name: String,
    fetcher: Arc<dyn EntityFetcher>,
    unique_identifier: UniqueIdentifier,
    index_by: Vec<String>,
    required_params: Vec<String>,
    cache_enabled: bool,
    all_key: String,
    derive: DeriveFn,
    data_mapper: Option<DataMapper>,
    selector: Selector,
    invalidated: AtomicBool,
    store: Arc<CacheStore>,
    pending: Arc<PendingRequests<usize>>,
}

impl Loader {
    pub(crate) fn new(
        cache_key: CacheKey,
        fetcher: Arc<dyn EntityFetcher>,
        options: LoaderOptions,
        config: &CacheConfig,
        store: Arc<CacheStore>,
        pending: Arc<PendingRequests<usize>>,
    ) -> Self {
        let LoaderOptions {
            unique_identifier,
            entity_name,
            index_by,
            required_params,
            cache,
            selector,
            data_mapper,
        } = options;

        let derive =
            selector.unwrap_or_else(|| default_derive(index_by.clone(), config.all_key.clone()));

        Self {
            inner: Arc::new(LoaderInner {
                entity_name: entity_name.unwrap_or_else(|| cache_key.to_string()),
                selector: Selector::new(cache_key.clone(), Arc::clone(&derive)),
                cache_key,
                fetcher,
                unique_identifier: unique_identifier
                    .unwrap_or_else(|| config.default_identifier()),
                required_params: required_params.unwrap_or_else(|| index_by.clone()),
                index_by,
                cache_enabled: cache.unwrap_or(config.enabled),
                all_key: config.all_key.clone(),
                derive,
                data_mapper,
                invalidated: AtomicBool::new(false),
                store,
                pending,
            }),
        }
    }

    /// Load with `refetch` defaulting to the invalidation flag.
    pub async fn load(&self, params: &Params) -> Result<Arc<Vec<Entity>>, ApiError> {
        self.load_with(params, None).await
    }

    /// Load, always going to the API.
    pub async fn refetch(&self, params: &Params) -> Result<Arc<Vec<Entity>>, ApiError> {
        self.load_with(params, Some(true)).await
    }

    pub async fn load_with(
        &self,
        params: &Params,
        refetch: Option<bool>,
    ) -> Result<Arc<Vec<Entity>>, ApiError> {
        let inner = &self.inner;
        let requested = refetch == Some(true);
        let refetch = refetch.unwrap_or_else(|| inner.invalidated.load(Ordering::SeqCst));

        if !self.has_required_params(params) {
            counter!(METRIC_GATE_SKIP, "cache_key" => inner.cache_key.to_string()).increment(1);
            if requested {
                warn!(
                    cache_key = %inner.cache_key,
                    required = ?inner.required_params,
                    "Refetch skipped: required params missing"
                );
            }
            return Ok(Arc::new(Vec::new()));
        }

        let indexed = self.indexed_params(params);
        if inner.cache_enabled
            && !refetch
            && inner.store.is_loaded(&inner.cache_key, &indexed)
        {
            counter!(METRIC_CACHE_HIT, "cache_key" => inner.cache_key.to_string()).increment(1);
            return Ok(self.select(params));
        }

        let key = PendingKey::load(&inner.cache_key, &indexed);
        let (request, joined) = inner.pending.join_or_start(key, || {
            // Only a request that starts after invalidation may consume the flag.
            let consumed = inner.invalidated.swap(false, Ordering::SeqCst);
            let loader = self.clone();
            let params = params.clone();
            async move {
                loader
                    .fetch_and_store(params, indexed, refetch || consumed, consumed)
                    .await
            }
            .boxed()
        });
        if joined {
            counter!(METRIC_DEDUP, "cache_key" => inner.cache_key.to_string()).increment(1);
            debug!(cache_key = %inner.cache_key, "Joined in-flight fetch");
        }

        request.await?;
        Ok(self.select(params))
    }

    async fn fetch_and_store(
        &self,
        params: Params,
        indexed: IndexedParams,
        refetch: bool,
        consumed_invalidation: bool,
    ) -> Result<usize, ApiError> {
        let inner = &self.inner;
        counter!(METRIC_FETCH, "cache_key" => inner.cache_key.to_string()).increment(1);

        let started = Instant::now();
        let fetched = inner.fetcher.fetch(&params).await.inspect_err(|err| {
            if consumed_invalidation {
                inner.invalidated.store(true, Ordering::SeqCst);
            }
            warn!(cache_key = %inner.cache_key, error = %err, "Fetch failed");
        })?;
        histogram!(METRIC_FETCH_MS, "cache_key" => inner.cache_key.to_string())
            .record(started.elapsed().as_secs_f64() * 1000.0);

        let fetched = match &inner.data_mapper {
            Some(mapper) => mapper(fetched, &params),
            None => fetched,
        };
        let items: Vec<Entity> = fetched
            .into_iter()
            .map(|item| tag_entity(item, indexed.as_params()))
            .collect();
        let count = items.len();
        let tag = indexed.tag();

        let replace = !inner.cache_enabled || refetch;
        let action = if replace {
            CacheAction::ReplaceAll {
                cache_key: inner.cache_key.clone(),
                items,
                params: Some(indexed),
            }
        } else {
            CacheAction::UpsertAll {
                unique_identifier: inner.unique_identifier.clone(),
                cache_key: inner.cache_key.clone(),
                items,
                params: indexed,
            }
        };
        let epoch = inner.store.dispatch(action);

        debug!(
            cache_key = %inner.cache_key,
            tag = %tag,
            items = count,
            replace,
            epoch,
            "Collection loaded"
        );
        Ok(count)
    }

    fn has_required_params(&self, params: &Params) -> bool {
        self.inner.required_params.iter().all(|key| {
            params
                .get(key)
                .is_some_and(|value| !matches!(value, Value::Null))
        })
    }

    /// The `index_by` subset of `params`, as stored in the params index.
    pub fn indexed_params(&self, params: &Params) -> IndexedParams {
        IndexedParams::from_params(params, &self.inner.index_by, &self.inner.all_key)
    }

    /// Memoized view of the cached collection for `params`; never fetches.
    pub fn select(&self, params: &Params) -> Arc<Vec<Entity>> {
        self.inner.selector.select(&self.inner.store, params)
    }

    /// True while a fetch for the subset `params` describes is in flight.
    pub fn is_loading(&self, params: &Params) -> bool {
        let key = PendingKey::load(&self.inner.cache_key, &self.indexed_params(params));
        self.inner.pending.is_pending(&key)
    }

    /// The next load replaces the collection instead of reading the cache.
    pub fn invalidate_cache(&self) {
        self.inner.invalidated.store(true, Ordering::SeqCst);
        debug!(cache_key = %self.inner.cache_key, "Cache invalidated");
    }

    pub fn is_invalidated(&self) -> bool {
        self.inner.invalidated.load(Ordering::SeqCst)
    }

    /// A fresh memoized selector over this loader's collection.
    pub fn selector_creator(&self) -> Selector {
        Selector::new(self.inner.cache_key.clone(), Arc::clone(&self.inner.derive))
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.inner.cache_key
    }

    pub fn index_by(&self) -> &[String] {
        &self.inner.index_by
    }

    pub fn required_params(&self) -> &[String] {
        &self.inner.required_params
    }

    pub fn unique_identifier(&self) -> &UniqueIdentifier {
        &self.inner.unique_identifier
    }

    pub fn entity_name(&self) -> &str {
        &self.inner.entity_name
    }

    pub fn cache_enabled(&self) -> bool {
        self.inner.cache_enabled
    }

    pub(crate) fn store(&self) -> &Arc<CacheStore> {
        &self.inner.store
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("cache_key", &self.inner.cache_key)
            .field("index_by", &self.inner.index_by)
            .field("required_params", &self.inner.required_params)
            .field("cache_enabled", &self.inner.cache_enabled)
            .finish_non_exhaustive()
    }
}
