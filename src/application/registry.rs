//! Loader and updater registry.
//!
//! Owns the cache store and the in-flight request tables, and maps each
//! [`CacheKey`] to its loader and each `(CacheKey, Operation)` to its updater.
//! Views share one registry through an `Arc`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::cache::{CacheConfig, CacheKey, CacheStore, PendingRequests, rw_read, rw_write};
use crate::domain::entity::Entity;
use crate::domain::types::Operation;

use super::error::AppError;
use super::loader::{Loader, LoaderOptions};
use super::sources::{EntityFetcher, EntityMutator};
use super::updater::{Updater, UpdaterOptions};

const SOURCE: &str = "application::registry";

pub struct DataRegistry {
    config: CacheConfig,
    store: Arc<CacheStore>,
    load_requests: Arc<PendingRequests<usize>>,
    update_requests: Arc<PendingRequests<Entity>>,
    loaders: RwLock<HashMap<CacheKey, Loader>>,
    updaters: RwLock<HashMap<(CacheKey, Operation), Updater>>,
}

impl DataRegistry {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            store: Arc::new(CacheStore::new()),
            load_requests: Arc::new(PendingRequests::new("loader")),
            update_requests: Arc::new(PendingRequests::new("updater")),
            loaders: RwLock::new(HashMap::new()),
            updaters: RwLock::new(HashMap::new()),
        }
    }

    /// Build a loader and register it under `cache_key`, replacing (with a
    /// warning) any loader already registered there.
    pub fn create_loader<F>(
        &self,
        cache_key: impl Into<CacheKey>,
        fetcher: F,
        options: LoaderOptions,
    ) -> Loader
    where
        F: EntityFetcher + 'static,
    {
        let cache_key = cache_key.into();
        let loader = Loader::new(
            cache_key.clone(),
            Arc::new(fetcher),
            options,
            &self.config,
            Arc::clone(&self.store),
            Arc::clone(&self.load_requests),
        );

        let previous = rw_write(&self.loaders, SOURCE, "create_loader")
            .insert(cache_key.clone(), loader.clone());
        if previous.is_some() {
            warn!(cache_key = %cache_key, "Loader re-registered; previous loader replaced");
        } else {
            debug!(cache_key = %cache_key, "Loader registered");
        }
        loader
    }

    /// Build an updater for `options.operation` on `cache_key`.
    ///
    /// Fails when `options.loader` is unset and no loader is registered
    /// under `cache_key`.
    pub fn create_updater<M>(
        &self,
        cache_key: impl Into<CacheKey>,
        mutator: M,
        options: UpdaterOptions,
    ) -> Result<Updater, AppError>
    where
        M: EntityMutator + 'static,
    {
        let cache_key = cache_key.into();
        let loader = match options.loader.clone() {
            Some(loader) => loader,
            None => self
                .loader(cache_key.as_str())
                .ok_or_else(|| AppError::missing_loader(&cache_key))?,
        };

        let operation = options.operation.clone();
        let updater = Updater::new(
            cache_key.clone(),
            Arc::new(mutator),
            loader,
            options,
            Arc::clone(&self.update_requests),
        );

        let previous = rw_write(&self.updaters, SOURCE, "create_updater")
            .insert((cache_key.clone(), operation.clone()), updater.clone());
        if previous.is_some() {
            warn!(
                cache_key = %cache_key,
                operation = %operation,
                "Updater re-registered; previous updater replaced"
            );
        } else {
            debug!(cache_key = %cache_key, operation = %operation, "Updater registered");
        }
        Ok(updater)
    }

    pub fn loader(&self, cache_key: &str) -> Option<Loader> {
        rw_read(&self.loaders, SOURCE, "loader")
            .get(cache_key)
            .cloned()
    }

    pub fn updater(&self, cache_key: &str, operation: &Operation) -> Option<Updater> {
        rw_read(&self.updaters, SOURCE, "updater")
            .get(&(CacheKey::from(cache_key), operation.clone()))
            .cloned()
    }

    /// Forget every registered loader and updater. Cached data is kept.
    pub fn reset(&self) {
        rw_write(&self.loaders, SOURCE, "reset").clear();
        rw_write(&self.updaters, SOURCE, "reset").clear();
        debug!("Registry reset");
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of fetches and mutations currently in flight.
    pub fn pending_requests(&self) -> usize {
        self.load_requests.len() + self.update_requests.len()
    }
}

impl fmt::Debug for DataRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataRegistry")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for DataRegistry {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
