//! Cache actions.
//!
//! The five mutations the cache store accepts. Every write to cached
//! collections is expressed as one of these and goes through
//! [`CacheStore::dispatch`](super::store::CacheStore::dispatch).

use crate::domain::entity::{Entity, Params, UniqueIdentifier};

use super::keys::{CacheKey, IndexedParams};

/// Monotonic epoch assigned to each dispatched action.
pub type Epoch = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum CacheAction {
    /// Replace the whole collection; the params index is reset to `params`.
    ReplaceAll {
        cache_key: CacheKey,
        items: Vec<Entity>,
        params: Option<IndexedParams>,
    },
    /// Merge a fetched subset by identifier, leaving other subsets untouched.
    UpsertAll {
        unique_identifier: UniqueIdentifier,
        cache_key: CacheKey,
        items: Vec<Entity>,
        params: IndexedParams,
    },
    /// Append one entity tagged with `params`.
    AddItem {
        cache_key: CacheKey,
        item: Entity,
        params: IndexedParams,
    },
    /// Replace the entity with the same identifier.
    UpdateItem {
        unique_identifier: UniqueIdentifier,
        cache_key: CacheKey,
        item: Entity,
        params: IndexedParams,
    },
    /// Remove the entity whose identifier appears in `params`.
    RemoveItem {
        unique_identifier: UniqueIdentifier,
        cache_key: CacheKey,
        params: Params,
    },
}

impl CacheAction {
    pub fn cache_key(&self) -> &CacheKey {
        match self {
            CacheAction::ReplaceAll { cache_key, .. }
            | CacheAction::UpsertAll { cache_key, .. }
            | CacheAction::AddItem { cache_key, .. }
            | CacheAction::UpdateItem { cache_key, .. }
            | CacheAction::RemoveItem { cache_key, .. } => cache_key,
        }
    }

    /// Metric and log label.
    pub fn kind(&self) -> &'static str {
        match self {
            CacheAction::ReplaceAll { .. } => "replace_all",
            CacheAction::UpsertAll { .. } => "upsert_all",
            CacheAction::AddItem { .. } => "add_item",
            CacheAction::UpdateItem { .. } => "update_item",
            CacheAction::RemoveItem { .. } => "remove_item",
        }
    }
}
