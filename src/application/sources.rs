//! Traits describing the remote API functions loaders and updaters call.
//!
//! Closures returning futures implement both traits, so API-client code can
//! hand over `|params| async move { client.list_pods(params).await }`.

use std::future::Future;

use async_trait::async_trait;

use crate::domain::entity::{Entity, Params};
use crate::domain::error::ApiError;

/// Fetches one entity collection (or a subset of it).
#[async_trait]
pub trait EntityFetcher: Send + Sync {
    async fn fetch(&self, params: &Params) -> Result<Vec<Entity>, ApiError>;
}

/// Performs a remote mutation. `prev_items` is the cached view before the
/// call, so implementations can diff old and new values.
#[async_trait]
pub trait EntityMutator: Send + Sync {
    async fn mutate(&self, params: &Params, prev_items: &[Entity]) -> Result<Entity, ApiError>;
}

#[async_trait]
impl<F, Fut> EntityFetcher for F
where
    F: Fn(Params) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Entity>, ApiError>> + Send + 'static,
{
    async fn fetch(&self, params: &Params) -> Result<Vec<Entity>, ApiError> {
        (self)(params.clone()).await
    }
}

#[async_trait]
impl<F, Fut> EntityMutator for F
where
    F: Fn(Params, Vec<Entity>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Entity, ApiError>> + Send + 'static,
{
    async fn mutate(&self, params: &Params, prev_items: &[Entity]) -> Result<Entity, ApiError> {
        (self)(params.clone(), prev_items.to_vec()).await
    }
}
