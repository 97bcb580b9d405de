//! Updaters: run a remote mutation and reconcile the cached collection.

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use metrics::counter;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheAction, CacheKey, PendingKey, PendingRequests};
use crate::domain::entity::{Entity, Params, UniqueIdentifier};
use crate::domain::error::ApiError;
use crate::domain::types::Operation;

use super::loader::Loader;
use super::messages::{
    ErrorContext, ErrorTemplate, SuccessContext, SuccessTemplate, UpdateListener,
    default_error_message, default_success_message,
};
use super::sources::EntityMutator;

const METRIC_UPDATER_FAILURE: &str = "fleetview_updater_failure_total";

/// `(succeeded, output)`; the output is `None` on failure.
pub type UpdateOutcome = (bool, Option<Entity>);

#[derive(Clone, Default)]
pub struct UpdaterOptions {
    pub operation: Operation,
    /// Defaults to the loader's identifier.
    pub unique_identifier: Option<UniqueIdentifier>,
    /// Defaults to the loader's entity name.
    pub entity_name: Option<String>,
    /// Loader to reconcile through; defaults to the one registered under the
    /// same cache key.
    pub loader: Option<Loader>,
    pub success_message: Option<SuccessTemplate>,
    pub error_message: Option<ErrorTemplate>,
}

#[derive(Clone)]
pub struct Updater {
    inner: Arc<UpdaterInner>,
}

struct UpdaterInner {
    cache_key: CacheKey,
    entity_name: String,
    operation: Operation,
    unique_identifier: UniqueIdentifier,
    mutator: Arc<dyn EntityMutator>,
    loader: Loader,
    success_message: Option<SuccessTemplate>,
    error_message: Option<ErrorTemplate>,
    pending: Arc<PendingRequests<Entity>>,
}

impl Updater {
    /// `options.loader` must already be resolved.
    pub(crate) fn new(
        cache_key: CacheKey,
        mutator: Arc<dyn EntityMutator>,
        loader: Loader,
        options: UpdaterOptions,
        pending: Arc<PendingRequests<Entity>>,
    ) -> Self {
        let UpdaterOptions {
            operation,
            unique_identifier,
            entity_name,
            success_message,
            error_message,
            ..
        } = options;

        Self {
            inner: Arc::new(UpdaterInner {
                entity_name: entity_name.unwrap_or_else(|| loader.entity_name().to_string()),
                unique_identifier: unique_identifier
                    .unwrap_or_else(|| loader.unique_identifier().clone()),
                cache_key,
                operation,
                mutator,
                loader,
                success_message,
                error_message,
                pending,
            }),
        }
    }

    /// Run the mutation for `params` and report the outcome to `listener`.
    ///
    /// Never fails: errors become `(false, None)` plus one `on_error` call.
    /// Concurrent calls with equal params share one mutation; each caller
    /// still gets its own reload, message and listener call.
    pub async fn update(&self, params: Params, listener: &dyn UpdateListener) -> UpdateOutcome {
        let inner = &self.inner;
        let prev_items = inner.loader.select(&params);

        let key = PendingKey::update(&inner.cache_key, &inner.operation, &params);
        let (request, joined) = inner.pending.join_or_start(key, || {
            let updater = self.clone();
            let params = params.clone();
            let prev_items = Arc::clone(&prev_items);
            async move { updater.mutate_and_store(params, prev_items).await }.boxed()
        });
        if joined {
            debug!(
                cache_key = %inner.cache_key,
                operation = %inner.operation,
                "Joined in-flight mutation"
            );
        }

        match request.await {
            Ok(output) => {
                let updated_items = match inner.loader.load(&params).await {
                    Ok(items) => items,
                    Err(err) => {
                        warn!(
                            cache_key = %inner.cache_key,
                            error = %err,
                            "Reload after mutation failed"
                        );
                        inner.loader.select(&params)
                    }
                };
                let message = self.success_message(&SuccessContext {
                    updated_items: &updated_items,
                    prev_items: &prev_items,
                    params: &params,
                    operation: &inner.operation,
                });
                listener.on_success(&message, &params);
                (true, Some(output))
            }
            Err(err) => {
                counter!(
                    METRIC_UPDATER_FAILURE,
                    "cache_key" => inner.cache_key.to_string(),
                    "operation" => inner.operation.to_string()
                )
                .increment(1);
                warn!(
                    cache_key = %inner.cache_key,
                    operation = %inner.operation,
                    error = %err,
                    "Mutation failed"
                );
                let message = self.error_message(&ErrorContext {
                    prev_items: &prev_items,
                    params: &params,
                    error: &err,
                    operation: &inner.operation,
                });
                listener.on_error(&message, &err, &params);
                (false, None)
            }
        }
    }

    async fn mutate_and_store(
        &self,
        params: Params,
        prev_items: Arc<Vec<Entity>>,
    ) -> Result<Entity, ApiError> {
        let inner = &self.inner;
        let output = inner.mutator.mutate(&params, &prev_items).await?;
        let indexed = inner.loader.indexed_params(&params);
        let cache_key = inner.cache_key.clone();

        let action = match &inner.operation {
            Operation::Create => CacheAction::AddItem {
                cache_key,
                item: output.clone(),
                params: indexed,
            },
            Operation::Update => CacheAction::UpdateItem {
                unique_identifier: inner.unique_identifier.clone(),
                cache_key,
                item: output.clone(),
                params: indexed,
            },
            Operation::Delete => CacheAction::RemoveItem {
                unique_identifier: inner.unique_identifier.clone(),
                cache_key,
                params,
            },
            Operation::Any | Operation::Custom(_) => CacheAction::ReplaceAll {
                cache_key,
                items: collection_of(output.clone()),
                params: Some(indexed),
            },
        };
        inner.loader.store().dispatch(action);
        Ok(output)
    }

    fn success_message(&self, context: &SuccessContext<'_>) -> String {
        match &self.inner.success_message {
            Some(template) => template(context),
            None => default_success_message(&self.inner.entity_name, context.operation),
        }
    }

    fn error_message(&self, context: &ErrorContext<'_>) -> String {
        match &self.inner.error_message {
            Some(template) => template(context),
            None => default_error_message(
                &self.inner.entity_name,
                &self.inner.unique_identifier,
                context,
            ),
        }
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.inner.cache_key
    }

    pub fn operation(&self) -> &Operation {
        &self.inner.operation
    }

    pub fn entity_name(&self) -> &str {
        &self.inner.entity_name
    }

    pub fn loader(&self) -> &Loader {
        &self.inner.loader
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("cache_key", &self.inner.cache_key)
            .field("operation", &self.inner.operation)
            .finish_non_exhaustive()
    }
}

/// Output of a whole-collection mutation as the new collection.
fn collection_of(output: Entity) -> Vec<Entity> {
    match output {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn array_output_becomes_the_collection() {
        assert_eq!(
            collection_of(json!([{ "id": 1 }, { "id": 2 }])),
            vec![json!({ "id": 1 }), json!({ "id": 2 })]
        );
        assert_eq!(collection_of(json!({ "id": 3 })), vec![json!({ "id": 3 })]);
        assert!(collection_of(Value::Null).is_empty());
    }
}
