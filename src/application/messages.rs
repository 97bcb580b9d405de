//! Outcome messages for updater operations and the listener that receives them.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use crate::domain::entity::{Entity, Params, UniqueIdentifier};
use crate::domain::error::ApiError;
use crate::domain::types::Operation;

/// Inputs available to a custom success message.
#[derive(Debug, Clone, Copy)]
pub struct SuccessContext<'a> {
    /// Selector view after the post-mutation reload.
    pub updated_items: &'a [Entity],
    /// Selector view captured before the mutation.
    pub prev_items: &'a [Entity],
    pub params: &'a Params,
    pub operation: &'a Operation,
}

/// Inputs available to a custom error message.
#[derive(Debug, Clone, Copy)]
pub struct ErrorContext<'a> {
    pub prev_items: &'a [Entity],
    pub params: &'a Params,
    pub error: &'a ApiError,
    pub operation: &'a Operation,
}

pub type SuccessTemplate = Arc<dyn Fn(&SuccessContext<'_>) -> String + Send + Sync>;
pub type ErrorTemplate = Arc<dyn Fn(&ErrorContext<'_>) -> String + Send + Sync>;

pub fn default_success_message(entity_name: &str, operation: &Operation) -> String {
    format!("Successfully {} {entity_name}", operation.past_tense())
}

pub fn default_error_message(
    entity_name: &str,
    unique_identifier: &UniqueIdentifier,
    context: &ErrorContext<'_>,
) -> String {
    if context.error.is_not_found() {
        let value = match context.error.missing_id() {
            Some(id) => id.to_string(),
            None => unique_identifier.describe(&Value::Object(context.params.clone())),
        };
        format!(
            "Unable to find {entity_name} with {unique_identifier}: {value} when trying to {}",
            context.operation
        )
    } else {
        format!(
            "Error when trying to {} {entity_name}",
            context.operation
        )
    }
}

/// Receives the outcome of every updater call.
pub trait UpdateListener: Send + Sync {
    fn on_success(&self, message: &str, params: &Params);
    fn on_error(&self, message: &str, error: &ApiError, params: &Params);
}

/// Writes outcomes to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogListener;

impl UpdateListener for LogListener {
    fn on_success(&self, message: &str, _params: &Params) {
        info!(target: "fleetview::updater", "{message}");
    }

    fn on_error(&self, message: &str, error: &ApiError, _params: &Params) {
        error!(target: "fleetview::updater", error = %error, "{message}");
    }
}
