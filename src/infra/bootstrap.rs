//! Runtime bootstrap: settings, telemetry and the shared registry.

use std::path::Path;
use std::sync::Arc;

use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

use crate::application::error::AppError;
use crate::application::registry::DataRegistry;
use crate::cache::CacheConfig;
use crate::config;

use super::telemetry;

/// Load settings from the layered sources, install the tracing subscriber
/// and build the registry every view will share.
pub fn init(config_path: Option<&Path>) -> Result<Arc<DataRegistry>, AppError> {
    let settings = config::load(config_path)?;
    telemetry::init(&settings.logging)?;

    let cache_config = CacheConfig::from(&settings.cache);
    info!(
        enabled = cache_config.enabled,
        all_key = %cache_config.all_key,
        unique_identifier = %cache_config.unique_identifier,
        "Data registry ready"
    );
    Ok(Arc::new(DataRegistry::new(cache_config)))
}

/// Log a startup failure, falling back to a stderr subscriber when
/// telemetry never came up.
pub fn report_error(error: &AppError) {
    let report = error.report();
    if dispatcher::has_been_set() {
        error!(source = report.source, chain = ?report.messages, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(source = report.source, chain = ?report.messages, "application error");
    });
}
