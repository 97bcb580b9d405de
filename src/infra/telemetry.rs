use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "fleetview_loader_fetch_total",
            Unit::Count,
            "Total number of loader fetches sent to the API."
        );
        describe_counter!(
            "fleetview_loader_cache_hit_total",
            Unit::Count,
            "Total number of loads answered from the cache."
        );
        describe_counter!(
            "fleetview_loader_dedup_total",
            Unit::Count,
            "Total number of loads that joined an in-flight fetch."
        );
        describe_counter!(
            "fleetview_loader_gate_skip_total",
            Unit::Count,
            "Total number of loads skipped for missing required params."
        );
        describe_histogram!(
            "fleetview_loader_fetch_ms",
            Unit::Milliseconds,
            "Loader fetch latency in milliseconds."
        );
        describe_counter!(
            "fleetview_store_mutation_total",
            Unit::Count,
            "Total number of cache actions applied to the store."
        );
        describe_counter!(
            "fleetview_updater_failure_total",
            Unit::Count,
            "Total number of failed updater operations."
        );
        describe_gauge!(
            "fleetview_pending_requests",
            Unit::Count,
            "Current number of in-flight loader or updater requests."
        );
    });
}
