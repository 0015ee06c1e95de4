use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    filter::LevelFilter,
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
        .with_default_directive(LevelFilter::from(logging.level).into())
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
            "bookworm_cache_hit_total",
            Unit::Count,
            "Total number of fresh cache hits."
        );
        describe_counter!(
            "bookworm_cache_miss_total",
            Unit::Count,
            "Total number of reads that needed a fetch."
        );
        describe_counter!(
            "bookworm_cache_join_total",
            Unit::Count,
            "Total number of reads that joined an in-flight fetch."
        );
        describe_counter!(
            "bookworm_cache_fetch_error_total",
            Unit::Count,
            "Total number of fetches that failed."
        );
        describe_counter!(
            "bookworm_cache_optimistic_write_total",
            Unit::Count,
            "Total number of optimistic cache writes."
        );
        describe_counter!(
            "bookworm_cache_rollback_total",
            Unit::Count,
            "Total number of mutations rolled back."
        );
        describe_counter!(
            "bookworm_cache_superseded_total",
            Unit::Count,
            "Total number of in-flight fetches retired by a newer write."
        );
    });
}
