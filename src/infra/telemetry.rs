use std::{io, sync::Once};

use metrics::{Unit, describe_counter, describe_gauge};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::preview::renderer::{
        METRIC_RENDER_FAILURES_TOTAL, METRIC_RENDERS_TOTAL, METRIC_RUNTIME_FAULTS_TOTAL,
        METRIC_SUPERSEDED_TOTAL,
    },
    config::{LogFormat, LoggingSettings},
};

use super::{
    error::InfraError,
    sandbox::{METRIC_SESSIONS_EVICTED_TOTAL, METRIC_SESSIONS_OPEN},
};

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
/// Records go to stderr so `compose` output on stdout stays a clean document.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .with_writer(io::stderr)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(io::stderr)
            .compact()
            .with_target(true)
            .boxed(),
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
            METRIC_RENDERS_TOTAL,
            Unit::Count,
            "Total number of preview render cycles started."
        );
        describe_counter!(
            METRIC_SUPERSEDED_TOTAL,
            Unit::Count,
            "Total number of render cycles replaced while still loading."
        );
        describe_counter!(
            METRIC_RUNTIME_FAULTS_TOTAL,
            Unit::Count,
            "Total number of runtime errors reported by sandboxed previews."
        );
        describe_counter!(
            METRIC_RENDER_FAILURES_TOTAL,
            Unit::Count,
            "Total number of render cycles that ended in an error status."
        );
        describe_gauge!(
            METRIC_SESSIONS_OPEN,
            Unit::Count,
            "Current number of open preview sessions."
        );
        describe_counter!(
            METRIC_SESSIONS_EVICTED_TOTAL,
            Unit::Count,
            "Total number of preview sessions evicted after going idle."
        );
    });
}
