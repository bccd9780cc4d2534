//! Structured telemetry initialisation for the daemon.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::{self, time::UtcTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{Layer, Registry};

use webby_config::LogFormat;

use crate::logging::LogSink;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber routing events through `sink`.
///
/// Repeated calls are idempotent: only the first invocation installs the
/// subscriber, so the sink passed first stays in effect for the process.
pub fn initialise(sink: &LogSink, format: LogFormat) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(sink, format))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(sink: &LogSink, format: LogFormat) -> Result<(), TelemetryError> {
    let layers = vec![print_layer(sink, format), record_layer(sink, format)];
    let subscriber = Registry::default().with(layers);
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

fn print_layer(sink: &LogSink, format: LogFormat) -> BoxedLayer {
    let gate = sink.clone();
    let filter = filter_fn(move |metadata| gate.prints(metadata.level()));
    let builder = fmt::layer()
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339());
    match format {
        LogFormat::Json => builder.json().flatten_event(true).with_filter(filter).boxed(),
        LogFormat::Compact => builder.compact().with_filter(filter).boxed(),
    }
}

fn record_layer(sink: &LogSink, format: LogFormat) -> BoxedLayer {
    let gate = sink.clone();
    let filter = filter_fn(move |metadata| gate.records(metadata.level()));
    let destination = sink.clone();
    let builder = fmt::layer()
        .with_target(true)
        .with_writer(move || destination.record_writer())
        .with_ansi(false)
        .with_timer(UtcTime::rfc_3339());
    match format {
        LogFormat::Json => builder.json().flatten_event(true).with_filter(filter).boxed(),
        LogFormat::Compact => builder.compact().with_filter(filter).boxed(),
    }
}
