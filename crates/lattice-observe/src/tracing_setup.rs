//! Tracing initialization.
//!
//! Installs the process-global subscriber once: a structured `fmt` layer, a
//! `RUST_LOG`-derived filter (defaulting to `info` when unset), and
//! optionally an OpenTelemetry bridge for span export.

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Where exported spans go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceExport {
    /// Structured logs only; no span export.
    Disabled,
    /// Bridge spans to OpenTelemetry with the stdout exporter. Meant for
    /// local inspection; production wiring swaps in an OTLP exporter here.
    Stdout,
}

/// Keeps the provider reachable for [`shutdown`].
static PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Install the global subscriber.
///
/// Errors if a subscriber is already installed for this process.
pub fn init(export: TraceExport) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    match export {
        TraceExport::Disabled => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        TraceExport::Stdout => {
            let provider = SdkTracerProvider::builder()
                .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
                .build();
            let otel_layer =
                tracing_opentelemetry::layer().with_tracer(provider.tracer("lattice"));

            let _ = PROVIDER.set(provider.clone());
            opentelemetry::global::set_tracer_provider(provider);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .with(otel_layer)
                .try_init()?;
        }
    }

    Ok(())
}

/// Flush pending spans and shut the exporter down before process exit.
/// No-op when span export was never enabled.
pub fn shutdown() {
    if let Some(provider) = PROVIDER.get() {
        if let Err(err) = provider.shutdown() {
            eprintln!("trace exporter shutdown failed: {err}");
        }
    }
}
