use std::time::Duration;

use opentelemetry::trace::TracerProvider;
use opentelemetry::{KeyValue, global};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{self, Protocol, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::constants::{SERVICE_NAME, TRACER_NAME};

pub type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>;

/// Used when `RUST_LOG` is unset or unparsable
pub const DEFAULT_FILTER: &str = "mention_board=debug,tower_http=debug,axum=debug,info";

/// Owns the tracing subscriber setup and, when a collector is configured, the OTLP providers
/// that must be flushed before the process exits.
#[derive(Debug)]
pub struct Telemetry {
    exporters: Option<OtlpProviders>,
}

#[derive(Debug)]
struct OtlpProviders {
    logger_provider: SdkLoggerProvider,
    tracer_provider: SdkTracerProvider,
}

impl Telemetry {
    /// `collector_url` is an OTLP/gRPC endpoint; `None` keeps logging on stdout only.
    pub fn new(collector_url: Option<&str>) -> Result<Telemetry> {
        let exporters = match collector_url {
            Some(url) => {
                let base_resource = base_attrs(SERVICE_NAME, env!("CARGO_PKG_VERSION"));
                Some(OtlpProviders {
                    logger_provider: build_logger_provider(url, base_resource.clone())?,
                    tracer_provider: build_tracer_provider(url, base_resource)?,
                })
            }
            None => None,
        };

        Ok(Self { exporters })
    }

    pub fn is_exporting(&self) -> bool {
        self.exporters.is_some()
    }

    pub fn register(self) -> Self {
        let (trace_layer, log_layer) = match &self.exporters {
            Some(providers) => {
                global::set_tracer_provider(providers.tracer_provider.clone());
                let tracer = providers.tracer_provider.tracer(TRACER_NAME);

                (
                    Some(tracing_opentelemetry::layer().with_tracer(tracer)),
                    Some(OpenTelemetryTracingBridge::new(&providers.logger_provider)),
                )
            }
            None => (None, None),
        };

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        tracing_subscriber::registry()
            .with(trace_layer)
            .with(log_layer)
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true),
            )
            .init();

        self
    }

    pub fn shutdown(self) {
        let Some(providers) = self.exporters else {
            return;
        };

        if let Err(e) = providers.logger_provider.shutdown() {
            eprintln!("error during logging shutdown: {e:?}");
        } else {
            println!("logging shut down ok");
        }

        if let Err(e) = providers.tracer_provider.shutdown() {
            eprintln!("error during tracing shutdown: {e:?}");
        } else {
            println!("tracing shut down ok");
        }
    }
}

pub fn build_logger_provider(
    collector_url: &str,
    base_resource: Resource,
) -> Result<SdkLoggerProvider> {
    let exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(collector_url)
        .with_timeout(Duration::from_secs(5))
        .build()?;

    Ok(SdkLoggerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(base_resource)
        .build())
}

pub fn build_tracer_provider(
    collector_url: &str,
    base_resource: Resource,
) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(collector_url)
        .with_timeout(Duration::from_secs(5))
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(base_resource)
        .build())
}

fn base_attrs(name: &'static str, version: &'static str) -> Resource {
    Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", name),
            KeyValue::new("service.version", version),
        ])
        .build()
}
