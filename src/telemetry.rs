use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::{Protocol, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{SERVICE_NAME, SERVICE_VERSION},
    resource::DEPLOYMENT_ENVIRONMENT_NAME,
};
use tonic::metadata::{Ascii, MetadataMap, MetadataValue};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::env::Settings;
use crate::error::AppError;

fn resource(settings: &Settings) -> Resource {
    Resource::builder()
        .with_schema_url(
            [
                KeyValue::new(SERVICE_NAME, env!("CARGO_PKG_NAME")),
                KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
                KeyValue::new(
                    DEPLOYMENT_ENVIRONMENT_NAME,
                    settings.deployment_environment.clone(),
                ),
            ],
            SCHEMA_URL,
        )
        .build()
}

// Construct TracerProvider for OpenTelemetryLayer
fn init_tracer_provider(
    settings: &Settings,
    endpoint: &str,
) -> Result<SdkTracerProvider, AppError> {
    let mut metadata = MetadataMap::new();
    if let Some(api_key) = &settings.honeycomb_api_key {
        let value: MetadataValue<Ascii> = api_key.parse().map_err(|_| {
            AppError::Configuration("HONEYCOMB_API_KEY is not a valid header value".to_string())
        })?;
        metadata.insert("x-honeycomb-team", value);
    }

    let mut builder = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_protocol(Protocol::Grpc)
        .with_metadata(metadata);

    if endpoint.starts_with("https://") {
        builder =
            builder.with_tls_config(tonic::transport::ClientTlsConfig::new().with_native_roots());
    }

    let exporter = builder
        .build()
        .map_err(|e| AppError::Configuration(format!("Failed to build span exporter: {}", e)))?;

    let tracer_provider = SdkTracerProvider::builder()
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource(settings))
        .with_batch_exporter(exporter)
        .build();

    Ok(tracer_provider)
}

pub struct OtelGuard {
    tracer_provider: SdkTracerProvider,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Err(err) = self.tracer_provider.shutdown() {
            eprintln!("Failed to shut down tracer provider: {:?}", err);
        }
    }
}

/// Installs the global subscriber: env-filtered fmt output, plus OTLP span
/// export when an endpoint is configured. Keep the returned guard alive for
/// the lifetime of the process.
pub fn init_tracing(settings: &Settings) -> Result<Option<OtelGuard>, AppError> {
    let env_filter =
        EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer());

    let Some(endpoint) = settings.otlp_endpoint.as_deref() else {
        registry
            .try_init()
            .map_err(|e| AppError::Internal(format!("Failed to install subscriber: {}", e)))?;
        return Ok(None);
    };

    let tracer_provider = init_tracer_provider(settings, endpoint)?;
    let tracer = tracer_provider.tracer("nutriplatform");

    registry
        .with(OpenTelemetryLayer::new(tracer))
        .try_init()
        .map_err(|e| AppError::Internal(format!("Failed to install subscriber: {}", e)))?;

    tracing::info!(endpoint, "Exporting traces over OTLP");
    Ok(Some(OtelGuard { tracer_provider }))
}
