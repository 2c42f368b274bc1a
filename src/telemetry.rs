use once_cell::sync::OnceCell;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::Resource;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

static METER_PROVIDER: OnceCell<SdkMeterProvider> = OnceCell::new();

const METER_NAME: &str = "doc-translation";

/// Which event source triggered a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    S3,
    Stream,
    Event,
    Pii,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::S3 => "s3",
            Trigger::Stream => "stream",
            Trigger::Event => "event",
            Trigger::Pii => "pii",
        }
    }
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_current_span(false)
        .init();
}

/// Install an OTLP/HTTP meter provider exporting to `endpoint`
/// (the ADOT collector extension listens on 127.0.0.1:4318).
pub fn init_metrics(service_name: &str, endpoint: &str) -> Result<(), Box<dyn std::error::Error>> {
    if METER_PROVIDER.get().is_some() {
        debug!("Meter provider already installed");
        return Ok(());
    }

    let resource = Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("application", "DocumentTranslation"),
        KeyValue::new("component", "execution-dispatch"),
    ]);

    let meter_provider = opentelemetry_otlp::new_pipeline()
        .metrics(opentelemetry_sdk::runtime::Tokio)
        .with_resource(resource)
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .http()
                .with_endpoint(endpoint),
        )
        .build()?;

    install_meter_provider(meter_provider);
    Ok(())
}

/// Make `provider` the global one unless a provider is already installed.
/// The flushed provider and the global provider are always the same.
fn install_meter_provider(provider: SdkMeterProvider) -> bool {
    match METER_PROVIDER.set(provider.clone()) {
        Ok(()) => {
            global::set_meter_provider(provider);
            true
        }
        Err(_) => {
            warn!("Meter provider already installed, keeping the first one");
            false
        }
    }
}

/// Count one dispatch outcome.
pub fn record_dispatch(trigger: Trigger, outcome: &'static str) {
    let meter = global::meter(METER_NAME);
    let counter = meter.u64_counter("doc_translation.dispatch").init();
    counter.add(
        1,
        &[
            KeyValue::new("trigger", trigger.as_str()),
            KeyValue::new("outcome", outcome),
        ],
    );
}

/// Export pending metrics before Lambda freezes the environment.
pub fn flush_metrics() {
    if let Some(provider) = METER_PROVIDER.get() {
        match provider.force_flush() {
            Ok(()) => debug!("Flushed metrics"),
            Err(e) => warn!("Failed to flush metrics: {}", e),
        }
    }
}
