//! Log output and optional OTLP span export for the server.
//!
//! Logs always go to stderr. Spans are additionally exported over OTLP/gRPC
//! when `OTEL_EXPORTER_OTLP_ENDPOINT` is set; `OTEL_EXPORTER_OTLP_HEADERS`
//! (`k1=v1,k2=v2`) and `OTEL_SERVICE_INSTANCE_ID` are honoured.

use anyhow::{Result, anyhow};
use once_cell::sync::OnceCell;
use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    propagation::TraceContextPropagator,
    trace::{SdkTracerProvider, Tracer},
};
use std::{env::var, time::Duration};
use tonic::{
    metadata::{Ascii, MetadataKey, MetadataMap, MetadataValue},
    transport::ClientTlsConfig,
};
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};
use ulid::Ulid;

use crate::GIT_COMMIT_HASH;

static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

#[derive(Debug, PartialEq, Eq)]
struct OtlpConfig {
    endpoint: String,
    headers: Vec<(String, String)>,
    instance_id: Option<String>,
}

impl OtlpConfig {
    /// `None` when no endpoint is configured.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let endpoint = lookup("OTEL_EXPORTER_OTLP_ENDPOINT")
            .map(|endpoint| endpoint.trim().trim_end_matches('/').to_string())
            .filter(|endpoint| !endpoint.is_empty())?;
        let endpoint = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint
        } else {
            format!("https://{endpoint}")
        };

        let headers = lookup("OTEL_EXPORTER_OTLP_HEADERS")
            .map(|raw| {
                raw.split(',')
                    .filter_map(|pair| pair.split_once('='))
                    .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim().to_string()))
                    .filter(|(key, _)| !key.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Some(Self {
            endpoint,
            headers,
            instance_id: lookup("OTEL_SERVICE_INSTANCE_ID").filter(|id| !id.is_empty()),
        })
    }

    /// Host to verify the collector certificate against, for `https` endpoints.
    fn tls_domain(&self) -> Option<&str> {
        let authority = self.endpoint.strip_prefix("https://")?.split('/').next()?;
        authority.split(':').next().filter(|host| !host.is_empty())
    }

    fn metadata(&self) -> Result<MetadataMap> {
        let mut metadata = MetadataMap::with_capacity(self.headers.len());
        for (key, value) in &self.headers {
            let name = MetadataKey::<Ascii>::from_bytes(key.as_bytes())
                .map_err(|err| anyhow!("invalid OTLP header name {key}: {err}"))?;
            let value: MetadataValue<Ascii> = value
                .parse()
                .map_err(|err| anyhow!("invalid OTLP header value for {key}: {err}"))?;
            metadata.insert(name, value);
        }
        Ok(metadata)
    }
}

fn init_tracer(config: &OtlpConfig) -> Result<Tracer> {
    let mut builder = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.endpoint)
        .with_compression(Compression::Gzip)
        .with_timeout(Duration::from_secs(3));

    if let Some(domain) = config.tls_domain() {
        builder = builder.with_tls_config(
            ClientTlsConfig::new()
                .domain_name(domain.to_string())
                .with_native_roots(),
        );
    }
    if !config.headers.is_empty() {
        builder = builder.with_metadata(config.metadata()?);
    }

    let instance_id = config
        .instance_id
        .clone()
        .unwrap_or_else(|| Ulid::new().to_string());

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(builder.build()?)
        .with_resource(
            Resource::builder_empty()
                .with_attributes(vec![
                    KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    KeyValue::new("service.instance.id", instance_id),
                    KeyValue::new("vcs.revision", GIT_COMMIT_HASH),
                ])
                .build(),
        )
        .build();

    let _ = TRACER_PROVIDER.set(provider.clone());
    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TraceContextPropagator::new());

    Ok(provider.tracer(env!("CARGO_PKG_NAME")))
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the level derived from `-v`. The HTTP, gRPC and
/// database client crates stay quiet unless asked for explicitly.
///
/// # Errors
///
/// Returns an error if the exporter or subscriber cannot be initialized.
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.unwrap_or(Level::ERROR).into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("h2=error".parse()?)
        .add_directive("tonic=warn".parse()?)
        .add_directive("sqlx=warn".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?);

    let otel_layer = match OtlpConfig::from_lookup(|name| var(name).ok()) {
        Some(config) => Some(tracing_opentelemetry::layer().with_tracer(init_tracer(&config)?)),
        None => None,
    };

    let subscriber = Registry::default()
        .with(fmt::layer().with_target(false).pretty())
        .with(otel_layer)
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Flush pending spans; does nothing when export is disabled.
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(err) = provider.shutdown() {
            debug!("tracer provider shutdown failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn otlp_config(vars: &[(&str, &str)]) -> Option<OtlpConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        OtlpConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn export_disabled_without_endpoint() {
        assert_eq!(otlp_config(&[]), None);
        assert_eq!(otlp_config(&[("OTEL_EXPORTER_OTLP_ENDPOINT", "  ")]), None);
    }

    #[test]
    fn endpoint_defaults_to_https() {
        let plain = otlp_config(&[("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317")]);
        assert_eq!(plain.map(|c| c.endpoint).as_deref(), Some("http://localhost:4317"));

        let bare = otlp_config(&[("OTEL_EXPORTER_OTLP_ENDPOINT", "otel.example.com:4317/")]);
        assert_eq!(
            bare.as_ref().map(|c| c.endpoint.as_str()),
            Some("https://otel.example.com:4317")
        );
        assert_eq!(
            bare.as_ref().and_then(OtlpConfig::tls_domain),
            Some("otel.example.com")
        );
    }

    #[test]
    fn plain_http_endpoint_skips_tls() {
        let config = otlp_config(&[("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4317")]);
        assert_eq!(config.as_ref().and_then(OtlpConfig::tls_domain), None);
    }

    #[test]
    fn headers_are_parsed_into_metadata() -> Result<()> {
        let config = otlp_config(&[
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "collector:4317"),
            (
                "OTEL_EXPORTER_OTLP_HEADERS",
                "Authorization = Bearer abc,malformed,x-team=notes",
            ),
        ])
        .ok_or_else(|| anyhow!("expected config"))?;
        assert_eq!(
            config.headers,
            vec![
                ("authorization".to_string(), "Bearer abc".to_string()),
                ("x-team".to_string(), "notes".to_string()),
            ]
        );
        assert_eq!(config.metadata()?.len(), 2);
        Ok(())
    }

    #[test]
    fn invalid_header_value_is_an_error() -> Result<()> {
        let config = otlp_config(&[
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "collector:4317"),
            ("OTEL_EXPORTER_OTLP_HEADERS", "x-token=bad\nvalue"),
        ])
        .ok_or_else(|| anyhow!("expected config"))?;
        assert!(config.metadata().is_err());
        Ok(())
    }

    #[test]
    fn shutdown_tracer_without_provider_is_noop() {
        shutdown_tracer();
    }
}
