use anyhow::{Context, Result};
use camtrap_generator::{GeneratorConfig, GeneratorError, MediaRecord, Orchestrator, Topology};
use camtrap_loader::{drain, Credentials, DocumentSink, ElasticsearchSink, FileSink};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit status after an interrupted run.
const EXIT_CANCELLED: u8 = 130;

/// Generate synthetic camera-trap media records and load them into
/// Elasticsearch or a local file.
#[derive(Debug, Parser)]
#[command(name = "camtrap-generator", version, about)]
struct Args {
    /// Configuration file (YAML or JSON); the bundled sample topology is used when omitted
    #[arg(short, long, env = "CAMTRAP_CONFIG")]
    config: Option<PathBuf>,

    /// Records per device, replacing `media_count_per_device`
    #[arg(short = 'n', long)]
    count: Option<u32>,

    /// Write records to this file instead of Elasticsearch (.json, .ndjson or .jsonl)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Elasticsearch endpoint, e.g. https://localhost:9200
    #[arg(long, env = "CAMTRAP_ES_ENDPOINT")]
    endpoint: Option<String>,

    #[arg(long, env = "CAMTRAP_ES_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "CAMTRAP_ES_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "CAMTRAP_ES_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Index name prefix; the tenant id is appended
    #[arg(long)]
    index_prefix: Option<String>,

    /// Records per bulk batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Skip TLS certificate verification
    #[arg(long)]
    no_verify: bool,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Devices generated concurrently
    #[arg(long)]
    workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(&self, config: GeneratorConfig) -> GeneratorConfig {
        let mut config = config.with_count_override(self.count);
        if let Some(seed) = self.seed {
            config.generation.seed = Some(seed);
        }
        if let Some(workers) = self.workers {
            config.generation.workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            config.generation.batch_size = batch_size;
        }
        if let Some(prefix) = &self.index_prefix {
            config.elasticsearch.index_prefix = prefix.clone();
        }
        if self.no_verify {
            config.elasticsearch.verify_ssl = false;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => GeneratorConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => GeneratorConfig::builtin().context("Failed to load bundled configuration")?,
    };
    let config = args.apply(config);
    config.validate().context("Invalid configuration")?;

    // Initialize logging
    init_tracing(&config.logging.level, &config.logging.format);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting camtrap generator");

    // Initialize metrics
    if let Some(port) = config.metrics_port {
        init_metrics(port)?;
    }

    let topology = Arc::new(Topology::load(&config).context("Invalid topology")?);

    // Choose the sink before generating anything
    let (sink, concurrency): (Arc<dyn DocumentSink<MediaRecord>>, usize) = match (&args.output, &args.endpoint) {
        (Some(path), _) => {
            let sink = FileSink::create(path)
                .await
                .with_context(|| format!("Failed to create output file {}", path.display()))?;
            (Arc::new(sink), 1)
        }
        (None, Some(endpoint)) => {
            let credentials = Credentials::resolve(
                config.elasticsearch.use_api_key,
                args.api_key.clone(),
                args.username.clone(),
                args.password.clone(),
            );
            let sink = ElasticsearchSink::new(endpoint.as_str(), credentials, config.elasticsearch.clone())
                .context("Failed to initialize Elasticsearch sink")?;
            let cluster = sink
                .check_connection()
                .await
                .context("Failed to connect to Elasticsearch")?;
            info!(
                cluster = %cluster.cluster_name,
                version = %cluster.version.number,
                "Connected to Elasticsearch"
            );
            (Arc::new(sink), config.elasticsearch.concurrency)
        }
        (None, None) => {
            return Err(GeneratorError::Configuration(
                "no destination: pass --output or --endpoint (or set CAMTRAP_ES_ENDPOINT)".to_string(),
            )
            .into());
        }
    };

    let orchestrator = Orchestrator::new(&config, topology, Utc::now()).context("Failed to plan generation")?;

    let (tx, rx) = mpsc::channel::<Vec<MediaRecord>>(config.generation.queue_batches);
    let loader = tokio::spawn(drain(rx, sink, concurrency));

    // Cancel generation on Ctrl+C / SIGTERM
    let cancel = CancellationToken::new();
    let signal_task = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let generation = orchestrator.run(tx, cancel.clone()).await;
    signal_task.abort();

    let load = loader
        .await
        .context("Loader task failed")?
        .context("Loader failed")?;
    let report = generation.context("Generation failed")?;

    info!(
        seed = report.seed,
        generated = report.generated,
        written = load.succeeded,
        retried = load.retried,
        dropped = load.dropped,
        failed = load.failed,
        failed_batches = load.failed_batches,
        identities = report.identities,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Run finished"
    );

    if report.cancelled {
        warn!("Run interrupted before all records were generated");
        return Ok(ExitCode::from(EXIT_CANCELLED));
    }
    if !load.is_success() {
        error!(failed_batches = load.failed_batches, "Some batches could not be written");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, format: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(env_filter);

    if format == "json" {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().pretty().with_writer(std::io::stderr)).init();
    }
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camtrap_generator::CountSpec;

    #[test]
    fn test_cli_overrides_apply() {
        let args = Args::parse_from([
            "camtrap-generator",
            "--count",
            "7",
            "--seed",
            "99",
            "--workers",
            "3",
            "--batch-size",
            "250",
            "--index-prefix",
            "camtrap-test",
            "--no-verify",
            "--output",
            "out.ndjson",
        ]);
        let config = args.apply(GeneratorConfig::builtin().unwrap());

        assert_eq!(config.media_count_per_device, CountSpec::Fixed(7));
        assert_eq!(config.generation.seed, Some(99));
        assert_eq!(config.generation.workers, 3);
        assert_eq!(config.generation.batch_size, 250);
        assert_eq!(config.elasticsearch.index_prefix, "camtrap-test");
        assert!(!config.elasticsearch.verify_ssl);
        assert_eq!(args.output, Some(PathBuf::from("out.ndjson")));
    }

    #[test]
    fn test_defaults_leave_config_untouched() {
        let args = Args::parse_from(["camtrap-generator", "--endpoint", "https://localhost:9200"]);
        let builtin = GeneratorConfig::builtin().unwrap();
        let expected = builtin.media_count_per_device;
        let config = args.apply(builtin);
        assert_eq!(config.media_count_per_device, expected);
        assert!(config.elasticsearch.verify_ssl);
    }
}
