//! ClipQueue worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipq_queue::{QueueConfig, RedisJobStore};
use clipq_worker::{CommandStage, JobExecutor, StagePipeline, TracingResultSink, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS connections to the store)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("clipq=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting clipq-worker");

    // Optional Prometheus endpoint
    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        match addr.parse::<std::net::SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
                    .with_http_listener(addr)
                    .install()
                {
                    error!("Failed to install metrics exporter: {}", e);
                }
            }
            Err(e) => error!("Invalid METRICS_ADDR: {}", e),
        }
    }

    let worker_config = WorkerConfig::from_env();
    info!("Worker config: {:?}", worker_config);

    let store = match RedisJobStore::new(&QueueConfig::from_env()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create job store: {}", e);
            std::process::exit(1);
        }
    };

    // The rendering pipeline lives in an external program: payload JSON
    // on stdin, artifact reference JSON on stdout.
    let Ok(pipeline_cmd) = std::env::var("PIPELINE_CMD") else {
        error!("PIPELINE_CMD must be set to the pipeline program");
        std::process::exit(1);
    };
    let mut parts = pipeline_cmd.split_whitespace().map(str::to_string);
    let Some(program) = parts.next() else {
        error!("PIPELINE_CMD must not be empty");
        std::process::exit(1);
    };
    let pipeline = Arc::new(StagePipeline::new(vec![Box::new(CommandStage::new(
        program,
        parts.collect(),
    ))]));

    let executor = Arc::new(JobExecutor::new(
        worker_config,
        store,
        pipeline,
        Arc::new(TracingResultSink),
    ));

    // Graceful shutdown on ctrl-c
    let shutdown_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
