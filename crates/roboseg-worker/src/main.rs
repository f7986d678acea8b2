//! Segmentation worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use roboseg_gemini::GeminiClient;
use roboseg_queue::{QueueConfig, ResultStore, StatusChannel, TaskQueue};
use roboseg_worker::{
    metrics, ActivationPolicy, HttpDownloader, PipelineConfig, RedisStatusSink,
    SegmentationPipeline, TaskExecutor, WorkerConfig,
};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting roboseg-worker");

    let activation = ActivationPolicy::from_env();
    let pipeline_config = PipelineConfig::from_env();
    let worker_config = WorkerConfig::from_env(&activation);
    let queue_config = QueueConfig::from_env();
    info!("Pipeline config: {:?}", pipeline_config);
    info!("Worker config: {:?}", worker_config);

    if let Some(port) = worker_config.metrics_port {
        match metrics::install_exporter(port) {
            Ok(()) => info!("Prometheus metrics exporter listening on port {}", port),
            Err(e) => warn!("Failed to install metrics exporter: {}", e),
        }
    }

    let provider = match GeminiClient::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create Gemini client: {}", e);
            std::process::exit(1);
        }
    };
    info!("Using Gemini model {}", provider.model());

    let downloader = match HttpDownloader::new(pipeline_config.download_timeout) {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to create HTTP downloader: {}", e);
            std::process::exit(1);
        }
    };

    let status = match StatusChannel::new(&queue_config.redis_url, queue_config.result_ttl) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create status channel: {}", e);
            std::process::exit(1);
        }
    };

    let results = match ResultStore::new(&queue_config.redis_url, queue_config.result_ttl) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to create result store: {}", e);
            std::process::exit(1);
        }
    };

    let queue = match TaskQueue::new(queue_config) {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create task queue: {}", e);
            std::process::exit(1);
        }
    };

    let pipeline = SegmentationPipeline::new(
        Arc::new(provider),
        Arc::new(downloader),
        Arc::new(RedisStatusSink::new(status)),
        pipeline_config,
    );

    let executor = TaskExecutor::new(worker_config, queue, results, pipeline);

    let shutdown = executor.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

/// Colored output for dev, JSON for production.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("roboseg_worker=info,roboseg_gemini=info,roboseg_queue=info"));

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
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
