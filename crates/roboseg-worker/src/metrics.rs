//! Prometheus metrics for the segmentation worker.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve `/metrics` on `port`.
pub fn install_exporter(port: u16) -> Result<(), BuildError> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()
}

/// Metric names as constants for consistency.
pub mod names {
    // Task metrics
    pub const TASKS_COMPLETED_TOTAL: &str = "roboseg_tasks_completed_total";
    pub const TASKS_FAILED_TOTAL: &str = "roboseg_tasks_failed_total";
    pub const PIPELINE_DURATION_SECONDS: &str = "roboseg_pipeline_duration_seconds";

    // Remote asset metrics
    pub const ASSETS_UPLOADED_TOTAL: &str = "roboseg_assets_uploaded_total";
    pub const ASSETS_DELETED_TOTAL: &str = "roboseg_assets_deleted_total";
    pub const ACTIVATION_POLLS_TOTAL: &str = "roboseg_activation_polls_total";

    // Stage durations
    pub const DOWNLOAD_DURATION_SECONDS: &str = "roboseg_download_duration_seconds";
    pub const GENERATION_DURATION_SECONDS: &str = "roboseg_generation_duration_seconds";
}

/// Record a successful task.
pub fn record_task_completed(duration_secs: f64) {
    counter!(names::TASKS_COMPLETED_TOTAL).increment(1);
    histogram!(names::PIPELINE_DURATION_SECONDS, "outcome" => "success").record(duration_secs);
}

/// Record a failed task, labelled by error kind.
pub fn record_task_failed(kind: &'static str, duration_secs: f64) {
    counter!(names::TASKS_FAILED_TOTAL, "kind" => kind).increment(1);
    histogram!(names::PIPELINE_DURATION_SECONDS, "outcome" => "failure").record(duration_secs);
}

pub fn record_asset_uploaded() {
    counter!(names::ASSETS_UPLOADED_TOTAL).increment(1);
}

/// Record an asset deletion attempt (`ok`, `not_found` or `error`).
pub fn record_asset_deleted(result: &'static str) {
    counter!(names::ASSETS_DELETED_TOTAL, "result" => result).increment(1);
}

pub fn record_activation_poll() {
    counter!(names::ACTIVATION_POLLS_TOTAL).increment(1);
}

pub fn record_download_duration(duration_secs: f64) {
    histogram!(names::DOWNLOAD_DURATION_SECONDS).record(duration_secs);
}

pub fn record_generation_duration(duration_secs: f64) {
    histogram!(names::GENERATION_DURATION_SECONDS).record(duration_secs);
}
