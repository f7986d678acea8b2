//! Pipeline and worker configuration.

use std::path::PathBuf;
use std::time::Duration;

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Bounded fixed-interval poll for remote asset activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationPolicy {
    /// Delay between status re-fetches
    pub interval: Duration,
    /// Maximum number of re-fetches
    pub max_attempts: u32,
}

impl Default for ActivationPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
            max_attempts: 30,
        }
    }
}

impl ActivationPolicy {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval: env_parse("ACTIVATION_POLL_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            max_attempts: env_parse("ACTIVATION_MAX_ATTEMPTS").unwrap_or(defaults.max_attempts),
        }
    }

    /// Total time spent sleeping between status re-fetches.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Configuration passed to the segmentation pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Managed directory for downloaded videos
    pub storage_dir: PathBuf,
    /// Prefix for `downloaded_video_path` (`<prefix>/<file name>`)
    pub public_path_prefix: String,
    /// Timeout for the whole source download
    pub download_timeout: Duration,
    pub activation: ActivationPolicy,
    /// Check `HH:MM:SS.mmm` format and start <= end on every segment
    pub strict_timestamps: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("uploads"),
            public_path_prefix: "uploads".to_string(),
            download_timeout: Duration::from_secs(60),
            activation: ActivationPolicy::default(),
            strict_timestamps: false,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            storage_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            public_path_prefix: std::env::var("UPLOAD_PUBLIC_PREFIX")
                .map(|p| p.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "uploads".to_string()),
            download_timeout: Duration::from_secs(env_parse("DOWNLOAD_TIMEOUT_SECS").unwrap_or(60)),
            activation: ActivationPolicy::from_env(),
            strict_timestamps: std::env::var("STRICT_TIMESTAMPS")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }

    /// Server-relative path under which a downloaded file is served.
    pub fn public_path(&self, file_name: &str) -> String {
        if self.public_path_prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.public_path_prefix, file_name)
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent pipeline invocations
    pub max_concurrent_tasks: usize,
    /// Upper bound on one invocation, including activation polling
    pub task_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// How often the worker should scan for orphaned pending tasks
    pub claim_interval: Duration,
    /// Minimum idle time before a pending task can be claimed (crash recovery)
    pub claim_min_idle: Duration,
    /// Prometheus exporter port; no exporter when unset
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::for_activation(&ActivationPolicy::default())
    }
}

impl WorkerConfig {
    /// Defaults sized so the task timeout covers the activation budget
    /// plus ten minutes for transfer and generation.
    pub fn for_activation(activation: &ActivationPolicy) -> Self {
        let task_timeout = activation.budget() + Duration::from_secs(600);
        Self {
            max_concurrent_tasks: 2,
            task_timeout,
            shutdown_timeout: Duration::from_secs(60),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: task_timeout + Duration::from_secs(60),
            metrics_port: None,
        }
    }

    /// Create config from environment variables.
    pub fn from_env(activation: &ActivationPolicy) -> Self {
        let defaults = Self::for_activation(activation);
        Self {
            max_concurrent_tasks: env_parse::<usize>("WORKER_MAX_TASKS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_tasks),
            task_timeout: env_parse("WORKER_TASK_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.task_timeout),
            shutdown_timeout: env_parse("WORKER_SHUTDOWN_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            claim_interval: env_parse("WORKER_CLAIM_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.claim_interval),
            claim_min_idle: env_parse("WORKER_CLAIM_MIN_IDLE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.claim_min_idle),
            metrics_port: env_parse("METRICS_PORT"),
        }
    }
}
