//! Robot video action segmentation worker.
//!
//! This crate provides:
//! - The segmentation pipeline (source resolution, upload, activation
//!   polling, generation, validation, cleanup)
//! - Task executor over the Redis task queue
//! - Status events at every stage transition
//! - Graceful shutdown

pub mod activation;
pub mod config;
pub mod error;
pub mod executor;
pub mod lease;
pub mod metrics;
pub mod pipeline;
pub mod prompt;
pub mod source;
pub mod status;
pub mod validate;

pub use config::{ActivationPolicy, PipelineConfig, WorkerConfig};
pub use error::{DownloadError, PipelineError, PipelineResult, SourceError, WorkerError, WorkerResult};
pub use executor::{settle_task, Acknowledger, OutcomeStore, ShutdownHandle, TaskExecutor};
pub use pipeline::SegmentationPipeline;
pub use source::{cleanup_task_files, BlobDownloader, HttpDownloader, ResolvedSource, SourceResolver};
pub use status::{RedisStatusSink, StatusSink};
