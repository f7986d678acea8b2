//! Shared data models for the RoboSeg backend.
//!
//! This crate provides Serde-serializable types for:
//! - Action segments and segmentation results
//! - The task outcome union persisted for result retrieval
//! - Segmentation tasks and their identifiers
//! - Pipeline stages and status events
//! - Direct-ingestion URL detection and timestamp validation

pub mod error;
pub mod outcome;
pub mod segment;
pub mod status;
pub mod task;
pub mod timestamp;
pub mod utils;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use outcome::TaskOutcome;
pub use segment::{ActionSegment, SegmentationResult};
pub use status::{PipelineStage, StatusEvent, TaskStatus};
pub use task::{SegmentationTask, TaskId};
pub use timestamp::{parse_timestamp, validate_segment_times, TimestampError};
pub use utils::is_direct_ingestion_url;
