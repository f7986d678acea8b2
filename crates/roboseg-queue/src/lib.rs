//! Redis transport for segmentation tasks.
//!
//! This crate provides:
//! - Task enqueueing and consumption via Redis Streams consumer groups
//! - Task outcome storage with a TTL
//! - Status events via Redis Pub/Sub, plus the latest status snapshot

pub mod error;
pub mod queue;
pub mod results;
pub mod status;

pub use error::{QueueError, QueueResult};
pub use queue::{QueueConfig, TaskQueue};
pub use results::{ResultStore, TaskReport};
pub use status::StatusChannel;
