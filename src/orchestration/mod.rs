//! # Replay Orchestration
//!
//! The control loop that turns a movement dataset into twin lifecycle calls.
//!
//! - [`ReplayOrchestrator`]: paces the dataset and decides create-vs-update
//! - [`TwinOperations`]: retry-wrapped directory calls shared with timer actions
//! - [`EntityRegistry`]: entity key to live twin handle

pub mod operations;
pub mod registry;
pub mod replay;

pub use operations::TwinOperations;
pub use registry::EntityRegistry;
pub use replay::{ReplayOrchestrator, ReplaySummary};
