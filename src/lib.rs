#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Vessel Replay
//!
//! Time-shifted replay of a port's vessel movement schedule into a digital twin
//! directory.
//!
//! ## Overview
//!
//! A historical schedule of arrivals and departures is mapped forward by a
//! fixed calendar offset (by default one year) and replayed against the wall
//! clock. Each vessel becomes a twin with an `arrival` and a `departure`
//! channel; arrivals, departures, voyage metadata changes and eventual deletion
//! are published at their shifted instants.
//!
//! ## Architecture
//!
//! - **Per-key timers**: one cancellable timer per (vessel, event kind); a new
//!   schedule for the same key replaces the pending one
//! - **Admission control**: only records within a look-ahead window are
//!   scheduled, so pending timers stay bounded regardless of dataset size
//! - **Resilient remote calls**: every directory call goes through a retry
//!   executor that retries transient failures with linear backoff
//! - **Credential rotation**: a background refresher rotates the shared token
//!   under the same lock that guards each remote call
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Replay control loop and twin operations
//! - [`scheduler`] - Cancellable per-key event timers
//! - [`resilience`] - Retry executor and error classification
//! - [`credentials`] - Token provider, credential gate and refresher
//! - [`time_shift`] - Calendar offset for historical timestamps
//! - [`twin_builder`] - Twin structure and metadata payloads
//! - [`dataset`] - CSV movement and vessel reference data
//! - [`directory`] - Directory service boundary and in-memory implementation
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vessel_replay::clock::MonotonicClock;
//! use vessel_replay::config::ConfigManager;
//! use vessel_replay::credentials::CredentialGate;
//! use vessel_replay::dataset::MovementDataset;
//! use vessel_replay::directory::InMemoryDirectory;
//! use vessel_replay::orchestration::ReplayOrchestrator;
//! use vessel_replay::resilience::{RetryExecutor, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load(None, None)?;
//! let config = manager.config();
//!
//! let dataset = Arc::new(MovementDataset::load(&config.dataset)?);
//! let executor = RetryExecutor::new(RetryPolicy::from(&config.retry), CredentialGate::new());
//! let orchestrator = ReplayOrchestrator::new(
//!     config,
//!     dataset,
//!     Arc::new(InMemoryDirectory::new()),
//!     executor,
//!     Arc::new(MonotonicClock::from_system()),
//! );
//!
//! let summary = orchestrator.start(config.replay.skip_past_data).await?;
//! println!("created {} twins", summary.twins_created);
//! orchestrator.scheduler().wait_until_idle().await;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod dataset;
pub mod directory;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod resilience;
pub mod scheduler;
pub mod time_shift;
pub mod twin_builder;

pub use error::{ReplayError, ReplayResult};
pub use orchestration::{ReplayOrchestrator, ReplaySummary};
pub use scheduler::EventScheduler;
