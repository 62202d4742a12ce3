//! # Resilience Module
//!
//! Bounded-attempt retry for side-effecting directory calls.
//!
//! ## Architecture
//!
//! - **Classification**: [`RetryPolicy::classify`] maps a remote status to
//!   [`ErrorCategory::Transient`] or [`ErrorCategory::Fatal`]
//! - **Execution**: [`RetryExecutor::execute`] loops over attempts, holding the
//!   shared credential gate for each call and sleeping with linear backoff
//!   between transient failures
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vessel_replay::credentials::CredentialGate;
//! use vessel_replay::directory::RemoteError;
//! use vessel_replay::resilience::{RetryExecutor, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = RetryExecutor::new(RetryPolicy::default(), CredentialGate::new());
//!
//! let id = executor
//!     .execute("create_entity_identity", || async {
//!         Ok::<_, RemoteError>("did:replay:pride_of_bilbao")
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod retry;

pub use classifier::{ErrorCategory, RetryPolicy};
pub use retry::RetryExecutor;
