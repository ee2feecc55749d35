//! Core orchestration for the transaction relay.
//!
//! [`RelayEngine`] ties the pipeline together: it asks the health monitor for
//! live endpoints, resolves and sizes each candidate call, runs it through the
//! executor, and decides from the classified outcome whether to retry, move
//! on, stop, or degrade to a demonstration result. [`RelayBuilder`] assembles
//! an engine from configuration.

use relay_types::IntentError;
use thiserror::Error;

pub mod builder;
pub mod engine;
pub mod prepare;

pub use builder::{BuilderError, RelayBuilder, RelayFactories};
pub use engine::{ContractCandidate, EngineSettings, RelayEngine};
pub use prepare::{HttpPreparation, PreparationInterface};

#[cfg(any(test, feature = "testing"))]
pub use prepare::MockPreparationInterface;

#[derive(Debug, Error)]
pub enum RelayError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Invalid intent: {0}")]
	InvalidIntent(#[from] IntentError),
	#[error("Preparation service not configured")]
	PreparationUnavailable,
	#[error("Preparation failed: {0}")]
	Preparation(String),
}
