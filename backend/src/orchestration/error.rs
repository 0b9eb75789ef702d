//! Orchestration error taxonomy
//!
//! Every argument-building, naming and driver operation reports failures
//! through [`OrchestrationError`]. Engine-specific error shapes (HTTP status
//! codes, reqwest errors, NiFi messages) are folded into these variants by the
//! driver before they reach the orchestrator.

use thiserror::Error;

/// Errors raised by the flow lifecycle orchestration engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationError {
    /// Bad or missing input to argument building (not retryable)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The flow engine could not be reached or is not ready yet
    #[error("Flow engine unreachable: {0}")]
    EngineUnreachable(String),

    /// A flow instance with this name already exists
    #[error("Flow instance already exists: {0}")]
    DuplicateInstance(String),

    /// No flow instance with this name exists
    #[error("Flow instance not found: {0}")]
    InstanceNotFound(String),

    /// The engine lacks a template or controller service type the flow needs
    #[error("Missing upstream dependency: {0}")]
    UpstreamDependencyMissing(String),

    /// The engine answered with an unexpected non-success reply
    #[error("Flow engine rejected the request: {0}")]
    EngineRejected(String),
}

impl OrchestrationError {
    /// Whether retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, OrchestrationError::EngineUnreachable(_))
    }
}
