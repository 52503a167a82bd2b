//! Runtime error types for the VERITAS execution pipeline.
//!
//! All fallible operations in the VERITAS pipeline return `VeritasResult<T>`.
//! Error variants carry enough context to produce actionable audit entries.

use thiserror::Error;

/// The unified error type for the VERITAS runtime.
#[derive(Debug, Error)]
pub enum VeritasError {
    /// A policy rule explicitly denied the agent's requested action.
    #[error("policy denied action: {reason}")]
    PolicyDenied { reason: String },

    /// The agent requires a capability it was not granted.
    #[error("capability '{capability}' required for action '{action}' is not granted")]
    CapabilityMissing { capability: String, action: String },

    /// The verifier rejected the agent's output before it could be delivered.
    #[error("output verification failed: {reason}")]
    VerificationFailed { reason: String },

    /// The audit writer could not persist a step record.
    ///
    /// This is treated as fatal — a step that cannot be audited cannot proceed.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },

    /// The agent's state machine encountered an illegal transition or corrupt state.
    #[error("state machine error: {reason}")]
    StateMachineError { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A JSON Schema validation check failed outside of the normal verification path.
    #[error("schema validation error: {reason}")]
    SchemaValidation { reason: String },

    /// Input the turn loop cannot act on (missing required field, malformed
    /// slot). Surfaced in `final_response`, not raised to the caller as a
    /// hard failure — see `VALIDATION_ERROR` in the error-code surface.
    #[error("validation error: {reason}")]
    ValidationError { reason: String },

    /// Two writes collide on a uniqueness constraint (e.g. an appointment
    /// double-booked on (date, time, provider)).
    #[error("conflict: {reason}")]
    Conflict { reason: String },

    /// A lookup by id found nothing.
    #[error("not found: {reason}")]
    NotFound { reason: String },

    /// An external collaborator (LLM, vector index, reranker, store) did not
    /// respond within its per-call timeout.
    #[error("upstream timeout: {reason}")]
    UpstreamTimeout { reason: String },

    /// A guardrail layer blocked the turn. Carries the tier and reason so the
    /// caller can distinguish this from a hard failure.
    #[error("blocked by guardrail: {reason}")]
    BlockedByGuardrail { reason: String },
}

impl VeritasError {
    /// The stable error code surfaced to callers (§6), independent of the
    /// human-readable message. `Internal` has no dedicated variant — it
    /// reuses `StateMachineError`'s shape per the error taxonomy in §7.
    pub fn code(&self) -> &'static str {
        match self {
            VeritasError::ValidationError { .. } => "VALIDATION_ERROR",
            VeritasError::Conflict { .. } => "CONFLICT",
            VeritasError::NotFound { .. } => "NOT_FOUND",
            VeritasError::UpstreamTimeout { .. } => "UPSTREAM_TIMEOUT",
            VeritasError::BlockedByGuardrail { .. } => "BLOCKED_BY_GUARDRAIL",
            VeritasError::StateMachineError { .. } => "INTERNAL",
            VeritasError::PolicyDenied { .. }
            | VeritasError::CapabilityMissing { .. }
            | VeritasError::VerificationFailed { .. }
            | VeritasError::AuditWriteFailed { .. }
            | VeritasError::ConfigError { .. }
            | VeritasError::SchemaValidation { .. } => "INTERNAL",
        }
    }
}

/// Convenience alias used throughout the VERITAS crates.
pub type VeritasResult<T> = Result<T, VeritasError>;
