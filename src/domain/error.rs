//! Domain error taxonomy.
//!
//! Each enum corresponds to a port or cross-cutting concern named in the
//! error handling design: `StoreError` (C1), `AgentRuntimeError` (C2),
//! `TelemetryError` (C3), `ConfigError`, and `DomainError` for validation
//! failures raised inside the application services themselves.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the `Store` port.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No row exists for the given id.
    #[error("not found: {0}")]
    NotFound(Uuid),

    /// A compare-and-set precondition did not hold.
    #[error("conflict: expected {expected}, found {actual}")]
    Conflict { expected: String, actual: String },

    /// The backing store is temporarily unreachable; safe to retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The row violates a schema or referential invariant.
    #[error("invalid row: {0}")]
    Invalid(String),
}

impl StoreError {
    /// Transient errors should be retried by the caller, possibly via C5.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    pub const fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

/// The classification of an `AgentRuntime` failure, mirroring the external
/// interface contract `Error{kind, message}`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentRuntimeError {
    /// The agent's structured response failed schema validation. Carries the
    /// offending field path so C5's pattern matcher can act on it.
    #[error("validation failed at {field_path}: {message}")]
    Validation { field_path: String, message: String },

    /// The call exceeded its deadline.
    #[error("timeout after {0}s")]
    Timeout(u64),

    /// The upstream provider rate-limited the request.
    #[error("rate limited: {0}")]
    RateLimit(String),

    /// A network/connection-level failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// Anything not covered above.
    #[error("unknown agent runtime error: {0}")]
    Unknown(String),
}

impl AgentRuntimeError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::RateLimit(_) | Self::Connection(_))
    }

    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// The error type string used in recovery pattern matching.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Timeout(_) => "timeout",
            Self::RateLimit(_) => "rate_limit",
            Self::Connection(_) => "connection",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Errors from the `Telemetry` port. These are always swallowed by callers
/// (§7): broadcast/emit failures never propagate, but the type exists so
/// adapters have something typed to log at debug level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("no subscribers for channel {0}")]
    NoSubscribers(String),

    #[error("telemetry sink error: {0}")]
    SinkError(String),
}

/// Configuration loading/parsing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("environment error: {0}")]
    EnvError(String),
}

/// Validation and invariant errors raised inside application services
/// (not port failures). Used for e.g. illegal status transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("{0}")]
    ValidationFailed(String),

    #[error("append attempted on a completed thinking process {0}")]
    ThinkingProcessSealed(Uuid),

    #[error("max recovery attempts exceeded for task {0}")]
    MaxRecoveryAttemptsExceeded(Uuid),
}

/// Convenience alias used throughout `application` for fallible operations
/// that are not themselves a specific port error.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_transience() {
        assert!(StoreError::Unavailable("timeout".into()).is_transient());
        assert!(!StoreError::NotFound(Uuid::new_v4()).is_transient());
        assert!(StoreError::NotFound(Uuid::new_v4()).is_permanent());
    }

    #[test]
    fn agent_runtime_error_type_strings() {
        assert_eq!(AgentRuntimeError::Timeout(30).error_type(), "timeout");
        assert_eq!(
            AgentRuntimeError::Validation { field_path: "x".into(), message: "y".into() }
                .error_type(),
            "validation"
        );
    }

    #[test]
    fn agent_runtime_error_transience() {
        assert!(AgentRuntimeError::RateLimit("429".into()).is_transient());
        assert!(AgentRuntimeError::Validation { field_path: "a".into(), message: "b".into() }
            .is_permanent());
    }
}
