//! Error types for the benchmark harness
//!
//! Errors fall into four families: configuration problems caught before any
//! network activity, transport failures that abort a single test unit, unit
//! deadline overruns, and illegal state transitions on unit results.
//! Messages say what to fix, not just what broke.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the benchmark harness
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    #[error("Event group '{group}' is invalid: {reason}")]
    InvalidEventGroup { group: String, reason: String },

    #[error("Product '{product}' supports none of the available transports (MQTT, WebSocket)")]
    UnsupportedTransport { product: String },

    #[error("Product '{product}' has no secret key configured")]
    MissingSecretKey { product: String },

    #[error("Unknown test mode '{0}'. Supported modes: POSITIVE_MATCH, NEGATIVE_MATCH, BOUNDARY_CONDITION")]
    UnknownMode(String),

    #[error("Unknown transport '{0}'. Supported transports: MQTT, WS")]
    UnknownTransport(String),

    // === Transport Errors ===
    #[error("Failed to open session to {url}: {reason}")]
    SessionOpenFailed { url: String, reason: String },

    #[error("Sending '{event_type}' event failed: {reason}")]
    SendFailed { event_type: String, reason: String },

    #[error("Sending '{event_type}' event was not acknowledged within {timeout_ms} ms")]
    SendTimeout { event_type: String, timeout_ms: u64 },

    #[error("Session is already closed")]
    SessionClosed,

    // === Timeout Errors ===
    #[error("Test unit {unit_id} exceeded its {timeout_ms} ms budget")]
    UnitTimeout { unit_id: String, timeout_ms: u64 },

    // === State Errors ===
    #[error("Cannot {action} a result that is already {state}")]
    InvalidState { action: String, state: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid event group error
    pub fn invalid_group(group: &str, reason: impl Into<String>) -> Self {
        Self::InvalidEventGroup {
            group: group.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a send failed error
    pub fn send_failed(event_type: &str, reason: impl Into<String>) -> Self {
        Self::SendFailed {
            event_type: event_type.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(action: &str, state: impl ToString) -> Self {
        Self::InvalidState {
            action: action.to_string(),
            state: state.to_string(),
        }
    }

    /// Whether this error belongs to the configuration family
    ///
    /// Configuration errors are raised before any session is opened.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::ConfigParse(_)
                | Error::FileRead { .. }
                | Error::InvalidEventGroup { .. }
                | Error::UnsupportedTransport { .. }
                | Error::MissingSecretKey { .. }
                | Error::UnknownMode(_)
                | Error::UnknownTransport(_)
        )
    }

    /// Whether this error came from the transport while a unit was running
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::SessionOpenFailed { .. }
                | Error::SendFailed { .. }
                | Error::SendTimeout { .. }
                | Error::SessionClosed
        )
    }
}
