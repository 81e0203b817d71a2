//! Error taxonomy for netfleet.
//!
//! Device-scoped errors ([`TransportError`], [`DeviceError`]) travel inside
//! per-device results and never abort a batch. [`DispatchError`] is the only
//! call-level failure and is raised before any device is contacted.

use thiserror::Error;

/// Connectivity failures reported by a session adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("host unreachable: {0}")]
    Unreachable(String),

    #[error("session dropped: {0}")]
    Disconnected(String),

    #[error("session already closed")]
    SessionClosed,
}

/// Failure attached to a single device in a batch result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The device answered a directive with a CLI error marker.
    #[error("configuration rejected at '{line}': {message}")]
    ConfigRejected { line: String, message: String },

    #[error(transparent)]
    Plan(#[from] PlanError),

    /// The device task panicked or was cancelled by the runtime.
    #[error("device task aborted: {0}")]
    TaskAborted(String),
}

impl DeviceError {
    /// Short machine-readable kind, used in logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceError::Transport(TransportError::Timeout { .. }) => "timeout",
            DeviceError::Transport(TransportError::AuthFailed(_)) => "auth_failed",
            DeviceError::Transport(TransportError::ConnectionRefused(_)) => "connection_refused",
            DeviceError::Transport(_) => "transport",
            DeviceError::ConfigRejected { .. } => "config_rejected",
            DeviceError::Plan(_) => "policy_gap",
            DeviceError::TaskAborted(_) => "task_aborted",
        }
    }
}

/// Planning failures, scoped to one device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("role '{role}' has no prefix in the remediation policy")]
    PolicyGap { role: String },
}

/// Malformed batch calls. Raised before any dispatch begins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("device list is empty")]
    EmptyInventory,

    #[error("concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),
}
