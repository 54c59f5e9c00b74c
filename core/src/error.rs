//! Error taxonomy for the discovery engine.

use thiserror::Error;

/// Failure to reach or query a target. Always scoped to one target.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollectionError {
    #[error("target must not be blank")]
    InvalidTarget,

    #[error("{target} unreachable: {detail}")]
    Unreachable { target: String, detail: String },

    #[error("access denied on {target}: {detail}")]
    AccessDenied { target: String, detail: String },

    #[error("{target} did not answer within {after_ms} ms")]
    TimedOut { target: String, after_ms: u64 },

    #[error("collection cancelled")]
    Cancelled,
}

impl CollectionError {
    /// Transient failures are the only ones worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, CollectionError::Unreachable { .. } | CollectionError::TimedOut { .. })
    }
}

/// Malformed input caught before anything is written.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("hostname is required")]
    MissingHostname,

    #[error("{field} is not a valid IP address: {value}")]
    InvalidIp { field: String, value: String },

    #[error("{field} is not a valid MAC address: {value}")]
    InvalidMac { field: String, value: String },

    #[error("target list contains no targets")]
    EmptyTargetList,

    #[error("bad target list entry {entry}: {detail}")]
    BadTargetEntry { entry: String, detail: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("a live device named {hostname} already exists")]
    DuplicateHostname { hostname: String },

    #[error("a change reason is required for {action}")]
    ChangeReasonRequired { action: &'static str },

    #[error("no live device named {hostname}")]
    NotFound { hostname: String },

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl EngineError {
    /// Short machine-readable code, used for scan error rows.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Collection(CollectionError::TimedOut { .. }) => "timeout",
            EngineError::Collection(CollectionError::AccessDenied { .. }) => "access_denied",
            EngineError::Collection(_) => "collection",
            EngineError::Validation(_) => "validation",
            EngineError::DuplicateHostname { .. } => "duplicate_hostname",
            EngineError::ChangeReasonRequired { .. } => "reason_required",
            EngineError::NotFound { .. } => "not_found",
            EngineError::Persistence(_) => "persistence",
            EngineError::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_reachability_failures_are_transient() {
        let unreachable = CollectionError::Unreachable { target: "h".into(), detail: "refused".into() };
        let denied = CollectionError::AccessDenied { target: "h".into(), detail: "publickey".into() };
        assert!(unreachable.is_transient());
        assert!(CollectionError::TimedOut { target: "h".into(), after_ms: 5 }.is_transient());
        assert!(!denied.is_transient());
        assert!(!CollectionError::Cancelled.is_transient());
    }

    #[test]
    fn codes_follow_the_variant() {
        let e: EngineError = CollectionError::TimedOut { target: "h".into(), after_ms: 1 }.into();
        assert_eq!(e.code(), "timeout");
        let e: EngineError = ValidationError::MissingHostname.into();
        assert_eq!(e.code(), "validation");
        assert_eq!(EngineError::ChangeReasonRequired { action: "UPDATE" }.code(), "reason_required");
    }
}
