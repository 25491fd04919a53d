use thiserror::Error;

/// A source value that falls outside one of the translation tables.
///
/// These point at an incomplete mapping, not a transient failure, so the
/// orchestrator skips the affected issue instead of retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("could not find type: {0}")]
    UnknownType(String),

    #[error("could not find state for status {status} ({issue_type})")]
    UnknownState { status: String, issue_type: String },

    #[error("could not find user: {0}")]
    UnknownUser(String),
}
