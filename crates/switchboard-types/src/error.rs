use thiserror::Error;

/// Errors from repository operations (used by store traits in switchboard-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Error raised by a subscriber while handling an event.
#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("subscriber {subscriber} failed: {message}")]
    Failed { subscriber: String, message: String },

    #[error("subscriber {0} panicked")]
    Panicked(String),

    #[error("subscriber io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("subscriber serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error raised by a team worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("{0}")]
    Failed(String),

    #[error("worker {0} is unavailable")]
    Unavailable(String),
}

impl WorkerError {
    pub fn failed(message: impl Into<String>) -> Self {
        WorkerError::Failed(message.into())
    }
}

/// Error raised by a tool implementation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("timed out after {0}ms")]
    Timeout(u64),
}

impl ToolError {
    /// Short machine-readable error kind, used in event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidArguments(_) => "invalid_arguments",
            ToolError::Execution(_) => "execution",
            ToolError::Timeout(_) => "timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_worker_error_display_is_bare_message() {
        assert_eq!(WorkerError::failed("boom").to_string(), "boom");
    }

    #[test]
    fn test_subscriber_error_display() {
        let err = SubscriberError::Failed {
            subscriber: "file".to_string(),
            message: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "subscriber file failed: disk full");
    }

    #[test]
    fn test_tool_error_kind() {
        assert_eq!(ToolError::Timeout(10).kind(), "timeout");
        assert_eq!(ToolError::Execution("x".into()).kind(), "execution");
    }
}
