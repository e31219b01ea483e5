use serde::Serialize;

/// Machine-readable error kind surfaced to callers in an `error` chunk.
///
/// Mirrors the propagation rules: some kinds are always terminal, others
/// are policy-dependent (see `ToolFailureMode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Auth,
    Provider,
    ToolExecution,
    DiscoveryFailed,
    Timeout,
    Canceled,
    Internal,
}

/// Shared error type used across all AgentOS crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation: {0}")]
    Validation(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("tool {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("canceled: {0}")]
    Canceled(String),

    #[error("config: {0}")]
    Config(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    /// Machine-readable kind, used to populate the outbound `error` chunk
    /// and to decide retry/propagation policy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Internal,
            Error::Json(_) => ErrorKind::Validation,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Auth(_) => ErrorKind::Auth,
            Error::Provider { .. } => ErrorKind::Provider,
            Error::ToolExecution { .. } => ErrorKind::ToolExecution,
            Error::DiscoveryFailed(_) => ErrorKind::DiscoveryFailed,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Canceled(_) => ErrorKind::Canceled,
            Error::Config(_) => ErrorKind::Internal,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_execution_kind() {
        let e = Error::ToolExecution {
            tool: "web.search".into(),
            message: "timed out".into(),
        };
        assert_eq!(e.kind(), ErrorKind::ToolExecution);
    }

    #[test]
    fn discovery_failed_kind() {
        let e = Error::DiscoveryFailed("vector store unreachable".into());
        assert_eq!(e.kind(), ErrorKind::DiscoveryFailed);
    }
}
