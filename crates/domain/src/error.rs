/// Shared error type used across all RivalWatch crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Transient transport failure: connect/read timeout, 5xx, 429.
    /// Retried with backoff inside the owning task.
    #[error("transient transport: {0}")]
    Transient(String),

    /// Permanent transport failure: 404/410/DNS-no-such-host.
    /// Bumps the health ledger; never retried within the same task.
    #[error("permanent transport: {0}")]
    Permanent(String),

    /// Structural mismatch while parsing a fetched payload.
    #[error("parse: {0}")]
    Parse(String),

    /// Unique-constraint style conflict (duplicate source_url, dedup
    /// key). Callers resolve these as no-ops.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("config: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the owning task may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_) | Error::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_retryable() {
        assert!(Error::Transient("503".into()).is_retryable());
    }

    #[test]
    fn permanent_is_not_retryable() {
        assert!(!Error::Permanent("404".into()).is_retryable());
        assert!(!Error::Parse("bad html".into()).is_retryable());
        assert!(!Error::Conflict("duplicate source_url".into()).is_retryable());
    }
}
