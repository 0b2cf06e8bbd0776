use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<StoreError>,
    },

    #[error("copy aborted after {copied} documents: {source}")]
    CopyAborted {
        copied: u64,
        #[source]
        source: Box<StoreError>,
    },

    #[error("bulk batch reported {failed} failed operations")]
    PartialBulk { failed: usize },

    #[error("atomic operation `{name}` failed: {detail}")]
    Atomic { name: String, detail: String },

    #[error("atomic operation `{0}` is not registered")]
    MissingScript(String),

    #[error("malformed filter: {0}")]
    BadFilter(String),

    #[error("key `{key}` holds a {found}, expected a {expected}")]
    WrongKeyType { key: String, expected: &'static str, found: &'static str },

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Transient errors are the only class the retry policy re-attempts.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}
