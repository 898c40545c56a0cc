//! Error taxonomy for the custody and decode pipeline

/// Convenience alias used across the library
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the library surfaces to callers
///
/// Per-item decode failures never appear here; the decoder recovers them locally
/// and only reports [`Error::NoItemsDecoded`] when an entire batch comes up empty.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller supplied malformed or out-of-range input
    #[error("validation error: {0}")]
    Validation(String),
    /// Duplicate submission, concurrent active event, or similar uniqueness violation
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// Fewer shares than the reconstruction threshold
    #[error("quorum not reached: need {needed} shares, got {got}")]
    Quorum { needed: u8, got: usize },
    #[error("invalid share: {0}")]
    InvalidShare(String),
    /// Encrypt/decrypt failure or malformed key/ciphertext
    #[error("crypto error: {0}")]
    Crypto(String),
    /// Illegal lifecycle transition or operation in the wrong state
    #[error("state error: {0}")]
    State(String),
    #[error("no guardians are registered")]
    NoGuardians,
    #[error("not enough candidate items: need {needed}, have {available}")]
    InsufficientItems { needed: usize, available: usize },
    /// Decode ran but no item reached quorum and decrypted cleanly; retry later
    #[error("no items could be decoded")]
    NoItemsDecoded,
    /// Role is not allowed to perform the requested action
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub(crate) fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }
}
