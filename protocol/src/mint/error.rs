use thiserror::Error;

/// Failure talking to a mint.
///
/// The split between [`Unreachable`](MintError::Unreachable) and
/// [`Network`](MintError::Network) matters more than anything else here:
/// the first means the mint never saw the request, the second means it
/// might have. Only the first is safe to retry with the same material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MintError {
    /// The connection could not be established. Nothing was sent.
    #[error("mint unreachable: {0}")]
    Unreachable(String),

    /// The request may have reached the mint (timeout mid-flight, connection
    /// reset, truncated response).
    #[error("network error talking to mint: {0}")]
    Network(String),

    /// The mint answered with a non-2xx status.
    #[error("mint rejected request (HTTP {code}): {body}")]
    Rejected { code: u16, body: String },

    /// The mint answered 2xx with a body we could not parse.
    #[error("malformed mint response: {0}")]
    Malformed(String),
}

impl MintError {
    /// Whether the mint may have acted on the request despite the error.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, MintError::Network(_) | MintError::Malformed(_))
    }
}
