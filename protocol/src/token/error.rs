use thiserror::Error;

use crate::crypto::CurveError;
use crate::mint::MintError;

/// Errors from the token engine: building, unblinding, verifying, splitting
/// and combining tokens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error(transparent)]
    Curve(#[from] CurveError),

    #[error(transparent)]
    Mint(#[from] MintError),

    /// A proof or signature failed verification. `index` points at the
    /// offending item: the proof within a token, the token within a combine,
    /// or the signature within a batch.
    #[error("invalid token at index {index}: {reason}")]
    InvalidToken { index: usize, reason: String },

    #[error("insufficient value: requested {requested}, available {available}")]
    InsufficientValue { requested: u64, available: u64 },

    #[error("token is from mint {found}, expected {expected}")]
    MintMismatch { expected: String, found: String },

    /// Zero, or larger than any keyset can represent.
    #[error("invalid amount: {0}")]
    InvalidAmount(u64),

    #[error("token encoding error: {0}")]
    Encoding(String),
}

impl TokenError {
    pub(crate) fn invalid(index: usize, reason: impl Into<String>) -> Self {
        TokenError::InvalidToken {
            index,
            reason: reason.into(),
        }
    }
}
