//! # Commitment Builder
//!
//! Turns a fresh secret into something the mint can sign without seeing it:
//!
//! ```text
//! Y  = hash_to_curve(secret || amount_be)     commitment
//! B_ = Y + r*G                                blinded message
//! ```
//!
//! `Y` comes from hash-to-curve rather than `hash * G` on purpose: a point
//! with a known discrete log would let anyone compute the mint's signature
//! on it from the public key alone.
//!
//! A [`PreparedOutput`] bundles the secret, the blinding factor and the
//! resulting [`BlindedMessage`]. It is not `Clone`, and constructing a proof
//! consumes it, so one secret can never back two issuance requests.

use crate::config::{OUTPUT_ID_DOMAIN, SECRET_LENGTH};
use crate::crypto::hash::{domain_separated_hash, hash_to_curve};
use crate::crypto::keys::{is_denomination, split_amount};
use crate::crypto::{new_blinding_scalar, new_secret, CurveError, Point, Scalar, Secret};

use super::error::TokenError;
use super::types::BlindedMessage;

/// Bytes of the output-id digest kept (16 hex characters).
const OUTPUT_ID_BYTES: usize = 8;

/// The amount-binding commitment `Y` for a secret.
///
/// Deterministic: the same `(secret, amount)` always yields the same point,
/// and changing either yields an unrelated one.
pub fn commit(secret: &Secret, amount: u64) -> Result<Point, CurveError> {
    let mut msg = [0u8; SECRET_LENGTH + 8];
    msg[..SECRET_LENGTH].copy_from_slice(secret.as_bytes());
    msg[SECRET_LENGTH..].copy_from_slice(&amount.to_be_bytes());
    hash_to_curve(&msg)
}

/// `commitment + r*G`.
pub fn blind(commitment: &Point, r: &Scalar) -> Point {
    *commitment + Point::mul_base(r)
}

/// Correlation handle for a blinded message, derived one-way from the secret.
pub fn output_id(secret: &Secret) -> String {
    let digest = domain_separated_hash(OUTPUT_ID_DOMAIN, secret.as_bytes());
    hex::encode(&digest[..OUTPUT_ID_BYTES])
}

/// One issuance request in the making.
#[derive(Debug)]
pub struct PreparedOutput {
    secret: Secret,
    blinding: Scalar,
    message: BlindedMessage,
}

impl PreparedOutput {
    /// Draws a secret and a blinding factor and builds the blinded message
    /// for a single denomination.
    pub fn new(amount: u64) -> Result<Self, TokenError> {
        if !is_denomination(amount) {
            return Err(TokenError::InvalidAmount(amount));
        }
        let secret = new_secret();
        let blinding = new_blinding_scalar();
        let y = commit(&secret, amount)?;
        let message = BlindedMessage {
            amount,
            blinded: blind(&y, &blinding),
            id: output_id(&secret),
        };
        Ok(Self {
            secret,
            blinding,
            message,
        })
    }

    /// One output per set bit of `total`, smallest denomination first.
    pub fn for_amount(total: u64) -> Result<Vec<Self>, TokenError> {
        let parts = split_amount(total);
        if parts.is_empty() {
            return Err(TokenError::InvalidAmount(total));
        }
        parts.into_iter().map(Self::new).collect()
    }

    pub fn amount(&self) -> u64 {
        self.message.amount
    }

    pub fn message(&self) -> &BlindedMessage {
        &self.message
    }

    pub(crate) fn into_parts(self) -> (Secret, Scalar, BlindedMessage) {
        (self.secret, self.blinding, self.message)
    }
}

/// The blinded messages of a batch, in order, ready to send.
pub fn messages(outputs: &[PreparedOutput]) -> Vec<BlindedMessage> {
    outputs.iter().map(|o| o.message.clone()).collect()
}
