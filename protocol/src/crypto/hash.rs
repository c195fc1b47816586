//! # Hashing Utilities
//!
//! Two hash functions, two jobs:
//!
//! - **SHA-256** sits inside the cryptographic contract with the mint:
//!   hash-to-curve, hash-to-scalar and the DLEQ challenge. Every mint
//!   implementation in the wild speaks SHA-256, so we do too.
//!
//! - **BLAKE3** is used for identifiers that never leave our own code paths
//!   in a security-relevant way: keyset ids and blinded-message correlation
//!   handles. It has a proper key-derivation mode, which makes domain
//!   separation free.
//!
//! ## hash_to_curve
//!
//! Maps a byte string to a secp256k1 point with no known discrete log
//! relative to `G`. The construction is try-and-increment:
//!
//! 1. `h = SHA-256(domain || msg)`
//! 2. for `counter = 0, 1, ...`: `x = SHA-256(h || counter_le32)`; if
//!    `0x02 || x` decodes to a curve point, return it.
//!
//! Roughly half of all x-coordinates are valid, so the loop ends after two
//! iterations on average. It is not constant-time, which is fine: the input
//! is a token secret that becomes public at redemption anyway.

use k256::elliptic_curve::ops::Reduce;
use k256::{FieldBytes, U256};
use sha2::{Digest, Sha256};

use super::curve::{CurveError, Point, Scalar};
use crate::config::{HASH_TO_CURVE_DOMAIN, HASH_TO_CURVE_MAX_ATTEMPTS};

/// Compute the SHA-256 hash of the input data.
///
/// ```
/// use ecash_protocol::crypto::sha256;
///
/// let hash = sha256(b"ecash");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    sha256_multi(&[data])
}

/// SHA-256 over several slices fed in order, without concatenating them first.
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Compute the BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Domain-separated BLAKE3 using its `derive_key` mode.
///
/// Two different contexts never collide, even on identical data, because
/// the context string selects a different internal IV.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Hash `domain || parts...` with SHA-256 and reduce modulo the group order.
///
/// The 256-bit digest is only a hair larger than `n`, so the bias from the
/// reduction is below 2^-128. The result may in principle be zero; callers
/// that need a nonzero scalar (key derivation) check for it.
pub fn hash_to_scalar(domain: &[u8], parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    for part in parts {
        hasher.update(part);
    }
    let digest: FieldBytes = hasher.finalize();
    Scalar(<k256::Scalar as Reduce<U256>>::reduce_bytes(&digest))
}

/// Map a message to a curve point. See the module docs for the construction.
pub fn hash_to_curve(msg: &[u8]) -> Result<Point, CurveError> {
    let msg_hash = sha256_multi(&[HASH_TO_CURVE_DOMAIN, msg]);

    let mut candidate = [0u8; 33];
    candidate[0] = 0x02;

    for counter in 0..HASH_TO_CURVE_MAX_ATTEMPTS {
        let x = sha256_multi(&[&msg_hash, &counter.to_le_bytes()]);
        candidate[1..].copy_from_slice(&x);
        if let Ok(point) = Point::decode(&candidate) {
            return Ok(point);
        }
    }

    Err(CurveError::HashToCurve)
}
