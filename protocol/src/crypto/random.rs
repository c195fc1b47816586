//! # Secret & Blinding Generator
//!
//! The only two sources of fresh randomness in the token engine: per-token
//! secrets and per-token blinding scalars. Both come straight from `OsRng`.
//!
//! There is no fallback RNG. If the operating system can't give us entropy,
//! `OsRng` panics, and that is the correct outcome: a predictable secret is
//! a stolen token, and a predictable blinding factor links issuance to
//! redemption.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::curve::Scalar;
use crate::config::SECRET_LENGTH;

/// 32 random bytes identifying exactly one token.
///
/// The secret stays private until redemption, when the mint learns it and
/// records it as spent. Serializes as lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Secret([u8; SECRET_LENGTH]);

impl Secret {
    pub fn from_bytes(bytes: [u8; SECRET_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex secret. Anything but exactly 32 bytes is rejected.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut out = [0u8; SECRET_LENGTH];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Self(out))
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(..)")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Secret::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Draws a fresh token secret.
pub fn new_secret() -> Secret {
    let mut bytes = [0u8; SECRET_LENGTH];
    OsRng.fill_bytes(&mut bytes);
    Secret(bytes)
}

/// Draws a fresh blinding scalar, uniform over `[1, n)`.
pub fn new_blinding_scalar() -> Scalar {
    Scalar::random(&mut OsRng)
}
