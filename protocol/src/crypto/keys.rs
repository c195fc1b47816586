//! # Mint Keys
//!
//! A mint signs with one secp256k1 scalar per denomination. Denominations
//! are powers of two, `2^0 ..= 2^(MAX_ORDER-1)`, and any amount is paid with
//! one token per set bit.
//!
//! ## Why one key per denomination?
//!
//! With a single key, the blinded message hides the amount from the mint,
//! so a client can ask for a signature on "1" and bind "1000000" into the
//! commitment. Keying by denomination makes the signature itself carry the
//! value: a signature from `k_8` only ever verifies for an 8-unit token.
//!
//! ## Types
//!
//! - [`MintKeyset`]: private. Lives only inside the mint. Deliberately not
//!   `Serialize`; persisting keys should be an explicit act, and the mint
//!   does it by storing the 32-byte seed.
//! - [`MintKeys`]: public. What `GET /keys` returns and what wallets verify
//!   proofs against.
//!
//! Both carry the same keyset id: a truncated BLAKE3 hash of the public keys.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use super::curve::{Point, Scalar};
use super::hash::{domain_separated_hash, hash_to_scalar};
use crate::config::{KEYSET_ID_DOMAIN, KEY_DERIVATION_DOMAIN, MAX_ORDER, MAX_TOKEN_AMOUNT};

/// Length of a mint seed in bytes.
pub const SEED_LENGTH: usize = 32;

/// Bytes of the BLAKE3 digest kept in a keyset id (16 hex characters).
const KEYSET_ID_BYTES: usize = 8;

/// Errors that can occur when loading mint key material.
///
/// Vague on purpose. The input is a secret seed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid mint seed: expected 32 bytes of hex")]
    InvalidSeed,
}

// ---------------------------------------------------------------------------
// Denominations
// ---------------------------------------------------------------------------

/// Whether `amount` is a denomination the mint has a key for.
pub fn is_denomination(amount: u64) -> bool {
    amount.is_power_of_two() && amount <= 1u64 << (MAX_ORDER - 1)
}

/// Decomposes an amount into its power-of-two parts, smallest first.
///
/// Returns an empty vector for zero and for amounts above
/// [`MAX_TOKEN_AMOUNT`], which no keyset can represent.
///
/// ```
/// use ecash_protocol::crypto::keys::split_amount;
///
/// assert_eq!(split_amount(13), vec![1, 4, 8]);
/// ```
pub fn split_amount(amount: u64) -> Vec<u64> {
    if amount > MAX_TOKEN_AMOUNT {
        return Vec::new();
    }
    (0..MAX_ORDER)
        .map(|order| 1u64 << order)
        .filter(|denomination| amount & denomination != 0)
        .collect()
}

// ---------------------------------------------------------------------------
// MintKeyset (private)
// ---------------------------------------------------------------------------

/// The mint's private keyset, derived deterministically from a 32-byte seed.
pub struct MintKeyset {
    seed: [u8; SEED_LENGTH],
    secrets: BTreeMap<u64, Scalar>,
    public: MintKeys,
}

impl MintKeyset {
    /// Generates a keyset from a fresh random seed.
    pub fn generate() -> Self {
        let mut seed = [0u8; SEED_LENGTH];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(&seed)
    }

    /// Derives every denomination key from `seed`.
    ///
    /// `k_i = H(KEY_DERIVATION_DOMAIN || seed || i || nonce)` reduced mod n,
    /// bumping `nonce` in the (astronomically unlikely) event of a zero.
    pub fn from_seed(seed: &[u8; SEED_LENGTH]) -> Self {
        let mut secrets = BTreeMap::new();
        let mut publics = BTreeMap::new();

        for order in 0..MAX_ORDER {
            let amount = 1u64 << order;
            let mut nonce = 0u32;
            let k = loop {
                let candidate = hash_to_scalar(
                    KEY_DERIVATION_DOMAIN,
                    &[seed, &order.to_be_bytes(), &nonce.to_be_bytes()],
                );
                if !candidate.is_zero() {
                    break candidate;
                }
                nonce += 1;
            };
            publics.insert(amount, Point::mul_base(&k));
            secrets.insert(amount, k);
        }

        Self {
            seed: *seed,
            secrets,
            public: MintKeys::new(publics),
        }
    }

    /// Loads a keyset from a hex-encoded seed, as stored by `ecash-mint init`.
    pub fn from_hex(hex_seed: &str) -> Result<Self, KeyError> {
        let mut seed = [0u8; SEED_LENGTH];
        hex::decode_to_slice(hex_seed.trim(), &mut seed).map_err(|_| KeyError::InvalidSeed)?;
        Ok(Self::from_seed(&seed))
    }

    /// The seed as hex. Handle with the same care as the keys themselves.
    pub fn seed_hex(&self) -> String {
        hex::encode(self.seed)
    }

    pub fn id(&self) -> &str {
        &self.public.id
    }

    /// The public half, safe to hand to anyone.
    pub fn public_keys(&self) -> &MintKeys {
        &self.public
    }

    /// The private key for one denomination.
    pub(crate) fn secret_for(&self, amount: u64) -> Option<&Scalar> {
        self.secrets.get(&amount)
    }
}

impl fmt::Debug for MintKeyset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MintKeyset(id={})", self.public.id)
    }
}

// ---------------------------------------------------------------------------
// MintKeys (public)
// ---------------------------------------------------------------------------

/// A mint's published keys: one point `K_a = k_a * G` per denomination `a`.
///
/// ```json
/// {"id": "00ad268c4d1f5826", "keys": {"1": "02...", "2": "03...", ...}}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintKeys {
    pub id: String,
    pub keys: BTreeMap<u64, Point>,
}

impl MintKeys {
    /// Builds a public keyset and computes its id.
    pub fn new(keys: BTreeMap<u64, Point>) -> Self {
        let id = Self::derive_id(&keys);
        Self { id, keys }
    }

    /// The public key for one denomination, if the mint has one.
    pub fn amount_key(&self, amount: u64) -> Option<&Point> {
        self.keys.get(&amount)
    }

    /// Keyset id: BLAKE3 (derive-key mode) over `amount_be || K_amount` for
    /// every key in ascending amount order, truncated to 8 bytes.
    pub fn derive_id(keys: &BTreeMap<u64, Point>) -> String {
        let mut data = Vec::with_capacity(keys.len() * 41);
        for (amount, point) in keys {
            data.extend_from_slice(&amount.to_be_bytes());
            data.extend_from_slice(&point.encode());
        }
        let digest = domain_separated_hash(KEYSET_ID_DOMAIN, &data);
        hex::encode(&digest[..KEYSET_ID_BYTES])
    }

    /// Whether the advertised id matches the keys. A wallet should refuse a
    /// keyset that fails this: the mint (or something in between) is lying.
    pub fn is_consistent(&self) -> bool {
        self.id == Self::derive_id(&self.keys)
    }
}
