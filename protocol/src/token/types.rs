//! Wire types shared by the wallet, the mint client and the reference mint.
//!
//! Field names on the wire follow the usual e-cash conventions (`B_`, `C_`,
//! `Y`, `C`). The Rust names say what the fields are.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{DleqProof, Point, Scalar};

pub use crate::crypto::Secret;

// ---------------------------------------------------------------------------
// Issuance round trip
// ---------------------------------------------------------------------------

/// What the wallet sends to the mint: a blinded commitment and the
/// denomination it wants signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindedMessage {
    pub amount: u64,
    #[serde(rename = "B_")]
    pub blinded: Point,
    /// Correlation handle for matching the response. One-way derived from
    /// the secret, so it reveals nothing about the eventual proof.
    pub id: String,
}

/// The mint's answer to one [`BlindedMessage`]: `C_ = k_amount * B_` and a
/// DLEQ proof that the published key was used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSignature {
    pub amount: u64,
    #[serde(rename = "C_")]
    pub signature: Point,
    pub id: String,
    pub dleq: DleqProof,
}

// ---------------------------------------------------------------------------
// Proofs
// ---------------------------------------------------------------------------

/// DLEQ material carried by a proof: the mint's `(e, s)` plus the blinding
/// factor `r`, which lets anyone rebuild `B_` and `C_` and check `(e, s)`
/// against the mint's public key.
///
/// Revealing `r` together with the proof is safe: the pair is only ever
/// shown to the recipient and, at redemption, to the mint, who learns the
/// secret at that point anyway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofDleq {
    pub e: Scalar,
    pub s: Scalar,
    pub r: Scalar,
}

/// An unblinded, spendable claim on `amount` units at one mint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub amount: u64,
    pub secret: Secret,
    /// `Y = hash_to_curve(secret || amount)`.
    #[serde(rename = "Y")]
    pub commitment: Point,
    /// `C = k_amount * Y`.
    #[serde(rename = "C")]
    pub signature: Point,
    #[serde(default)]
    pub dleq: Option<ProofDleq>,
}

impl Proof {
    /// Stable key for storage and spent-set lookups: the secret in hex.
    pub fn key(&self) -> String {
        self.secret.to_hex()
    }
}

/// Lifecycle of a proof as seen by a wallet or reported by a mint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofState {
    /// Held by the wallet and free to spend.
    Spendable,
    /// Reserved for a mint request that has not finished yet.
    InFlight,
    /// The mint has recorded the secret as spent.
    Spent,
    /// A request may or may not have reached the mint. Needs reconciling.
    Unknown,
}

impl fmt::Display for ProofState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProofState::Spendable => "spendable",
            ProofState::InFlight => "in_flight",
            ProofState::Spent => "spent",
            ProofState::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// A bundle of proofs from one mint.
///
/// ```json
/// {"token": [], "mint": "https://mint.example", "proofs": [{"amount": 4, ...}]}
/// ```
///
/// `outputs` holds blinded messages only while a token is being assembled.
/// Tokens handed out by the composer carry none: shipping them would let
/// the mint tie the proofs back to their issuance requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "token", default)]
    pub outputs: Vec<BlindedMessage>,
    #[serde(rename = "mint")]
    pub mint_url: String,
    pub proofs: Vec<Proof>,
}

impl Token {
    pub fn new(mint_url: impl Into<String>, proofs: Vec<Proof>) -> Self {
        Self {
            outputs: Vec::new(),
            mint_url: mint_url.into(),
            proofs,
        }
    }

    /// Sum of the proof amounts. Saturates instead of wrapping; a token
    /// whose value overflows `u64` cannot verify anyway.
    pub fn value(&self) -> u64 {
        sum_amounts(&self.proofs)
    }

    pub fn is_empty(&self) -> bool {
        self.proofs.is_empty()
    }
}

/// Saturating sum of proof amounts.
pub fn sum_amounts(proofs: &[Proof]) -> u64 {
    proofs
        .iter()
        .fold(0u64, |acc, p| acc.saturating_add(p.amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{hash_to_curve, new_blinding_scalar, new_secret};
    use crate::token::PreparedOutput;

    fn dummy_proof(amount: u64) -> Proof {
        let secret = new_secret();
        let y = hash_to_curve(secret.as_bytes()).unwrap();
        Proof {
            amount,
            secret,
            commitment: y,
            signature: y * new_blinding_scalar(),
            dleq: None,
        }
    }

    #[test]
    fn test_proof_wire_field_names() {
        let proof = dummy_proof(8);
        let json = serde_json::to_value(&proof).unwrap();
        assert_eq!(json["amount"], 8);
        assert!(json["secret"].is_string());
        assert!(json["Y"].is_string());
        assert!(json["C"].is_string());
        assert!(json["dleq"].is_null());
    }

    #[test]
    fn test_token_wire_shape() {
        let token = Token::new("http://mint.test", vec![dummy_proof(1), dummy_proof(2)]);
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["mint"], "http://mint.test");
        assert_eq!(json["token"].as_array().unwrap().len(), 0);
        assert_eq!(json["proofs"].as_array().unwrap().len(), 2);

        let back: Token = serde_json::from_value(json).unwrap();
        assert_eq!(back, token);
        assert_eq!(back.value(), 3);
    }

    #[test]
    fn test_blinded_message_json_round_trip() {
        let output = PreparedOutput::new(16).unwrap();
        let message = output.message().clone();

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["amount"], 16);
        assert_eq!(json["B_"].as_str().unwrap().len(), 66);
        assert_eq!(json["id"], message.id.as_str());

        let back: BlindedMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn test_token_with_outputs_round_trip() {
        let outputs = PreparedOutput::for_amount(5).unwrap();
        let mut token = Token::new("http://mint.test", vec![dummy_proof(4), dummy_proof(1)]);
        token.outputs = outputs.iter().map(|o| o.message().clone()).collect();

        let json = serde_json::to_string(&token).unwrap();
        let back: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
        assert_eq!(back.outputs.len(), 2);
        assert_eq!(back.outputs[0].blinded, token.outputs[0].blinded);
    }

    #[test]
    fn token_without_outputs_field_parses() {
        let token = Token::new("http://mint.test", vec![dummy_proof(4)]);
        let mut json = serde_json::to_value(&token).unwrap();
        json.as_object_mut().unwrap().remove("token");
        let back: Token = serde_json::from_value(json).unwrap();
        assert!(back.outputs.is_empty());
    }

    #[test]
    fn test_value_saturates() {
        let token = Token::new("m", vec![dummy_proof(u64::MAX), dummy_proof(1)]);
        assert_eq!(token.value(), u64::MAX);
    }

    #[test]
    fn test_proof_state_serde() {
        assert_eq!(
            serde_json::to_string(&ProofState::InFlight).unwrap(),
            "\"in_flight\""
        );
        let s: ProofState = serde_json::from_str("\"spent\"").unwrap();
        assert_eq!(s, ProofState::Spent);
        assert_eq!(ProofState::Unknown.to_string(), "unknown");
    }
}
