//! Request and response bodies of the mint's HTTP surface.
//!
//! Shared by [`HttpMintClient`](super::HttpMintClient) and the `ecash-mint`
//! node so both ends agree on the JSON by construction.

use serde::{Deserialize, Serialize};

use crate::token::{BlindSignature, BlindedMessage, Proof, ProofState};

/// `POST /split` and `POST /combine`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub proofs: Vec<Proof>,
    pub outputs: Vec<BlindedMessage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapResponse {
    pub signatures: Vec<BlindSignature>,
}

/// `POST /check`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub proofs: Vec<Proof>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub states: Vec<ProofState>,
}

/// `POST /redeem` success body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemResponse {
    pub redeemed: usize,
}

/// `GET /info`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintInfo {
    pub name: String,
    pub version: String,
    pub keyset_id: String,
}

/// Error body returned with every non-2xx response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}
