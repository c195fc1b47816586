//! # DLEQ Proofs
//!
//! A Chaum-Pedersen proof that the mint used the same private key `k` for
//! its public key `K = k*G` and for the blind signature `C_ = k*B_`:
//!
//! ```text
//! prove:   p random;  R1 = p*G;  R2 = p*B_
//!          e = H(R1 || R2 || K || B_ || C_);  s = p + e*k
//! verify:  R1 = s*G - e*K;  R2 = s*B_ - e*C_;  recompute e
//! ```
//!
//! Without this, a mint could sign each wallet with a different key and
//! later tell tokens apart by which key verifies them. With it, a wallet
//! checks the signature against the published keyset and never has to ask
//! the mint whether a token is genuine.

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::curve::{Point, Scalar};
use super::hash::hash_to_scalar;
use crate::config::DLEQ_CHALLENGE_DOMAIN;

/// A non-interactive DLEQ proof `(e, s)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DleqProof {
    pub e: Scalar,
    pub s: Scalar,
}

fn challenge(r1: &Point, r2: &Point, k: &Point, b_: &Point, c_: &Point) -> Scalar {
    hash_to_scalar(
        DLEQ_CHALLENGE_DOMAIN,
        &[
            &r1.encode(),
            &r2.encode(),
            &k.encode(),
            &b_.encode(),
            &c_.encode(),
        ],
    )
}

/// Proves `log_G(k*G) == log_{B_}(C_)`. Mint side.
pub fn prove(k: &Scalar, b_: &Point, c_: &Point) -> DleqProof {
    let p = Scalar::random(&mut OsRng);
    let r1 = Point::mul_base(&p);
    let r2 = *b_ * p;
    let e = challenge(&r1, &r2, &Point::mul_base(k), b_, c_);
    DleqProof { e, s: p + e * *k }
}

/// Checks a DLEQ proof against the public key `k_pub`.
pub fn verify(proof: &DleqProof, k_pub: &Point, b_: &Point, c_: &Point) -> bool {
    let r1 = Point::mul_base(&proof.s) - *k_pub * proof.e;
    let r2 = *b_ * proof.s - *c_ * proof.e;
    if r1.is_identity() || r2.is_identity() {
        return false;
    }
    challenge(&r1, &r2, k_pub, b_, c_) == proof.e
}
