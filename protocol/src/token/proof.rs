//! # Proof Engine
//!
//! Unblinding and offline verification.
//!
//! ## Unblinding
//!
//! The mint returns `C_ = k*B_ = k*Y + k*r*G = k*Y + r*K`. Subtracting
//! `r*K` leaves `C = k*Y`, a signature on a point the mint has never seen.
//!
//! ## Verification
//!
//! A wallet cannot check `C == k*Y` without `k`. Instead it replays the
//! blinded exchange from the data in the proof: `B_ = Y + r*G` and
//! `C_ = C + r*K`, then checks the mint's DLEQ proof that `C_` was made with
//! the key behind `K`. Everything needed comes from the mint's published
//! keyset, so this works offline.

use crate::crypto::dleq::{self, DleqProof};
use crate::crypto::{MintKeys, Point};

use super::commitment::{commit, PreparedOutput};
use super::error::TokenError;
use super::types::{BlindSignature, Proof, ProofDleq};

/// Unblinds a mint signature into a [`Proof`].
///
/// Consumes the [`PreparedOutput`]: its secret now lives in the proof and
/// nowhere else.
pub fn construct(
    output: PreparedOutput,
    signature: &BlindSignature,
    keys: &MintKeys,
) -> Result<Proof, TokenError> {
    construct_at(0, output, signature, keys)
}

/// Unblinds a batch, pairing outputs and signatures by position.
///
/// Fails on the first bad signature, naming its index. A count mismatch is
/// treated as a malformed mint response.
pub fn construct_all(
    outputs: Vec<PreparedOutput>,
    signatures: &[BlindSignature],
    keys: &MintKeys,
) -> Result<Vec<Proof>, TokenError> {
    if outputs.len() != signatures.len() {
        return Err(crate::mint::MintError::Malformed(format!(
            "expected {} signatures, got {}",
            outputs.len(),
            signatures.len()
        ))
        .into());
    }
    outputs
        .into_iter()
        .zip(signatures)
        .enumerate()
        .map(|(i, (output, sig))| construct_at(i, output, sig, keys))
        .collect()
}

fn construct_at(
    index: usize,
    output: PreparedOutput,
    signature: &BlindSignature,
    keys: &MintKeys,
) -> Result<Proof, TokenError> {
    let (secret, r, message) = output.into_parts();

    if signature.amount != message.amount {
        return Err(TokenError::invalid(index, "signature amount differs from request"));
    }
    if signature.id != message.id {
        return Err(TokenError::invalid(index, "signature answers a different request"));
    }
    let k_pub = keys
        .amount_key(message.amount)
        .ok_or_else(|| TokenError::invalid(index, "mint has no key for this amount"))?;

    if !dleq::verify(&signature.dleq, k_pub, &message.blinded, &signature.signature) {
        return Err(TokenError::invalid(index, "DLEQ proof does not match mint key"));
    }

    let c = signature.signature - *k_pub * r;
    if c.is_identity() {
        return Err(TokenError::invalid(index, "unblinded signature is the identity"));
    }

    Ok(Proof {
        amount: message.amount,
        commitment: commit(&secret, message.amount)?,
        secret,
        signature: c,
        dleq: Some(ProofDleq {
            e: signature.dleq.e,
            s: signature.dleq.s,
            r,
        }),
    })
}

/// Checks a proof against a mint's public keys. Never panics; any
/// structural or cryptographic problem is simply `false`.
pub fn verify(proof: &Proof, keys: &MintKeys) -> bool {
    let Some(k_pub) = keys.amount_key(proof.amount) else {
        return false;
    };
    let Ok(y) = commit(&proof.secret, proof.amount) else {
        return false;
    };
    if y != proof.commitment {
        return false;
    }
    let Some(d) = proof.dleq else {
        return false;
    };

    let b_ = y + Point::mul_base(&d.r);
    let c_ = proof.signature + *k_pub * d.r;
    if b_.is_identity() || c_.is_identity() {
        return false;
    }
    dleq::verify(&DleqProof { e: d.e, s: d.s }, k_pub, &b_, &c_)
}

/// Verifies every proof, reporting the index of the first failure.
pub fn verify_all(proofs: &[Proof], keys: &MintKeys) -> Result<(), TokenError> {
    match proofs.iter().position(|p| !verify(p, keys)) {
        Some(index) => Err(TokenError::invalid(index, "proof does not verify")),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{MintKeyset, Scalar};
    use crate::token::commitment::output_id;
    use rand::rngs::OsRng;

    /// Mint-side signing, inlined so these tests don't depend on the issuer.
    fn sign(keyset: &MintKeyset, output: &PreparedOutput) -> BlindSignature {
        let msg = output.message();
        let k = keyset.secret_for(msg.amount).unwrap();
        let c_ = msg.blinded * *k;
        BlindSignature {
            amount: msg.amount,
            signature: c_,
            id: msg.id.clone(),
            dleq: dleq::prove(k, &msg.blinded, &c_),
        }
    }

    fn issue(keyset: &MintKeyset, amount: u64) -> Proof {
        let output = PreparedOutput::new(amount).unwrap();
        let sig = sign(keyset, &output);
        construct(output, &sig, keyset.public_keys()).unwrap()
    }

    #[test]
    fn test_construct_then_verify() {
        let keyset = MintKeyset::generate();
        let proof = issue(&keyset, 16);
        assert!(verify(&proof, keyset.public_keys()));
    }

    #[test]
    fn unblinded_signature_is_k_times_y() {
        let keyset = MintKeyset::generate();
        let proof = issue(&keyset, 2);
        let k = keyset.secret_for(2).unwrap();
        assert_eq!(proof.signature, proof.commitment * *k);
    }

    #[test]
    fn test_tampered_amount_fails() {
        let keyset = MintKeyset::generate();
        let mut proof = issue(&keyset, 4);
        proof.amount = 8;
        assert!(!verify(&proof, keyset.public_keys()));
    }

    #[test]
    fn test_tampered_signature_fails() {
        let keyset = MintKeyset::generate();
        let mut proof = issue(&keyset, 4);
        proof.signature = proof.signature + Point::generator();
        assert!(!verify(&proof, keyset.public_keys()));
    }

    #[test]
    fn test_tampered_secret_fails() {
        let keyset = MintKeyset::generate();
        let mut proof = issue(&keyset, 4);
        proof.secret = crate::crypto::new_secret();
        assert!(!verify(&proof, keyset.public_keys()));
    }

    #[test]
    fn test_missing_dleq_fails() {
        let keyset = MintKeyset::generate();
        let mut proof = issue(&keyset, 4);
        proof.dleq = None;
        assert!(!verify(&proof, keyset.public_keys()));
    }

    #[test]
    fn test_other_mint_keys_fail() {
        let keyset = MintKeyset::generate();
        let other = MintKeyset::generate();
        let proof = issue(&keyset, 64);
        assert!(!verify(&proof, other.public_keys()));
    }

    #[test]
    fn signature_against_generator_fails() {
        // A "signature" that only checks out against G, the way a naive
        // verifier would accept it, must not pass.
        let keyset = MintKeyset::generate();
        let mut proof = issue(&keyset, 1);
        let fake = Scalar::random(&mut OsRng);
        proof.signature = proof.commitment * fake;
        assert!(!verify(&proof, keyset.public_keys()));
    }

    #[test]
    fn test_construct_rejects_wrong_key() {
        let keyset = MintKeyset::generate();
        let other = MintKeyset::generate();
        let output = PreparedOutput::new(8).unwrap();
        let sig = sign(&other, &output);
        let err = construct(output, &sig, keyset.public_keys()).unwrap_err();
        assert!(matches!(err, TokenError::InvalidToken { index: 0, .. }));
    }

    #[test]
    fn test_construct_rejects_amount_swap() {
        // The mint signs as 1 but the wallet claims it signed 8.
        let keyset = MintKeyset::generate();
        let output = PreparedOutput::new(8).unwrap();
        let mut sig = sign(&keyset, &output);
        sig.amount = 1;
        assert!(construct(output, &sig, keyset.public_keys()).is_err());
    }

    #[test]
    fn test_construct_all_reports_index() {
        let keyset = MintKeyset::generate();
        let other = MintKeyset::generate();
        let outputs = PreparedOutput::for_amount(7).unwrap();
        let mut sigs: Vec<BlindSignature> = outputs.iter().map(|o| sign(&keyset, o)).collect();
        sigs[2] = sign(&other, &outputs[2]);
        let err = construct_all(outputs, &sigs, keyset.public_keys()).unwrap_err();
        assert!(matches!(err, TokenError::InvalidToken { index: 2, .. }));
    }

    #[test]
    fn test_construct_all_count_mismatch() {
        let keyset = MintKeyset::generate();
        let outputs = PreparedOutput::for_amount(3).unwrap();
        let sigs = vec![sign(&keyset, &outputs[0])];
        let err = construct_all(outputs, &sigs, keyset.public_keys()).unwrap_err();
        assert!(matches!(err, TokenError::Mint(_)));
    }

    #[test]
    fn test_verify_all_reports_first_failure() {
        let keyset = MintKeyset::generate();
        let mut proofs = vec![issue(&keyset, 1), issue(&keyset, 2), issue(&keyset, 4)];
        assert!(verify_all(&proofs, keyset.public_keys()).is_ok());
        proofs[1].amount = 4;
        let err = verify_all(&proofs, keyset.public_keys()).unwrap_err();
        assert!(matches!(err, TokenError::InvalidToken { index: 1, .. }));
    }

    #[test]
    fn test_output_id_matches_signature() {
        let keyset = MintKeyset::generate();
        let output = PreparedOutput::new(1).unwrap();
        let sig = sign(&keyset, &output);
        assert_eq!(sig.id, output.message().id);
        assert_eq!(sig.id.len(), output_id(&crate::crypto::new_secret()).len());
    }
}
