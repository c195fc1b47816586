//! # Reference Issuer
//!
//! The mint side of the protocol: sign blinded messages, check proofs with
//! the private keys, and keep the spent-set.
//!
//! ## Spent-set
//!
//! One sled tree, keyed by the proof secret, valued with the redemption
//! time (unix seconds, big-endian). Marking a batch spent is a single sled
//! transaction: either every secret in the request is new and all of them
//! are recorded, or none is. Two concurrent redemptions of the same secret
//! serialize inside sled and exactly one wins.
//!
//! ## What this mint does not do
//!
//! It signs any well-formed blinded message. Gating issuance on payment is
//! the job of whatever sits in front of `/sign`.

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Tree};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PROTOCOL_VERSION;
use crate::crypto::dleq;
use crate::crypto::keys::{is_denomination, SEED_LENGTH};
use crate::crypto::{MintKeys, MintKeyset};
use crate::token::commitment::commit;
use crate::token::types::sum_amounts;
use crate::token::{BlindSignature, BlindedMessage, Proof, ProofState};

use super::wire::MintInfo;

/// Default display name of a mint.
pub const DEFAULT_MINT_NAME: &str = "ecash-mint";

/// Why the mint refused a request. Each variant maps to one HTTP status.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MintRejection {
    /// A proof's signature does not check out under the mint's keys.
    #[error("proof {0} is not a valid signature from this mint")]
    Unauthorized(usize),

    /// A proof's secret has already been redeemed.
    #[error("proof {0} is already spent")]
    AlreadySpent(usize),

    #[error("swap is unbalanced: inputs {inputs}, outputs {outputs}")]
    UnbalancedSwap { inputs: u64, outputs: u64 },

    #[error("no key for amount {0}")]
    UnknownDenomination(u64),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl MintRejection {
    /// HTTP status for this rejection.
    pub fn status_code(&self) -> u16 {
        match self {
            MintRejection::Unauthorized(_) => 403,
            MintRejection::AlreadySpent(_) => 409,
            MintRejection::UnbalancedSwap { .. }
            | MintRejection::UnknownDenomination(_)
            | MintRejection::BadRequest(_) => 400,
            MintRejection::Storage(_) => 500,
        }
    }

    /// Short machine-readable code, used in error bodies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            MintRejection::Unauthorized(_) => "unauthorized",
            MintRejection::AlreadySpent(_) => "already_spent",
            MintRejection::UnbalancedSwap { .. } => "unbalanced_swap",
            MintRejection::UnknownDenomination(_) => "unknown_denomination",
            MintRejection::BadRequest(_) => "bad_request",
            MintRejection::Storage(_) => "storage",
        }
    }
}

impl From<sled::Error> for MintRejection {
    fn from(e: sled::Error) -> Self {
        MintRejection::Storage(e.to_string())
    }
}

/// A mint: one keyset plus a persistent spent-set.
///
/// Thread-safe. Share it as `Arc<Mint>`.
pub struct Mint {
    name: String,
    keyset: MintKeyset,
    db: Db,
    spent: Tree,
}

impl Mint {
    /// Opens (or creates) a mint database at `path`, keyed by `seed`.
    pub fn open<P: AsRef<Path>>(path: P, seed: &[u8; SEED_LENGTH]) -> Result<Self, sled::Error> {
        Self::from_db(sled::open(path)?, MintKeyset::from_seed(seed))
    }

    /// A mint whose spent-set lives in a temporary database.
    pub fn temporary(seed: &[u8; SEED_LENGTH]) -> Result<Self, sled::Error> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db, MintKeyset::from_seed(seed))
    }

    fn from_db(db: Db, keyset: MintKeyset) -> Result<Self, sled::Error> {
        let spent = db.open_tree("spent")?;
        Ok(Self {
            name: DEFAULT_MINT_NAME.to_string(),
            keyset,
            db,
            spent,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn keys(&self) -> &MintKeys {
        self.keyset.public_keys()
    }

    pub fn info(&self) -> MintInfo {
        MintInfo {
            name: self.name.clone(),
            version: PROTOCOL_VERSION.to_string(),
            keyset_id: self.keyset.id().to_string(),
        }
    }

    /// Number of secrets ever redeemed.
    pub fn spent_count(&self) -> usize {
        self.spent.len()
    }

    pub fn flush(&self) -> Result<(), sled::Error> {
        self.db.flush()?;
        Ok(())
    }

    /// Signs one blinded message with the key for its amount.
    pub fn sign(&self, message: &BlindedMessage) -> Result<BlindSignature, MintRejection> {
        let k = self
            .keyset
            .secret_for(message.amount)
            .ok_or(MintRejection::UnknownDenomination(message.amount))?;
        let c_ = message.blinded * *k;
        Ok(BlindSignature {
            amount: message.amount,
            signature: c_,
            id: message.id.clone(),
            dleq: dleq::prove(k, &message.blinded, &c_),
        })
    }

    /// `C == k_amount * commit(secret, amount)`, using the private key.
    pub fn verify_proof(&self, proof: &Proof) -> bool {
        let Some(k) = self.keyset.secret_for(proof.amount) else {
            return false;
        };
        match commit(&proof.secret, proof.amount) {
            Ok(y) => proof.signature == y * *k,
            Err(_) => false,
        }
    }

    /// Checks every proof, then marks all of them spent atomically.
    /// Returns the number of proofs redeemed.
    pub fn redeem(&self, proofs: &[Proof]) -> Result<usize, MintRejection> {
        if proofs.is_empty() {
            return Err(MintRejection::BadRequest("no proofs".into()));
        }
        if let Some(index) = proofs.iter().position(|p| !self.verify_proof(p)) {
            warn!(index, "rejecting invalid proof");
            return Err(MintRejection::Unauthorized(index));
        }

        let mut seen = HashSet::with_capacity(proofs.len());
        if let Some(index) = proofs.iter().position(|p| !seen.insert(p.secret.clone())) {
            return Err(MintRejection::BadRequest(format!(
                "proof {index} repeats a secret"
            )));
        }

        let now = chrono::Utc::now().timestamp().to_be_bytes();
        let result = self.spent.transaction(|tx| {
            for (index, proof) in proofs.iter().enumerate() {
                let key = proof.secret.as_bytes();
                if tx.get(key)?.is_some() {
                    return Err(ConflictableTransactionError::Abort(
                        MintRejection::AlreadySpent(index),
                    ));
                }
                tx.insert(&key[..], &now[..])?;
            }
            Ok(())
        });

        match result {
            Ok(()) => {
                info!(count = proofs.len(), amount = sum_amounts(proofs), "redeemed proofs");
                Ok(proofs.len())
            }
            Err(TransactionError::Abort(rejection)) => {
                debug!(%rejection, "redeem aborted");
                Err(rejection)
            }
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    /// Spends `proofs` and signs `outputs`, which must add up to the same
    /// value. Every output is validated before anything is spent.
    pub fn swap(
        &self,
        proofs: &[Proof],
        outputs: &[BlindedMessage],
    ) -> Result<Vec<BlindSignature>, MintRejection> {
        if outputs.is_empty() {
            return Err(MintRejection::BadRequest("no outputs".into()));
        }
        if let Some(bad) = outputs.iter().find(|o| !is_denomination(o.amount)) {
            return Err(MintRejection::UnknownDenomination(bad.amount));
        }

        let inputs = sum_amounts(proofs);
        let requested = outputs
            .iter()
            .fold(0u64, |acc, o| acc.saturating_add(o.amount));
        if inputs != requested {
            return Err(MintRejection::UnbalancedSwap {
                inputs,
                outputs: requested,
            });
        }

        self.redeem(proofs)?;
        outputs.iter().map(|o| self.sign(o)).collect()
    }

    /// Spent state of each proof. Proofs that don't verify are reported
    /// `Unknown`; this mint never issued them.
    pub fn check(&self, proofs: &[Proof]) -> Result<Vec<ProofState>, MintRejection> {
        proofs
            .iter()
            .map(|p| -> Result<ProofState, MintRejection> {
                if !self.verify_proof(p) {
                    return Ok(ProofState::Unknown);
                }
                if self.spent.contains_key(p.secret.as_bytes())? {
                    Ok(ProofState::Spent)
                } else {
                    Ok(ProofState::Spendable)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::proof::{construct, verify};
    use crate::token::PreparedOutput;

    fn mint() -> Mint {
        Mint::temporary(&[5u8; 32]).unwrap()
    }

    fn issue(mint: &Mint, amount: u64) -> Vec<Proof> {
        PreparedOutput::for_amount(amount)
            .unwrap()
            .into_iter()
            .map(|o| {
                let sig = mint.sign(o.message()).unwrap();
                construct(o, &sig, mint.keys()).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_signed_proofs_verify_both_ways() {
        let mint = mint();
        for proof in issue(&mint, 21) {
            assert!(mint.verify_proof(&proof));
            assert!(verify(&proof, mint.keys()));
        }
    }

    #[test]
    fn test_sign_rejects_unknown_denomination() {
        let mint = mint();
        let out = PreparedOutput::new(4).unwrap();
        let mut msg = out.message().clone();
        msg.amount = 3;
        assert_eq!(
            mint.sign(&msg).unwrap_err(),
            MintRejection::UnknownDenomination(3)
        );
    }

    #[test]
    fn test_redeem_then_double_spend() {
        let mint = mint();
        let proofs = issue(&mint, 6);
        assert_eq!(mint.redeem(&proofs).unwrap(), 2);
        let err = mint.redeem(&proofs).unwrap_err();
        assert_eq!(err, MintRejection::AlreadySpent(0));
        assert_eq!(err.status_code(), 409);
        assert_eq!(mint.spent_count(), 2);
    }

    #[test]
    fn test_redeem_is_all_or_nothing() {
        let mint = mint();
        let spent = issue(&mint, 1);
        mint.redeem(&spent).unwrap();

        let mut batch = issue(&mint, 2);
        batch.extend(spent);
        assert_eq!(
            mint.redeem(&batch).unwrap_err(),
            MintRejection::AlreadySpent(1)
        );
        // The fresh proof was not marked spent by the failed batch.
        assert_eq!(mint.check(&batch[..1]).unwrap(), vec![ProofState::Spendable]);
    }

    #[test]
    fn test_redeem_rejects_forgery() {
        let mint = mint();
        let mut proofs = issue(&mint, 8);
        proofs[0].amount = 16;
        let err = mint.redeem(&proofs).unwrap_err();
        assert_eq!(err, MintRejection::Unauthorized(0));
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_redeem_rejects_repeated_secret() {
        let mint = mint();
        let proofs = issue(&mint, 1);
        let doubled = vec![proofs[0].clone(), proofs[0].clone()];
        assert!(matches!(
            mint.redeem(&doubled).unwrap_err(),
            MintRejection::BadRequest(_)
        ));
        assert_eq!(mint.spent_count(), 0);
    }

    #[test]
    fn test_swap_requires_balance() {
        let mint = mint();
        let proofs = issue(&mint, 8);
        let outputs = PreparedOutput::for_amount(9).unwrap();
        let msgs: Vec<_> = outputs.iter().map(|o| o.message().clone()).collect();
        let err = mint.swap(&proofs, &msgs).unwrap_err();
        assert_eq!(
            err,
            MintRejection::UnbalancedSwap {
                inputs: 8,
                outputs: 9
            }
        );
        assert_eq!(mint.spent_count(), 0);
    }

    #[test]
    fn test_swap_spends_and_signs() {
        let mint = mint();
        let proofs = issue(&mint, 8);
        let outputs = PreparedOutput::for_amount(8).unwrap();
        let msgs: Vec<_> = outputs.iter().map(|o| o.message().clone()).collect();
        let sigs = mint.swap(&proofs, &msgs).unwrap();
        assert_eq!(sigs.len(), 1);
        assert_eq!(mint.check(&proofs).unwrap(), vec![ProofState::Spent]);
    }

    #[test]
    fn test_check_reports_foreign_proofs_unknown() {
        let mint = mint();
        let other = Mint::temporary(&[6u8; 32]).unwrap();
        let proofs = issue(&other, 1);
        assert_eq!(mint.check(&proofs).unwrap(), vec![ProofState::Unknown]);
    }

    #[test]
    fn test_info() {
        let mint = mint().with_name("test mint");
        let info = mint.info();
        assert_eq!(info.name, "test mint");
        assert_eq!(info.keyset_id, mint.keys().id);
        assert_eq!(info.version, PROTOCOL_VERSION);
    }

    #[test]
    fn test_spent_set_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let proofs = {
            let mint = Mint::open(dir.path(), &[8u8; 32]).unwrap();
            let proofs = issue(&mint, 4);
            mint.redeem(&proofs).unwrap();
            mint.flush().unwrap();
            proofs
        };
        let mint = Mint::open(dir.path(), &[8u8; 32]).unwrap();
        assert_eq!(mint.check(&proofs).unwrap(), vec![ProofState::Spent]);
    }
}
