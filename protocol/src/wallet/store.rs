//! # SledLedger: Persistent Wallet Storage
//!
//! [`WalletLedger`] on top of sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree           | Key                     | Value                        |
//! |----------------|-------------------------|------------------------------|
//! | `transactions` | `uuid` (16B)            | `bincode(TransactionEntity)` |
//! | `mints`        | `url` (UTF-8)           | `bincode(MintUrl)`           |
//! | `proofs`       | `secret` (hex, UTF-8)   | `bincode(StoredProof)`       |
//! | `metadata`     | key (UTF-8)             | value (bytes)                |
//!
//! The default mint is a single entry in `metadata` rather than a flag on
//! every mint record, so switching defaults is one write.
//!
//! ## Atomicity
//!
//! Multi-proof state changes (`reserve`, `set_state`) run as sled
//! transactions on the `proofs` tree. Two concurrent `reserve` calls over
//! overlapping proofs serialize inside sled: one gets the proofs, the other
//! gets `ProofUnavailable`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Tree};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

use super::ledger::{
    LedgerError, LedgerResult, MintUrl, StoredProof, TransactionEntity, TransactionStatus,
    WalletLedger,
};
use crate::token::{Proof, ProofState};

/// Key in the `metadata` tree holding the default mint's URL.
const META_DEFAULT_MINT: &[u8] = b"default_mint";

fn encode<T: Serialize>(value: &T) -> LedgerResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| LedgerError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> LedgerResult<T> {
    bincode::deserialize(bytes).map_err(|e| LedgerError::Serialization(e.to_string()))
}

fn abort(e: LedgerError) -> ConflictableTransactionError<LedgerError> {
    ConflictableTransactionError::Abort(e)
}

fn unwrap_tx<T>(result: Result<T, TransactionError<LedgerError>>) -> LedgerResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(LedgerError::Sled(e)),
    }
}

/// sled-backed wallet ledger.
///
/// Cheap to clone; clones share the same database. Share across tasks as-is
/// or behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SledLedger {
    db: Db,
    transactions: Tree,
    mints: Tree,
    proofs: Tree,
    metadata: Tree,
}

impl SledLedger {
    /// Open or create a ledger at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A ledger that lives in a temporary directory and is removed on drop.
    pub fn open_temporary() -> LedgerResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> LedgerResult<Self> {
        Ok(Self {
            transactions: db.open_tree("transactions")?,
            mints: db.open_tree("mints")?,
            proofs: db.open_tree("proofs")?,
            metadata: db.open_tree("metadata")?,
            db,
        })
    }

    /// Number of proofs stored, in any state.
    pub fn proof_count(&self) -> usize {
        self.proofs.len()
    }

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> LedgerResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn store_proofs(
        &self,
        mint_url: &str,
        proofs: &[Proof],
        state: ProofState,
        transaction: Option<Uuid>,
    ) -> LedgerResult<()> {
        let mut batch = sled::Batch::default();
        for proof in proofs {
            let stored = StoredProof {
                proof: proof.clone(),
                mint_url: mint_url.to_string(),
                state,
                transaction,
            };
            batch.insert(proof.key().as_bytes(), encode(&stored)?);
        }
        self.proofs.apply_batch(batch)?;
        debug!(count = proofs.len(), mint = mint_url, %state, "stored proofs");
        Ok(())
    }

    fn default_url(&self) -> LedgerResult<Option<String>> {
        match self.metadata.get(META_DEFAULT_MINT)? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }
}

impl WalletLedger for SledLedger {
    // -- Transactions -------------------------------------------------------

    fn insert_transaction(&self, tx: &TransactionEntity) -> LedgerResult<()> {
        self.transactions.insert(tx.id.as_bytes(), encode(tx)?)?;
        Ok(())
    }

    fn update_transaction_status(&self, id: &Uuid, status: TransactionStatus) -> LedgerResult<()> {
        let bytes = self
            .transactions
            .get(id.as_bytes())?
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))?;
        let mut tx: TransactionEntity = decode(&bytes)?;
        tx.status = status;
        self.transactions.insert(id.as_bytes(), encode(&tx)?)?;
        Ok(())
    }

    fn transactions(&self) -> LedgerResult<Vec<TransactionEntity>> {
        let mut out = Vec::with_capacity(self.transactions.len());
        for entry in self.transactions.iter() {
            let (_key, value) = entry?;
            out.push(decode::<TransactionEntity>(&value)?);
        }
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(out)
    }

    // -- Mints --------------------------------------------------------------

    fn upsert_mint(&self, mint: &MintUrl) -> LedgerResult<()> {
        self.mints.insert(mint.url.as_bytes(), encode(mint)?)?;
        if mint.is_default {
            self.metadata.insert(META_DEFAULT_MINT, mint.url.as_bytes())?;
        } else if self.default_url()?.as_deref() == Some(mint.url.as_str()) {
            self.metadata.remove(META_DEFAULT_MINT)?;
        }
        Ok(())
    }

    fn mints(&self) -> LedgerResult<Vec<MintUrl>> {
        let default = self.default_url()?;
        let mut out = Vec::new();
        for entry in self.mints.iter() {
            let (_key, value) = entry?;
            let mut mint: MintUrl = decode(&value)?;
            mint.is_default = default.as_deref() == Some(mint.url.as_str());
            out.push(mint);
        }
        Ok(out)
    }

    fn default_mint(&self) -> LedgerResult<Option<MintUrl>> {
        let Some(url) = self.default_url()? else {
            return Ok(None);
        };
        match self.mints.get(url.as_bytes())? {
            Some(bytes) => {
                let mut mint: MintUrl = decode(&bytes)?;
                mint.is_default = true;
                Ok(Some(mint))
            }
            None => Ok(None),
        }
    }

    fn set_default_mint(&self, url: &str) -> LedgerResult<()> {
        if !self.mints.contains_key(url.as_bytes())? {
            return Err(LedgerError::NotFound(format!("mint {url}")));
        }
        self.metadata.insert(META_DEFAULT_MINT, url.as_bytes())?;
        Ok(())
    }

    // -- Proofs -------------------------------------------------------------

    fn add_proofs(&self, mint_url: &str, proofs: &[Proof], state: ProofState) -> LedgerResult<()> {
        self.store_proofs(mint_url, proofs, state, None)
    }

    fn add_unsettled_proofs(
        &self,
        mint_url: &str,
        proofs: &[Proof],
        transaction: &Uuid,
    ) -> LedgerResult<()> {
        self.store_proofs(mint_url, proofs, ProofState::Unknown, Some(*transaction))
    }

    fn proofs(
        &self,
        mint_url: Option<&str>,
        state: Option<ProofState>,
    ) -> LedgerResult<Vec<StoredProof>> {
        let mut out = Vec::new();
        for entry in self.proofs.iter() {
            let (_key, value) = entry?;
            let stored: StoredProof = decode(&value)?;
            if mint_url.is_some_and(|m| m != stored.mint_url) {
                continue;
            }
            if state.is_some_and(|s| s != stored.state) {
                continue;
            }
            out.push(stored);
        }
        Ok(out)
    }

    fn reserve(&self, keys: &[String]) -> LedgerResult<Vec<Proof>> {
        let result = self.proofs.transaction(|tx| {
            let mut reserved = Vec::with_capacity(keys.len());
            for key in keys {
                let bytes = tx
                    .get(key.as_bytes())?
                    .ok_or_else(|| abort(LedgerError::NotFound(format!("proof {key}"))))?;
                let mut stored: StoredProof = decode(&bytes).map_err(abort)?;
                if stored.state != ProofState::Spendable {
                    return Err(abort(LedgerError::ProofUnavailable {
                        key: key.clone(),
                        state: stored.state,
                    }));
                }
                stored.state = ProofState::InFlight;
                tx.insert(key.as_bytes(), encode(&stored).map_err(abort)?)?;
                reserved.push(stored.proof);
            }
            Ok(reserved)
        });
        let reserved = unwrap_tx(result)?;
        debug!(count = reserved.len(), "reserved proofs");
        Ok(reserved)
    }

    fn set_state(&self, keys: &[String], state: ProofState) -> LedgerResult<()> {
        let result = self.proofs.transaction(|tx| {
            for key in keys {
                let bytes = tx
                    .get(key.as_bytes())?
                    .ok_or_else(|| abort(LedgerError::NotFound(format!("proof {key}"))))?;
                let mut stored: StoredProof = decode(&bytes).map_err(abort)?;
                stored.state = state;
                stored.transaction = None;
                tx.insert(key.as_bytes(), encode(&stored).map_err(abort)?)?;
            }
            Ok(())
        });
        unwrap_tx(result)?;
        debug!(count = keys.len(), %state, "updated proof state");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
