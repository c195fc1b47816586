//! # Wallet Ledger
//!
//! What a wallet remembers: its transaction history, the mints it knows
//! (one of them the default), and every proof it has held along with that
//! proof's state.
//!
//! [`WalletLedger`] is the storage contract; [`SledLedger`](super::SledLedger)
//! is the implementation. The service layer only ever talks to the trait.
//!
//! ## Proof states
//!
//! ```text
//!            reserve                success
//! Spendable ─────────► InFlight ─────────────► Spent
//!     ▲                   │
//!     │  unreachable /    │ network / malformed
//!     │  rejected         ▼
//!     └────────────── (release)      Unknown ──reconcile──► Spent | Spendable
//! ```
//!
//! `reserve` is the only transition that needs to be atomic across several
//! proofs, and it is: either every requested proof goes from `Spendable` to
//! `InFlight`, or none does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::token::{Proof, ProofState};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A proof asked for by `reserve` is missing or not spendable.
    #[error("proof {key} is not spendable (state: {state})")]
    ProofUnavailable { key: String, state: ProofState },
}

pub type LedgerResult<T> = Result<T, LedgerError>;

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Send,
    Receive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// One entry of the wallet's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEntity {
    pub id: Uuid,
    pub amount: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub memo: Option<String>,
}

impl TransactionEntity {
    pub fn new(
        tx_type: TransactionType,
        amount: u64,
        status: TransactionStatus,
        memo: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            timestamp: Utc::now(),
            tx_type,
            status,
            memo,
        }
    }

    /// Positive for receives, negative for sends.
    pub fn signed_amount(&self) -> i128 {
        match self.tx_type {
            TransactionType::Receive => self.amount as i128,
            TransactionType::Send => -(self.amount as i128),
        }
    }
}

// ---------------------------------------------------------------------------
// Mints
// ---------------------------------------------------------------------------

/// A mint the wallet knows about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintUrl {
    pub url: String,
    pub name: String,
    pub is_default: bool,
}

// ---------------------------------------------------------------------------
// Proofs
// ---------------------------------------------------------------------------

/// A proof as the wallet stores it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProof {
    pub proof: Proof,
    pub mint_url: String,
    pub state: ProofState,
    /// The receive that brought these proofs in while their fate at the
    /// mint was unknown. Cleared on the next state change.
    #[serde(default)]
    pub transaction: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Persistent wallet state.
pub trait WalletLedger: Send + Sync {
    /// Appends a transaction. Ids are unique; history is never rewritten
    /// except for status updates.
    fn insert_transaction(&self, tx: &TransactionEntity) -> LedgerResult<()>;

    fn update_transaction_status(&self, id: &Uuid, status: TransactionStatus) -> LedgerResult<()>;

    /// Full history, newest first.
    fn transactions(&self) -> LedgerResult<Vec<TransactionEntity>>;

    /// Inserts or replaces a mint by URL. `is_default = true` makes it the
    /// default and demotes whichever mint held that role.
    fn upsert_mint(&self, mint: &MintUrl) -> LedgerResult<()>;

    fn mints(&self) -> LedgerResult<Vec<MintUrl>>;

    fn default_mint(&self) -> LedgerResult<Option<MintUrl>>;

    /// Fails with `NotFound` for a URL that was never added.
    fn set_default_mint(&self, url: &str) -> LedgerResult<()>;

    /// Stores proofs from `mint_url` in `state`.
    fn add_proofs(&self, mint_url: &str, proofs: &[Proof], state: ProofState) -> LedgerResult<()>;

    /// Stores proofs as `Unknown`, linked to the pending transaction that
    /// received them. `reconcile` settles that transaction along with them.
    fn add_unsettled_proofs(
        &self,
        mint_url: &str,
        proofs: &[Proof],
        transaction: &Uuid,
    ) -> LedgerResult<()>;

    /// Stored proofs, optionally filtered by mint and state.
    fn proofs(
        &self,
        mint_url: Option<&str>,
        state: Option<ProofState>,
    ) -> LedgerResult<Vec<StoredProof>>;

    /// Atomically moves every listed proof from `Spendable` to `InFlight`
    /// and returns them. Fails without changing anything if any proof is
    /// missing or not spendable.
    fn reserve(&self, keys: &[String]) -> LedgerResult<Vec<Proof>>;

    /// Unconditionally sets the state of every listed proof and drops any
    /// transaction link.
    fn set_state(&self, keys: &[String], state: ProofState) -> LedgerResult<()>;

    /// Returns reserved proofs to `Spendable`: the mint never acted.
    fn release(&self, keys: &[String]) -> LedgerResult<()> {
        self.set_state(keys, ProofState::Spendable)
    }

    fn mark_spent(&self, keys: &[String]) -> LedgerResult<()> {
        self.set_state(keys, ProofState::Spent)
    }

    /// The mint may or may not have acted. Excluded from spending until
    /// reconciled.
    fn mark_unknown(&self, keys: &[String]) -> LedgerResult<()> {
        self.set_state(keys, ProofState::Unknown)
    }
}
