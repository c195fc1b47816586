//! # Wallet
//!
//! Persistent wallet state and the operations built on it.
//!
//! - [`ledger`]: the [`WalletLedger`] contract, transaction and mint records.
//! - [`store`]: [`SledLedger`], the sled-backed ledger.
//! - [`service`]: [`Wallet`], which drives the token engine against the
//!   ledger.

pub mod ledger;
pub mod service;
pub mod store;

pub use ledger::{
    LedgerError, LedgerResult, MintUrl, StoredProof, TransactionEntity, TransactionStatus,
    TransactionType, WalletLedger,
};
pub use service::{
    HttpConnector, MintConnector, ReconcileReport, StaticConnector, Wallet, WalletError,
    WalletResult,
};
pub use store::SledLedger;
