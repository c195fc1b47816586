//! # Token Engine
//!
//! From a fresh secret to a spendable, verifiable, splittable token:
//!
//! ```text
//! new_secret, r ──► commit ──► blind ──► mint signs ──► construct ──► Proof
//!                                                                   │
//!                          Token { mint, proofs } ◄── compose ◄─────┘
//! ```
//!
//! - [`commitment`]: `Y`, `B_` and the single-use [`PreparedOutput`].
//! - [`proof`]: unblinding and offline verification.
//! - [`composer`]: issue, split and combine with value conservation.
//! - [`encoding`]: the `ecashA...` token string.

pub mod commitment;
pub mod composer;
pub mod encoding;
pub mod error;
pub mod proof;
pub mod types;

pub use commitment::{blind, commit, PreparedOutput};
pub use composer::{SplitPlan, TokenComposer};
pub use error::TokenError;
pub use proof::{construct, verify};
pub use types::{BlindSignature, BlindedMessage, Proof, ProofDleq, ProofState, Secret, Token};
