// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # E-Cash Protocol Core Library
//!
//! A bearer-token wallet built on blind signatures. A wallet asks a mint to
//! sign a token it cannot see, unblinds the result, and ends up holding a
//! proof the mint will honour exactly once but cannot link back to the
//! request that created it.
//!
//! The scheme is blind Diffie-Hellman key exchange on secp256k1, with one
//! mint key per power-of-two denomination and a DLEQ proof on every
//! signature so wallets can verify tokens offline.
//!
//! ## Architecture
//!
//! - **crypto**: curve arithmetic, hashing, mint keys, DLEQ proofs and the
//!   secret/blinding generator.
//! - **token**: commitments, proof construction and verification, the token
//!   composer (issue, split, combine) and the copy-pasteable token string.
//! - **mint**: the `MintClient` contract, its HTTP implementation, and the
//!   reference issuer used by the `ecash-mint` node and by tests.
//! - **wallet**: the persistent ledger (sled) and the wallet service that
//!   ties everything together.
//! - **config**: protocol constants and client settings.
//!
//! ## Design Philosophy
//!
//! 1. The mint is authoritative on spent state. The wallet never guesses.
//! 2. A proof belongs to one token at a time, and the ledger enforces it.
//! 3. No unsafe code. No panics on untrusted input.
//! 4. If it touches money, it has tests. Plural.

pub mod config;
pub mod crypto;
pub mod mint;
pub mod token;
pub mod wallet;
