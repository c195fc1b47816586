//! # Mint
//!
//! Both sides of the wallet/mint conversation:
//!
//! - [`client`]: the [`MintClient`] contract and its HTTP implementation.
//! - [`issuer`]: the reference mint's logic (signing, spent-set).
//! - [`local`]: an in-process client over an issuer, for tests and demos.
//! - [`wire`]: JSON bodies of the HTTP surface.

pub mod client;
pub mod error;
pub mod issuer;
pub mod local;
pub mod wire;

pub use client::{HttpMintClient, MintClient};
pub use error::MintError;
pub use issuer::{Mint, MintRejection};
pub use local::LocalMintClient;
