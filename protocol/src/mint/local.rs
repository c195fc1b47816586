//! In-process [`MintClient`] backed directly by a [`Mint`].
//!
//! Same semantics as talking to `ecash-mint` over HTTP, minus the network:
//! rejections come back as [`MintError::Rejected`] with the status code the
//! HTTP surface would have used. A storage failure inside the mint is the
//! exception: it becomes [`MintError::Network`], since the mint may have
//! committed part of the request.

use async_trait::async_trait;
use std::sync::Arc;

use crate::crypto::MintKeys;
use crate::token::{BlindSignature, BlindedMessage, Proof, ProofState, Token};

use super::client::MintClient;
use super::error::MintError;
use super::issuer::{Mint, MintRejection};

#[derive(Clone)]
pub struct LocalMintClient {
    url: String,
    mint: Arc<Mint>,
}

impl LocalMintClient {
    pub fn new(url: impl Into<String>, mint: Arc<Mint>) -> Self {
        Self {
            url: url.into(),
            mint,
        }
    }

    pub fn mint(&self) -> &Arc<Mint> {
        &self.mint
    }
}

impl From<MintRejection> for MintError {
    fn from(rejection: MintRejection) -> Self {
        match rejection {
            MintRejection::Storage(e) => MintError::Network(format!("mint storage failure: {e}")),
            other => MintError::Rejected {
                code: other.status_code(),
                body: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl MintClient for LocalMintClient {
    fn url(&self) -> &str {
        &self.url
    }

    async fn keys(&self) -> Result<MintKeys, MintError> {
        Ok(self.mint.keys().clone())
    }

    async fn request_signature(
        &self,
        message: &BlindedMessage,
    ) -> Result<BlindSignature, MintError> {
        Ok(self.mint.sign(message)?)
    }

    async fn submit_redeem(&self, token: &Token) -> Result<bool, MintError> {
        match self.mint.redeem(&token.proofs) {
            Ok(_) => Ok(true),
            Err(rejection @ MintRejection::Storage(_)) => Err(rejection.into()),
            Err(_) => Ok(false),
        }
    }

    async fn submit_verify(&self, proofs: &[Proof]) -> Result<Vec<ProofState>, MintError> {
        Ok(self.mint.check(proofs)?)
    }

    async fn submit_split(
        &self,
        proofs: &[Proof],
        outputs: &[BlindedMessage],
    ) -> Result<Vec<BlindSignature>, MintError> {
        Ok(self.mint.swap(proofs, outputs)?)
    }

    async fn submit_combine(
        &self,
        proofs: &[Proof],
        outputs: &[BlindedMessage],
    ) -> Result<Vec<BlindSignature>, MintError> {
        Ok(self.mint.swap(proofs, outputs)?)
    }
}
