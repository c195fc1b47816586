//! # Mint Client
//!
//! [`MintClient`] is everything the token engine needs from a mint. The
//! engine never talks HTTP itself; it holds an `Arc<dyn MintClient>`, which
//! is an [`HttpMintClient`] in production and a
//! [`LocalMintClient`](super::LocalMintClient) in tests.
//!
//! ## Retries
//!
//! `HttpMintClient` retries a request only when the connection could not be
//! established, so the mint provably never saw it. Anything that fails after
//! the request may have been written (timeouts, resets, garbage bodies) is
//! returned to the caller as-is. Resending a blinded message or a spend
//! after an ambiguous failure is the caller's decision to make, with fresh
//! outputs, never ours.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{
    MintClientConfig, PATH_CHECK, PATH_COMBINE, PATH_KEYS, PATH_REDEEM, PATH_SIGN, PATH_SPLIT,
};
use crate::crypto::MintKeys;
use crate::token::{BlindSignature, BlindedMessage, Proof, ProofState, Token};

use super::error::MintError;
use super::wire::{CheckRequest, CheckResponse, SwapRequest, SwapResponse};

/// Operations a wallet performs against a mint.
///
/// Implementations must be cheap to share (`Send + Sync`); the wallet keeps
/// one per mint URL.
#[async_trait]
pub trait MintClient: Send + Sync {
    /// The mint's base URL, exactly as tokens name it.
    fn url(&self) -> &str;

    /// `GET /keys`: the mint's public keyset.
    async fn keys(&self) -> Result<MintKeys, MintError>;

    /// `POST /sign`: a blind signature on one blinded message.
    async fn request_signature(
        &self,
        message: &BlindedMessage,
    ) -> Result<BlindSignature, MintError>;

    /// `POST /redeem`. `Ok(true)` only if the mint accepted; a rejection is
    /// `Ok(false)`. Transport failures are errors.
    async fn submit_redeem(&self, token: &Token) -> Result<bool, MintError>;

    /// `POST /check`: the mint's view of each proof, in order.
    async fn submit_verify(&self, proofs: &[Proof]) -> Result<Vec<ProofState>, MintError>;

    /// `POST /split`: spend `proofs` and sign `outputs` in one step.
    async fn submit_split(
        &self,
        proofs: &[Proof],
        outputs: &[BlindedMessage],
    ) -> Result<Vec<BlindSignature>, MintError>;

    /// `POST /combine`: same contract as split, different intent.
    async fn submit_combine(
        &self,
        proofs: &[Proof],
        outputs: &[BlindedMessage],
    ) -> Result<Vec<BlindSignature>, MintError>;
}

// ---------------------------------------------------------------------------
// HttpMintClient
// ---------------------------------------------------------------------------

/// [`MintClient`] over HTTP/JSON via `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpMintClient {
    http: reqwest::Client,
    base_url: String,
    config: MintClientConfig,
}

impl HttpMintClient {
    /// Builds a client for the mint at `base_url` (e.g. `http://127.0.0.1:3338`).
    pub fn new(base_url: impl Into<String>, config: MintClientConfig) -> Result<Self, MintError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| MintError::Unreachable(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            config,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Sends a request, retrying only while the connection cannot be made.
    async fn send<F>(&self, build: F) -> Result<reqwest::Response, MintError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match build().send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() && attempt < max_attempts => {
                    attempt += 1;
                    let delay = self.config.backoff_for(attempt);
                    warn!(
                        mint = %self.base_url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "mint unreachable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(classify(e)),
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, MintError> {
        let url = self.endpoint(path);
        let response = self.send(|| self.http.get(&url)).await?;
        read_json(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, MintError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        let response = self.send(|| self.http.post(&url).json(body)).await?;
        read_json(response).await
    }

    async fn swap(
        &self,
        path: &str,
        proofs: &[Proof],
        outputs: &[BlindedMessage],
    ) -> Result<Vec<BlindSignature>, MintError> {
        let request = SwapRequest {
            proofs: proofs.to_vec(),
            outputs: outputs.to_vec(),
        };
        let response: SwapResponse = self.post_json(path, &request).await?;
        Ok(response.signatures)
    }
}

/// Connect failures never put bytes on the wire; everything else might have.
fn classify(e: reqwest::Error) -> MintError {
    if e.is_connect() || e.is_builder() {
        MintError::Unreachable(e.to_string())
    } else {
        MintError::Network(e.to_string())
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, MintError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| MintError::Network(format!("failed to read response body: {e}")))?;

    if !status.is_success() {
        return Err(MintError::Rejected {
            code: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    serde_json::from_slice(&bytes).map_err(|e| MintError::Malformed(e.to_string()))
}

#[async_trait]
impl MintClient for HttpMintClient {
    fn url(&self) -> &str {
        &self.base_url
    }

    async fn keys(&self) -> Result<MintKeys, MintError> {
        self.get_json(PATH_KEYS).await
    }

    async fn request_signature(
        &self,
        message: &BlindedMessage,
    ) -> Result<BlindSignature, MintError> {
        self.post_json(PATH_SIGN, message).await
    }

    async fn submit_redeem(&self, token: &Token) -> Result<bool, MintError> {
        let url = self.endpoint(PATH_REDEEM);
        let response = self.send(|| self.http.post(&url).json(token)).await?;
        let status = response.status();
        if status.is_success() {
            debug!(mint = %self.base_url, proofs = token.proofs.len(), "redeem accepted");
            Ok(true)
        } else {
            warn!(mint = %self.base_url, status = status.as_u16(), "redeem rejected");
            Ok(false)
        }
    }

    async fn submit_verify(&self, proofs: &[Proof]) -> Result<Vec<ProofState>, MintError> {
        let request = CheckRequest {
            proofs: proofs.to_vec(),
        };
        let response: CheckResponse = self.post_json(PATH_CHECK, &request).await?;
        if response.states.len() != proofs.len() {
            return Err(MintError::Malformed(format!(
                "expected {} states, got {}",
                proofs.len(),
                response.states.len()
            )));
        }
        Ok(response.states)
    }

    async fn submit_split(
        &self,
        proofs: &[Proof],
        outputs: &[BlindedMessage],
    ) -> Result<Vec<BlindSignature>, MintError> {
        self.swap(PATH_SPLIT, proofs, outputs).await
    }

    async fn submit_combine(
        &self,
        proofs: &[Proof],
        outputs: &[BlindedMessage],
    ) -> Result<Vec<BlindSignature>, MintError> {
        self.swap(PATH_COMBINE, proofs, outputs).await
    }
}
