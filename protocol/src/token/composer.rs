//! # Token Composer
//!
//! Issue, split and combine. Every operation that touches the mint follows
//! the same pattern: verify inputs locally, build fresh outputs, make
//! exactly one mint round trip, unblind.
//!
//! Value is conserved by construction: split and combine ask the mint for
//! outputs summing to exactly the input value, and the mint refuses any
//! swap that doesn't balance.

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};

use crate::crypto::MintKeys;
use crate::mint::MintClient;

use super::commitment::{messages, PreparedOutput};
use super::error::TokenError;
use super::proof::{construct, construct_all, verify_all};
use super::types::{sum_amounts, Proof, Token};

/// A verified split, ready to send: the inputs, the fresh outputs for
/// both halves, and where the first half ends.
pub struct SplitPlan {
    inputs: Vec<Proof>,
    outputs: Vec<PreparedOutput>,
    split_at: usize,
    amount: u64,
}

impl SplitPlan {
    pub fn amount(&self) -> u64 {
        self.amount
    }
}

/// Builds and transforms tokens against one mint.
///
/// Holds the mint's public keys so verification never needs the network.
pub struct TokenComposer {
    client: Arc<dyn MintClient>,
    keys: MintKeys,
}

impl TokenComposer {
    pub fn new(client: Arc<dyn MintClient>, keys: MintKeys) -> Self {
        Self { client, keys }
    }

    /// Fetches the mint's keyset and checks that its id matches its keys.
    pub async fn connect(client: Arc<dyn MintClient>) -> Result<Self, TokenError> {
        let keys = client.keys().await?;
        if !keys.is_consistent() {
            return Err(crate::mint::MintError::Malformed(format!(
                "keyset id {} does not match its keys",
                keys.id
            ))
            .into());
        }
        Ok(Self::new(client, keys))
    }

    pub fn mint_url(&self) -> &str {
        self.client.url()
    }

    pub fn keys(&self) -> &MintKeys {
        &self.keys
    }

    /// Verifies every proof of a token against this mint's keys.
    pub fn verify(&self, token: &Token) -> Result<(), TokenError> {
        self.check_mint(token)?;
        verify_all(&token.proofs, &self.keys)
    }

    /// Mints a fresh token worth `amount`: one blinded message per
    /// denomination, each signed in its own request.
    pub async fn issue(&self, amount: u64) -> Result<Token, TokenError> {
        let outputs = PreparedOutput::for_amount(amount)?;
        debug!(amount, outputs = outputs.len(), "requesting blind signatures");

        let signatures =
            try_join_all(outputs.iter().map(|o| self.client.request_signature(o.message())))
                .await?;

        let proofs = outputs
            .into_iter()
            .zip(signatures.iter())
            .map(|(output, sig)| construct(output, sig, &self.keys))
            .collect::<Result<Vec<_>, _>>()?;

        info!(amount, mint = %self.mint_url(), "issued token");
        Ok(Token::new(self.mint_url(), proofs))
    }

    /// Splits `token` into `(amount, value - amount)`.
    ///
    /// Nothing goes to the mint unless every proof verifies and the token
    /// holds at least `amount`. Either side may come back empty when
    /// `amount` is `0` or equals the token's value.
    pub async fn split(&self, token: &Token, amount: u64) -> Result<(Token, Token), TokenError> {
        let plan = self.plan_split(token, amount)?;
        self.execute_split(plan).await
    }

    /// The local half of [`split`](Self::split): verifies the token and
    /// prepares both sets of outputs without contacting the mint.
    pub fn plan_split(&self, token: &Token, amount: u64) -> Result<SplitPlan, TokenError> {
        self.verify(token)?;
        let value = token.value();
        if amount > value {
            return Err(TokenError::InsufficientValue {
                requested: amount,
                available: value,
            });
        }

        let first = outputs_for(amount)?;
        let second = outputs_for(value - amount)?;
        let split_at = first.len();

        let mut outputs = first;
        outputs.extend(second);
        Ok(SplitPlan {
            inputs: token.proofs.clone(),
            outputs,
            split_at,
            amount,
        })
    }

    /// Sends a planned split to the mint and unblinds the result. Every
    /// error from here on comes after the request was built for the mint.
    pub async fn execute_split(&self, plan: SplitPlan) -> Result<(Token, Token), TokenError> {
        let SplitPlan {
            inputs,
            outputs,
            split_at,
            amount,
        } = plan;
        let value = sum_amounts(&inputs);
        let requested = messages(&outputs);

        let signatures = self.client.submit_split(&inputs, &requested).await?;
        let mut proofs = construct_all(outputs, &signatures, &self.keys)?;
        let rest = proofs.split_off(split_at);

        debug_assert_eq!(sum_amounts(&proofs) + sum_amounts(&rest), value);
        info!(amount, change = value - amount, mint = %self.mint_url(), "split token");
        Ok((
            Token::new(self.mint_url(), proofs),
            Token::new(self.mint_url(), rest),
        ))
    }

    /// Merges `tokens` from `mint_url` into one token with fresh proofs.
    ///
    /// Each token is verified in turn; the first failure is reported with
    /// that token's index. The inputs are spent by the mint on success.
    pub async fn combine(&self, tokens: &[Token], mint_url: &str) -> Result<Token, TokenError> {
        if mint_url != self.mint_url() {
            return Err(TokenError::MintMismatch {
                expected: self.mint_url().to_string(),
                found: mint_url.to_string(),
            });
        }

        let mut inputs: Vec<Proof> = Vec::new();
        for (index, token) in tokens.iter().enumerate() {
            if let Err(TokenError::InvalidToken { index: proof, .. }) =
                verify_all(&token.proofs, &self.keys)
            {
                return Err(TokenError::invalid(
                    index,
                    format!("proof {} does not verify", proof),
                ));
            }
            self.check_mint(token)?;
            inputs.extend(token.proofs.iter().cloned());
        }

        let total = sum_amounts(&inputs);
        let outputs = PreparedOutput::for_amount(total)?;
        let requested = messages(&outputs);

        let signatures = self.client.submit_combine(&inputs, &requested).await?;
        let proofs = construct_all(outputs, &signatures, &self.keys)?;

        info!(
            tokens = tokens.len(),
            amount = total,
            mint = %self.mint_url(),
            "combined tokens"
        );
        Ok(Token::new(self.mint_url(), proofs))
    }

    fn check_mint(&self, token: &Token) -> Result<(), TokenError> {
        if token.mint_url != self.mint_url() {
            return Err(TokenError::MintMismatch {
                expected: self.mint_url().to_string(),
                found: token.mint_url.clone(),
            });
        }
        Ok(())
    }
}

fn outputs_for(amount: u64) -> Result<Vec<PreparedOutput>, TokenError> {
    if amount == 0 {
        Ok(Vec::new())
    } else {
        PreparedOutput::for_amount(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mint::{LocalMintClient, Mint};

    const MINT_URL: &str = "http://local.mint";

    async fn composer() -> (TokenComposer, Arc<Mint>) {
        let mint = Arc::new(Mint::temporary(&[3u8; 32]).unwrap());
        let client = Arc::new(LocalMintClient::new(MINT_URL, mint.clone()));
        (TokenComposer::connect(client).await.unwrap(), mint)
    }

    #[tokio::test]
    async fn test_issue_produces_verifiable_token() {
        let (composer, _) = composer().await;
        let token = composer.issue(100).await.unwrap();
        assert_eq!(token.value(), 100);
        assert_eq!(token.proofs.len(), 3);
        assert!(token.outputs.is_empty());
        assert!(composer.verify(&token).is_ok());
    }

    #[tokio::test]
    async fn test_issue_zero_rejected() {
        let (composer, _) = composer().await;
        assert_eq!(
            composer.issue(0).await.unwrap_err(),
            TokenError::InvalidAmount(0)
        );
    }

    #[tokio::test]
    async fn test_split_conserves_value() {
        let (composer, _) = composer().await;
        let token = composer.issue(100).await.unwrap();
        let (a, b) = composer.split(&token, 30).await.unwrap();
        assert_eq!(a.value(), 30);
        assert_eq!(b.value(), 70);
        assert!(composer.verify(&a).is_ok());
        assert!(composer.verify(&b).is_ok());
    }

    #[tokio::test]
    async fn test_split_exact_value_leaves_empty_change() {
        let (composer, _) = composer().await;
        let token = composer.issue(5).await.unwrap();
        let (a, b) = composer.split(&token, 5).await.unwrap();
        assert_eq!(a.value(), 5);
        assert!(b.is_empty());
    }

    #[tokio::test]
    async fn test_split_more_than_value() {
        let (composer, _) = composer().await;
        let token = composer.issue(10).await.unwrap();
        let err = composer.split(&token, 11).await.unwrap_err();
        assert_eq!(
            err,
            TokenError::InsufficientValue {
                requested: 11,
                available: 10
            }
        );
        // Nothing was spent: the original token still splits.
        assert!(composer.split(&token, 4).await.is_ok());
    }

    #[tokio::test]
    async fn test_split_spends_inputs() {
        let (composer, _) = composer().await;
        let token = composer.issue(8).await.unwrap();
        composer.split(&token, 3).await.unwrap();
        let err = composer.split(&token, 3).await.unwrap_err();
        assert!(matches!(
            err,
            TokenError::Mint(crate::mint::MintError::Rejected { code: 409, .. })
        ));
    }

    #[tokio::test]
    async fn test_split_rejects_tampered_token() {
        let (composer, _) = composer().await;
        let mut token = composer.issue(12).await.unwrap();
        token.proofs[1].amount = 1;
        let err = composer.split(&token, 1).await.unwrap_err();
        assert!(matches!(err, TokenError::InvalidToken { index: 1, .. }));
    }

    #[tokio::test]
    async fn test_plan_split_is_local() {
        let (composer, mint) = composer().await;
        let token = composer.issue(9).await.unwrap();
        let plan = composer.plan_split(&token, 4).unwrap();
        assert_eq!(plan.amount(), 4);
        assert_eq!(mint.spent_count(), 0);

        let (a, b) = composer.execute_split(plan).await.unwrap();
        assert_eq!((a.value(), b.value()), (4, 5));
        assert_eq!(mint.spent_count(), 2);
    }

    #[tokio::test]
    async fn test_combine_conserves_value() {
        let (composer, _) = composer().await;
        let a = composer.issue(30).await.unwrap();
        let b = composer.issue(70).await.unwrap();
        let combined = composer.combine(&[a, b], MINT_URL).await.unwrap();
        assert_eq!(combined.value(), 100);
        assert!(composer.verify(&combined).is_ok());
    }

    #[tokio::test]
    async fn test_combine_names_bad_token() {
        let (composer, _) = composer().await;
        let good = composer.issue(2).await.unwrap();
        let mut bad = composer.issue(2).await.unwrap();
        bad.proofs[0].signature = bad.proofs[0].commitment;
        let err = composer.combine(&[good, bad], MINT_URL).await.unwrap_err();
        assert!(matches!(err, TokenError::InvalidToken { index: 1, .. }));
    }

    #[tokio::test]
    async fn test_combine_rejects_foreign_mint() {
        let (composer, _) = composer().await;
        let mut token = composer.issue(2).await.unwrap();
        token.mint_url = "http://elsewhere".into();
        let err = composer.combine(&[token], MINT_URL).await.unwrap_err();
        assert!(matches!(err, TokenError::MintMismatch { .. }));
    }

    #[tokio::test]
    async fn test_combine_wrong_target_mint() {
        let (composer, _) = composer().await;
        let token = composer.issue(2).await.unwrap();
        let err = composer
            .combine(&[token], "http://elsewhere")
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::MintMismatch { .. }));
    }
}
