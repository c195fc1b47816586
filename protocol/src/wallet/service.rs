//! # Wallet Service
//!
//! The application layer: ties the ledger to the token engine and decides
//! what happens to stored proofs when a mint round trip fails.
//!
//! Every operation that spends stored proofs goes through
//! [`WalletLedger::reserve`], so two concurrent sends can never pick the same
//! proof. A send fetches the mint's keys and runs every local check before
//! reserving, so failures at that stage leave the proofs alone. What happens
//! after a failed mint call depends on whether the mint could have acted:
//!
//! | Failure                          | Reserved proofs go to |
//! |----------------------------------|-----------------------|
//! | `Unreachable`, `Rejected`        | `Spendable`           |
//! | `Network`, `Malformed`, other    | `Unknown`             |
//!
//! `Unknown` proofs sit out of every selection until [`Wallet::reconcile`]
//! asks the mint what became of them.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MintClientConfig;
use crate::mint::{HttpMintClient, MintClient, MintError};
use crate::token::{Proof, ProofState, SplitPlan, Token, TokenComposer, TokenError};

use super::ledger::{
    LedgerError, MintUrl, StoredProof, TransactionEntity, TransactionStatus, TransactionType,
    WalletLedger,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum WalletError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("no default mint configured")]
    NoDefaultMint,

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("insufficient funds: requested {requested}, spendable {available}")]
    InsufficientFunds { requested: u64, available: u64 },
}

impl From<MintError> for WalletError {
    fn from(e: MintError) -> Self {
        WalletError::Token(TokenError::Mint(e))
    }
}

pub type WalletResult<T> = Result<T, WalletError>;

/// Where reserved proofs go after `err` interrupted an operation.
///
/// Only a mint error that proves the mint did nothing returns them to
/// `Spendable`. Anything else may have happened after the mint spent them.
fn rollback_state(err: &TokenError) -> ProofState {
    match err {
        TokenError::Mint(e) if !e.is_ambiguous() => ProofState::Spendable,
        _ => ProofState::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Connectors
// ---------------------------------------------------------------------------

/// Resolves a mint URL to a client.
pub trait MintConnector: Send + Sync {
    fn connect(&self, url: &str) -> Result<Arc<dyn MintClient>, MintError>;
}

/// Connects to mints over HTTP.
#[derive(Clone, Debug, Default)]
pub struct HttpConnector {
    config: MintClientConfig,
}

impl HttpConnector {
    pub fn new(config: MintClientConfig) -> Self {
        Self { config }
    }
}

impl MintConnector for HttpConnector {
    fn connect(&self, url: &str) -> Result<Arc<dyn MintClient>, MintError> {
        Ok(Arc::new(HttpMintClient::new(url, self.config.clone())?))
    }
}

/// A fixed set of pre-built clients, keyed by their URL.
///
/// Used with [`LocalMintClient`](crate::mint::LocalMintClient) to run a
/// wallet against in-process mints.
#[derive(Clone, Default)]
pub struct StaticConnector {
    clients: HashMap<String, Arc<dyn MintClient>>,
}

impl StaticConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, client: Arc<dyn MintClient>) -> Self {
        self.clients.insert(client.url().to_string(), client);
        self
    }
}

impl MintConnector for StaticConnector {
    fn connect(&self, url: &str) -> Result<Arc<dyn MintClient>, MintError> {
        self.clients
            .get(url)
            .cloned()
            .ok_or_else(|| MintError::Unreachable(format!("no client for {url}")))
    }
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// Outcome of [`Wallet::reconcile`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Proofs the mint reports as spent.
    pub spent: usize,
    /// Proofs the mint never spent, back in `Spendable`.
    pub restored: usize,
    /// Proofs the mint could not account for; still `Unknown`.
    pub unresolved: usize,
}

pub struct Wallet<L: WalletLedger> {
    ledger: L,
    connector: Arc<dyn MintConnector>,
    composers: Mutex<HashMap<String, Arc<TokenComposer>>>,
}

impl<L: WalletLedger> Wallet<L> {
    pub fn new(ledger: L, connector: Arc<dyn MintConnector>) -> Self {
        Self {
            ledger,
            connector,
            composers: Mutex::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// The composer for `url`, fetching the mint's keys on first use.
    async fn composer(&self, url: &str) -> WalletResult<Arc<TokenComposer>> {
        let cached = self.composers.lock().get(url).cloned();
        if let Some(composer) = cached {
            return Ok(composer);
        }
        let client = self.connector.connect(url)?;
        let composer = Arc::new(TokenComposer::connect(client).await?);
        debug!(mint = url, keyset = %composer.keys().id, "loaded mint keys");
        self.composers
            .lock()
            .insert(url.to_string(), composer.clone());
        Ok(composer)
    }

    fn default_url(&self) -> WalletResult<String> {
        self.ledger
            .default_mint()?
            .map(|m| m.url)
            .ok_or(WalletError::NoDefaultMint)
    }

    fn finish(&self, tx: &TransactionEntity, status: TransactionStatus) -> WalletResult<()> {
        self.ledger.update_transaction_status(&tx.id, status)?;
        Ok(())
    }

    // -- Mint registry ------------------------------------------------------

    /// Adds a mint, or updates its name and default flag if already known.
    pub fn add_mint(&self, url: &str, name: &str, is_default: bool) -> WalletResult<()> {
        self.ledger.upsert_mint(&MintUrl {
            url: url.to_string(),
            name: name.to_string(),
            is_default,
        })?;
        info!(mint = url, is_default, "mint registered");
        Ok(())
    }

    pub fn set_default_mint(&self, url: &str) -> WalletResult<()> {
        self.ledger.set_default_mint(url)?;
        Ok(())
    }

    pub fn mints(&self) -> WalletResult<Vec<MintUrl>> {
        Ok(self.ledger.mints()?)
    }

    pub fn default_mint(&self) -> WalletResult<Option<MintUrl>> {
        Ok(self.ledger.default_mint()?)
    }

    // -- Balances -----------------------------------------------------------

    /// Completed receives minus completed sends.
    pub fn balance(&self) -> WalletResult<i128> {
        Ok(self
            .ledger
            .transactions()?
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Completed)
            .map(TransactionEntity::signed_amount)
            .sum())
    }

    /// Value of all `Spendable` proofs, across every mint.
    pub fn spendable_balance(&self) -> WalletResult<u64> {
        Ok(self
            .ledger
            .proofs(None, Some(ProofState::Spendable))?
            .iter()
            .fold(0u64, |acc, p| acc.saturating_add(p.proof.amount)))
    }

    pub fn transactions(&self) -> WalletResult<Vec<TransactionEntity>> {
        Ok(self.ledger.transactions()?)
    }

    // -- Operations ---------------------------------------------------------

    /// Issues `amount` from the default mint and stores the proofs.
    pub async fn mint_tokens(&self, amount: u64) -> WalletResult<Token> {
        if amount == 0 {
            return Err(WalletError::ZeroAmount);
        }
        let url = self.default_url()?;
        let composer = self.composer(&url).await?;
        let token = composer.issue(amount).await?;

        self.ledger
            .add_proofs(&url, &token.proofs, ProofState::Spendable)?;
        self.ledger.insert_transaction(&TransactionEntity::new(
            TransactionType::Receive,
            amount,
            TransactionStatus::Completed,
            None,
        ))?;
        info!(amount, mint = %url, "minted tokens");
        Ok(token)
    }

    /// Builds a token worth exactly `amount` from the default mint's
    /// proofs. Change from a split stays in the wallet.
    pub async fn send(&self, amount: u64, memo: Option<String>) -> WalletResult<Token> {
        if amount == 0 {
            return Err(WalletError::ZeroAmount);
        }
        let url = self.default_url()?;
        let spendable: Vec<Proof> = self
            .ledger
            .proofs(Some(&url), Some(ProofState::Spendable))?
            .into_iter()
            .map(|s| s.proof)
            .collect();
        let available = spendable
            .iter()
            .fold(0u64, |acc, p| acc.saturating_add(p.amount));
        if available < amount {
            return Err(WalletError::InsufficientFunds {
                requested: amount,
                available,
            });
        }

        let (selected, exact) = select_proofs(spendable, amount);
        let keys: Vec<String> = selected.iter().map(Proof::key).collect();

        if exact {
            let reserved = self.ledger.reserve(&keys)?;
            let tx = TransactionEntity::new(
                TransactionType::Send,
                amount,
                TransactionStatus::Completed,
                memo,
            );
            self.ledger.mark_spent(&keys)?;
            self.ledger.insert_transaction(&tx)?;
            info!(amount, mint = %url, "sent exact proofs");
            return Ok(Token::new(url, reserved));
        }

        let tx = TransactionEntity::new(TransactionType::Send, amount, TransactionStatus::Pending, memo);
        self.ledger.insert_transaction(&tx)?;

        // Keys and local checks come first; the stored proofs are untouched
        // if any of them fails.
        let (composer, plan) = match self.plan_send(&url, selected, amount).await {
            Ok(ready) => ready,
            Err(e) => {
                warn!(amount, error = %e, "send failed before contacting the mint");
                self.finish(&tx, TransactionStatus::Failed)?;
                return Err(e);
            }
        };

        if let Err(e) = self.ledger.reserve(&keys) {
            self.finish(&tx, TransactionStatus::Failed)?;
            return Err(e.into());
        }

        match composer.execute_split(plan).await {
            Ok((outgoing, change)) => {
                self.ledger
                    .add_proofs(&url, &change.proofs, ProofState::Spendable)?;
                self.ledger.mark_spent(&keys)?;
                self.finish(&tx, TransactionStatus::Completed)?;
                info!(amount, change = change.value(), mint = %url, "sent token");
                Ok(outgoing)
            }
            Err(e) => {
                let state = rollback_state(&e);
                warn!(amount, error = %e, %state, "send failed");
                self.ledger.set_state(&keys, state)?;
                self.finish(&tx, TransactionStatus::Failed)?;
                Err(e.into())
            }
        }
    }

    async fn plan_send(
        &self,
        url: &str,
        selected: Vec<Proof>,
        amount: u64,
    ) -> WalletResult<(Arc<TokenComposer>, SplitPlan)> {
        let composer = self.composer(url).await?;
        let plan = composer.plan_split(&Token::new(url, selected), amount)?;
        Ok((composer, plan))
    }

    /// Accepts a token string from someone else. The proofs are swapped for
    /// fresh ones so the sender can no longer spend them. Returns the value
    /// received.
    ///
    /// When the swap fails ambiguously, the incoming proofs are stored as
    /// `Unknown` and the transaction stays `Pending`; `reconcile` decides
    /// whether they are still good and settles the transaction with them.
    pub async fn receive(&self, encoded: &str) -> WalletResult<u64> {
        let token = Token::decode(encoded)?;
        let amount = token.value();
        if amount == 0 {
            return Err(WalletError::ZeroAmount);
        }
        let url = token.mint_url.clone();
        let composer = self.composer(&url).await?;
        composer.verify(&token)?;

        if !self.ledger.mints()?.iter().any(|m| m.url == url) {
            let first = self.ledger.default_mint()?.is_none();
            self.add_mint(&url, &url, first)?;
        }

        let tx = TransactionEntity::new(
            TransactionType::Receive,
            amount,
            TransactionStatus::Pending,
            None,
        );
        self.ledger.insert_transaction(&tx)?;

        match composer.combine(std::slice::from_ref(&token), &url).await {
            Ok(fresh) => {
                self.ledger
                    .add_proofs(&url, &fresh.proofs, ProofState::Spendable)?;
                self.finish(&tx, TransactionStatus::Completed)?;
                info!(amount, mint = %url, "received token");
                Ok(amount)
            }
            Err(e) if rollback_state(&e) == ProofState::Unknown => {
                warn!(amount, error = %e, "receive outcome unknown");
                self.ledger
                    .add_unsettled_proofs(&url, &token.proofs, &tx.id)?;
                Err(e.into())
            }
            Err(e) => {
                warn!(amount, error = %e, "receive failed");
                self.finish(&tx, TransactionStatus::Failed)?;
                Err(e.into())
            }
        }
    }

    /// Redeems wallet-held proofs at their mint. `Ok(true)` means the mint
    /// accepted and the proofs are now `Spent`; `Ok(false)` means it
    /// refused and they are `Spendable` again.
    pub async fn redeem(&self, token: &Token) -> WalletResult<bool> {
        if token.is_empty() {
            return Err(WalletError::ZeroAmount);
        }
        let keys: Vec<String> = token.proofs.iter().map(Proof::key).collect();
        self.ledger.reserve(&keys)?;

        let client = match self.connector.connect(&token.mint_url) {
            Ok(client) => client,
            Err(e) => {
                self.ledger.release(&keys)?;
                return Err(e.into());
            }
        };

        match client.submit_redeem(token).await {
            Ok(true) => {
                self.ledger.mark_spent(&keys)?;
                self.ledger.insert_transaction(&TransactionEntity::new(
                    TransactionType::Send,
                    token.value(),
                    TransactionStatus::Completed,
                    Some("redeemed".to_string()),
                ))?;
                info!(amount = token.value(), mint = %token.mint_url, "redeemed token");
                Ok(true)
            }
            Ok(false) => {
                self.ledger.release(&keys)?;
                warn!(amount = token.value(), mint = %token.mint_url, "mint refused redemption");
                Ok(false)
            }
            Err(e) => {
                if e.is_ambiguous() {
                    self.ledger.mark_unknown(&keys)?;
                } else {
                    self.ledger.release(&keys)?;
                }
                warn!(error = %e, mint = %token.mint_url, "redeem failed");
                Err(e.into())
            }
        }
    }

    /// Asks each mint about proofs in `Unknown` and settles them.
    ///
    /// A pending receive whose proofs are all resolved is settled too:
    /// `Completed` if the mint never spent them, `Failed` if it did.
    pub async fn reconcile(&self) -> WalletResult<ReconcileReport> {
        let mut by_mint: HashMap<String, Vec<StoredProof>> = HashMap::new();
        for stored in self.ledger.proofs(None, Some(ProofState::Unknown))? {
            by_mint.entry(stored.mint_url.clone()).or_default().push(stored);
        }

        let mut report = ReconcileReport::default();
        let mut receives: HashMap<Uuid, Vec<ProofState>> = HashMap::new();
        for (url, stored) in by_mint {
            let client = self.connector.connect(&url)?;
            let proofs: Vec<Proof> = stored.iter().map(|s| s.proof.clone()).collect();
            let states = client.submit_verify(&proofs).await?;

            let mut spent = Vec::new();
            let mut spendable = Vec::new();
            for (entry, state) in stored.iter().zip(states) {
                match state {
                    ProofState::Spent => spent.push(entry.proof.key()),
                    ProofState::Spendable => spendable.push(entry.proof.key()),
                    ProofState::InFlight | ProofState::Unknown => report.unresolved += 1,
                }
                if let Some(id) = entry.transaction {
                    receives.entry(id).or_default().push(state);
                }
            }
            self.ledger.mark_spent(&spent)?;
            self.ledger.release(&spendable)?;
            report.spent += spent.len();
            report.restored += spendable.len();
            info!(
                mint = %url,
                spent = spent.len(),
                restored = spendable.len(),
                "reconciled proofs"
            );
        }

        for (id, states) in receives {
            let status = if states.iter().all(|s| *s == ProofState::Spendable) {
                TransactionStatus::Completed
            } else if states.iter().all(|s| *s == ProofState::Spent) {
                TransactionStatus::Failed
            } else {
                continue;
            };
            self.ledger.update_transaction_status(&id, status)?;
            debug!(transaction = %id, %status, "settled pending receive");
        }
        Ok(report)
    }
}

/// Picks proofs covering `amount`, largest first.
///
/// First tries to hit `amount` exactly, taking each proof only if it still
/// fits; with power-of-two denominations this usually succeeds and the send
/// needs no mint round trip. Otherwise accumulates until the target is
/// covered. The flag reports whether the selection is exact.
fn select_proofs(mut proofs: Vec<Proof>, amount: u64) -> (Vec<Proof>, bool) {
    proofs.sort_by(|a, b| b.amount.cmp(&a.amount));

    let mut exact = Vec::new();
    let mut sum = 0u64;
    for proof in &proofs {
        if sum + proof.amount <= amount {
            sum += proof.amount;
            exact.push(proof.clone());
            if sum == amount {
                return (exact, true);
            }
        }
    }

    let mut covering = Vec::new();
    let mut sum = 0u64;
    for proof in proofs {
        if sum >= amount {
            break;
        }
        sum = sum.saturating_add(proof.amount);
        covering.push(proof);
    }
    (covering, false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
