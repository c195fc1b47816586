//! # Protocol Configuration & Constants
//!
//! Every magic number in the token engine lives here. If you're hardcoding
//! a domain separator somewhere else, you're doing it wrong and you owe the
//! team coffee.
//!
//! Domain separators are part of the cryptographic contract between wallet
//! and mint. Changing one after tokens are in circulation invalidates every
//! proof ever issued, so treat them as frozen.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The protocol version string reported by wallets and mints.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// The curve every point and scalar lives on.
pub const CURVE_NAME: &str = "secp256k1";

/// Length of a per-token secret in bytes.
pub const SECRET_LENGTH: usize = 32;

/// Length of a SEC1-compressed secp256k1 point.
pub const POINT_LENGTH: usize = 33;

/// Length of a serialized scalar.
pub const SCALAR_LENGTH: usize = 32;

/// Domain separator for mapping `(secret, amount)` onto the curve.
pub const HASH_TO_CURVE_DOMAIN: &[u8] = b"ecash/v1/hash_to_curve";

/// Domain separator for the Fiat-Shamir challenge of DLEQ proofs.
pub const DLEQ_CHALLENGE_DOMAIN: &[u8] = b"ecash/v1/dleq_challenge";

/// Domain separator for deriving per-denomination mint keys from a seed.
pub const KEY_DERIVATION_DOMAIN: &[u8] = b"ecash/v1/mint_key";

/// Domain separator for the correlation handle of a blinded message.
pub const OUTPUT_ID_DOMAIN: &str = "ecash/v1/output_id";

/// Domain separator for keyset identifiers.
pub const KEYSET_ID_DOMAIN: &str = "ecash/v1/keyset_id";

/// Upper bound on hash-to-curve attempts. Each attempt succeeds with
/// probability ~1/2, so hitting this bound means SHA-256 is broken.
pub const HASH_TO_CURVE_MAX_ATTEMPTS: u32 = 1 << 16;

/// Number of power-of-two denominations the mint signs: `2^0 ..= 2^(MAX_ORDER-1)`.
/// 32 orders covers every amount up to `u32::MAX`.
pub const MAX_ORDER: u32 = 32;

/// Largest value a single token may carry.
pub const MAX_TOKEN_AMOUNT: u64 = (1u64 << MAX_ORDER) - 1;

// ---------------------------------------------------------------------------
// Token Encoding
// ---------------------------------------------------------------------------

/// Prefix of the copy-pasteable token string. The trailing `A` is the
/// encoding version.
pub const TOKEN_PREFIX: &str = "ecashA";

// ---------------------------------------------------------------------------
// Mint HTTP Surface
// ---------------------------------------------------------------------------

pub const PATH_KEYS: &str = "/keys";
pub const PATH_SIGN: &str = "/sign";
pub const PATH_REDEEM: &str = "/redeem";
pub const PATH_SPLIT: &str = "/split";
pub const PATH_COMBINE: &str = "/combine";
pub const PATH_CHECK: &str = "/check";

/// Default listening port of the reference mint.
pub const DEFAULT_MINT_PORT: u16 = 3338;

/// Default Prometheus port of the reference mint.
pub const DEFAULT_METRICS_PORT: u16 = 3339;

// ---------------------------------------------------------------------------
// Mint Client
// ---------------------------------------------------------------------------

/// Total request timeout for a single mint round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for establishing the TCP/TLS connection to the mint.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Attempts made when the mint is unreachable (request never sent).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Linear backoff step between unreachable-mint retries.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Settings for [`HttpMintClient`](crate::mint::HttpMintClient).
///
/// Passed explicitly to the client constructor. There is no process-wide
/// "current mint" anywhere in this crate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintClientConfig {
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// Connection-establishment timeout.
    pub connect_timeout: Duration,
    /// How many times to try a request whose connection could not be
    /// established. Requests that may have reached the mint are never
    /// replayed regardless of this value.
    pub max_attempts: u32,
    /// Delay added per failed attempt.
    pub retry_backoff: Duration,
}

impl Default for MintClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl MintClientConfig {
    /// Backoff before attempt number `attempt` (1-based; the first attempt
    /// never waits).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff * attempt.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_separators_are_distinct() {
        // A shared tag between two hash uses would let one output be
        // replayed as the other.
        let tags: Vec<&[u8]> = vec![
            HASH_TO_CURVE_DOMAIN,
            DLEQ_CHALLENGE_DOMAIN,
            KEY_DERIVATION_DOMAIN,
            OUTPUT_ID_DOMAIN.as_bytes(),
            KEYSET_ID_DOMAIN.as_bytes(),
        ];
        let mut deduped = tags.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(tags.len(), deduped.len());
    }

    #[test]
    fn test_max_token_amount_matches_orders() {
        assert_eq!(MAX_TOKEN_AMOUNT, u32::MAX as u64);
        assert_eq!(MAX_TOKEN_AMOUNT.count_ones(), MAX_ORDER);
    }

    #[test]
    fn test_default_client_config() {
        let cfg = MintClientConfig::default();
        assert!(cfg.connect_timeout < cfg.request_timeout);
        assert!(cfg.max_attempts >= 1);
    }

    #[test]
    fn test_backoff_is_linear() {
        let cfg = MintClientConfig::default();
        assert_eq!(cfg.backoff_for(1), Duration::ZERO);
        assert_eq!(cfg.backoff_for(2), DEFAULT_RETRY_BACKOFF);
        assert_eq!(cfg.backoff_for(3), DEFAULT_RETRY_BACKOFF * 2);
    }

    #[test]
    fn test_client_config_serde_roundtrip() {
        let cfg = MintClientConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: MintClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
