//! Property tests for the token engine.
//!
//! Sign/verify cases run against a single in-process mint; the key
//! derivation is the expensive part, so it happens once.

use proptest::prelude::*;
use std::sync::OnceLock;

use ecash_protocol::config::{MAX_ORDER, MAX_TOKEN_AMOUNT};
use ecash_protocol::crypto::keys::{is_denomination, split_amount};
use ecash_protocol::crypto::{Point, Secret};
use ecash_protocol::mint::Mint;
use ecash_protocol::token::{commit, construct, verify, PreparedOutput, Proof, Token};

fn mint() -> &'static Mint {
    static MINT: OnceLock<Mint> = OnceLock::new();
    MINT.get_or_init(|| Mint::temporary(&[42u8; 32]).expect("temp mint"))
}

fn issue(amount: u64) -> Proof {
    let output = PreparedOutput::new(amount).expect("denomination");
    let signature = mint().sign(output.message()).expect("signed");
    construct(output, &signature, mint().keys()).expect("constructed")
}

fn denomination() -> impl Strategy<Value = u64> {
    (0..MAX_ORDER).prop_map(|order| 1u64 << order)
}

proptest! {
    #[test]
    fn split_amount_decomposes_exactly(amount in 1..=MAX_TOKEN_AMOUNT) {
        let parts = split_amount(amount);
        prop_assert_eq!(parts.iter().sum::<u64>(), amount);
        prop_assert!(parts.iter().all(|p| is_denomination(*p)));
        prop_assert!(parts.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(parts.len() as u32, amount.count_ones());
    }

    #[test]
    fn split_amount_rejects_out_of_range(amount in (MAX_TOKEN_AMOUNT + 1)..u64::MAX) {
        prop_assert!(split_amount(amount).is_empty());
    }

    #[test]
    fn commit_is_deterministic_and_binds_amount(
        bytes in any::<[u8; 32]>(),
        amount in 1u64..1_000_000,
    ) {
        let secret = Secret::from_bytes(bytes);
        let y = commit(&secret, amount).unwrap();
        prop_assert_eq!(y, commit(&secret, amount).unwrap());
        prop_assert_ne!(y, commit(&secret, amount + 1).unwrap());
    }

    #[test]
    fn point_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..70)) {
        let _ = Point::decode(&bytes);
    }

    #[test]
    fn token_decode_never_panics(s in "\\PC{0,200}") {
        let _ = Token::decode(&s);
        let _ = Token::decode(&format!("ecashA{s}"));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn issued_proofs_verify(amount in denomination()) {
        let proof = issue(amount);
        prop_assert!(verify(&proof, mint().keys()));
        prop_assert!(mint().verify_proof(&proof));
    }

    #[test]
    fn amount_tampering_fails(amount in denomination(), other in denomination()) {
        prop_assume!(amount != other);
        let mut proof = issue(amount);
        proof.amount = other;
        prop_assert!(!verify(&proof, mint().keys()));
        prop_assert!(!mint().verify_proof(&proof));
    }

    #[test]
    fn secret_tampering_fails(amount in denomination(), flip in 0usize..32) {
        let proof = issue(amount);
        let mut bytes = *proof.secret.as_bytes();
        bytes[flip] ^= 0x01;
        let mut tampered = proof.clone();
        tampered.secret = Secret::from_bytes(bytes);
        prop_assert!(!verify(&tampered, mint().keys()));
        prop_assert!(!mint().verify_proof(&tampered));
    }

    #[test]
    fn dropped_dleq_fails_offline_only(amount in denomination()) {
        let mut proof = issue(amount);
        proof.dleq = None;
        prop_assert!(!verify(&proof, mint().keys()));
        // The mint checks with its private key and does not need the DLEQ.
        prop_assert!(mint().verify_proof(&proof));
    }
}
