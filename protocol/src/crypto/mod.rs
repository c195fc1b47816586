//! # Cryptographic Primitives
//!
//! Everything the token engine does with curves and hashes lives here:
//!
//! - **secp256k1** (via `k256`) for blind signatures. The same curve every
//!   deployed e-cash mint uses.
//! - **SHA-256** for hash-to-curve, hash-to-scalar and DLEQ challenges.
//! - **BLAKE3** for identifiers.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. The group arithmetic is `k256`; this module only fixes the
//! encodings and domain separators that the wallet and mint must agree on.
//! If you're tempted to optimize these functions, please reconsider.

pub mod curve;
pub mod dleq;
pub mod hash;
pub mod keys;
pub mod random;

pub use curve::{CurveError, Point, Scalar};
pub use dleq::DleqProof;
pub use hash::{blake3_hash, hash_to_curve, hash_to_scalar, sha256};
pub use keys::{MintKeys, MintKeyset};
pub use random::{new_blinding_scalar, new_secret, Secret};
