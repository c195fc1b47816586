//! # Curve Arithmetic
//!
//! A thin, type-safe facade over secp256k1 (via `k256`). Everything the
//! token engine does with elliptic curves goes through [`Point`] and
//! [`Scalar`] so that encoding rules and error handling live in one place.
//!
//! ## Encoding
//!
//! Points travel as 33-byte SEC1 compressed encodings, hex-encoded inside
//! JSON. Scalars travel as 32 big-endian bytes. Decoding rejects anything
//! that is not a canonical, on-curve, non-identity value. There is no
//! "lenient mode".
//!
//! ## Secrets
//!
//! [`Scalar`] deliberately prints as `Scalar(..)` in debug output. Blinding
//! factors and mint keys are scalars, and grepping logs for hex is trivial.

use k256::elliptic_curve::group::Group;
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::elliptic_curve::{Field, PrimeField};
use k256::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use thiserror::Error;

use crate::config::{POINT_LENGTH, SCALAR_LENGTH};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Malformed curve data. Always a bug or data corruption, so never retried.
///
/// Messages never include the offending bytes: some of them are secrets.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CurveError {
    #[error("invalid point encoding: {0}")]
    InvalidEncoding(&'static str),

    #[error("invalid scalar: {0}")]
    InvalidScalar(&'static str),

    #[error("hash-to-curve exhausted its attempt budget")]
    HashToCurve,
}

// ---------------------------------------------------------------------------
// Scalar
// ---------------------------------------------------------------------------

/// An element of the secp256k1 scalar field (integers mod the group order).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Scalar(pub(crate) k256::Scalar);

impl Scalar {
    /// Draws a uniformly random, nonzero scalar.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        loop {
            let s = k256::Scalar::random(&mut *rng);
            if !bool::from(s.is_zero()) {
                return Self(s);
            }
        }
    }

    /// Parses 32 big-endian bytes. Rejects values `>= n` and zero.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CurveError> {
        if bytes.len() != SCALAR_LENGTH {
            return Err(CurveError::InvalidScalar("expected 32 bytes"));
        }
        let repr = FieldBytes::clone_from_slice(bytes);
        let scalar = Option::<k256::Scalar>::from(k256::Scalar::from_repr(repr))
            .ok_or(CurveError::InvalidScalar("not below the group order"))?;
        if bool::from(scalar.is_zero()) {
            return Err(CurveError::InvalidScalar("zero"));
        }
        Ok(Self(scalar))
    }

    /// Parses a hex-encoded scalar.
    pub fn from_hex(s: &str) -> Result<Self, CurveError> {
        let bytes = hex::decode(s).map_err(|_| CurveError::InvalidScalar("not hex"))?;
        Self::from_bytes(&bytes)
    }

    /// 32 big-endian bytes.
    pub fn to_bytes(&self) -> [u8; SCALAR_LENGTH] {
        self.0.to_bytes().into()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn is_zero(&self) -> bool {
        bool::from(self.0.is_zero())
    }
}

impl Add for Scalar {
    type Output = Scalar;
    fn add(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 + rhs.0)
    }
}

impl Sub for Scalar {
    type Output = Scalar;
    fn sub(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 - rhs.0)
    }
}

impl Mul for Scalar {
    type Output = Scalar;
    fn mul(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 * rhs.0)
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar(..)")
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Scalar::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Point
// ---------------------------------------------------------------------------

/// A point on secp256k1.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Point(pub(crate) ProjectivePoint);

impl Point {
    /// The standard generator `G`.
    pub fn generator() -> Self {
        Self(ProjectivePoint::GENERATOR)
    }

    /// `scalar * G`.
    pub fn mul_base(scalar: &Scalar) -> Self {
        Self(ProjectivePoint::GENERATOR * scalar.0)
    }

    pub fn is_identity(&self) -> bool {
        bool::from(self.0.is_identity())
    }

    /// SEC1 compressed encoding. The identity has no compressed form and
    /// encodes as 33 zero bytes, which [`Point::decode`] refuses.
    pub fn encode(&self) -> [u8; POINT_LENGTH] {
        let mut out = [0u8; POINT_LENGTH];
        let encoded = self.0.to_affine().to_encoded_point(true);
        let bytes = encoded.as_bytes();
        if bytes.len() == POINT_LENGTH {
            out.copy_from_slice(bytes);
        }
        out
    }

    /// Decodes a SEC1 compressed point.
    ///
    /// Fails on wrong length, a bad tag byte, an x-coordinate with no
    /// matching curve point, or the identity.
    pub fn decode(bytes: &[u8]) -> Result<Self, CurveError> {
        if bytes.len() != POINT_LENGTH {
            return Err(CurveError::InvalidEncoding("expected 33 bytes"));
        }
        if bytes[0] != 0x02 && bytes[0] != 0x03 {
            return Err(CurveError::InvalidEncoding("bad SEC1 tag"));
        }
        let encoded = EncodedPoint::from_bytes(bytes)
            .map_err(|_| CurveError::InvalidEncoding("malformed SEC1 bytes"))?;
        let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
            .ok_or(CurveError::InvalidEncoding("point not on curve"))?;
        let point = Self(ProjectivePoint::from(affine));
        if point.is_identity() {
            return Err(CurveError::InvalidEncoding("identity"));
        }
        Ok(point)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    pub fn from_hex(s: &str) -> Result<Self, CurveError> {
        let bytes = hex::decode(s).map_err(|_| CurveError::InvalidEncoding("not hex"))?;
        Self::decode(&bytes)
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point(self.0 + rhs.0)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point(self.0 - rhs.0)
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point(-self.0)
    }
}

impl Mul<Scalar> for Point {
    type Output = Point;
    fn mul(self, rhs: Scalar) -> Point {
        Point(self.0 * rhs.0)
    }
}

impl Mul<&Scalar> for Point {
    type Output = Point;
    fn mul(self, rhs: &Scalar) -> Point {
        Point(self.0 * rhs.0)
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point({}...)", &self.to_hex()[..16])
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Point {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Point::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
