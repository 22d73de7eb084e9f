//! Ristretto255 group helpers
//!
//! Thin layer over `curve25519-dalek`: canonical encode/decode, uniform
//! sampling, and multi-scalar multiplication. Points and scalars are used
//! directly as `RistrettoPoint` / `Scalar` everywhere in the crate.

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::MultiscalarMul;
use rand::{CryptoRng, RngCore};

use crate::codec::CodecError;

/// Canonical encoding size of both scalars and group elements.
pub const ENCODED_LEN: usize = 32;

/// The fixed Ristretto basepoint.
///
/// Protocol sessions sample their own fresh base points; this one is only
/// the default starting base handed to key generation.
pub fn basepoint() -> RistrettoPoint {
    RISTRETTO_BASEPOINT_POINT
}

/// Sample a scalar uniformly from the scalar field.
pub fn rand_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    Scalar::random(rng)
}

/// Sample a group element with unknown discrete log relative to any other.
pub fn rand_element<R: RngCore + CryptoRng>(rng: &mut R) -> RistrettoPoint {
    RistrettoPoint::random(rng)
}

pub fn encode_element(point: &RistrettoPoint) -> [u8; ENCODED_LEN] {
    point.compress().to_bytes()
}

/// Decode a canonical 32-byte Ristretto encoding.
///
/// Exact-length input only; framing (length tags, trailing data) is the
/// codec layer's concern.
pub fn decode_element(bytes: &[u8]) -> Result<RistrettoPoint, CodecError> {
    let arr: [u8; ENCODED_LEN] =
        bytes
            .try_into()
            .map_err(|_| CodecError::WrongPayloadLength {
                expected: ENCODED_LEN,
                got: bytes.len(),
            })?;
    CompressedRistretto(arr)
        .decompress()
        .ok_or(CodecError::MalformedElement)
}

pub fn encode_scalar(scalar: &Scalar) -> [u8; ENCODED_LEN] {
    scalar.to_bytes()
}

/// Decode a canonical little-endian scalar, rejecting values `>= q`.
pub fn decode_scalar(bytes: &[u8]) -> Result<Scalar, CodecError> {
    let arr: [u8; ENCODED_LEN] =
        bytes
            .try_into()
            .map_err(|_| CodecError::WrongPayloadLength {
                expected: ENCODED_LEN,
                got: bytes.len(),
            })?;
    Option::<Scalar>::from(Scalar::from_canonical_bytes(arr)).ok_or(CodecError::MalformedScalar)
}

/// Multi-scalar multiplication: `Σ scalars[i] · points[i]`.
pub fn msm(scalars: &[Scalar], points: &[RistrettoPoint]) -> RistrettoPoint {
    debug_assert_eq!(scalars.len(), points.len());
    RistrettoPoint::multiscalar_mul(scalars.iter(), points.iter())
}

/// `x^1, x^2, …, x^n`.
pub fn scalar_powers(x: &Scalar, n: usize) -> Vec<Scalar> {
    let mut powers = Vec::with_capacity(n);
    let mut acc = Scalar::ONE;
    for _ in 0..n {
        acc *= x;
        powers.push(acc);
    }
    powers
}
