//! Pedersen vector commitments
//!
//! A commitment key is one blinding base `H` plus `n` message bases
//! `G₁..Gₙ`, all sampled uniformly when the session that owns them is
//! created. Keys are never reused across sessions; an adversary who could
//! choose them would know discrete-log relations between the bases.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::MultiscalarMul;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::codec::{ByteReader, ByteWriter, CodecError, WireDecode, WireEncode};
use crate::group;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentKey {
    pub blinding_base: RistrettoPoint,
    pub message_bases: Vec<RistrettoPoint>,
}

impl CommitmentKey {
    /// Sample a fresh key committing to vectors of length up to `n`.
    pub fn rand<R: RngCore + CryptoRng>(n: usize, rng: &mut R) -> Self {
        Self {
            blinding_base: group::rand_element(rng),
            message_bases: (0..n).map(|_| group::rand_element(rng)).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.message_bases.len()
    }

    /// `H·blinding + Σ Gᵢ·values[i]`, using the first `values.len()` bases.
    pub fn commit(&self, blinding: &Scalar, values: &[Scalar]) -> RistrettoPoint {
        assert!(
            values.len() <= self.capacity(),
            "vector of {} exceeds commitment key capacity {}",
            values.len(),
            self.capacity()
        );
        RistrettoPoint::multiscalar_mul(
            std::iter::once(blinding).chain(values.iter()),
            std::iter::once(&self.blinding_base).chain(self.message_bases[..values.len()].iter()),
        )
    }

    /// `Σ Gᵢ` over the first `k` message bases.
    ///
    /// A commitment to the constant vector `(c, …, c)` with zero blinding is
    /// `c · base_sum(k)`; the shuffle verifier uses this to fold a public
    /// constant into a committed vector homomorphically.
    pub fn base_sum(&self, k: usize) -> RistrettoPoint {
        assert!(k <= self.capacity());
        self.message_bases[..k].iter().sum()
    }
}

impl WireEncode for CommitmentKey {
    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_element(&self.blinding_base);
        self.message_bases.encode(writer);
    }
}

impl WireDecode for CommitmentKey {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            blinding_base: reader.read_element()?,
            message_bases: Vec::<RistrettoPoint>::decode(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_rng;

    #[test]
    fn commit_matches_naive_formula() {
        let mut rng = test_rng();
        let key = CommitmentKey::rand(8, &mut rng);
        let blinding = group::rand_scalar(&mut rng);
        let values: Vec<Scalar> = (0..8).map(|_| group::rand_scalar(&mut rng)).collect();

        let naive = values
            .iter()
            .zip(key.message_bases.iter())
            .fold(key.blinding_base * blinding, |acc, (v, g)| acc + g * v);
        assert_eq!(key.commit(&blinding, &values), naive);
    }

    #[test]
    fn commitment_is_linearly_homomorphic() {
        let mut rng = test_rng();
        let key = CommitmentKey::rand(4, &mut rng);

        let (r1, r2) = (group::rand_scalar(&mut rng), group::rand_scalar(&mut rng));
        let v1: Vec<Scalar> = (0..4).map(|_| group::rand_scalar(&mut rng)).collect();
        let v2: Vec<Scalar> = (0..4).map(|_| group::rand_scalar(&mut rng)).collect();
        let sum: Vec<Scalar> = v1.iter().zip(v2.iter()).map(|(a, b)| a + b).collect();

        assert_eq!(
            key.commit(&r1, &v1) + key.commit(&r2, &v2),
            key.commit(&(r1 + r2), &sum)
        );
    }

    #[test]
    fn short_vectors_use_a_prefix_of_the_bases() {
        let mut rng = test_rng();
        let key = CommitmentKey::rand(8, &mut rng);
        let blinding = group::rand_scalar(&mut rng);
        let values: Vec<Scalar> = (0..3).map(|_| group::rand_scalar(&mut rng)).collect();

        let mut padded = values.clone();
        padded.extend(std::iter::repeat(Scalar::ZERO).take(5));
        assert_eq!(key.commit(&blinding, &values), key.commit(&blinding, &padded));
    }

    #[test]
    fn base_sum_equals_constant_vector_commitment() {
        let mut rng = test_rng();
        let key = CommitmentKey::rand(6, &mut rng);
        let c = group::rand_scalar(&mut rng);

        assert_eq!(
            key.base_sum(6) * c,
            key.commit(&Scalar::ZERO, &vec![c; 6])
        );
    }

    #[test]
    fn wire_round_trip() {
        let mut rng = test_rng();
        let key = CommitmentKey::rand(5, &mut rng);
        assert_eq!(CommitmentKey::from_bytes(&key.to_bytes()).unwrap(), key);
    }
}
