//! Exponential ElGamal over Ristretto255
//!
//! Plaintexts are group elements, so ciphertexts are additively
//! homomorphic: component-wise addition adds plaintexts and randomness,
//! scalar multiplication scales both. Encrypt/decrypt are total functions;
//! malformed bytes are rejected at the codec layer before they become
//! ciphertexts.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::codec::{ByteReader, ByteWriter, CodecError, WireDecode, WireEncode};
use crate::group;

/// Public encryption key: a base point `B` and `P = s·B`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionKey {
    pub base: RistrettoPoint,
    pub point: RistrettoPoint,
}

impl EncryptionKey {
    /// `(r·B, m + r·P)`.
    pub fn encrypt(&self, randomizer: &Scalar, message: &RistrettoPoint) -> Ciphertext {
        Ciphertext {
            c0: self.base * randomizer,
            c1: message + self.point * randomizer,
        }
    }

    /// Encrypt the small message `m` as the group element `m·B`.
    pub fn encrypt_scalar(&self, randomizer: &Scalar, message: u64) -> Ciphertext {
        self.encrypt(randomizer, &(self.base * Scalar::from(message)))
    }

    /// An encryption of the identity element, used as a re-randomization
    /// layer: adding it to a ciphertext changes nothing but the randomness.
    pub fn encrypt_zero(&self, randomizer: &Scalar) -> Ciphertext {
        self.encrypt(randomizer, &RistrettoPoint::identity())
    }
}

impl WireEncode for EncryptionKey {
    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_element(&self.base);
        writer.write_element(&self.point);
    }
}

impl WireDecode for EncryptionKey {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            base: reader.read_element()?,
            point: reader.read_element()?,
        })
    }
}

/// Secret decryption key. The scalar is wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DecryptionKey {
    #[zeroize(skip)]
    pub base: RistrettoPoint,
    pub secret: Scalar,
}

impl DecryptionKey {
    pub fn keygen<R: RngCore + CryptoRng>(
        base: RistrettoPoint,
        rng: &mut R,
    ) -> (DecryptionKey, EncryptionKey) {
        let secret = group::rand_scalar(rng);
        let ek = EncryptionKey {
            base,
            point: base * secret,
        };
        (DecryptionKey { base, secret }, ek)
    }

    pub fn encryption_key(&self) -> EncryptionKey {
        EncryptionKey {
            base: self.base,
            point: self.base * self.secret,
        }
    }

    /// `C₁ − s·C₀`.
    pub fn decrypt(&self, ciphertext: &Ciphertext) -> RistrettoPoint {
        ciphertext.c1 - ciphertext.c0 * self.secret
    }
}

impl std::fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptionKey")
            .field("base", &self.base.compress())
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    pub c0: RistrettoPoint,
    pub c1: RistrettoPoint,
}

impl Ciphertext {
    pub fn identity() -> Self {
        Self {
            c0: RistrettoPoint::identity(),
            c1: RistrettoPoint::identity(),
        }
    }

    pub fn scale(&self, scalar: &Scalar) -> Self {
        Self {
            c0: self.c0 * scalar,
            c1: self.c1 * scalar,
        }
    }
}

impl Add for Ciphertext {
    type Output = Ciphertext;

    fn add(self, rhs: Ciphertext) -> Ciphertext {
        Ciphertext {
            c0: self.c0 + rhs.c0,
            c1: self.c1 + rhs.c1,
        }
    }
}

impl AddAssign for Ciphertext {
    fn add_assign(&mut self, rhs: Ciphertext) {
        self.c0 += rhs.c0;
        self.c1 += rhs.c1;
    }
}

impl Sub for Ciphertext {
    type Output = Ciphertext;

    fn sub(self, rhs: Ciphertext) -> Ciphertext {
        Ciphertext {
            c0: self.c0 - rhs.c0,
            c1: self.c1 - rhs.c1,
        }
    }
}

impl Neg for Ciphertext {
    type Output = Ciphertext;

    fn neg(self) -> Ciphertext {
        Ciphertext {
            c0: -self.c0,
            c1: -self.c1,
        }
    }
}

impl Mul<Scalar> for Ciphertext {
    type Output = Ciphertext;

    fn mul(self, rhs: Scalar) -> Ciphertext {
        self.scale(&rhs)
    }
}

impl Sum for Ciphertext {
    fn sum<I: Iterator<Item = Ciphertext>>(iter: I) -> Ciphertext {
        iter.fold(Ciphertext::identity(), |acc, c| acc + c)
    }
}

impl WireEncode for Ciphertext {
    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_element(&self.c0);
        writer.write_element(&self.c1);
    }
}

impl WireDecode for Ciphertext {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            c0: reader.read_element()?,
            c1: reader.read_element()?,
        })
    }
}

/// Component-wise multi-scalar multiplication: `Σ scalars[i] · cts[i]`.
pub fn msm_ciphertexts(ciphertexts: &[Ciphertext], scalars: &[Scalar]) -> Ciphertext {
    debug_assert_eq!(ciphertexts.len(), scalars.len());
    let c0: Vec<RistrettoPoint> = ciphertexts.iter().map(|c| c.c0).collect();
    let c1: Vec<RistrettoPoint> = ciphertexts.iter().map(|c| c.c1).collect();
    Ciphertext {
        c0: group::msm(scalars, &c0),
        c1: group::msm(scalars, &c1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_rng;

    #[test]
    fn decrypt_inverts_encrypt() {
        let mut rng = test_rng();
        for _ in 0..16 {
            let base = group::rand_element(&mut rng);
            let (dk, ek) = DecryptionKey::keygen(base, &mut rng);
            let message = group::rand_element(&mut rng);
            let r = group::rand_scalar(&mut rng);
            assert_eq!(dk.decrypt(&ek.encrypt(&r, &message)), message);
        }
    }

    #[test]
    fn addition_is_homomorphic() {
        let mut rng = test_rng();
        let (dk, ek) = DecryptionKey::keygen(group::basepoint(), &mut rng);

        let m1 = group::rand_element(&mut rng);
        let m2 = group::rand_element(&mut rng);
        let c1 = ek.encrypt(&group::rand_scalar(&mut rng), &m1);
        let c2 = ek.encrypt(&group::rand_scalar(&mut rng), &m2);

        assert_eq!(dk.decrypt(&(c1 + c2)), m1 + m2);
    }

    #[test]
    fn randomness_and_messages_add_componentwise() {
        let mut rng = test_rng();
        let (_, ek) = DecryptionKey::keygen(group::basepoint(), &mut rng);

        let (r1, r2) = (group::rand_scalar(&mut rng), group::rand_scalar(&mut rng));
        let (m1, m2) = (group::rand_element(&mut rng), group::rand_element(&mut rng));

        assert_eq!(
            ek.encrypt(&r1, &m1) + ek.encrypt(&r2, &m2),
            ek.encrypt(&(r1 + r2), &(m1 + m2))
        );
    }

    #[test]
    fn scaling_scales_the_plaintext() {
        let mut rng = test_rng();
        let (dk, ek) = DecryptionKey::keygen(group::basepoint(), &mut rng);

        let m = group::rand_element(&mut rng);
        let x = group::rand_scalar(&mut rng);
        let c = ek.encrypt(&group::rand_scalar(&mut rng), &m);

        assert_eq!(dk.decrypt(&c.scale(&x)), m * x);
    }

    #[test]
    fn ciphertext_msm_matches_weighted_sum_of_plaintexts() {
        // Regression for the source's identity-initialized accumulator: the
        // weighted combination must decrypt to the weighted plaintext sum.
        let mut rng = test_rng();
        let (dk, ek) = DecryptionKey::keygen(group::basepoint(), &mut rng);

        let messages: Vec<RistrettoPoint> =
            (0..8).map(|_| group::rand_element(&mut rng)).collect();
        let ciphertexts: Vec<Ciphertext> = messages
            .iter()
            .map(|m| ek.encrypt(&group::rand_scalar(&mut rng), m))
            .collect();
        let weights: Vec<Scalar> = (0..8).map(|_| group::rand_scalar(&mut rng)).collect();

        let combined = msm_ciphertexts(&ciphertexts, &weights);

        let folded = ciphertexts
            .iter()
            .zip(weights.iter())
            .fold(Ciphertext::identity(), |acc, (c, x)| acc + c.scale(x));
        assert_eq!(combined, folded);

        let expected: RistrettoPoint = messages
            .iter()
            .zip(weights.iter())
            .map(|(m, x)| m * x)
            .sum();
        assert_eq!(dk.decrypt(&combined), expected);
    }

    #[test]
    fn wire_round_trip() {
        let mut rng = test_rng();
        let (_, ek) = DecryptionKey::keygen(group::basepoint(), &mut rng);
        let ct = ek.encrypt(&group::rand_scalar(&mut rng), &group::rand_element(&mut rng));

        assert_eq!(Ciphertext::from_bytes(&ct.to_bytes()).unwrap(), ct);
        assert_eq!(EncryptionKey::from_bytes(&ek.to_bytes()).unwrap(), ek);
    }
}
