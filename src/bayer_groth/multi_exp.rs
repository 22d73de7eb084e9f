//! Multi-exponentiation argument
//!
//! Proves, for ciphertexts `C₁..Cₙ`, a target ciphertext `C*`, and a
//! Pedersen commitment `cmt_a = com(r_a; a)`, knowledge of `(a, r_a, ρ)`
//! with `C* = enc(ek, ρ, 0) + Σ aᵢ·Cᵢ`. Single-row variant: the prover
//! masks the exponent row with a random row `a₀`, publishes the two
//! diagonal ciphertexts `e₀` and `e₁ = C*`, and answers the challenge with
//! linearized openings.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::codec::{ByteReader, ByteWriter, CodecError, WireDecode, WireEncode};
use crate::elgamal::{msm_ciphertexts, Ciphertext, EncryptionKey};
use crate::group;
use crate::pedersen::CommitmentKey;
use crate::transcript::Transcript;

const LOG_TARGET: &str = "mental_poker::bayer_groth::multi_exp";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiExpProof {
    /// Commitment to the masking row `a₀`.
    pub cmt_a0: RistrettoPoint,
    /// Commitment to the masking scalar `b₀`.
    pub b_cmt_0: RistrettoPoint,
    /// Commitment to zero with zero blinding; pinned to the identity.
    pub b_cmt_1: RistrettoPoint,
    /// Diagonal ciphertext combining `a₀` with the ciphertext row.
    pub e0: Ciphertext,
    /// Equals the target ciphertext; re-checked by the verifier.
    pub e1: Ciphertext,
    pub a_vec: Vec<Scalar>,
    pub r: Scalar,
    pub b: Scalar,
    pub s: Scalar,
    pub tau: Scalar,
}

#[derive(Clone, Debug)]
pub struct MultiExpWitness {
    /// Exponent row committed in `cmt_a`.
    pub exponents: Vec<Scalar>,
    /// Blinding of `cmt_a`.
    pub blinding: Scalar,
    /// Randomizer of the `enc(ek, ρ, 0)` layer inside the target.
    pub rho: Scalar,
}

/// Prove over a transcript already carrying the statement.
pub fn prove<R: RngCore + CryptoRng>(
    transcript: &mut Transcript,
    key: &CommitmentKey,
    ek: &EncryptionKey,
    ciphertexts: &[Ciphertext],
    witness: &MultiExpWitness,
    rng: &mut R,
) -> MultiExpProof {
    let a = &witness.exponents;
    let n = a.len();
    assert_eq!(n, ciphertexts.len());
    assert!(n <= key.capacity());

    let a0: Vec<Scalar> = (0..n).map(|_| group::rand_scalar(rng)).collect();
    let r0 = group::rand_scalar(rng);
    let b0 = group::rand_scalar(rng);
    let s0 = group::rand_scalar(rng);
    let tau0 = group::rand_scalar(rng);

    let cmt_a0 = key.commit(&r0, &a0);
    let b_cmt_0 = key.commit(&s0, &[b0]);
    let b_cmt_1 = key.commit(&Scalar::ZERO, &[Scalar::ZERO]);

    let e0 = ek.encrypt(&tau0, &(ek.base * b0)) + msm_ciphertexts(ciphertexts, &a0);
    let e1 = ek.encrypt_zero(&witness.rho) + msm_ciphertexts(ciphertexts, a);

    transcript.append_element(&cmt_a0);
    transcript.append_element(&b_cmt_0);
    transcript.append_element(&b_cmt_1);
    transcript.append_ciphertext(&e0);
    transcript.append_ciphertext(&e1);
    let x = transcript.challenge();

    MultiExpProof {
        cmt_a0,
        b_cmt_0,
        b_cmt_1,
        e0,
        e1,
        a_vec: (0..n).map(|i| a0[i] + x * a[i]).collect(),
        r: r0 + x * witness.blinding,
        b: b0,
        s: s0,
        tau: tau0 + x * witness.rho,
    }
}

pub fn verify(
    transcript: &mut Transcript,
    key: &CommitmentKey,
    ek: &EncryptionKey,
    ciphertexts: &[Ciphertext],
    target: &Ciphertext,
    cmt_a: &RistrettoPoint,
    proof: &MultiExpProof,
) -> bool {
    let n = ciphertexts.len();
    if proof.a_vec.len() != n || n == 0 || n > key.capacity() {
        tracing::debug!(target: LOG_TARGET, n, "multi-exp proof has malformed dimensions");
        return false;
    }
    // The last diagonal must literally be the statement's target, and the
    // trailing exponent-row commitment must open to zero.
    if proof.e1 != *target || proof.b_cmt_1 != RistrettoPoint::identity() {
        tracing::debug!(target: LOG_TARGET, "statement binding check failed");
        return false;
    }

    transcript.append_element(&proof.cmt_a0);
    transcript.append_element(&proof.b_cmt_0);
    transcript.append_element(&proof.b_cmt_1);
    transcript.append_ciphertext(&proof.e0);
    transcript.append_ciphertext(&proof.e1);
    let x = transcript.challenge();

    if key.commit(&proof.r, &proof.a_vec) != proof.cmt_a0 + cmt_a * x {
        tracing::debug!(target: LOG_TARGET, "exponent opening check failed");
        return false;
    }
    if key.commit(&proof.s, &[proof.b]) != proof.b_cmt_0 + proof.b_cmt_1 * x {
        tracing::debug!(target: LOG_TARGET, "masking scalar check failed");
        return false;
    }

    let lhs = ek.encrypt(&proof.tau, &(ek.base * proof.b))
        + msm_ciphertexts(ciphertexts, &proof.a_vec);
    lhs == proof.e0 + target.scale(&x)
}

impl WireEncode for MultiExpProof {
    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_element(&self.cmt_a0);
        writer.write_element(&self.b_cmt_0);
        writer.write_element(&self.b_cmt_1);
        self.e0.encode(writer);
        self.e1.encode(writer);
        self.a_vec.encode(writer);
        writer.write_scalar(&self.r);
        writer.write_scalar(&self.b);
        writer.write_scalar(&self.s);
        writer.write_scalar(&self.tau);
    }
}

impl WireDecode for MultiExpProof {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            cmt_a0: reader.read_element()?,
            b_cmt_0: reader.read_element()?,
            b_cmt_1: reader.read_element()?,
            e0: Ciphertext::decode(reader)?,
            e1: Ciphertext::decode(reader)?,
            a_vec: Vec::<Scalar>::decode(reader)?,
            r: reader.read_scalar()?,
            b: reader.read_scalar()?,
            s: reader.read_scalar()?,
            tau: reader.read_scalar()?,
        })
    }
}
