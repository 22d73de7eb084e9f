//! Bayer-Groth verifiable shuffle
//!
//! Proves that one ElGamal deck is a re-randomized permutation of another
//! without revealing the permutation. Composition of two sub-arguments over
//! Pedersen vector commitments:
//!
//! 1. commit to the permutation as the scalar vector `(π(1)..π(n))`,
//!    derive `x`, then commit to `(x^{π(1)}..x^{π(n)})`;
//! 2. a product argument shows the second vector is consistent with the
//!    first being a permutation of `1..n` (the polynomial identity
//!    `Π(y·aᵢ + bᵢ − z) = Π(y·i + xⁱ − z)` only survives a random `y, z`
//!    when `b` really is `x` raised to a permutation of `1..n`);
//! 3. a multi-exp argument shows the new deck combined with those powers
//!    reproduces the old deck scaled by powers of `x`, up to an encryption
//!    of zero, which pins the ciphertext contents themselves.
//!
//! The two sub-proofs share the transcript prefix up to `z` and branch on
//! clones of it.

pub mod multi_exp;
pub mod product_argument;

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::codec::{ByteReader, ByteWriter, CodecError, WireDecode, WireEncode};
use crate::elgamal::{msm_ciphertexts, Ciphertext, EncryptionKey};
use crate::group;
use crate::pedersen::CommitmentKey;
use crate::transcript::Transcript;

pub use multi_exp::{MultiExpProof, MultiExpWitness};
pub use product_argument::{ProductProof, ProductWitness};

const LOG_TARGET: &str = "mental_poker::bayer_groth";

const TRANSCRIPT_DOMAIN: &[u8] = b"mental_poker/shuffle/v1";

/// Appended between the `y` and `z` challenges so they are derived from
/// distinct transcripts.
const CHALLENGE_NUDGE: &[u8] = b"NUDGE";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleProof {
    /// Commitment to the permutation `(π(1)..π(n))`.
    pub a_cmt: RistrettoPoint,
    /// Commitment to `(x^{π(1)}..x^{π(n)})`.
    pub b_cmt: RistrettoPoint,
    pub multi_exp: MultiExpProof,
    pub product: ProductProof,
}

#[derive(Clone, Debug)]
pub struct ShuffleWitness {
    /// `new[i] = old[perm[i]] + enc(reenc_rands[i], 0)`.
    pub perm: Vec<usize>,
    pub reenc_rands: Vec<Scalar>,
}

impl ShuffleWitness {
    /// Sample a uniform permutation and fresh re-randomizers.
    pub fn random<R: RngCore + CryptoRng>(n: usize, rng: &mut R) -> Self {
        Self {
            perm: random_permutation(n, rng),
            reenc_rands: (0..n).map(|_| group::rand_scalar(rng)).collect(),
        }
    }
}

/// Fisher-Yates.
pub fn random_permutation<R: Rng>(n: usize, rng: &mut R) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        perm.swap(i, rng.gen_range(0..=i));
    }
    perm
}

/// Apply a shuffle witness to a deck.
pub fn apply_shuffle(
    ek: &EncryptionKey,
    deck: &[Ciphertext],
    witness: &ShuffleWitness,
) -> Vec<Ciphertext> {
    assert_eq!(deck.len(), witness.perm.len());
    assert_eq!(deck.len(), witness.reenc_rands.len());
    witness
        .perm
        .iter()
        .zip(witness.reenc_rands.iter())
        .map(|(&from, r)| deck[from] + ek.encrypt_zero(r))
        .collect()
}

fn statement_transcript(
    ek: &EncryptionKey,
    old: &[Ciphertext],
    new: &[Ciphertext],
) -> Transcript {
    let mut transcript = Transcript::new(TRANSCRIPT_DOMAIN);
    transcript.append_element(&ek.base);
    transcript.append_element(&ek.point);
    transcript.append_ciphertexts(old);
    transcript.append_ciphertexts(new);
    transcript
}

pub fn prove<R: RngCore + CryptoRng>(
    key: &CommitmentKey,
    ek: &EncryptionKey,
    old: &[Ciphertext],
    new: &[Ciphertext],
    witness: &ShuffleWitness,
    rng: &mut R,
) -> ShuffleProof {
    let n = old.len();
    assert!(n >= 2);
    assert_eq!(new.len(), n);
    assert_eq!(witness.perm.len(), n);
    assert!(n <= key.capacity());

    // Permutation image, 1-based so the product identity below ranges over 1..n.
    let a: Vec<Scalar> = witness
        .perm
        .iter()
        .map(|&p| Scalar::from((p + 1) as u64))
        .collect();
    let r_a = group::rand_scalar(rng);
    let a_cmt = key.commit(&r_a, &a);

    let mut transcript = statement_transcript(ek, old, new);
    transcript.append_element(&a_cmt);
    let x = transcript.challenge();

    let x_powers = group::scalar_powers(&x, n);
    let b: Vec<Scalar> = witness.perm.iter().map(|&p| x_powers[p]).collect();
    let r_b = group::rand_scalar(rng);
    let b_cmt = key.commit(&r_b, &b);

    transcript.append_element(&b_cmt);
    let y = transcript.challenge();
    transcript.append_bytes(CHALLENGE_NUDGE);
    let z = transcript.challenge();

    // Product branch: the committed vector y·a + b − z multiplies to the
    // same public value as y·i + x^i − z over i = 1..n.
    let product_values: Vec<Scalar> = (0..n).map(|i| y * a[i] + b[i] - z).collect();
    let product_witness = ProductWitness {
        values: product_values,
        blinding: y * r_a + r_b,
    };
    let mut product_transcript = transcript.clone();
    let product = product_argument::prove(&mut product_transcript, key, &product_witness, rng);

    // Multi-exp branch: Σ x^i·old[i] = enc(−Σ ρᵢ·bᵢ, 0) + Σ bᵢ·new[i].
    let rho = -witness
        .reenc_rands
        .iter()
        .zip(b.iter())
        .map(|(r, bi)| r * bi)
        .sum::<Scalar>();
    let multi_exp_witness = MultiExpWitness {
        exponents: b,
        blinding: r_b,
        rho,
    };
    let multi_exp = multi_exp::prove(&mut transcript, key, ek, new, &multi_exp_witness, rng);

    ShuffleProof {
        a_cmt,
        b_cmt,
        multi_exp,
        product,
    }
}

pub fn verify(
    key: &CommitmentKey,
    ek: &EncryptionKey,
    old: &[Ciphertext],
    new: &[Ciphertext],
    proof: &ShuffleProof,
) -> bool {
    let n = old.len();
    if n < 2 || new.len() != n || n > key.capacity() {
        tracing::debug!(target: LOG_TARGET, n, "shuffle statement has malformed dimensions");
        return false;
    }

    let mut transcript = statement_transcript(ek, old, new);
    transcript.append_element(&proof.a_cmt);
    let x = transcript.challenge();
    transcript.append_element(&proof.b_cmt);
    let y = transcript.challenge();
    transcript.append_bytes(CHALLENGE_NUDGE);
    let z = transcript.challenge();

    let x_powers = group::scalar_powers(&x, n);

    // Public side of the permutation identity.
    let expected_product: Scalar = (0..n)
        .map(|i| y * Scalar::from((i + 1) as u64) + x_powers[i] - z)
        .product();
    // com(y·a + b − z; y·r_a + r_b) derived homomorphically.
    let product_cmt = proof.a_cmt * y + proof.b_cmt - key.base_sum(n) * z;

    let mut product_transcript = transcript.clone();
    if !product_argument::verify(
        &mut product_transcript,
        key,
        &product_cmt,
        &expected_product,
        &proof.product,
    ) {
        tracing::debug!(target: LOG_TARGET, "permutation argument rejected");
        return false;
    }

    let target = msm_ciphertexts(old, &x_powers);
    if !multi_exp::verify(
        &mut transcript,
        key,
        ek,
        new,
        &target,
        &proof.b_cmt,
        &proof.multi_exp,
    ) {
        tracing::debug!(target: LOG_TARGET, "re-encryption argument rejected");
        return false;
    }
    true
}

impl WireEncode for ShuffleProof {
    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_element(&self.a_cmt);
        writer.write_element(&self.b_cmt);
        self.multi_exp.encode(writer);
        self.product.encode(writer);
    }
}

impl WireDecode for ShuffleProof {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            a_cmt: reader.read_element()?,
            b_cmt: reader.read_element()?,
            multi_exp: MultiExpProof::decode(reader)?,
            product: ProductProof::decode(reader)?,
        })
    }
}
