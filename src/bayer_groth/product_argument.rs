//! Single-value product argument
//!
//! Proves, for a Pedersen commitment `cmt = com(r; a₁..aₙ)` and a public
//! scalar `product`, knowledge of an opening with `product = Π aᵢ`. The
//! prover commits to a random vector `d` and to two helper vectors that
//! encode the telescoping relation over the prefix products `pᵢ`; the
//! challenge `x` collapses everything into two linear commitment checks
//! plus the terminal check `b̃ₙ = x·product`.

use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use curve25519_dalek::ristretto::RistrettoPoint;

use crate::codec::{ByteReader, ByteWriter, CodecError, WireDecode, WireEncode};
use crate::group;
use crate::pedersen::CommitmentKey;
use crate::transcript::Transcript;

const LOG_TARGET: &str = "mental_poker::bayer_groth::product";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductProof {
    /// Commitment to the masking vector `d`.
    pub cmt_d: RistrettoPoint,
    /// Commitment to `(−δᵢ·dᵢ₊₁)ᵢ`.
    pub cmt_dd: RistrettoPoint,
    /// Commitment to `(δᵢ₊₁ − aᵢ₊₁·δᵢ − pᵢ·dᵢ₊₁)ᵢ`.
    pub cmt_da: RistrettoPoint,
    pub a_tilde: Vec<Scalar>,
    pub b_tilde: Vec<Scalar>,
    pub r_tilde: Scalar,
    pub s_tilde: Scalar,
}

#[derive(Clone, Debug)]
pub struct ProductWitness {
    pub values: Vec<Scalar>,
    pub blinding: Scalar,
}

impl ProductWitness {
    pub fn product(&self) -> Scalar {
        self.values.iter().product()
    }
}

/// Prove over a transcript already carrying the statement.
///
/// The caller must have absorbed the commitment (and whatever binds the
/// public product) before this runs; prover and verifier then perform the
/// identical appends below.
pub fn prove<R: RngCore + CryptoRng>(
    transcript: &mut Transcript,
    key: &CommitmentKey,
    witness: &ProductWitness,
    rng: &mut R,
) -> ProductProof {
    let a = &witness.values;
    let n = a.len();
    assert!(n >= 2, "product argument needs at least two entries");
    assert!(n <= key.capacity());

    // Prefix products p_i = a_1 · … · a_i.
    let mut prefix = Vec::with_capacity(n);
    let mut acc = Scalar::ONE;
    for value in a {
        acc *= value;
        prefix.push(acc);
    }

    let d: Vec<Scalar> = (0..n).map(|_| group::rand_scalar(rng)).collect();
    let mut delta = Vec::with_capacity(n);
    delta.push(d[0]);
    delta.extend((0..n.saturating_sub(2)).map(|_| group::rand_scalar(rng)));
    delta.push(Scalar::ZERO);

    let dd: Vec<Scalar> = (0..n - 1).map(|i| -delta[i] * d[i + 1]).collect();
    let da: Vec<Scalar> = (0..n - 1)
        .map(|i| delta[i + 1] - a[i + 1] * delta[i] - prefix[i] * d[i + 1])
        .collect();

    let r_d = group::rand_scalar(rng);
    let r_dd = group::rand_scalar(rng);
    let r_da = group::rand_scalar(rng);
    let cmt_d = key.commit(&r_d, &d);
    let cmt_dd = key.commit(&r_dd, &dd);
    let cmt_da = key.commit(&r_da, &da);

    transcript.append_element(&cmt_d);
    transcript.append_element(&cmt_dd);
    transcript.append_element(&cmt_da);
    let x = transcript.challenge();

    let a_tilde: Vec<Scalar> = (0..n).map(|i| x * a[i] + d[i]).collect();
    let b_tilde: Vec<Scalar> = (0..n).map(|i| x * prefix[i] + delta[i]).collect();

    ProductProof {
        cmt_d,
        cmt_dd,
        cmt_da,
        a_tilde,
        b_tilde,
        r_tilde: x * witness.blinding + r_d,
        s_tilde: x * r_da + r_dd,
    }
}

pub fn verify(
    transcript: &mut Transcript,
    key: &CommitmentKey,
    cmt: &RistrettoPoint,
    product: &Scalar,
    proof: &ProductProof,
) -> bool {
    let n = proof.a_tilde.len();
    if n < 2 || n > key.capacity() || proof.b_tilde.len() != n {
        tracing::debug!(target: LOG_TARGET, n, "product proof has malformed dimensions");
        return false;
    }

    transcript.append_element(&proof.cmt_d);
    transcript.append_element(&proof.cmt_dd);
    transcript.append_element(&proof.cmt_da);
    let x = transcript.challenge();

    // com(r̃; ã) = x·cmt + cmt_d
    if key.commit(&proof.r_tilde, &proof.a_tilde) != cmt * x + proof.cmt_d {
        tracing::debug!(target: LOG_TARGET, "opening check failed");
        return false;
    }

    // com(s̃; x·b̃ᵢ₊₁ − b̃ᵢ·ãᵢ₊₁) = x·cmt_da + cmt_dd
    let diffs: Vec<Scalar> = (0..n - 1)
        .map(|i| x * proof.b_tilde[i + 1] - proof.b_tilde[i] * proof.a_tilde[i + 1])
        .collect();
    if key.commit(&proof.s_tilde, &diffs) != proof.cmt_da * x + proof.cmt_dd {
        tracing::debug!(target: LOG_TARGET, "telescoping check failed");
        return false;
    }

    // The prefix chain starts at a₁ and ends at the claimed product.
    proof.b_tilde[0] == proof.a_tilde[0] && proof.b_tilde[n - 1] == x * product
}

impl WireEncode for ProductProof {
    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_element(&self.cmt_d);
        writer.write_element(&self.cmt_dd);
        writer.write_element(&self.cmt_da);
        self.a_tilde.encode(writer);
        self.b_tilde.encode(writer);
        writer.write_scalar(&self.r_tilde);
        writer.write_scalar(&self.s_tilde);
    }
}

impl WireDecode for ProductProof {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            cmt_d: reader.read_element()?,
            cmt_dd: reader.read_element()?,
            cmt_da: reader.read_element()?,
            a_tilde: Vec::<Scalar>::decode(reader)?,
            b_tilde: Vec::<Scalar>::decode(reader)?,
            r_tilde: reader.read_scalar()?,
            s_tilde: reader.read_scalar()?,
        })
    }
}
