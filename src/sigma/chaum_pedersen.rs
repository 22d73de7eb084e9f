//! Chaum-Pedersen proof of discrete-log equality
//!
//! Proves knowledge of one `s` such that `s·B₀ = P₀` and `s·B₁ = P₁`.
//! The single response `z` answering both verification equations is what
//! ties the two discrete logs together.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::codec::{ByteReader, ByteWriter, CodecError, WireDecode, WireEncode};
use crate::group;
use crate::transcript::Transcript;

const LOG_TARGET: &str = "mental_poker::sigma::chaum_pedersen";

const TRANSCRIPT_DOMAIN: &[u8] = b"mental_poker/sigma/dlog-eq/v1";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaumPedersenProof {
    /// Commitment under the first base: `t₀ = r·B₀`.
    pub t0: RistrettoPoint,
    /// Commitment under the second base: `t₁ = r·B₁`.
    pub t1: RistrettoPoint,
    /// Shared response `z = r + c·s`.
    pub z: Scalar,
}

impl ChaumPedersenProof {
    pub fn prove<R: RngCore + CryptoRng>(
        base0: &RistrettoPoint,
        base1: &RistrettoPoint,
        secret: &Scalar,
        rng: &mut R,
    ) -> Self {
        let r = group::rand_scalar(rng);
        let t0 = base0 * r;
        let t1 = base1 * r;
        let c = Self::challenge(base0, &(base0 * secret), base1, &(base1 * secret), &t0, &t1);
        ChaumPedersenProof { t0, t1, z: r + c * secret }
    }

    /// Check `z·B₀ = t₀ + c·P₀` and `z·B₁ = t₁ + c·P₁`.
    pub fn verify(
        &self,
        base0: &RistrettoPoint,
        point0: &RistrettoPoint,
        base1: &RistrettoPoint,
        point1: &RistrettoPoint,
    ) -> bool {
        let c = Self::challenge(base0, point0, base1, point1, &self.t0, &self.t1);
        let first = base0 * self.z == self.t0 + point0 * c;
        let second = base1 * self.z == self.t1 + point1 * c;
        if !(first && second) {
            tracing::debug!(
                target: LOG_TARGET,
                first,
                second,
                "discrete-log equality proof rejected"
            );
        }
        first && second
    }

    fn challenge(
        base0: &RistrettoPoint,
        point0: &RistrettoPoint,
        base1: &RistrettoPoint,
        point1: &RistrettoPoint,
        t0: &RistrettoPoint,
        t1: &RistrettoPoint,
    ) -> Scalar {
        let mut transcript = Transcript::new(TRANSCRIPT_DOMAIN);
        transcript.append_element(base0);
        transcript.append_element(point0);
        transcript.append_element(base1);
        transcript.append_element(point1);
        transcript.append_element(t0);
        transcript.append_element(t1);
        transcript.challenge()
    }
}

impl WireEncode for ChaumPedersenProof {
    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_element(&self.t0);
        writer.write_element(&self.t1);
        writer.write_scalar(&self.z);
    }
}

impl WireDecode for ChaumPedersenProof {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            t0: reader.read_element()?,
            t1: reader.read_element()?,
            z: reader.read_scalar()?,
        })
    }
}
