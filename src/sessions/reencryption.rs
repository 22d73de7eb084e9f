//! Private card dealing by re-encryption
//!
//! Deals one encrypted card to a single recipient. Phase A: the recipient
//! publishes `T = t·B`, `TS = t·(s·B)` and a blind `URT = u·(C₀+T)` with
//! proofs tying `t` to both bases and `u` to the shifted ciphertext. That
//! transforms the card into `C' = (C₀+T, C₁+URT+TS)`, which still decrypts
//! under the shared secret but now carries a blind only the recipient can
//! remove. Phase B: the whole roster runs threshold scalar multiplication
//! over `C'₀`, so the recipient, and nobody else, can finish
//! `m = C'₁ − s·C'₀ − u·C'₀` locally.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::codec::{ByteReader, ByteWriter, CodecError, WireDecode, WireEncode};
use crate::elgamal::Ciphertext;
use crate::group;
use crate::sessions::dkg::SharedSecretPublicInfo;
use crate::sessions::scalar_mul::{ScalarMulContribution, ScalarMulSession};
use crate::sessions::{Address, ProtocolError, SessionStatus, UnixSeconds};
use crate::sigma::{ChaumPedersenProof, SchnorrProof};

const LOG_TARGET: &str = "mental_poker::sessions::reencryption";

/// The recipient's private unblinding scalar. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RecipientBlind {
    pub u: Scalar,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReencryptContribution {
    /// `T = t·B`.
    pub th: RistrettoPoint,
    /// `TS = t·(s·B)`.
    pub tsh: RistrettoPoint,
    /// `URT = u·(C₀+T)`.
    pub urth: RistrettoPoint,
    /// Ties `t` across `B` and `s·B`.
    pub proof_t: Option<ChaumPedersenProof>,
    /// Knowledge of `u` over the base `C₀+T`.
    pub proof_u: Option<SchnorrProof>,
}

impl ReencryptContribution {
    /// Recipient side: sample fresh `(t, u)` and keep `u` for the reveal.
    pub fn create<R: RngCore + CryptoRng>(
        shared: &SharedSecretPublicInfo,
        card: &Ciphertext,
        rng: &mut R,
    ) -> (RecipientBlind, Self) {
        let base = shared.aggregate.base;
        let shared_point = shared.aggregate.point;

        let t = group::rand_scalar(rng);
        let u = group::rand_scalar(rng);
        let th = base * t;
        let tsh = shared_point * t;
        let shifted = card.c0 + th;
        let urth = shifted * u;

        let proof_t = ChaumPedersenProof::prove(&base, &shared_point, &t, rng);
        let proof_u = SchnorrProof::prove(&shifted, &urth, &u, rng);

        (
            RecipientBlind { u },
            Self {
                th,
                tsh,
                urth,
                proof_t: Some(proof_t),
                proof_u: Some(proof_u),
            },
        )
    }
}

impl WireEncode for ReencryptContribution {
    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_element(&self.th);
        writer.write_element(&self.tsh);
        writer.write_element(&self.urth);
        self.proof_t.encode(writer);
        self.proof_u.encode(writer);
    }
}

impl WireDecode for ReencryptContribution {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            th: reader.read_element()?,
            tsh: reader.read_element()?,
            urth: reader.read_element()?,
            proof_t: Option::<ChaumPedersenProof>::decode(reader)?,
            proof_u: Option::<SchnorrProof>::decode(reader)?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReencAccepting {
    pub card: Ciphertext,
    pub shared: SharedSecretPublicInfo,
    pub target: Address,
    pub roster: Vec<Address>,
    pub reencrypt_deadline: UnixSeconds,
    pub scalar_mul_deadline: UnixSeconds,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReencScaling {
    pub target: Address,
    pub reencryption: ReencryptContribution,
    pub transformed: Ciphertext,
    pub scalar_mul: ScalarMulSession,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReencSuccess {
    pub target: Address,
    pub reencryption: ReencryptContribution,
    pub transformed: Ciphertext,
    /// `s·C'₀` from the threshold multiplication.
    pub scaled: RistrettoPoint,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReencFailure {
    pub culprits: Vec<Address>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ReencryptionSession {
    AcceptingReencrypt(ReencAccepting),
    ScalarMulInProgress(ReencScaling),
    Succeeded(ReencSuccess),
    Failed(ReencFailure),
}

impl ReencryptionSession {
    pub fn new(
        card: Ciphertext,
        shared: SharedSecretPublicInfo,
        target: Address,
        roster: Vec<Address>,
        reencrypt_deadline: UnixSeconds,
        scalar_mul_deadline: UnixSeconds,
    ) -> Self {
        assert!(
            reencrypt_deadline < scalar_mul_deadline,
            "re-encryption must close before the scalar multiplication"
        );
        assert!(roster.contains(&target));
        ReencryptionSession::AcceptingReencrypt(ReencAccepting {
            card,
            shared,
            target,
            roster,
            reencrypt_deadline,
            scalar_mul_deadline,
        })
    }

    pub fn status(&self) -> SessionStatus {
        match self {
            ReencryptionSession::AcceptingReencrypt(_)
            | ReencryptionSession::ScalarMulInProgress(_) => SessionStatus::InProgress,
            ReencryptionSession::Succeeded(_) => SessionStatus::Succeeded,
            ReencryptionSession::Failed(_) => SessionStatus::Failed,
        }
    }

    pub fn culprits(&self) -> &[Address] {
        match self {
            ReencryptionSession::Failed(failure) => &failure.culprits,
            _ => &[],
        }
    }

    pub fn target(&self) -> Option<Address> {
        match self {
            ReencryptionSession::AcceptingReencrypt(st) => Some(st.target),
            ReencryptionSession::ScalarMulInProgress(st) => Some(st.target),
            ReencryptionSession::Succeeded(st) => Some(st.target),
            ReencryptionSession::Failed(_) => None,
        }
    }

    /// The recipient's published re-encryption, once phase A is done.
    pub fn reencryption(&self) -> Option<&ReencryptContribution> {
        match self {
            ReencryptionSession::ScalarMulInProgress(st) => Some(&st.reencryption),
            ReencryptionSession::Succeeded(st) => Some(&st.reencryption),
            _ => None,
        }
    }

    pub fn transformed(&self) -> Option<&Ciphertext> {
        match self {
            ReencryptionSession::ScalarMulInProgress(st) => Some(&st.transformed),
            ReencryptionSession::Succeeded(st) => Some(&st.transformed),
            _ => None,
        }
    }

    /// Phase A: only the designated recipient may transform the card.
    pub fn process_reencryption(
        &mut self,
        from: Address,
        contribution: ReencryptContribution,
    ) -> Result<(), ProtocolError> {
        let st = match self {
            ReencryptionSession::AcceptingReencrypt(st) => st,
            other => {
                return Err(ProtocolError::SessionClosed {
                    status: other.status(),
                })
            }
        };
        if from != st.target {
            return Err(ProtocolError::WrongTurn {
                expected: st.target,
                got: from,
            });
        }
        let base = st.shared.aggregate.base;
        let shared_point = st.shared.aggregate.point;

        let proof_t = contribution
            .proof_t
            .as_ref()
            .ok_or(ProtocolError::ProofInvalid { context: "re-encryption shift" })?;
        if !proof_t.verify(&base, &contribution.th, &shared_point, &contribution.tsh) {
            return Err(ProtocolError::ProofInvalid { context: "re-encryption shift" });
        }

        let shifted = st.card.c0 + contribution.th;
        let proof_u = contribution
            .proof_u
            .as_ref()
            .ok_or(ProtocolError::ProofInvalid { context: "re-encryption blind" })?;
        if !proof_u.verify(&shifted, &contribution.urth) {
            return Err(ProtocolError::ProofInvalid { context: "re-encryption blind" });
        }

        let transformed = Ciphertext {
            c0: shifted,
            c1: st.card.c1 + contribution.urth + contribution.tsh,
        };
        let next = ReencryptionSession::ScalarMulInProgress(ReencScaling {
            target: st.target,
            reencryption: contribution,
            transformed,
            scalar_mul: ScalarMulSession::new(
                transformed.c0,
                st.shared.clone(),
                st.roster.clone(),
                st.roster.len(),
                st.scalar_mul_deadline,
            ),
        });
        tracing::debug!(target: LOG_TARGET, %from, "card transformed, scalar multiplication open");
        *self = next;
        Ok(())
    }

    /// Phase B: any roster member's share multiplication over `C'₀`.
    pub fn process_scalar_mul(
        &mut self,
        from: Address,
        contribution: ScalarMulContribution,
    ) -> Result<(), ProtocolError> {
        match self {
            ReencryptionSession::ScalarMulInProgress(st) => {
                st.scalar_mul.process_contribution(from, contribution)
            }
            other => Err(ProtocolError::SessionClosed {
                status: other.status(),
            }),
        }
    }

    pub fn state_update(&mut self, now: UnixSeconds) {
        let next = match self {
            ReencryptionSession::AcceptingReencrypt(st) => {
                if now >= st.reencrypt_deadline {
                    tracing::warn!(target: LOG_TARGET, target_addr = %st.target, "recipient missed the deal");
                    Some(ReencryptionSession::Failed(ReencFailure {
                        culprits: vec![st.target],
                    }))
                } else {
                    None
                }
            }
            ReencryptionSession::ScalarMulInProgress(st) => {
                st.scalar_mul.state_update(now);
                match &st.scalar_mul {
                    ScalarMulSession::Succeeded(inner) => {
                        Some(ReencryptionSession::Succeeded(ReencSuccess {
                            target: st.target,
                            reencryption: st.reencryption.clone(),
                            transformed: st.transformed,
                            scaled: inner.result,
                        }))
                    }
                    ScalarMulSession::Failed(inner) => {
                        Some(ReencryptionSession::Failed(ReencFailure {
                            culprits: inner.culprits.clone(),
                        }))
                    }
                    ScalarMulSession::InProgress(_) => None,
                }
            }
            _ => None,
        };
        if let Some(next) = next {
            *self = next;
        }
    }

    /// Recipient-local reveal: `m = C'₁ − s·C'₀ − u·C'₀`.
    pub fn reveal(&self, blind: &RecipientBlind) -> Option<RistrettoPoint> {
        match self {
            ReencryptionSession::Succeeded(st) => {
                Some(st.transformed.c1 - st.scaled - st.transformed.c0 * blind.u)
            }
            _ => None,
        }
    }
}
