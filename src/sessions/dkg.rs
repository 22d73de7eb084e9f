//! n-of-n distributed key generation
//!
//! Every roster member publishes `Pᵢ = sᵢ·B` for a session-fresh base `B`,
//! with a discrete-log proof of knowledge. When all slots fill, the
//! aggregate encryption key is `(B, Σ Pᵢ)`; the matching secret `Σ sᵢ` is
//! never materialized anywhere. A missing contribution past the deadline
//! fails the session and names the absentees.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::codec::{ByteReader, ByteWriter, CodecError, WireDecode, WireEncode};
use crate::elgamal::EncryptionKey;
use crate::group;
use crate::sessions::{Address, ProtocolError, SessionStatus, UnixSeconds};
use crate::sigma::SchnorrProof;

const LOG_TARGET: &str = "mental_poker::sessions::dkg";

/// A participant's private key share, held off-log. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretShare(pub Scalar);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkgContribution {
    pub public_point: RistrettoPoint,
    pub proof: Option<SchnorrProof>,
}

impl DkgContribution {
    /// Prover side: sample a share and build the contribution for `base`.
    pub fn create<R: RngCore + CryptoRng>(
        base: &RistrettoPoint,
        rng: &mut R,
    ) -> (SecretShare, Self) {
        let secret = group::rand_scalar(rng);
        let public_point = base * secret;
        let proof = SchnorrProof::prove(base, &public_point, &secret, rng);
        (
            SecretShare(secret),
            Self {
                public_point,
                proof: Some(proof),
            },
        )
    }
}

impl WireEncode for DkgContribution {
    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_element(&self.public_point);
        self.proof.encode(writer);
    }
}

impl WireDecode for DkgContribution {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            public_point: reader.read_element()?,
            proof: Option::<SchnorrProof>::decode(reader)?,
        })
    }
}

/// Public description of a completed DKG, broadcast for the sessions that
/// consume the shared secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedSecretPublicInfo {
    pub session_addr: Address,
    pub aggregate: EncryptionKey,
    pub shares: Vec<EncryptionKey>,
}

impl WireEncode for SharedSecretPublicInfo {
    fn encode(&self, writer: &mut ByteWriter) {
        self.session_addr.encode(writer);
        self.aggregate.encode(writer);
        self.shares.encode(writer);
    }
}

impl WireDecode for SharedSecretPublicInfo {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            session_addr: Address::decode(reader)?,
            aggregate: EncryptionKey::decode(reader)?,
            shares: Vec::<EncryptionKey>::decode(reader)?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DkgInProgress {
    pub base: RistrettoPoint,
    pub roster: Vec<Address>,
    pub deadline: UnixSeconds,
    pub slots: Vec<Option<DkgContribution>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DkgSuccess {
    pub base: RistrettoPoint,
    pub roster: Vec<Address>,
    pub share_points: Vec<RistrettoPoint>,
    pub aggregate: RistrettoPoint,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DkgFailure {
    pub culprits: Vec<Address>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum DkgSession {
    InProgress(DkgInProgress),
    Succeeded(DkgSuccess),
    Failed(DkgFailure),
}

impl DkgSession {
    /// Open a session with a freshly sampled base point.
    pub fn new<R: RngCore + CryptoRng>(
        roster: Vec<Address>,
        deadline: UnixSeconds,
        rng: &mut R,
    ) -> Self {
        assert!(!roster.is_empty());
        let slots = vec![None; roster.len()];
        DkgSession::InProgress(DkgInProgress {
            base: group::rand_element(rng),
            roster,
            deadline,
            slots,
        })
    }

    pub fn status(&self) -> SessionStatus {
        match self {
            DkgSession::InProgress(_) => SessionStatus::InProgress,
            DkgSession::Succeeded(_) => SessionStatus::Succeeded,
            DkgSession::Failed(_) => SessionStatus::Failed,
        }
    }

    pub fn culprits(&self) -> &[Address] {
        match self {
            DkgSession::Failed(failure) => &failure.culprits,
            _ => &[],
        }
    }

    pub fn base(&self) -> Option<&RistrettoPoint> {
        match self {
            DkgSession::InProgress(st) => Some(&st.base),
            DkgSession::Succeeded(st) => Some(&st.base),
            DkgSession::Failed(_) => None,
        }
    }

    pub fn process_contribution(
        &mut self,
        from: Address,
        contribution: DkgContribution,
    ) -> Result<(), ProtocolError> {
        let st = match self {
            DkgSession::InProgress(st) => st,
            closed => {
                return Err(ProtocolError::SessionClosed {
                    status: closed.status(),
                })
            }
        };
        let index = st
            .roster
            .iter()
            .position(|member| *member == from)
            .ok_or(ProtocolError::NotInRoster(from))?;
        if st.slots[index].is_some() {
            return Err(ProtocolError::DuplicateContribution(from));
        }
        let proof = contribution
            .proof
            .as_ref()
            .ok_or(ProtocolError::ProofInvalid { context: "key share" })?;
        if !proof.verify(&st.base, &contribution.public_point) {
            return Err(ProtocolError::ProofInvalid { context: "key share" });
        }
        tracing::debug!(target: LOG_TARGET, %from, slot = index, "key share accepted");
        st.slots[index] = Some(contribution);
        Ok(())
    }

    pub fn state_update(&mut self, now: UnixSeconds) {
        let next = match self {
            DkgSession::InProgress(st) => {
                if st.slots.iter().all(Option::is_some) {
                    let share_points: Vec<RistrettoPoint> = st
                        .slots
                        .iter()
                        .flatten()
                        .map(|c| c.public_point)
                        .collect();
                    let aggregate: RistrettoPoint = share_points.iter().sum();
                    tracing::info!(
                        target: LOG_TARGET,
                        members = st.roster.len(),
                        "key generation complete"
                    );
                    Some(DkgSession::Succeeded(DkgSuccess {
                        base: st.base,
                        roster: st.roster.clone(),
                        share_points,
                        aggregate,
                    }))
                } else if now >= st.deadline {
                    let culprits: Vec<Address> = st
                        .roster
                        .iter()
                        .zip(st.slots.iter())
                        .filter(|(_, slot)| slot.is_none())
                        .map(|(member, _)| *member)
                        .collect();
                    tracing::warn!(
                        target: LOG_TARGET,
                        ?culprits,
                        "key generation timed out"
                    );
                    Some(DkgSession::Failed(DkgFailure { culprits }))
                } else {
                    None
                }
            }
            _ => None,
        };
        if let Some(next) = next {
            *self = next;
        }
    }

    /// The aggregate encryption key, available once succeeded.
    pub fn aggregate_key(&self) -> Option<EncryptionKey> {
        match self {
            DkgSession::Succeeded(st) => Some(EncryptionKey {
                base: st.base,
                point: st.aggregate,
            }),
            _ => None,
        }
    }

    /// Per-party encryption keys `(B, Pᵢ)`, in roster order.
    pub fn share_keys(&self) -> Option<Vec<EncryptionKey>> {
        match self {
            DkgSession::Succeeded(st) => Some(
                st.share_points
                    .iter()
                    .map(|point| EncryptionKey {
                        base: st.base,
                        point: *point,
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn public_info(&self, session_addr: Address) -> Option<SharedSecretPublicInfo> {
        Some(SharedSecretPublicInfo {
            session_addr,
            aggregate: self.aggregate_key()?,
            shares: self.share_keys()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{addr, test_rng};

    fn roster() -> Vec<Address> {
        vec![addr(1), addr(2), addr(3)]
    }

    #[test]
    fn three_party_run_aggregates_shares() {
        let mut rng = test_rng();
        let mut session = DkgSession::new(roster(), 100, &mut rng);
        let base = *session.base().unwrap();

        let mut secrets = Vec::new();
        // Contributions may land in any order.
        for member in [addr(2), addr(1), addr(3)] {
            let (share, contribution) = DkgContribution::create(&base, &mut rng);
            secrets.push(share);
            session.process_contribution(member, contribution).unwrap();
        }

        session.state_update(0);
        assert_eq!(session.status(), SessionStatus::Succeeded);

        let total: Scalar = secrets.iter().map(|s| s.0).sum();
        assert_eq!(session.aggregate_key().unwrap().point, base * total);
    }

    #[test]
    fn rejects_outsiders_duplicates_and_bad_proofs() {
        let mut rng = test_rng();
        let mut session = DkgSession::new(roster(), 100, &mut rng);
        let base = *session.base().unwrap();

        let (_, contribution) = DkgContribution::create(&base, &mut rng);
        assert_eq!(
            session.process_contribution(addr(9), contribution.clone()),
            Err(ProtocolError::NotInRoster(addr(9)))
        );

        session
            .process_contribution(addr(1), contribution.clone())
            .unwrap();
        assert_eq!(
            session.process_contribution(addr(1), contribution),
            Err(ProtocolError::DuplicateContribution(addr(1)))
        );

        // Proof for the wrong point.
        let (_, honest) = DkgContribution::create(&base, &mut rng);
        let forged = DkgContribution {
            public_point: group::rand_element(&mut rng),
            proof: honest.proof,
        };
        assert_eq!(
            session.process_contribution(addr(2), forged),
            Err(ProtocolError::ProofInvalid { context: "key share" })
        );

        let (_, unproven) = DkgContribution::create(&base, &mut rng);
        let unproven = DkgContribution {
            proof: None,
            ..unproven
        };
        assert_eq!(
            session.process_contribution(addr(2), unproven),
            Err(ProtocolError::ProofInvalid { context: "key share" })
        );
    }

    #[test]
    fn timeout_names_absentees_in_roster_order() {
        let mut rng = test_rng();
        let mut session = DkgSession::new(roster(), 105, &mut rng);
        let base = *session.base().unwrap();

        let (_, contribution) = DkgContribution::create(&base, &mut rng);
        session.process_contribution(addr(1), contribution).unwrap();

        session.state_update(104);
        assert_eq!(session.status(), SessionStatus::InProgress);

        session.state_update(110);
        assert_eq!(session.status(), SessionStatus::Failed);
        assert_eq!(session.culprits(), &[addr(2), addr(3)]);

        // Frozen: a late contribution is rejected and the status sticks.
        let (_, late) = DkgContribution::create(&base, &mut rng);
        assert_eq!(
            session.process_contribution(addr(2), late),
            Err(ProtocolError::SessionClosed {
                status: SessionStatus::Failed
            })
        );
        session.state_update(200);
        assert_eq!(session.status(), SessionStatus::Failed);
    }

    #[test]
    fn contribution_wire_round_trip() {
        let mut rng = test_rng();
        let base = group::rand_element(&mut rng);
        let (_, contribution) = DkgContribution::create(&base, &mut rng);
        assert_eq!(
            DkgContribution::from_bytes(&contribution.to_bytes()).unwrap(),
            contribution
        );

        let info = SharedSecretPublicInfo {
            session_addr: addr(5),
            aggregate: EncryptionKey {
                base,
                point: group::rand_element(&mut rng),
            },
            shares: vec![EncryptionKey {
                base,
                point: group::rand_element(&mut rng),
            }],
        };
        assert_eq!(
            SharedSecretPublicInfo::from_bytes(&info.to_bytes()).unwrap(),
            info
        );
    }
}
