//! Threshold scalar multiplication
//!
//! Computes `s·P` for a public point `P` and the DKG shared secret
//! `s = Σ sᵢ` without reconstructing `s`: each member publishes
//! `Qᵢ = sᵢ·P` with a discrete-log-equality proof against its registered
//! share key, and the results sum. The threshold is explicit; with the
//! current n-of-n sharing it always equals the roster size.

use curve25519_dalek::ristretto::RistrettoPoint;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::codec::{ByteReader, ByteWriter, CodecError, WireDecode, WireEncode};
use crate::sessions::dkg::{SecretShare, SharedSecretPublicInfo};
use crate::sessions::{Address, ProtocolError, SessionStatus, UnixSeconds};
use crate::sigma::ChaumPedersenProof;

const LOG_TARGET: &str = "mental_poker::sessions::scalar_mul";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarMulContribution {
    /// `Qᵢ = sᵢ·P`.
    pub payload: RistrettoPoint,
    pub proof: Option<ChaumPedersenProof>,
}

impl ScalarMulContribution {
    /// Prover side: scale `point` by the held share and prove consistency
    /// with the share key registered under `base`.
    pub fn create<R: RngCore + CryptoRng>(
        share: &SecretShare,
        base: &RistrettoPoint,
        point: &RistrettoPoint,
        rng: &mut R,
    ) -> Self {
        Self {
            payload: point * share.0,
            proof: Some(ChaumPedersenProof::prove(base, point, &share.0, rng)),
        }
    }
}

impl WireEncode for ScalarMulContribution {
    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_element(&self.payload);
        self.proof.encode(writer);
    }
}

impl WireDecode for ScalarMulContribution {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            payload: reader.read_element()?,
            proof: Option::<ChaumPedersenProof>::decode(reader)?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScalarMulInProgress {
    pub point: RistrettoPoint,
    pub shared: SharedSecretPublicInfo,
    pub roster: Vec<Address>,
    pub threshold: usize,
    pub deadline: UnixSeconds,
    pub slots: Vec<Option<ScalarMulContribution>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScalarMulSuccess {
    pub point: RistrettoPoint,
    pub result: RistrettoPoint,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScalarMulFailure {
    pub culprits: Vec<Address>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ScalarMulSession {
    InProgress(ScalarMulInProgress),
    Succeeded(ScalarMulSuccess),
    Failed(ScalarMulFailure),
}

impl ScalarMulSession {
    pub fn new(
        point: RistrettoPoint,
        shared: SharedSecretPublicInfo,
        roster: Vec<Address>,
        threshold: usize,
        deadline: UnixSeconds,
    ) -> Self {
        assert_eq!(
            roster.len(),
            shared.shares.len(),
            "one share key per roster member"
        );
        assert!(threshold >= 1 && threshold <= roster.len());
        let slots = vec![None; roster.len()];
        ScalarMulSession::InProgress(ScalarMulInProgress {
            point,
            shared,
            roster,
            threshold,
            deadline,
            slots,
        })
    }

    pub fn status(&self) -> SessionStatus {
        match self {
            ScalarMulSession::InProgress(_) => SessionStatus::InProgress,
            ScalarMulSession::Succeeded(_) => SessionStatus::Succeeded,
            ScalarMulSession::Failed(_) => SessionStatus::Failed,
        }
    }

    pub fn culprits(&self) -> &[Address] {
        match self {
            ScalarMulSession::Failed(failure) => &failure.culprits,
            _ => &[],
        }
    }

    pub fn result(&self) -> Option<&RistrettoPoint> {
        match self {
            ScalarMulSession::Succeeded(st) => Some(&st.result),
            _ => None,
        }
    }

    pub fn process_contribution(
        &mut self,
        from: Address,
        contribution: ScalarMulContribution,
    ) -> Result<(), ProtocolError> {
        let st = match self {
            ScalarMulSession::InProgress(st) => st,
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
            .ok_or(ProtocolError::ProofInvalid { context: "share multiplication" })?;
        // Same sᵢ behind the registered share key and the payload.
        let base = &st.shared.aggregate.base;
        let share_point = &st.shared.shares[index].point;
        if !proof.verify(base, share_point, &st.point, &contribution.payload) {
            return Err(ProtocolError::ProofInvalid { context: "share multiplication" });
        }
        tracing::debug!(target: LOG_TARGET, %from, slot = index, "share multiplication accepted");
        st.slots[index] = Some(contribution);
        Ok(())
    }

    pub fn state_update(&mut self, now: UnixSeconds) {
        let next = match self {
            ScalarMulSession::InProgress(st) => {
                let filled = st.slots.iter().filter(|slot| slot.is_some()).count();
                if filled >= st.threshold {
                    let result: RistrettoPoint =
                        st.slots.iter().flatten().map(|c| c.payload).sum();
                    tracing::info!(target: LOG_TARGET, filled, "scalar multiplication complete");
                    Some(ScalarMulSession::Succeeded(ScalarMulSuccess {
                        point: st.point,
                        result,
                    }))
                } else if now >= st.deadline {
                    let culprits: Vec<Address> = st
                        .roster
                        .iter()
                        .zip(st.slots.iter())
                        .filter(|(_, slot)| slot.is_none())
                        .map(|(member, _)| *member)
                        .collect();
                    tracing::warn!(target: LOG_TARGET, ?culprits, "scalar multiplication timed out");
                    Some(ScalarMulSession::Failed(ScalarMulFailure { culprits }))
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group;
    use crate::sessions::dkg::{DkgContribution, DkgSession};
    use crate::test_utils::{addr, test_rng};
    use curve25519_dalek::scalar::Scalar;

    fn shared_setup(
        rng: &mut (impl RngCore + CryptoRng),
    ) -> (Vec<Address>, Vec<SecretShare>, SharedSecretPublicInfo) {
        let roster = vec![addr(1), addr(2), addr(3)];
        let mut dkg = DkgSession::new(roster.clone(), 100, rng);
        let base = *dkg.base().unwrap();
        let mut shares = Vec::new();
        for member in &roster {
            let (share, contribution) = DkgContribution::create(&base, rng);
            shares.push(share);
            dkg.process_contribution(*member, contribution).unwrap();
        }
        dkg.state_update(0);
        let info = dkg.public_info(addr(100)).unwrap();
        (roster, shares, info)
    }

    #[test]
    fn aggregate_equals_full_secret_multiplication() {
        let mut rng = test_rng();
        let (roster, shares, info) = shared_setup(&mut rng);
        let point = group::rand_element(&mut rng);
        let base = info.aggregate.base;

        let mut session =
            ScalarMulSession::new(point, info, roster.clone(), roster.len(), 100);
        for (member, share) in roster.iter().zip(shares.iter()) {
            let contribution = ScalarMulContribution::create(share, &base, &point, &mut rng);
            session.process_contribution(*member, contribution).unwrap();
        }
        session.state_update(0);
        assert_eq!(session.status(), SessionStatus::Succeeded);

        let secret: Scalar = shares.iter().map(|s| s.0).sum();
        assert_eq!(session.result().unwrap(), &(point * secret));
    }

    #[test]
    fn wrong_share_is_rejected() {
        let mut rng = test_rng();
        let (roster, shares, info) = shared_setup(&mut rng);
        let point = group::rand_element(&mut rng);
        let base = info.aggregate.base;

        let mut session = ScalarMulSession::new(point, info, roster.clone(), roster.len(), 100);
        // addr(1) tries to answer with addr(2)'s share.
        let contribution = ScalarMulContribution::create(&shares[1], &base, &point, &mut rng);
        assert_eq!(
            session.process_contribution(roster[0], contribution),
            Err(ProtocolError::ProofInvalid { context: "share multiplication" })
        );
    }

    #[test]
    fn timeout_blames_missing_members() {
        let mut rng = test_rng();
        let (roster, shares, info) = shared_setup(&mut rng);
        let point = group::rand_element(&mut rng);
        let base = info.aggregate.base;

        let mut session = ScalarMulSession::new(point, info, roster.clone(), roster.len(), 50);
        let contribution = ScalarMulContribution::create(&shares[1], &base, &point, &mut rng);
        session.process_contribution(roster[1], contribution).unwrap();

        session.state_update(50);
        assert_eq!(session.status(), SessionStatus::Failed);
        assert_eq!(session.culprits(), &[addr(1), addr(3)]);
    }

    #[test]
    fn contribution_wire_round_trip() {
        let mut rng = test_rng();
        let share = SecretShare(group::rand_scalar(&mut rng));
        let base = group::rand_element(&mut rng);
        let point = group::rand_element(&mut rng);
        let contribution = ScalarMulContribution::create(&share, &base, &point, &mut rng);
        assert_eq!(
            ScalarMulContribution::from_bytes(&contribution.to_bytes()).unwrap(),
            contribution
        );
    }
}
