//! Sequential verifiable shuffle session
//!
//! Roster members take turns re-randomizing and permuting the deck, each
//! before their own rung of a strictly increasing deadline ladder. A
//! contribution is only accepted from the member whose turn it is, and only
//! with a verifying shuffle proof against the deck it claims to extend;
//! verification is not optional. After all turns the final deck is a
//! re-randomized permutation of the original under the composition of all
//! the players' permutations, which no single player knows.

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::bayer_groth::{self, ShuffleProof};
use crate::codec::{ByteReader, ByteWriter, CodecError, WireDecode, WireEncode};
use crate::elgamal::{Ciphertext, EncryptionKey};
use crate::pedersen::CommitmentKey;
use crate::sessions::{Address, ProtocolError, SessionStatus, UnixSeconds};

const LOG_TARGET: &str = "mental_poker::sessions::shuffle";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleContribution {
    pub new_deck: Vec<Ciphertext>,
    pub proof: Option<ShuffleProof>,
}

impl ShuffleContribution {
    /// Prover side: shuffle `deck` with a fresh witness and prove it.
    pub fn create<R: RngCore + CryptoRng>(
        key: &CommitmentKey,
        ek: &EncryptionKey,
        deck: &[Ciphertext],
        rng: &mut R,
    ) -> Self {
        let witness = bayer_groth::ShuffleWitness::random(deck.len(), rng);
        let new_deck = bayer_groth::apply_shuffle(ek, deck, &witness);
        let proof = bayer_groth::prove(key, ek, deck, &new_deck, &witness, rng);
        Self {
            new_deck,
            proof: Some(proof),
        }
    }
}

impl WireEncode for ShuffleContribution {
    fn encode(&self, writer: &mut ByteWriter) {
        self.new_deck.encode(writer);
        self.proof.encode(writer);
    }
}

impl WireDecode for ShuffleContribution {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            new_deck: Vec::<Ciphertext>::decode(reader)?,
            proof: Option::<ShuffleProof>::decode(reader)?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShuffleInProgress {
    pub ek: EncryptionKey,
    pub commitment_key: CommitmentKey,
    pub initial_deck: Vec<Ciphertext>,
    pub roster: Vec<Address>,
    /// One rung per roster member, strictly increasing.
    pub deadlines: Vec<UnixSeconds>,
    /// Index of the next contributor whose deadline is being watched.
    pub cursor: usize,
    pub contributions: Vec<ShuffleContribution>,
}

impl ShuffleInProgress {
    fn current_deck(&self) -> &[Ciphertext] {
        match self.contributions.last() {
            Some(last) => &last.new_deck,
            None => &self.initial_deck,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShuffleSuccess {
    pub ek: EncryptionKey,
    pub deck: Vec<Ciphertext>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShuffleFailure {
    pub culprit: Address,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ShuffleSession {
    InProgress(ShuffleInProgress),
    Succeeded(ShuffleSuccess),
    Failed(ShuffleFailure),
}

impl ShuffleSession {
    /// Open a session over `initial_deck`. The Pedersen commitment key is
    /// sampled here and fixed for the session's lifetime.
    pub fn new<R: RngCore + CryptoRng>(
        ek: EncryptionKey,
        initial_deck: Vec<Ciphertext>,
        roster: Vec<Address>,
        deadlines: Vec<UnixSeconds>,
        rng: &mut R,
    ) -> Self {
        assert!(!roster.is_empty());
        assert_eq!(roster.len(), deadlines.len());
        assert!(
            deadlines.windows(2).all(|pair| pair[0] < pair[1]),
            "shuffle deadlines must be strictly increasing"
        );
        let commitment_key = CommitmentKey::rand(initial_deck.len(), rng);
        ShuffleSession::InProgress(ShuffleInProgress {
            ek,
            commitment_key,
            initial_deck,
            roster,
            deadlines,
            cursor: 0,
            contributions: Vec::new(),
        })
    }

    pub fn status(&self) -> SessionStatus {
        match self {
            ShuffleSession::InProgress(_) => SessionStatus::InProgress,
            ShuffleSession::Succeeded(_) => SessionStatus::Succeeded,
            ShuffleSession::Failed(_) => SessionStatus::Failed,
        }
    }

    pub fn culprits(&self) -> Vec<Address> {
        match self {
            ShuffleSession::Failed(failure) => vec![failure.culprit],
            _ => Vec::new(),
        }
    }

    /// The deck a contributor must extend right now.
    pub fn current_deck(&self) -> Option<&[Ciphertext]> {
        match self {
            ShuffleSession::InProgress(st) => Some(st.current_deck()),
            _ => None,
        }
    }

    pub fn commitment_key(&self) -> Option<&CommitmentKey> {
        match self {
            ShuffleSession::InProgress(st) => Some(&st.commitment_key),
            _ => None,
        }
    }

    /// The fully shuffled deck, available once succeeded.
    pub fn deck(&self) -> Option<&[Ciphertext]> {
        match self {
            ShuffleSession::Succeeded(st) => Some(&st.deck),
            _ => None,
        }
    }

    pub fn process_contribution(
        &mut self,
        from: Address,
        contribution: ShuffleContribution,
    ) -> Result<(), ProtocolError> {
        let st = match self {
            ShuffleSession::InProgress(st) => st,
            closed => {
                return Err(ProtocolError::SessionClosed {
                    status: closed.status(),
                })
            }
        };
        let turn = st.contributions.len();
        if turn >= st.roster.len() {
            // Every turn already taken; only the success tick is pending.
            return Err(ProtocolError::DuplicateContribution(from));
        }
        let expected = st.roster[turn];
        if from != expected {
            return Err(ProtocolError::WrongTurn { expected, got: from });
        }
        let current = st.current_deck();
        if contribution.new_deck.len() != current.len() {
            return Err(ProtocolError::LengthMismatch {
                expected: current.len(),
                got: contribution.new_deck.len(),
            });
        }
        let proof = contribution
            .proof
            .as_ref()
            .ok_or(ProtocolError::ProofInvalid { context: "shuffle" })?;
        if !bayer_groth::verify(
            &st.commitment_key,
            &st.ek,
            current,
            &contribution.new_deck,
            proof,
        ) {
            return Err(ProtocolError::ProofInvalid { context: "shuffle" });
        }
        tracing::debug!(target: LOG_TARGET, %from, turn, "shuffle step accepted");
        st.contributions.push(contribution);
        Ok(())
    }

    pub fn state_update(&mut self, now: UnixSeconds) {
        let next = match self {
            ShuffleSession::InProgress(st) => {
                if st.contributions.len() > st.cursor {
                    st.cursor = st.contributions.len();
                }
                if st.cursor == st.roster.len() {
                    let deck = st
                        .contributions
                        .last()
                        .map(|last| last.new_deck.clone())
                        .unwrap_or_else(|| st.initial_deck.clone());
                    tracing::info!(
                        target: LOG_TARGET,
                        steps = st.roster.len(),
                        "shuffle complete"
                    );
                    Some(ShuffleSession::Succeeded(ShuffleSuccess { ek: st.ek, deck }))
                } else if now >= st.deadlines[st.cursor] {
                    let culprit = st.roster[st.cursor];
                    tracing::warn!(target: LOG_TARGET, %culprit, "shuffle stalled");
                    Some(ShuffleSession::Failed(ShuffleFailure { culprit }))
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
