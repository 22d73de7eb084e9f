//! Room and hand driver
//!
//! Chains the session protocols into complete hand and room lifecycles:
//! join → key generation → shuffle → hand (deals, streets, showdown) with
//! the next shuffle running concurrently, penalizing the culprits of any
//! failed session along the way. The driver is itself a deterministic state
//! machine over the same ordered event stream the sessions consume.

pub mod betting;
pub mod hand;
pub mod room;

#[cfg(test)]
mod tests;

use curve25519_dalek::scalar::Scalar;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sessions::dkg::DkgContribution;
use crate::sessions::reencryption::ReencryptContribution;
use crate::sessions::scalar_mul::ScalarMulContribution;
use crate::sessions::shuffle::ShuffleContribution;
use crate::sessions::{Address, ProtocolError};

pub use betting::{BetAction, BettingRound};
pub use hand::{canonical_deck, card_point, Hand, HandPhase, DECK_SIZE};
pub use room::{PlayerSeat, Room, RoomConfig, RoomPhase};

/// The command surface of the log: everything a participant can submit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Command {
    Join,
    SubmitDkg {
        session: Address,
        contribution: DkgContribution,
    },
    SubmitShuffle {
        session: Address,
        contribution: ShuffleContribution,
    },
    SubmitReencryption {
        session: Address,
        contribution: ReencryptContribution,
    },
    SubmitScalarMul {
        session: Address,
        contribution: ScalarMulContribution,
    },
    SubmitBet {
        action: BetAction,
    },
    SubmitShowdownReveal {
        blinds: [Scalar; 2],
    },
    /// Clock tick; the event timestamp is the clock.
    StateUpdate,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("no session at address {0}")]
    UnknownSession(Address),
    #[error("{0} is not seated at this table")]
    NotSeated(Address),
    #[error("{0} already joined")]
    AlreadyJoined(Address),
    #[error("table is full")]
    TableFull,
    #[error("command is only legal while {expected}")]
    WrongPhase { expected: &'static str },
    #[error("no hand in progress")]
    NoHand,
    #[error("{0} is not an active player in this hand")]
    NotActive(Address),
    #[error("insufficient chips: need {need}, have {have}")]
    InsufficientChips { need: u64, have: u64 },
    #[error("raise must reach {minimum}, got {got}")]
    RaiseTooSmall { minimum: u64, got: u64 },
    #[error("{0} already revealed this hand")]
    AlreadyRevealed(Address),
    #[error("reveal does not match the published blind")]
    RevealMismatch,
}
