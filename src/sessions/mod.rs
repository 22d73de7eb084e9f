//! Multi-party session protocols
//!
//! Each session is a deterministic state machine over a totally-ordered
//! event stream: contributions mutate it only after passing the session's
//! cryptographic check, clock ticks drive success/timeout transitions, and
//! a frozen session never changes again. Sessions own no shared state; the
//! driver owns the sessions.

pub mod dkg;
pub mod reencryption;
pub mod scalar_mul;
pub mod shuffle;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{ByteReader, ByteWriter, CodecError, WireDecode, WireEncode};

pub use dkg::{DkgContribution, DkgSession, SecretShare, SharedSecretPublicInfo};
pub use reencryption::{RecipientBlind, ReencryptContribution, ReencryptionSession};
pub use scalar_mul::{ScalarMulContribution, ScalarMulSession};
pub use shuffle::{ShuffleContribution, ShuffleSession};

/// Wall-clock seconds from the log's monotonic clock.
pub type UnixSeconds = u64;

/// Identity of a participant (and of a session) on the log.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 32]);

impl Address {
    pub const LEN: usize = 32;

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// A fresh identifier for a newly created session.
    pub fn random<R: rand::RngCore>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form is enough to tell rosters apart in logs.
        write!(f, "0x{}..", hex::encode(&self.0[..4]))
    }
}

// Hex strings on the serde side so addresses can key JSON maps.
impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let stripped = text.strip_prefix("0x").unwrap_or(&text);
        let bytes = hex::decode(stripped).map_err(serde::de::Error::custom)?;
        let arr: [u8; Self::LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| serde::de::Error::custom("address must be 32 bytes"))?;
        Ok(Address(arr))
    }
}

impl WireEncode for Address {
    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_raw(&self.0);
    }
}

impl WireDecode for Address {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let mut bytes = [0u8; Self::LEN];
        bytes.copy_from_slice(reader.read_raw(Self::LEN)?);
        Ok(Self(bytes))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    InProgress,
    Succeeded,
    Failed,
}

/// Rejection reasons for contributions and out-of-order operations.
///
/// None of these mutate the session they were raised against; timeouts are
/// state transitions, not errors.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error(transparent)]
    Decode(#[from] CodecError),
    #[error("{0} is not a member of the roster")]
    NotInRoster(Address),
    #[error("expected a contribution from {expected}, got one from {got}")]
    WrongTurn { expected: Address, got: Address },
    #[error("slot for {0} is already filled")]
    DuplicateContribution(Address),
    #[error("expected {expected} entries, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("{context} proof missing or rejected")]
    ProofInvalid { context: &'static str },
    #[error("session is already {status:?}")]
    SessionClosed { status: SessionStatus },
}

impl ProtocolError {
    /// Stable diagnostic code, continuing the codec error numbering.
    pub fn code(&self) -> u32 {
        match self {
            ProtocolError::Decode(e) => e.code(),
            ProtocolError::NotInRoster(_) => 11,
            ProtocolError::WrongTurn { .. } => 12,
            ProtocolError::DuplicateContribution(_) => 13,
            ProtocolError::LengthMismatch { .. } => 14,
            ProtocolError::ProofInvalid { .. } => 15,
            ProtocolError::SessionClosed { .. } => 16,
        }
    }
}

/// Deadline derivation policy.
///
/// Every deadline is `now + per_action + buffer`; sequential protocols get
/// a strictly increasing ladder, one rung per expected contributor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineSchedule {
    pub per_action: u64,
    pub buffer: u64,
}

impl DeadlineSchedule {
    pub fn new(per_action: u64, buffer: u64) -> Self {
        Self { per_action, buffer }
    }

    pub fn deadline(&self, now: UnixSeconds) -> UnixSeconds {
        now + self.per_action + self.buffer
    }

    pub fn staggered(&self, now: UnixSeconds, count: usize) -> Vec<UnixSeconds> {
        (1..=count as u64)
            .map(|k| now + k * self.per_action.max(1) + self.buffer)
            .collect()
    }
}

/// Typed events as they appear on the replicated log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum LogEvent {
    SessionCreated {
        session: Address,
        kind: SessionKind,
        at: UnixSeconds,
    },
    Contribution {
        session: Address,
        from: Address,
        at: UnixSeconds,
    },
    Tick {
        at: UnixSeconds,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    Dkg,
    Shuffle,
    ScalarMul,
    Reencryption,
}
