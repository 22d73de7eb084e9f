//! Room lifecycle
//!
//! Owns the seats, the chip balances and the session pipeline:
//!
//! 1. all seats taken → key generation over the alive players;
//! 2. keys ready → first shuffle;
//! 3. shuffle done → a hand and the next shuffle run concurrently;
//! 4. hand done → next hand from the concurrent shuffle, until one player
//!    remains.
//!
//! Culprits of any failed session are disconnected and burn up to the
//! configured penalty (saturating, so a penalty never underflows a stack).
//! Whenever the alive set drifts from the roster the last key generation
//! produced, the room re-runs key generation before shuffling again.

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::elgamal::Ciphertext;
use crate::game::hand::{canonical_deck, Hand};
use crate::game::{Command, GameError};
use crate::sessions::dkg::{DkgSession, SharedSecretPublicInfo};
use crate::sessions::shuffle::ShuffleSession;
use crate::sessions::{
    Address, DeadlineSchedule, LogEvent, SessionKind, SessionStatus, UnixSeconds,
};

const LOG_TARGET: &str = "mental_poker::game::room";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    pub seats: usize,
    pub buy_in: u64,
    /// Chips burned by a culprit, capped by their stack.
    pub penalty: u64,
    pub min_raise: u64,
    pub schedule: DeadlineSchedule,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSeat {
    pub address: Address,
    pub chips: u64,
    pub connected: bool,
}

impl PlayerSeat {
    pub fn is_alive(&self) -> bool {
        self.connected && self.chips > 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomPhase {
    WaitingForPlayers,
    DkgInProgress,
    ShuffleInProgress,
    HandAndNextShuffleInProgress,
    Closed,
}

#[derive(Clone, Debug)]
pub struct Room {
    config: RoomConfig,
    seats: Vec<PlayerSeat>,
    phase: RoomPhase,
    clock: UnixSeconds,
    dkg: Option<(Address, DkgSession)>,
    /// Roster the current shared key was generated over.
    key_roster: Vec<Address>,
    shared: Option<SharedSecretPublicInfo>,
    shuffle: Option<(Address, ShuffleSession)>,
    next_shuffle: Option<(Address, ShuffleSession)>,
    hand: Option<Hand>,
    log: Vec<LogEvent>,
}

impl Room {
    pub fn create(config: RoomConfig) -> Self {
        assert!(config.seats >= 2);
        Self {
            config,
            seats: Vec::new(),
            phase: RoomPhase::WaitingForPlayers,
            clock: 0,
            dkg: None,
            key_roster: Vec::new(),
            shared: None,
            shuffle: None,
            next_shuffle: None,
            hand: None,
            log: Vec::new(),
        }
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn seats(&self) -> &[PlayerSeat] {
        &self.seats
    }

    pub fn hand(&self) -> Option<&Hand> {
        self.hand.as_ref()
    }

    pub fn shared_info(&self) -> Option<&SharedSecretPublicInfo> {
        self.shared.as_ref()
    }

    pub fn dkg_session(&self) -> Option<(&Address, &DkgSession)> {
        self.dkg.as_ref().map(|(addr, session)| (addr, session))
    }

    pub fn shuffle_session(&self) -> Option<(&Address, &ShuffleSession)> {
        self.shuffle.as_ref().map(|(addr, session)| (addr, session))
    }

    pub fn next_shuffle_session(&self) -> Option<(&Address, &ShuffleSession)> {
        self.next_shuffle
            .as_ref()
            .map(|(addr, session)| (addr, session))
    }

    /// The append-only record of everything this room accepted.
    pub fn log(&self) -> &[LogEvent] {
        &self.log
    }

    fn alive(&self) -> Vec<Address> {
        self.seats
            .iter()
            .filter(|seat| seat.is_alive())
            .map(|seat| seat.address)
            .collect()
    }

    /// Apply one log event. `at` is the event's log timestamp; the room's
    /// clock never runs backwards.
    pub fn apply<R: RngCore + CryptoRng>(
        &mut self,
        at: UnixSeconds,
        from: Address,
        command: Command,
        rng: &mut R,
    ) -> Result<(), GameError> {
        self.clock = self.clock.max(at);
        match command {
            Command::Join => self.join(from, rng),
            Command::SubmitDkg { session, contribution } => {
                let dkg = match self.dkg.as_mut() {
                    Some((addr, dkg)) if *addr == session => dkg,
                    _ => return Err(GameError::UnknownSession(session)),
                };
                dkg.process_contribution(from, contribution)?;
                self.record_contribution(session, from);
                Ok(())
            }
            Command::SubmitShuffle { session, contribution } => {
                let slot = [self.shuffle.as_mut(), self.next_shuffle.as_mut()]
                    .into_iter()
                    .flatten()
                    .find(|(addr, _)| *addr == session)
                    .ok_or(GameError::UnknownSession(session))?;
                slot.1.process_contribution(from, contribution)?;
                self.record_contribution(session, from);
                Ok(())
            }
            Command::SubmitReencryption { session, contribution } => {
                self.hand
                    .as_mut()
                    .ok_or(GameError::NoHand)?
                    .process_reencryption(session, from, contribution)?;
                self.record_contribution(session, from);
                Ok(())
            }
            Command::SubmitScalarMul { session, contribution } => {
                self.hand
                    .as_mut()
                    .ok_or(GameError::NoHand)?
                    .process_scalar_mul(session, from, contribution)?;
                self.record_contribution(session, from);
                Ok(())
            }
            Command::SubmitBet { action } => {
                let seat_index = self
                    .seats
                    .iter()
                    .position(|seat| seat.address == from)
                    .ok_or(GameError::NotSeated(from))?;
                let hand = self.hand.as_mut().ok_or(GameError::NoHand)?;
                hand.process_bet(from, action, &mut self.seats[seat_index].chips)
            }
            Command::SubmitShowdownReveal { blinds } => self
                .hand
                .as_mut()
                .ok_or(GameError::NoHand)?
                .process_showdown_reveal(from, blinds),
            Command::StateUpdate => {
                self.log.push(LogEvent::Tick { at: self.clock });
                self.tick(rng);
                Ok(())
            }
        }
    }

    fn join<R: RngCore + CryptoRng>(
        &mut self,
        from: Address,
        rng: &mut R,
    ) -> Result<(), GameError> {
        if self.phase != RoomPhase::WaitingForPlayers {
            return Err(GameError::WrongPhase { expected: "waiting for players" });
        }
        if self.seats.iter().any(|seat| seat.address == from) {
            return Err(GameError::AlreadyJoined(from));
        }
        if self.seats.len() >= self.config.seats {
            return Err(GameError::TableFull);
        }
        tracing::info!(target: LOG_TARGET, %from, "player joined");
        self.seats.push(PlayerSeat {
            address: from,
            chips: self.config.buy_in,
            connected: true,
        });
        if self.seats.len() == self.config.seats {
            self.start_dkg(rng);
        }
        Ok(())
    }

    fn record_contribution(&mut self, session: Address, from: Address) {
        self.log.push(LogEvent::Contribution {
            session,
            from,
            at: self.clock,
        });
    }

    fn record_created(&mut self, session: Address, kind: SessionKind) {
        self.log.push(LogEvent::SessionCreated {
            session,
            kind,
            at: self.clock,
        });
    }

    fn start_dkg<R: RngCore + CryptoRng>(&mut self, rng: &mut R) {
        let roster = self.alive();
        debug_assert!(roster.len() >= 2);
        let addr = Address::random(rng);
        let session = DkgSession::new(roster, self.config.schedule.deadline(self.clock), rng);
        tracing::info!(target: LOG_TARGET, session = %addr, "key generation started");
        self.record_created(addr, SessionKind::Dkg);
        self.dkg = Some((addr, session));
        self.shared = None;
        self.phase = RoomPhase::DkgInProgress;
    }

    fn new_shuffle<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> (Address, ShuffleSession) {
        let shared = self.shared.as_ref().expect("shuffle requires a shared key");
        let ek = shared.aggregate;
        let roster = self.key_roster.clone();
        let deadlines = self.config.schedule.staggered(self.clock, roster.len());
        let addr = Address::random(rng);
        let session = ShuffleSession::new(ek, canonical_deck(&ek), roster, deadlines, rng);
        tracing::info!(target: LOG_TARGET, session = %addr, "shuffle started");
        self.record_created(addr, SessionKind::Shuffle);
        (addr, session)
    }

    fn open_hand<R: RngCore + CryptoRng>(&mut self, deck: Vec<Ciphertext>, rng: &mut R) {
        let shared = self
            .shared
            .as_ref()
            .expect("hand requires a shared key")
            .clone();
        self.hand = Some(Hand::new(
            self.key_roster.clone(),
            shared,
            deck,
            self.config.schedule,
            self.config.min_raise,
            self.clock,
            rng,
        ));
        let next = self.new_shuffle(rng);
        self.next_shuffle = Some(next);
        self.shuffle = None;
        self.phase = RoomPhase::HandAndNextShuffleInProgress;
    }

    fn penalize(&mut self, culprits: &[Address]) {
        for culprit in culprits {
            if let Some(seat) = self.seats.iter_mut().find(|seat| seat.address == *culprit) {
                let burned = seat.chips.min(self.config.penalty);
                seat.chips = seat.chips.saturating_sub(self.config.penalty);
                seat.connected = false;
                tracing::warn!(
                    target: LOG_TARGET,
                    culprit = %culprit,
                    burned,
                    "culprit penalized"
                );
            }
        }
    }

    fn tick<R: RngCore + CryptoRng>(&mut self, rng: &mut R) {
        let now = self.clock;
        match self.phase {
            RoomPhase::WaitingForPlayers | RoomPhase::Closed => {}
            RoomPhase::DkgInProgress => self.tick_dkg(now, rng),
            RoomPhase::ShuffleInProgress => self.tick_shuffle(now, rng),
            RoomPhase::HandAndNextShuffleInProgress => self.tick_hand(now, rng),
        }
    }

    fn tick_dkg<R: RngCore + CryptoRng>(&mut self, now: UnixSeconds, rng: &mut R) {
        let (addr, status) = match self.dkg.as_mut() {
            Some((addr, session)) => {
                session.state_update(now);
                (*addr, session.status())
            }
            None => return,
        };
        match status {
            SessionStatus::InProgress => {}
            SessionStatus::Succeeded => {
                let (roster, info) = match &self.dkg {
                    Some((_, session)) => {
                        let roster = match session {
                            DkgSession::Succeeded(st) => st.roster.clone(),
                            _ => unreachable!("status was checked above"),
                        };
                        let info = session
                            .public_info(addr)
                            .expect("succeeded DKG yields public info");
                        (roster, info)
                    }
                    None => unreachable!("status was checked above"),
                };
                self.key_roster = roster;
                self.shared = Some(info);
                let shuffle = self.new_shuffle(rng);
                self.shuffle = Some(shuffle);
                self.phase = RoomPhase::ShuffleInProgress;
            }
            SessionStatus::Failed => {
                let culprits = match &self.dkg {
                    Some((_, session)) => session.culprits().to_vec(),
                    None => Vec::new(),
                };
                self.penalize(&culprits);
                self.dkg = None;
                self.restart_or_close(rng);
            }
        }
    }

    fn tick_shuffle<R: RngCore + CryptoRng>(&mut self, now: UnixSeconds, rng: &mut R) {
        let status = match self.shuffle.as_mut() {
            Some((_, session)) => {
                session.state_update(now);
                session.status()
            }
            None => return,
        };
        match status {
            SessionStatus::InProgress => {}
            SessionStatus::Succeeded => {
                let deck = match &self.shuffle {
                    Some((_, session)) => session
                        .deck()
                        .expect("succeeded shuffle has a deck")
                        .to_vec(),
                    None => return,
                };
                self.open_hand(deck, rng);
            }
            SessionStatus::Failed => {
                let culprits = match &self.shuffle {
                    Some((_, session)) => session.culprits(),
                    None => Vec::new(),
                };
                self.penalize(&culprits);
                self.shuffle = None;
                self.restart_or_close(rng);
            }
        }
    }

    fn tick_hand<R: RngCore + CryptoRng>(&mut self, now: UnixSeconds, rng: &mut R) {
        let next_status = match self.next_shuffle.as_mut() {
            Some((_, session)) => {
                session.state_update(now);
                session.status()
            }
            None => SessionStatus::InProgress,
        };
        if next_status == SessionStatus::Failed {
            let culprits = match &self.next_shuffle {
                Some((_, session)) => session.culprits(),
                None => Vec::new(),
            };
            self.penalize(&culprits);
            self.next_shuffle = None;
        }

        let finished = match self.hand.as_mut() {
            Some(hand) => {
                hand.state_update(now, rng);
                hand.is_finished()
            }
            None => false,
        };
        if finished {
            self.settle_hand(rng);
        }
    }

    fn settle_hand<R: RngCore + CryptoRng>(&mut self, rng: &mut R) {
        let hand = self.hand.take().expect("settling requires a hand");
        for (player, amount) in hand.settlement() {
            if let Some(seat) = self.seats.iter_mut().find(|seat| seat.address == player) {
                seat.chips += amount;
            }
        }
        let culprits = hand.culprits().to_vec();
        if !culprits.is_empty() {
            self.penalize(&culprits);
        }

        let alive = self.alive();
        if alive.len() <= 1 {
            tracing::info!(target: LOG_TARGET, "room closed");
            self.next_shuffle = None;
            self.phase = RoomPhase::Closed;
            return;
        }
        if alive != self.key_roster {
            // The shared key no longer matches the table; re-key first.
            self.next_shuffle = None;
            self.start_dkg(rng);
            return;
        }
        match self.next_shuffle.take() {
            Some((_, session)) if session.status() == SessionStatus::Succeeded => {
                let deck = session
                    .deck()
                    .expect("succeeded shuffle has a deck")
                    .to_vec();
                self.open_hand(deck, rng);
            }
            Some((addr, session)) if session.status() == SessionStatus::InProgress => {
                self.shuffle = Some((addr, session));
                self.phase = RoomPhase::ShuffleInProgress;
            }
            _ => {
                // The concurrent shuffle was lost; rebuild from a fresh one.
                let shuffle = self.new_shuffle(rng);
                self.shuffle = Some(shuffle);
                self.phase = RoomPhase::ShuffleInProgress;
            }
        }
    }

    fn restart_or_close<R: RngCore + CryptoRng>(&mut self, rng: &mut R) {
        if self.alive().len() <= 1 {
            tracing::info!(target: LOG_TARGET, "room closed");
            self.phase = RoomPhase::Closed;
        } else {
            self.start_dkg(rng);
        }
    }
}
