//! Single hand lifecycle
//!
//! Runs over a fully shuffled deck: 2n concurrent private deals (player `i`
//! takes deck positions `2i` and `2i+1`), four betting streets interleaved
//! with the 3/1/1 community openings at positions `2n..2n+2`, `2n+3` and
//! `2n+4`, then a showdown where every remaining player publishes their
//! unblinding scalars so the table can check the hole cards. Any failed
//! underlying session voids the hand; the room refunds bets and penalizes
//! the culprits.

use std::collections::BTreeMap;

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::elgamal::{Ciphertext, EncryptionKey};
use crate::game::betting::{BetAction, BettingRound};
use crate::game::GameError;
use crate::sessions::dkg::SharedSecretPublicInfo;
use crate::sessions::reencryption::{ReencryptContribution, ReencryptionSession};
use crate::sessions::scalar_mul::{ScalarMulContribution, ScalarMulSession};
use crate::sessions::{Address, DeadlineSchedule, SessionStatus, UnixSeconds};

const LOG_TARGET: &str = "mental_poker::game::hand";

pub const DECK_SIZE: usize = 52;
pub const HOLE_CARDS: usize = 2;
const FLOP_CARDS: usize = 3;

/// The public pre-shuffle deck: card `j` is `(j+1)·B` encrypted with zero
/// randomness, so anyone can recompute it from the aggregate key alone.
pub fn canonical_deck(ek: &EncryptionKey) -> Vec<Ciphertext> {
    (0..DECK_SIZE as u64)
        .map(|j| ek.encrypt_scalar(&Scalar::ZERO, j + 1))
        .collect()
}

/// The plaintext point of card `j`, for matching opened cards back to ranks.
pub fn card_point(ek: &EncryptionKey, j: u64) -> RistrettoPoint {
    ek.base * Scalar::from(j + 1)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandPhase {
    Dealing,
    PreFlopBetting,
    FlopOpening,
    PostFlopBetting,
    TurnOpening,
    PostTurnBetting,
    RiverOpening,
    PostRiverBetting,
    Showdown,
    Complete,
    Void,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Deal {
    pub session_addr: Address,
    pub recipient: Address,
    pub deck_position: usize,
    pub session: ReencryptionSession,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoardOpening {
    pub session_addr: Address,
    pub deck_position: usize,
    pub session: ScalarMulSession,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hand {
    roster: Vec<Address>,
    shared: SharedSecretPublicInfo,
    deck: Vec<Ciphertext>,
    schedule: DeadlineSchedule,
    min_raise: u64,
    phase: HandPhase,
    deals: Vec<Deal>,
    openings: Vec<BoardOpening>,
    board: Vec<RistrettoPoint>,
    betting: Option<BettingRound>,
    /// Players who have not folded.
    active: Vec<Address>,
    pot: u64,
    committed: BTreeMap<Address, u64>,
    reveals: BTreeMap<Address, [RistrettoPoint; HOLE_CARDS]>,
    culprits: Vec<Address>,
}

impl Hand {
    pub fn new<R: RngCore + CryptoRng>(
        roster: Vec<Address>,
        shared: SharedSecretPublicInfo,
        deck: Vec<Ciphertext>,
        schedule: DeadlineSchedule,
        min_raise: u64,
        now: UnixSeconds,
        rng: &mut R,
    ) -> Self {
        let n = roster.len();
        assert!(n >= 2);
        assert!(
            deck.len() >= HOLE_CARDS * n + FLOP_CARDS + 2,
            "deck too small for {} players",
            n
        );
        assert_eq!(roster.len(), shared.shares.len());

        let mut deals = Vec::with_capacity(HOLE_CARDS * n);
        for (i, recipient) in roster.iter().enumerate() {
            for k in 0..HOLE_CARDS {
                let deck_position = HOLE_CARDS * i + k;
                let ladder = schedule.staggered(now, 2);
                deals.push(Deal {
                    session_addr: Address::random(rng),
                    recipient: *recipient,
                    deck_position,
                    session: ReencryptionSession::new(
                        deck[deck_position],
                        shared.clone(),
                        *recipient,
                        roster.clone(),
                        ladder[0],
                        ladder[1],
                    ),
                });
            }
        }
        tracing::info!(target: LOG_TARGET, players = n, deals = deals.len(), "hand opened");

        Hand {
            active: roster.clone(),
            roster,
            shared,
            deck,
            schedule,
            min_raise,
            phase: HandPhase::Dealing,
            deals,
            openings: Vec::new(),
            board: Vec::new(),
            betting: None,
            pot: 0,
            committed: BTreeMap::new(),
            reveals: BTreeMap::new(),
            culprits: Vec::new(),
        }
    }

    pub fn phase(&self) -> HandPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, HandPhase::Complete | HandPhase::Void)
    }

    pub fn pot(&self) -> u64 {
        self.pot
    }

    pub fn board(&self) -> &[RistrettoPoint] {
        &self.board
    }

    pub fn culprits(&self) -> &[Address] {
        &self.culprits
    }

    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    pub fn openings(&self) -> &[BoardOpening] {
        &self.openings
    }

    pub fn reveals(&self) -> &BTreeMap<Address, [RistrettoPoint; HOLE_CARDS]> {
        &self.reveals
    }

    pub fn process_reencryption(
        &mut self,
        session: Address,
        from: Address,
        contribution: ReencryptContribution,
    ) -> Result<(), GameError> {
        let deal = self
            .deals
            .iter_mut()
            .find(|deal| deal.session_addr == session)
            .ok_or(GameError::UnknownSession(session))?;
        deal.session.process_reencryption(from, contribution)?;
        Ok(())
    }

    pub fn process_scalar_mul(
        &mut self,
        session: Address,
        from: Address,
        contribution: ScalarMulContribution,
    ) -> Result<(), GameError> {
        if let Some(deal) = self
            .deals
            .iter_mut()
            .find(|deal| deal.session_addr == session)
        {
            deal.session.process_scalar_mul(from, contribution)?;
            return Ok(());
        }
        if let Some(opening) = self
            .openings
            .iter_mut()
            .find(|opening| opening.session_addr == session)
        {
            opening.session.process_contribution(from, contribution)?;
            return Ok(());
        }
        Err(GameError::UnknownSession(session))
    }

    pub fn process_bet(
        &mut self,
        from: Address,
        action: BetAction,
        stack: &mut u64,
    ) -> Result<(), GameError> {
        if !self.in_betting_phase() {
            return Err(GameError::WrongPhase { expected: "betting" });
        }
        let round = self.betting.as_mut().ok_or(GameError::WrongPhase {
            expected: "betting",
        })?;
        round.process_action(from, action, stack)
    }

    /// Showdown: a player opens both hole cards by publishing the `u`
    /// blinds of their deals. Each blind is checked against the `URT`
    /// value published during the deal before anything is accepted.
    pub fn process_showdown_reveal(
        &mut self,
        from: Address,
        blinds: [Scalar; HOLE_CARDS],
    ) -> Result<(), GameError> {
        if self.phase != HandPhase::Showdown {
            return Err(GameError::WrongPhase { expected: "showdown" });
        }
        if !self.active.contains(&from) {
            return Err(GameError::NotActive(from));
        }
        if self.reveals.contains_key(&from) {
            return Err(GameError::AlreadyRevealed(from));
        }

        let deals: Vec<&Deal> = self
            .deals
            .iter()
            .filter(|deal| deal.recipient == from)
            .collect();
        debug_assert_eq!(deals.len(), HOLE_CARDS);

        let mut holes = [RistrettoPoint::identity(); HOLE_CARDS];
        for (k, deal) in deals.iter().enumerate() {
            let (transformed, scaled, published) = match &deal.session {
                ReencryptionSession::Succeeded(st) => {
                    (st.transformed, st.scaled, st.reencryption.urth)
                }
                _ => return Err(GameError::RevealMismatch),
            };
            if transformed.c0 * blinds[k] != published {
                return Err(GameError::RevealMismatch);
            }
            holes[k] = transformed.c1 - scaled - transformed.c0 * blinds[k];
        }
        tracing::debug!(target: LOG_TARGET, %from, "hole cards revealed");
        self.reveals.insert(from, holes);
        Ok(())
    }

    fn in_betting_phase(&self) -> bool {
        matches!(
            self.phase,
            HandPhase::PreFlopBetting
                | HandPhase::PostFlopBetting
                | HandPhase::PostTurnBetting
                | HandPhase::PostRiverBetting
        )
    }

    pub fn state_update<R: RngCore + CryptoRng>(&mut self, now: UnixSeconds, rng: &mut R) {
        match self.phase {
            HandPhase::Dealing => {
                for deal in &mut self.deals {
                    deal.session.state_update(now);
                }
                let mut culprits: Vec<Address> = Vec::new();
                for deal in &self.deals {
                    for culprit in deal.session.culprits() {
                        if !culprits.contains(culprit) {
                            culprits.push(*culprit);
                        }
                    }
                }
                if !culprits.is_empty() {
                    self.void(culprits);
                } else if self
                    .deals
                    .iter()
                    .all(|deal| deal.session.status() == SessionStatus::Succeeded)
                {
                    tracing::info!(target: LOG_TARGET, "all hole cards dealt");
                    self.open_betting(HandPhase::PreFlopBetting);
                }
            }
            HandPhase::PreFlopBetting => {
                if self.finish_betting_street() {
                    self.open_board_cards(FLOP_CARDS, HandPhase::FlopOpening, now, rng);
                }
            }
            HandPhase::PostFlopBetting => {
                if self.finish_betting_street() {
                    self.open_board_cards(1, HandPhase::TurnOpening, now, rng);
                }
            }
            HandPhase::PostTurnBetting => {
                if self.finish_betting_street() {
                    self.open_board_cards(1, HandPhase::RiverOpening, now, rng);
                }
            }
            HandPhase::PostRiverBetting => {
                if self.finish_betting_street() {
                    tracing::info!(target: LOG_TARGET, "showdown");
                    self.phase = HandPhase::Showdown;
                }
            }
            HandPhase::FlopOpening => {
                self.advance_openings(now, HandPhase::PostFlopBetting);
            }
            HandPhase::TurnOpening => {
                self.advance_openings(now, HandPhase::PostTurnBetting);
            }
            HandPhase::RiverOpening => {
                self.advance_openings(now, HandPhase::PostRiverBetting);
            }
            HandPhase::Showdown => {
                if self.active.iter().all(|p| self.reveals.contains_key(p)) {
                    tracing::info!(target: LOG_TARGET, pot = self.pot, "hand complete");
                    self.phase = HandPhase::Complete;
                }
            }
            HandPhase::Complete | HandPhase::Void => {}
        }
    }

    /// Collapse a completed betting round into the pot; returns whether the
    /// street is over and play continues with more than one player.
    fn finish_betting_street(&mut self) -> bool {
        let complete = self
            .betting
            .as_ref()
            .map(BettingRound::is_complete)
            .unwrap_or(false);
        if !complete {
            return false;
        }
        let round = self.betting.take().expect("checked above");
        for (player, amount) in &round.bets {
            *self.committed.entry(*player).or_insert(0) += amount;
        }
        self.pot += round.pot;
        self.active = round.active;

        if self.active.len() <= 1 {
            // Fold-out: no showdown, the last player takes the pot.
            tracing::info!(target: LOG_TARGET, pot = self.pot, "hand won by fold-out");
            self.phase = HandPhase::Complete;
            return false;
        }
        true
    }

    fn open_betting(&mut self, phase: HandPhase) {
        self.betting = Some(BettingRound::new(self.active.clone(), self.min_raise));
        self.phase = phase;
    }

    fn open_board_cards<R: RngCore + CryptoRng>(
        &mut self,
        count: usize,
        phase: HandPhase,
        now: UnixSeconds,
        rng: &mut R,
    ) {
        let first = HOLE_CARDS * self.roster.len() + self.openings.len();
        for deck_position in first..first + count {
            self.openings.push(BoardOpening {
                session_addr: Address::random(rng),
                deck_position,
                session: ScalarMulSession::new(
                    self.deck[deck_position].c0,
                    self.shared.clone(),
                    self.roster.clone(),
                    self.roster.len(),
                    self.schedule.deadline(now),
                ),
            });
        }
        tracing::debug!(target: LOG_TARGET, count, "community card openings created");
        self.phase = phase;
    }

    fn advance_openings(&mut self, now: UnixSeconds, next: HandPhase) {
        for opening in &mut self.openings {
            opening.session.state_update(now);
        }
        let mut culprits: Vec<Address> = Vec::new();
        for opening in &self.openings {
            for culprit in opening.session.culprits() {
                if !culprits.contains(culprit) {
                    culprits.push(*culprit);
                }
            }
        }
        if !culprits.is_empty() {
            self.void(culprits);
            return;
        }
        if self
            .openings
            .iter()
            .all(|opening| opening.session.status() == SessionStatus::Succeeded)
        {
            // Decrypt the freshly opened cards publicly: m = C₁ − s·C₀.
            while self.board.len() < self.openings.len() {
                let opening = &self.openings[self.board.len()];
                let result = opening
                    .session
                    .result()
                    .expect("opening just checked as succeeded");
                let card = self.deck[opening.deck_position].c1 - result;
                self.board.push(card);
            }
            self.open_betting(next);
        }
    }

    fn void(&mut self, culprits: Vec<Address>) {
        tracing::warn!(target: LOG_TARGET, ?culprits, "hand voided");
        self.culprits = culprits;
        self.phase = HandPhase::Void;
    }

    /// Chip movements owed once the hand is finished.
    ///
    /// A voided hand refunds every committed bet. A completed hand pays the
    /// pot to the remaining players; hand ranking is the caller's
    /// collaborator, so a multi-way showdown splits evenly, remainder to
    /// the earliest seat.
    pub fn settlement(&self) -> Vec<(Address, u64)> {
        match self.phase {
            HandPhase::Void => self
                .committed
                .iter()
                .map(|(player, amount)| (*player, *amount))
                .collect(),
            HandPhase::Complete => {
                let winners: Vec<Address> = self
                    .roster
                    .iter()
                    .filter(|p| self.active.contains(p))
                    .copied()
                    .collect();
                if winners.is_empty() || self.pot == 0 {
                    return Vec::new();
                }
                let share = self.pot / winners.len() as u64;
                let remainder = self.pot % winners.len() as u64;
                winners
                    .iter()
                    .enumerate()
                    .map(|(i, winner)| {
                        (*winner, if i == 0 { share + remainder } else { share })
                    })
                    .collect()
            }
            _ => Vec::new(),
        }
    }
}
