//! Betting round bookkeeping
//!
//! One round per street. Tracks who still owes, who folded, and the chips
//! committed this street; chip custody stays with the room, which debits
//! stacks as actions land and refunds from this record if the hand voids.
//! Anything fancier than fold/call/raise is outside this core.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::game::GameError;
use crate::sessions::Address;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetAction {
    Fold,
    /// Match the current bet (a check when nothing is owed).
    Call,
    /// Raise the current bet to this total.
    Raise(u64),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BettingRound {
    pub pot: u64,
    pub current_bet: u64,
    pub min_raise: u64,
    /// Chips committed this street, per player.
    pub bets: BTreeMap<Address, u64>,
    pub active: Vec<Address>,
    pub folded: Vec<Address>,
    acted: BTreeSet<Address>,
}

impl BettingRound {
    pub fn new(active: Vec<Address>, min_raise: u64) -> Self {
        Self {
            pot: 0,
            current_bet: 0,
            min_raise,
            bets: BTreeMap::new(),
            active,
            folded: Vec::new(),
            acted: BTreeSet::new(),
        }
    }

    /// Apply one action, debiting `stack` by whatever the player owes.
    pub fn process_action(
        &mut self,
        from: Address,
        action: BetAction,
        stack: &mut u64,
    ) -> Result<(), GameError> {
        if !self.active.contains(&from) {
            return Err(GameError::NotActive(from));
        }
        match action {
            BetAction::Fold => {
                self.active.retain(|p| *p != from);
                self.acted.remove(&from);
                self.folded.push(from);
            }
            BetAction::Call => {
                let committed = self.bets.get(&from).copied().unwrap_or(0);
                let owed = self.current_bet - committed;
                self.debit(from, owed, stack)?;
                self.acted.insert(from);
            }
            BetAction::Raise(to) => {
                if to < self.current_bet + self.min_raise {
                    return Err(GameError::RaiseTooSmall {
                        minimum: self.current_bet + self.min_raise,
                        got: to,
                    });
                }
                let committed = self.bets.get(&from).copied().unwrap_or(0);
                let owed = to - committed;
                self.debit(from, owed, stack)?;
                self.current_bet = to;
                // Everyone else has to respond to the raise.
                self.acted.clear();
                self.acted.insert(from);
            }
        }
        Ok(())
    }

    fn debit(&mut self, from: Address, owed: u64, stack: &mut u64) -> Result<(), GameError> {
        if owed > *stack {
            return Err(GameError::InsufficientChips {
                need: owed,
                have: *stack,
            });
        }
        *stack -= owed;
        *self.bets.entry(from).or_insert(0) += owed;
        self.pot += owed;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.active.len() <= 1
            || self.active.iter().all(|p| {
                self.acted.contains(p)
                    && self.bets.get(p).copied().unwrap_or(0) == self.current_bet
            })
    }

    pub fn has_folded(&self, player: &Address) -> bool {
        self.folded.contains(player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::addr;
    use crate::test_utils::serde::assert_round_trip_json;

    #[test]
    fn calls_complete_a_round() {
        let mut round = BettingRound::new(vec![addr(1), addr(2)], 10);
        let mut stacks = [100u64, 100];

        round
            .process_action(addr(1), BetAction::Raise(10), &mut stacks[0])
            .unwrap();
        assert!(!round.is_complete());
        round
            .process_action(addr(2), BetAction::Call, &mut stacks[1])
            .unwrap();
        assert!(round.is_complete());
        assert_eq!(round.pot, 20);
        assert_eq!(stacks, [90, 90]);
    }

    #[test]
    fn a_raise_reopens_the_action() {
        let mut round = BettingRound::new(vec![addr(1), addr(2), addr(3)], 5);
        let mut stacks = [100u64, 100, 100];

        round
            .process_action(addr(1), BetAction::Raise(5), &mut stacks[0])
            .unwrap();
        round
            .process_action(addr(2), BetAction::Call, &mut stacks[1])
            .unwrap();
        round
            .process_action(addr(3), BetAction::Raise(15), &mut stacks[2])
            .unwrap();
        assert!(!round.is_complete());

        round
            .process_action(addr(1), BetAction::Call, &mut stacks[0])
            .unwrap();
        round
            .process_action(addr(2), BetAction::Call, &mut stacks[1])
            .unwrap();
        assert!(round.is_complete());
        assert_eq!(round.pot, 45);
    }

    #[test]
    fn folding_down_to_one_ends_the_round() {
        let mut round = BettingRound::new(vec![addr(1), addr(2)], 5);
        let mut stack = 100u64;

        round
            .process_action(addr(2), BetAction::Fold, &mut stack)
            .unwrap();
        assert!(round.is_complete());
        assert!(round.has_folded(&addr(2)));
        assert_eq!(
            round.process_action(addr(2), BetAction::Call, &mut stack),
            Err(GameError::NotActive(addr(2)))
        );
    }

    #[test]
    fn undersized_raises_and_short_stacks_are_rejected() {
        let mut round = BettingRound::new(vec![addr(1), addr(2)], 10);
        let mut stack = 12u64;

        assert_eq!(
            round.process_action(addr(1), BetAction::Raise(5), &mut stack),
            Err(GameError::RaiseTooSmall { minimum: 10, got: 5 })
        );
        assert_eq!(
            round.process_action(addr(1), BetAction::Raise(20), &mut stack),
            Err(GameError::InsufficientChips { need: 20, have: 12 })
        );
        assert_eq!(stack, 12);
    }

    #[test]
    fn round_state_round_trips_with_serde() {
        let mut round = BettingRound::new(vec![addr(1), addr(2)], 10);
        let mut stack = 50u64;
        round
            .process_action(addr(1), BetAction::Raise(10), &mut stack)
            .unwrap();
        assert_round_trip_json(&round);
    }
}
