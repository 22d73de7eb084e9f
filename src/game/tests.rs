//! End-to-end room scenarios: every role is played locally and fed through
//! the command surface in log order.

use std::collections::BTreeMap;

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;

use crate::elgamal::Ciphertext;
use crate::game::betting::BetAction;
use crate::game::hand::{card_point, Hand, HandPhase};
use crate::game::room::{Room, RoomConfig, RoomPhase};
use crate::game::Command;
use crate::sessions::dkg::{DkgContribution, SecretShare};
use crate::sessions::reencryption::{ReencryptContribution, ReencryptionSession};
use crate::sessions::scalar_mul::{ScalarMulContribution, ScalarMulSession};
use crate::sessions::shuffle::ShuffleContribution;
use crate::sessions::{Address, DeadlineSchedule};
use crate::test_utils::{addr, init_tracing, test_rng};

fn config(seats: usize) -> RoomConfig {
    RoomConfig {
        seats,
        buy_in: 1_000,
        penalty: 100,
        min_raise: 10,
        schedule: DeadlineSchedule::new(30, 60),
    }
}

fn chips_of(room: &Room, player: Address) -> u64 {
    room.seats()
        .iter()
        .find(|seat| seat.address == player)
        .expect("seated")
        .chips
}

/// Drive a room of three players through one complete hand: key
/// generation, a fully verified 52-card shuffle, six private deals, four
/// betting streets with the 3/1/1 community openings, and a showdown.
#[test]
fn full_hand_plays_out_over_the_room() {
    init_tracing();
    let mut rng = test_rng();
    let players = [addr(0xa1), addr(0xb2), addr(0xc3)];
    let mut room = Room::create(config(3));

    // Seats fill; the last join opens key generation.
    for (i, player) in players.iter().enumerate() {
        room.apply(i as u64, *player, Command::Join, &mut rng).unwrap();
    }
    assert_eq!(room.phase(), RoomPhase::DkgInProgress);

    let (dkg_addr, base) = {
        let (addr, session) = room.dkg_session().unwrap();
        (*addr, *session.base().unwrap())
    };
    let mut shares: BTreeMap<Address, SecretShare> = BTreeMap::new();
    for player in players {
        let (share, contribution) = DkgContribution::create(&base, &mut rng);
        shares.insert(player, share);
        room.apply(
            3,
            player,
            Command::SubmitDkg { session: dkg_addr, contribution },
            &mut rng,
        )
        .unwrap();
    }
    room.apply(4, players[0], Command::StateUpdate, &mut rng).unwrap();
    assert_eq!(room.phase(), RoomPhase::ShuffleInProgress);

    let shared = room.shared_info().unwrap().clone();
    let secret: Scalar = shares.values().map(|s| s.0).sum();
    assert_eq!(shared.aggregate.point, shared.aggregate.base * secret);

    // Sequential verified shuffle, one contribution per player in order.
    for (i, player) in players.iter().enumerate() {
        let (shuffle_addr, key, current) = {
            let (addr, session) = room.shuffle_session().unwrap();
            (
                *addr,
                session.commitment_key().unwrap().clone(),
                session.current_deck().unwrap().to_vec(),
            )
        };
        let contribution =
            ShuffleContribution::create(&key, &shared.aggregate, &current, &mut rng);
        room.apply(
            5 + i as u64,
            *player,
            Command::SubmitShuffle { session: shuffle_addr, contribution },
            &mut rng,
        )
        .unwrap();
    }
    let deck: Vec<Ciphertext> = room
        .shuffle_session()
        .unwrap()
        .1
        .current_deck()
        .unwrap()
        .to_vec();
    let open = |position: usize| -> RistrettoPoint {
        deck[position].c1 - deck[position].c0 * secret
    };

    room.apply(9, players[0], Command::StateUpdate, &mut rng).unwrap();
    assert_eq!(room.phase(), RoomPhase::HandAndNextShuffleInProgress);
    assert_eq!(room.hand().unwrap().phase(), HandPhase::Dealing);

    // Private deals: each recipient re-encrypts, then the whole roster
    // answers the scalar multiplication for every deal.
    let deal_index: Vec<(Address, Address, Ciphertext)> = room
        .hand()
        .unwrap()
        .deals()
        .iter()
        .map(|deal| {
            let card = match &deal.session {
                ReencryptionSession::AcceptingReencrypt(st) => st.card,
                _ => panic!("deal should be accepting"),
            };
            (deal.session_addr, deal.recipient, card)
        })
        .collect();

    let mut blinds: BTreeMap<Address, Vec<Scalar>> = BTreeMap::new();
    for (session, recipient, card) in &deal_index {
        let (blind, contribution) = ReencryptContribution::create(&shared, card, &mut rng);
        blinds.entry(*recipient).or_default().push(blind.u);
        room.apply(
            10,
            *recipient,
            Command::SubmitReencryption { session: *session, contribution },
            &mut rng,
        )
        .unwrap();

        let c0 = room
            .hand()
            .unwrap()
            .deals()
            .iter()
            .find(|deal| deal.session_addr == *session)
            .unwrap()
            .session
            .transformed()
            .unwrap()
            .c0;
        for player in players {
            let contribution = ScalarMulContribution::create(
                &shares[&player],
                &shared.aggregate.base,
                &c0,
                &mut rng,
            );
            room.apply(
                10,
                player,
                Command::SubmitScalarMul { session: *session, contribution },
                &mut rng,
            )
            .unwrap();
        }
    }
    room.apply(11, players[0], Command::StateUpdate, &mut rng).unwrap();
    assert_eq!(room.hand().unwrap().phase(), HandPhase::PreFlopBetting);

    // Pre-flop: a raise, two calls.
    room.apply(12, players[0], Command::SubmitBet { action: BetAction::Raise(10) }, &mut rng)
        .unwrap();
    room.apply(12, players[1], Command::SubmitBet { action: BetAction::Call }, &mut rng)
        .unwrap();
    room.apply(12, players[2], Command::SubmitBet { action: BetAction::Call }, &mut rng)
        .unwrap();
    room.apply(13, players[0], Command::StateUpdate, &mut rng).unwrap();
    assert_eq!(room.hand().unwrap().phase(), HandPhase::FlopOpening);

    // Community openings: folded or not, every roster member owes a share.
    let open_board = |room: &mut Room, rng: &mut rand::rngs::StdRng, at: u64| {
        let pending: Vec<(Address, RistrettoPoint)> = room
            .hand()
            .unwrap()
            .openings()
            .iter()
            .filter_map(|opening| match &opening.session {
                ScalarMulSession::InProgress(st) => Some((opening.session_addr, st.point)),
                _ => None,
            })
            .collect();
        for (session, point) in pending {
            for player in players {
                let contribution = ScalarMulContribution::create(
                    &shares[&player],
                    &shared.aggregate.base,
                    &point,
                    rng,
                );
                room.apply(at, player, Command::SubmitScalarMul { session, contribution }, rng)
                    .unwrap();
            }
        }
        room.apply(at + 1, players[0], Command::StateUpdate, rng).unwrap();
    };

    open_board(&mut room, &mut rng, 14);
    assert_eq!(room.hand().unwrap().phase(), HandPhase::PostFlopBetting);
    assert_eq!(room.hand().unwrap().board().len(), 3);

    // Post-flop: the third player gives up; the other two check it down.
    room.apply(16, players[2], Command::SubmitBet { action: BetAction::Fold }, &mut rng)
        .unwrap();
    room.apply(16, players[0], Command::SubmitBet { action: BetAction::Call }, &mut rng)
        .unwrap();
    room.apply(16, players[1], Command::SubmitBet { action: BetAction::Call }, &mut rng)
        .unwrap();
    room.apply(17, players[0], Command::StateUpdate, &mut rng).unwrap();
    assert_eq!(room.hand().unwrap().phase(), HandPhase::TurnOpening);

    open_board(&mut room, &mut rng, 18);
    assert_eq!(room.hand().unwrap().phase(), HandPhase::PostTurnBetting);
    for player in [players[0], players[1]] {
        room.apply(20, player, Command::SubmitBet { action: BetAction::Call }, &mut rng)
            .unwrap();
    }
    room.apply(21, players[0], Command::StateUpdate, &mut rng).unwrap();
    assert_eq!(room.hand().unwrap().phase(), HandPhase::RiverOpening);

    open_board(&mut room, &mut rng, 22);
    assert_eq!(room.hand().unwrap().phase(), HandPhase::PostRiverBetting);
    for player in [players[0], players[1]] {
        room.apply(24, player, Command::SubmitBet { action: BetAction::Call }, &mut rng)
            .unwrap();
    }
    room.apply(25, players[0], Command::StateUpdate, &mut rng).unwrap();
    assert_eq!(room.hand().unwrap().phase(), HandPhase::Showdown);

    // The five community cards are the deck positions 2n..2n+4, opened.
    let board = room.hand().unwrap().board().to_vec();
    assert_eq!(board, (6..=10).map(open).collect::<Vec<_>>());

    // Showdown: the two remaining players publish their unblinding scalars.
    for player in [players[0], players[1]] {
        let us = &blinds[&player];
        room.apply(
            26,
            player,
            Command::SubmitShowdownReveal { blinds: [us[0], us[1]] },
            &mut rng,
        )
        .unwrap();
    }

    // Revealed holes must equal the dealt deck positions (player i holds
    // positions 2i and 2i+1), and every opened card is a canonical card.
    {
        let hand = room.hand().unwrap();
        let reveals = hand.reveals();
        for (i, player) in players.iter().take(2).enumerate() {
            let expected = [open(2 * i), open(2 * i + 1)];
            assert_eq!(reveals[player], expected);
        }
        let all_cards: Vec<RistrettoPoint> =
            (0..52).map(|j| card_point(&shared.aggregate, j)).collect();
        let mut opened: Vec<RistrettoPoint> = (0..=10).map(open).collect();
        for point in &opened {
            assert!(all_cards.contains(point));
        }
        let before = opened.len();
        opened.sort_by_key(|p| p.compress().to_bytes());
        opened.dedup_by_key(|p| p.compress().to_bytes());
        assert_eq!(opened.len(), before, "opened cards must be distinct");
    }

    room.apply(27, players[0], Command::StateUpdate, &mut rng).unwrap();

    // Pot of 30 split between the two remaining players; the folder paid.
    assert_eq!(chips_of(&room, players[0]), 1_005);
    assert_eq!(chips_of(&room, players[1]), 1_005);
    assert_eq!(chips_of(&room, players[2]), 990);

    // The concurrent shuffle is still running; the room waits on it.
    assert_eq!(room.phase(), RoomPhase::ShuffleInProgress);
    assert!(!room.log().is_empty());
}

/// A key-generation timeout blames exactly the absentees, burns their
/// penalty, and closes the room when too few players remain.
#[test]
fn dkg_timeout_penalizes_absentees_and_closes_the_room() {
    init_tracing();
    let mut rng = test_rng();
    let players = [addr(1), addr(2), addr(3)];
    let mut room = Room::create(config(3));
    for player in players {
        room.apply(0, player, Command::Join, &mut rng).unwrap();
    }

    let (dkg_addr, base) = {
        let (addr, session) = room.dkg_session().unwrap();
        (*addr, *session.base().unwrap())
    };
    // Only the first player shows up.
    let (_, contribution) = DkgContribution::create(&base, &mut rng);
    room.apply(
        1,
        players[0],
        Command::SubmitDkg { session: dkg_addr, contribution },
        &mut rng,
    )
    .unwrap();

    // Deadline is join-time + per_action + buffer = 90.
    room.apply(50, players[0], Command::StateUpdate, &mut rng).unwrap();
    assert_eq!(room.phase(), RoomPhase::DkgInProgress);

    room.apply(95, players[0], Command::StateUpdate, &mut rng).unwrap();
    assert_eq!(chips_of(&room, players[0]), 1_000);
    assert_eq!(chips_of(&room, players[1]), 900);
    assert_eq!(chips_of(&room, players[2]), 900);
    assert!(!room.seats()[1].connected);
    assert!(!room.seats()[2].connected);

    // One alive player left: nothing to continue with.
    assert_eq!(room.phase(), RoomPhase::Closed);
}

/// A recipient who never transforms their card voids the hand and eats the
/// penalty; bets placed before the void are returned.
#[test]
fn stalled_deal_voids_the_hand_and_blames_the_recipient() {
    init_tracing();
    let mut rng = test_rng();
    let roster = vec![addr(1), addr(2), addr(3)];

    // Build the shared key directly; the room pipeline is exercised above.
    let mut dkg = crate::sessions::dkg::DkgSession::new(roster.clone(), 100, &mut rng);
    let base = *dkg.base().unwrap();
    for member in &roster {
        let (_, contribution) = DkgContribution::create(&base, &mut rng);
        dkg.process_contribution(*member, contribution).unwrap();
    }
    dkg.state_update(0);
    let shared = dkg.public_info(addr(99)).unwrap();

    let deck: Vec<Ciphertext> = (0..11)
        .map(|j| shared.aggregate.encrypt_scalar(&Scalar::ZERO, j + 1))
        .collect();
    let mut hand = Hand::new(
        roster.clone(),
        shared,
        deck,
        DeadlineSchedule::new(30, 60),
        10,
        0,
        &mut rng,
    );

    // Nobody re-encrypts anything; the first rung of every deal passes.
    hand.state_update(500, &mut rng);
    assert_eq!(hand.phase(), HandPhase::Void);
    assert_eq!(hand.culprits(), roster.as_slice());
    assert!(hand.settlement().is_empty());
}
