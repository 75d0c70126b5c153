//! Plain trick-taking game with hidden hands.
//!
//! The deck holds the `players * hand_size` highest cards of a standard deck
//! and is dealt by a chance node at the start. Players must follow the led
//! suit when they can; the highest card of the led suit wins the trick and
//! its winner leads next. Hearts cost one point, the queen of spades
//! thirteen, and the lowest total wins.

use crate::determinize::Dealer;
use crate::model::card::Card;
use crate::model::deck::Deck;
use crate::model::hand::Hand;
use crate::model::seat::Seat;
use crate::model::suit::{Suit, SuitMask};
use crate::model::trick::{Trick, TrickError};
use crate::tree::{ActionCollection, ActionKind, GameWorld, NodeKind, ScoreAggregator, stage_on_clone};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrickConfig {
    pub players: usize,
    pub hand_size: usize,
}

impl Default for TrickConfig {
    fn default() -> Self {
        Self {
            players: 4,
            hand_size: 5,
        }
    }
}

impl TrickConfig {
    pub const MIN_PLAYERS: usize = 2;
    pub const MAX_PLAYERS: usize = 6;

    pub fn validate(&self) -> Result<(), PlayError> {
        if !(Self::MIN_PLAYERS..=Self::MAX_PLAYERS).contains(&self.players) {
            return Err(PlayError::InvalidConfig(format!(
                "players must be between {} and {}, got {}",
                Self::MIN_PLAYERS,
                Self::MAX_PLAYERS,
                self.players
            )));
        }
        if self.hand_size == 0 || self.players * self.hand_size > 52 {
            return Err(PlayError::InvalidConfig(format!(
                "{} hands of {} cards do not fit a 52-card deck",
                self.players, self.hand_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrickPhase {
    Deal,
    Play,
    Collect,
    Finished,
}

/// Primitive steps of a play. A legal play is always the pair
/// `TakeFromHand` then `PlaceOnTrick` for the same card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrickMutation {
    TakeFromHand { seat: Seat, card: Card },
    PlaceOnTrick { seat: Seat, card: Card },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("not allowed during the {0:?} phase")]
    WrongPhase(TrickPhase),
    #[error("expected {expected} to play but got {actual}")]
    OutOfTurn { expected: Seat, actual: Seat },
    #[error("{seat} does not hold {card}")]
    CardNotHeld { seat: Seat, card: Card },
    #[error("{card} does not follow the led suit {lead}")]
    MustFollowSuit { card: Card, lead: Suit },
    #[error("a card is already on its way to the trick")]
    CardInFlight,
    #[error("{card} was not taken from the hand first")]
    NotInFlight { card: Card },
    #[error("no winner for an unfinished trick")]
    IncompleteTrick,
    #[error(transparent)]
    Trick(#[from] TrickError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrickGame {
    config: TrickConfig,
    phase: TrickPhase,
    hands: Vec<Hand>,
    trick: Trick,
    in_flight: Option<Card>,
    penalties: Vec<u32>,
    voids: Vec<SuitMask>,
    played: Vec<Card>,
    tricks_completed: usize,
}

impl TrickGame {
    /// A fresh game waiting for its deal.
    pub fn new(config: TrickConfig) -> Result<Self, PlayError> {
        config.validate()?;
        Ok(Self {
            config,
            phase: TrickPhase::Deal,
            hands: vec![Hand::new(); config.players],
            trick: Trick::new(Seat::new(0), config.players),
            in_flight: None,
            penalties: vec![0; config.players],
            voids: vec![SuitMask::EMPTY; config.players],
            played: Vec::new(),
            tricks_completed: 0,
        })
    }

    /// A game that starts from the given hands with `leader` to play.
    pub fn dealt(hands: Vec<Hand>, leader: Seat) -> Result<Self, PlayError> {
        let hand_size = hands.first().map(Hand::len).unwrap_or(0);
        let config = TrickConfig {
            players: hands.len(),
            hand_size,
        };
        config.validate()?;
        if hands.iter().any(|hand| hand.len() != hand_size) {
            return Err(PlayError::InvalidConfig(
                "every hand must hold the same number of cards".into(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(card) = hands.iter().flat_map(Hand::iter).find(|card| !seen.insert(**card)) {
            return Err(PlayError::InvalidConfig(format!("{card} is dealt twice")));
        }
        if leader.index() >= config.players {
            return Err(PlayError::InvalidConfig(format!(
                "{leader} cannot lead a {}-player game",
                config.players
            )));
        }
        let mut game = Self::new(config)?;
        game.hands = hands;
        game.trick = Trick::new(leader, config.players);
        game.phase = TrickPhase::Play;
        Ok(game)
    }

    pub fn config(&self) -> TrickConfig {
        self.config
    }

    pub fn phase(&self) -> TrickPhase {
        self.phase
    }

    pub fn hands(&self) -> &[Hand] {
        &self.hands
    }

    pub fn hand(&self, seat: Seat) -> Option<&Hand> {
        self.hands.get(seat.index())
    }

    pub fn trick(&self) -> &Trick {
        &self.trick
    }

    pub fn penalties(&self) -> &[u32] {
        &self.penalties
    }

    /// Suits each seat has shown out of.
    pub fn voids(&self) -> &[SuitMask] {
        &self.voids
    }

    /// Cards played so far, in play order.
    pub fn played(&self) -> &[Card] {
        &self.played
    }

    pub fn tricks_completed(&self) -> usize {
        self.tricks_completed
    }

    /// Cards `seat` cannot see: everything in the other hands.
    pub fn hidden_cards(&self, seat: Seat) -> Vec<Card> {
        let mut hidden: Vec<Card> = self
            .hands
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != seat.index())
            .flat_map(|(_, hand)| hand.iter().copied())
            .collect();
        hidden.sort();
        hidden
    }

    fn expect_turn(&self, seat: Seat) -> Result<(), PlayError> {
        if self.phase != TrickPhase::Play {
            return Err(PlayError::WrongPhase(self.phase));
        }
        let expected = self.trick.expected_seat();
        if expected != seat {
            return Err(PlayError::OutOfTurn {
                expected,
                actual: seat,
            });
        }
        Ok(())
    }

    fn check_take(&self, seat: Seat, card: Card) -> Result<(), PlayError> {
        self.expect_turn(seat)?;
        if self.in_flight.is_some() {
            return Err(PlayError::CardInFlight);
        }
        let hand = &self.hands[seat.index()];
        if !hand.contains(card) {
            return Err(PlayError::CardNotHeld { seat, card });
        }
        if let Some(lead) = self.trick.lead_suit() {
            if card.suit != lead && hand.has_suit(lead) {
                return Err(PlayError::MustFollowSuit { card, lead });
            }
        }
        Ok(())
    }

    fn take(&mut self, seat: Seat, card: Card) -> Result<(), PlayError> {
        self.check_take(seat, card)?;
        self.hands[seat.index()].remove(card);
        self.in_flight = Some(card);
        Ok(())
    }

    fn place(&mut self, seat: Seat, card: Card) -> Result<(), PlayError> {
        self.expect_turn(seat)?;
        if self.in_flight != Some(card) {
            return Err(PlayError::NotInFlight { card });
        }
        if let Some(lead) = self.trick.lead_suit() {
            if card.suit != lead {
                self.voids[seat.index()] = self.voids[seat.index()].with(lead);
            }
        }
        self.trick.play(seat, card)?;
        self.in_flight = None;
        self.played.push(card);
        if self.trick.is_complete() {
            self.phase = TrickPhase::Collect;
        }
        Ok(())
    }

    fn deal(&mut self, rng: &mut dyn RngCore) {
        let players = self.config.players;
        let mut deck = Deck::top_ranks(players * self.config.hand_size);
        deck.shuffle_in_place(rng);
        for (index, card) in deck.drain().enumerate() {
            self.hands[index % players].add(card);
        }
        self.trick = Trick::new(Seat::new(0), players);
        self.phase = TrickPhase::Play;
    }

    fn collect(&mut self) -> Result<(), PlayError> {
        let winner = self.trick.winner().ok_or(PlayError::IncompleteTrick)?;
        self.penalties[winner.index()] += self.trick.penalty_total();
        self.tricks_completed += 1;
        self.trick = Trick::new(winner, self.config.players);
        self.phase = if self.hands.iter().all(Hand::is_empty) {
            TrickPhase::Finished
        } else {
            TrickPhase::Play
        };
        Ok(())
    }
}

impl ScoreAggregator for TrickGame {
    fn final_scores(&self) -> Vec<i64> {
        self.penalties.iter().map(|&points| i64::from(points)).collect()
    }
}

impl GameWorld for TrickGame {
    type Mutation = TrickMutation;
    type Error = PlayError;

    fn num_players(&self) -> usize {
        self.config.players
    }

    fn node(&self) -> NodeKind {
        match self.phase {
            TrickPhase::Deal | TrickPhase::Collect => NodeKind::Automatic,
            TrickPhase::Play => NodeKind::Decision(self.trick.expected_seat()),
            TrickPhase::Finished => NodeKind::Terminal,
        }
    }

    fn legal_actions(&self) -> Vec<ActionCollection<TrickMutation>> {
        if self.phase != TrickPhase::Play {
            return Vec::new();
        }
        let seat = self.trick.expected_seat();
        let hand = &self.hands[seat.index()];
        let lead = self.trick.lead_suit().filter(|suit| hand.has_suit(*suit));
        hand.iter()
            .filter(|card| lead.is_none_or(|suit| card.suit == suit))
            .map(|&card| {
                ActionCollection::new(
                    ActionKind::Play,
                    vec![
                        TrickMutation::TakeFromHand { seat, card },
                        TrickMutation::PlaceOnTrick { seat, card },
                    ],
                )
            })
            .collect()
    }

    fn apply(&mut self, mutation: &TrickMutation) -> Result<(), PlayError> {
        match *mutation {
            TrickMutation::TakeFromHand { seat, card } => self.take(seat, card),
            TrickMutation::PlaceOnTrick { seat, card } => self.place(seat, card),
        }
    }

    fn check_mutations(&self, mutations: &[TrickMutation]) -> Result<(), PlayError> {
        // A legal take leaves the turn and the trick as they were, so the
        // matching place always succeeds.
        match mutations {
            [TrickMutation::TakeFromHand { seat, card }] => self.check_take(*seat, *card),
            [
                TrickMutation::TakeFromHand { seat, card },
                TrickMutation::PlaceOnTrick {
                    seat: placer,
                    card: placed,
                },
            ] if seat == placer && card == placed => self.check_take(*seat, *card),
            _ => stage_on_clone(self, mutations),
        }
    }

    fn resolve_automatic(&mut self, rng: &mut dyn RngCore) -> Result<(), PlayError> {
        match self.phase {
            TrickPhase::Deal => {
                self.deal(rng);
                Ok(())
            }
            TrickPhase::Collect => self.collect(),
            other => Err(PlayError::WrongPhase(other)),
        }
    }

    fn determinize(&self, seat: Seat, rng: &mut dyn RngCore) -> Self {
        if self.phase == TrickPhase::Deal {
            return self.clone();
        }
        let mut world = self.clone();
        world.hands = Dealer::default().redeal_or_keep(&self.hands, seat, &self.voids, rng, None);
        world
    }

    fn tree_location(&self) -> String {
        format!(
            "trick {} {:?} ({} played)",
            self.tricks_completed + 1,
            self.phase,
            self.trick.plays().len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{PlayError, TrickConfig, TrickGame, TrickMutation, TrickPhase};
    use crate::model::card::Card;
    use crate::model::hand::Hand;
    use crate::model::seat::Seat;
    use crate::model::suit::Suit;
    use crate::tree::{ActionCollection, ActionKind, GameWorld, NodeKind, ScoreAggregator};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn card(raw: &str) -> Card {
        raw.parse().unwrap()
    }

    fn hand(cards: &[&str]) -> Hand {
        Hand::with_cards(cards.iter().map(|raw| card(raw)).collect())
    }

    fn play(game: &mut TrickGame, seat: usize, raw: &str) -> Result<(), PlayError> {
        let seat = Seat::new(seat);
        let card = card(raw);
        game.apply(&TrickMutation::TakeFromHand { seat, card })?;
        game.apply(&TrickMutation::PlaceOnTrick { seat, card })
    }

    fn three_seat_game() -> TrickGame {
        TrickGame::dealt(
            vec![
                hand(&["AC", "2H", "QS"]),
                hand(&["KC", "3D", "AH"]),
                hand(&["4H", "5H", "KS"]),
            ],
            Seat::new(0),
        )
        .unwrap()
    }

    #[test]
    fn chance_deal_fills_every_hand() {
        let mut game = TrickGame::new(TrickConfig {
            players: 4,
            hand_size: 3,
        })
        .unwrap();
        assert_eq!(game.node(), NodeKind::Automatic);
        let mut rng = SmallRng::seed_from_u64(2);
        game.resolve_automatic(&mut rng).unwrap();
        assert_eq!(game.phase(), TrickPhase::Play);
        assert!(game.hands().iter().all(|hand| hand.len() == 3));
        assert_eq!(game.hidden_cards(Seat::new(0)).len(), 9);
        assert_eq!(game.node(), NodeKind::Decision(Seat::new(0)));
    }

    #[test]
    fn rejects_bad_configurations() {
        assert!(TrickGame::new(TrickConfig { players: 1, hand_size: 3 }).is_err());
        assert!(TrickGame::new(TrickConfig { players: 6, hand_size: 9 }).is_err());
        assert!(TrickGame::dealt(vec![hand(&["AC"]), hand(&["AC"])], Seat::new(0)).is_err());
        assert!(TrickGame::dealt(vec![hand(&["AC"]), hand(&["KC", "QC"])], Seat::new(0)).is_err());
    }

    #[test]
    fn must_follow_suit_when_possible() {
        let mut game = three_seat_game();
        play(&mut game, 0, "AC").unwrap();
        assert_eq!(game.legal_actions().len(), 1);
        assert!(matches!(
            play(&mut game, 1, "AH"),
            Err(PlayError::MustFollowSuit { .. })
        ));
        play(&mut game, 1, "KC").unwrap();
        assert_eq!(game.legal_actions().len(), 3);
        play(&mut game, 2, "KS").unwrap();
        assert!(game.voids()[2].contains(Suit::Clubs));
        assert!(!game.voids()[1].contains(Suit::Clubs));
        assert_eq!(game.node(), NodeKind::Automatic);
    }

    #[test]
    fn place_requires_a_taken_card() {
        let mut game = three_seat_game();
        let err = game
            .apply(&TrickMutation::PlaceOnTrick {
                seat: Seat::new(0),
                card: card("AC"),
            })
            .unwrap_err();
        assert!(matches!(err, PlayError::NotInFlight { .. }));
        assert!(matches!(play(&mut game, 1, "KC"), Err(PlayError::OutOfTurn { .. })));
    }

    #[test]
    fn checked_plays_match_applied_plays() {
        let mut game = three_seat_game();
        play(&mut game, 0, "AC").unwrap();
        let seat = Seat::new(1);
        for raw in ["KC", "3D", "AH", "AC"] {
            let card = card(raw);
            let group = [
                TrickMutation::TakeFromHand { seat, card },
                TrickMutation::PlaceOnTrick { seat, card },
            ];
            let mut applied = game.clone();
            let expected = group.iter().try_for_each(|mutation| applied.apply(mutation));
            assert_eq!(game.check_mutations(&group), expected, "{raw}");
        }
    }

    #[test]
    fn rejected_action_leaves_game_untouched() {
        let mut game = three_seat_game();
        play(&mut game, 0, "AC").unwrap();
        let before = game.clone();

        let off_suit = ActionCollection::new(
            ActionKind::Play,
            vec![
                TrickMutation::TakeFromHand {
                    seat: Seat::new(1),
                    card: card("AH"),
                },
                TrickMutation::PlaceOnTrick {
                    seat: Seat::new(1),
                    card: card("AH"),
                },
            ],
        );
        assert!(matches!(
            off_suit.execute_all(&mut game),
            Err(PlayError::MustFollowSuit { .. })
        ));
        assert_eq!(game, before);

        let mismatched = ActionCollection::new(
            ActionKind::Play,
            vec![
                TrickMutation::TakeFromHand {
                    seat: Seat::new(1),
                    card: card("KC"),
                },
                TrickMutation::PlaceOnTrick {
                    seat: Seat::new(1),
                    card: card("3D"),
                },
            ],
        );
        assert!(matches!(
            mismatched.execute_all(&mut game),
            Err(PlayError::NotInFlight { .. })
        ));
        assert_eq!(game, before);
    }

    #[test]
    fn collecting_scores_penalties_and_passes_the_lead() {
        let mut game = three_seat_game();
        let mut rng = SmallRng::seed_from_u64(0);
        play(&mut game, 0, "QS").unwrap();
        play(&mut game, 1, "AH").unwrap();
        play(&mut game, 2, "KS").unwrap();
        game.resolve_automatic(&mut rng).unwrap();
        assert_eq!(game.penalties(), &[0, 0, 14]);
        assert_eq!(game.node(), NodeKind::Decision(Seat::new(2)));
        assert_eq!(game.tricks_completed(), 1);
    }

    #[test]
    fn full_game_reaches_terminal_with_all_penalties_scored() {
        let mut game = three_seat_game();
        let mut rng = SmallRng::seed_from_u64(0);
        loop {
            match game.node() {
                NodeKind::Terminal => break,
                NodeKind::Automatic => game.resolve_automatic(&mut rng).unwrap(),
                NodeKind::Decision(_) => {
                    let options = game.legal_actions();
                    options[0].execute_all(&mut game).unwrap();
                }
            }
        }
        assert_eq!(game.final_scores().iter().sum::<i64>(), 13 + 4);
        assert_eq!(game.played().len(), 9);
    }

    #[test]
    fn determinize_keeps_own_hand_and_hidden_multiset() {
        let mut game = TrickGame::new(TrickConfig::default()).unwrap();
        let mut rng = SmallRng::seed_from_u64(17);
        game.resolve_automatic(&mut rng).unwrap();
        let options = game.legal_actions();
        options[0].execute_all(&mut game).unwrap();

        let seat = Seat::new(1);
        let sampled = game.determinize(seat, &mut rng);
        assert_eq!(sampled.hand(seat), game.hand(seat));
        assert_eq!(sampled.hidden_cards(seat), game.hidden_cards(seat));
        assert_eq!(sampled.played(), game.played());
        assert_eq!(sampled.trick(), game.trick());
        for (left, right) in sampled.hands().iter().zip(game.hands()) {
            assert_eq!(left.len(), right.len());
        }
    }
}
