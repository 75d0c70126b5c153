use crate::model::card::Card;
use crate::model::seat::Seat;
use crate::model::suit::Suit;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trick {
    leader: Seat,
    players: usize,
    plays: Vec<Play>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Play {
    pub seat: Seat,
    pub card: Card,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrickError {
    #[error("trick already complete")]
    TrickComplete,
    #[error("expected {expected} to play next but got {actual}")]
    OutOfTurn { expected: Seat, actual: Seat },
}

impl Trick {
    pub fn new(leader: Seat, players: usize) -> Self {
        Self {
            leader,
            players,
            plays: Vec::with_capacity(players),
        }
    }

    pub fn leader(&self) -> Seat {
        self.leader
    }

    pub fn plays(&self) -> &[Play] {
        &self.plays
    }

    pub fn is_complete(&self) -> bool {
        self.plays.len() == self.players
    }

    pub fn lead_suit(&self) -> Option<Suit> {
        self.plays.first().map(|play| play.card.suit)
    }

    pub fn play(&mut self, seat: Seat, card: Card) -> Result<(), TrickError> {
        if self.is_complete() {
            return Err(TrickError::TrickComplete);
        }
        let expected = self.expected_seat();
        if expected != seat {
            return Err(TrickError::OutOfTurn {
                expected,
                actual: seat,
            });
        }
        self.plays.push(Play { seat, card });
        Ok(())
    }

    /// Highest card of the led suit; `None` until every seat has played.
    pub fn winner(&self) -> Option<Seat> {
        if !self.is_complete() {
            return None;
        }
        let lead_suit = self.lead_suit()?;
        self.plays
            .iter()
            .filter(|play| play.card.suit == lead_suit)
            .max_by_key(|play| play.card.rank)
            .map(|play| play.seat)
    }

    pub fn penalty_total(&self) -> u32 {
        self.plays.iter().map(|play| play.card.penalty_value()).sum()
    }

    pub fn expected_seat(&self) -> Seat {
        self.plays
            .last()
            .map(|play| play.seat.next(self.players))
            .unwrap_or(self.leader)
    }
}
