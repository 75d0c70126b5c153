use crate::model::rank::Rank;
use crate::model::suit::Suit;
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { suit, rank }
    }

    pub const fn is_queen_of_spades(self) -> bool {
        matches!(self.rank, Rank::Queen) && matches!(self.suit, Suit::Spades)
    }

    /// Penalty points collected by whoever wins a trick containing this card.
    pub fn penalty_value(self) -> u32 {
        if self.is_queen_of_spades() {
            13
        } else if self.suit.is_heart() {
            1
        } else {
            0
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

impl FromStr for Card {
    type Err = String;

    /// Parses the display form, e.g. `QS`, `10H`, `2C`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let split = raw
            .char_indices()
            .last()
            .map(|(idx, _)| idx)
            .ok_or_else(|| "empty card".to_string())?;
        let (rank, suit) = raw.split_at(split);
        Ok(Card::new(rank.parse()?, suit.parse()?))
    }
}
