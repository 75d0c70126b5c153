use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Suit {
    Clubs = 0,
    Diamonds = 1,
    Spades = 2,
    Hearts = 3,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Spades, Suit::Hearts];

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Suit::Clubs),
            1 => Some(Suit::Diamonds),
            2 => Some(Suit::Spades),
            3 => Some(Suit::Hearts),
            _ => None,
        }
    }

    pub const fn symbol(self) -> char {
        match self {
            Suit::Clubs => 'C',
            Suit::Diamonds => 'D',
            Suit::Spades => 'S',
            Suit::Hearts => 'H',
        }
    }

    pub const fn is_heart(self) -> bool {
        matches!(self, Suit::Hearts)
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Suit {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "C" => Ok(Suit::Clubs),
            "D" => Ok(Suit::Diamonds),
            "S" => Ok(Suit::Spades),
            "H" => Ok(Suit::Hearts),
            other => Err(format!("unknown suit '{other}'")),
        }
    }
}

/// Bit-mask of suits a seat is publicly known to be void in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SuitMask(u8);

impl SuitMask {
    pub const EMPTY: Self = Self(0);

    pub fn contains(self, suit: Suit) -> bool {
        let bit = 1 << suit as u8;
        self.0 & bit != 0
    }

    pub fn with(mut self, suit: Suit) -> Self {
        let bit = 1 << suit as u8;
        self.0 |= bit;
        self
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}
