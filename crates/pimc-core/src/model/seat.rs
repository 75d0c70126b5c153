use core::fmt;
use serde::{Deserialize, Serialize};

/// Index of a player around the table, `0..players`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seat(u8);

impl Seat {
    pub const MAX_PLAYERS: usize = 8;

    pub const fn new(index: usize) -> Self {
        Self(index as u8)
    }

    pub const fn from_index(index: usize, players: usize) -> Option<Self> {
        if index < players && index < Self::MAX_PLAYERS {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn next(self, players: usize) -> Seat {
        Seat(((self.0 as usize + 1) % players) as u8)
    }

    pub const fn previous(self, players: usize) -> Seat {
        Seat(((self.0 as usize + players - 1) % players) as u8)
    }

    pub fn all(players: usize) -> impl Iterator<Item = Seat> {
        (0..players.min(Self::MAX_PLAYERS)).map(Seat::new)
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seat{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Seat;

    #[test]
    fn next_and_previous_wrap() {
        assert_eq!(Seat::new(2).next(3), Seat::new(0));
        assert_eq!(Seat::new(0).previous(3), Seat::new(2));
        assert_eq!(Seat::new(1).next(4), Seat::new(2));
    }

    #[test]
    fn from_index_respects_player_count() {
        assert_eq!(Seat::from_index(1, 2), Some(Seat::new(1)));
        assert_eq!(Seat::from_index(2, 2), None);
        assert_eq!(Seat::from_index(9, 12), None);
    }

    #[test]
    fn all_enumerates_in_order() {
        let seats: Vec<_> = Seat::all(3).map(Seat::index).collect();
        assert_eq!(seats, vec![0, 1, 2]);
    }
}
