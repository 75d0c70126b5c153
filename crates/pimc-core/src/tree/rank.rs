use super::world::ScoreOrder;
use crate::model::seat::Seat;
use serde::Serialize;
use std::cmp::Reverse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub seat: Seat,
    pub score: i64,
}

/// Players ordered from best (rank 0) to worst.
///
/// Equal scores are ordered by ascending seat index, so the result is
/// always a permutation of `0..players`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankResult {
    standings: Vec<Standing>,
}

impl RankResult {
    pub fn from_scores(scores: &[i64], order: ScoreOrder) -> Self {
        let mut standings: Vec<Standing> = scores
            .iter()
            .enumerate()
            .map(|(index, &score)| Standing {
                seat: Seat::new(index),
                score,
            })
            .collect();
        match order {
            ScoreOrder::LowestWins => standings.sort_by_key(|s| (s.score, s.seat)),
            ScoreOrder::HighestWins => standings.sort_by_key(|s| (Reverse(s.score), s.seat)),
        }
        Self { standings }
    }

    pub fn standings(&self) -> &[Standing] {
        &self.standings
    }

    /// Seats from first place to last.
    pub fn order(&self) -> impl Iterator<Item = Seat> + '_ {
        self.standings.iter().map(|standing| standing.seat)
    }

    /// 0-based placement of `seat`, 0 being the winner.
    pub fn rank_of(&self, seat: Seat) -> Option<usize> {
        self.standings
            .iter()
            .position(|standing| standing.seat == seat)
    }

    pub fn winner(&self) -> Option<Seat> {
        self.standings.first().map(|standing| standing.seat)
    }

    pub fn len(&self) -> usize {
        self.standings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.standings.is_empty()
    }

    pub fn is_permutation(&self) -> bool {
        let mut seen = vec![false; self.standings.len()];
        for standing in &self.standings {
            match seen.get_mut(standing.seat.index()) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }
}
