use crate::model::seat::Seat;
use crate::tree::{ActionCollection, ActionKind, GameWorld, NodeKind, ScoreAggregator, ScoreOrder};
use rand::{Rng, RngCore};
use thiserror::Error;

/// Fair chance game: each round the seat to act makes a call that has no
/// influence on the outcome, then a coin flip awards the round's point to a
/// uniformly random player. Highest total wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinGame {
    players: usize,
    options: usize,
    rounds: usize,
    round: usize,
    points: Vec<u32>,
    calls: Vec<usize>,
    flip_pending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinMutation {
    Call { seat: Seat, option: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoinError {
    #[error("game is over")]
    GameOver,
    #[error("a coin flip is pending")]
    FlipPending,
    #[error("no coin flip is pending")]
    NoFlipPending,
    #[error("{actual} called out of turn, expected {expected}")]
    OutOfTurn { expected: Seat, actual: Seat },
    #[error("option {option} is not one of {available}")]
    UnknownOption { option: usize, available: usize },
}

impl CoinGame {
    pub fn new(players: usize, options: usize, rounds: usize) -> Self {
        let players = players.clamp(1, Seat::MAX_PLAYERS);
        Self {
            players,
            options: options.max(1),
            rounds,
            round: 0,
            points: vec![0; players],
            calls: Vec::with_capacity(rounds),
            flip_pending: false,
        }
    }

    pub fn round(&self) -> usize {
        self.round
    }

    pub fn points(&self) -> &[u32] {
        &self.points
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> &[usize] {
        &self.calls
    }

    fn seat_to_act(&self) -> Seat {
        Seat::new(self.round % self.players)
    }
}

impl ScoreAggregator for CoinGame {
    fn final_scores(&self) -> Vec<i64> {
        self.points.iter().map(|&points| i64::from(points)).collect()
    }

    fn score_order(&self) -> ScoreOrder {
        ScoreOrder::HighestWins
    }
}

impl GameWorld for CoinGame {
    type Mutation = CoinMutation;
    type Error = CoinError;

    fn num_players(&self) -> usize {
        self.players
    }

    fn node(&self) -> NodeKind {
        if self.round >= self.rounds {
            NodeKind::Terminal
        } else if self.flip_pending {
            NodeKind::Automatic
        } else {
            NodeKind::Decision(self.seat_to_act())
        }
    }

    fn legal_actions(&self) -> Vec<ActionCollection<CoinMutation>> {
        let NodeKind::Decision(seat) = self.node() else {
            return Vec::new();
        };
        (0..self.options)
            .map(|option| ActionCollection::single(ActionKind::Call, CoinMutation::Call { seat, option }))
            .collect()
    }

    fn apply(&mut self, mutation: &CoinMutation) -> Result<(), CoinError> {
        let CoinMutation::Call { seat, option } = *mutation;
        match self.node() {
            NodeKind::Terminal => return Err(CoinError::GameOver),
            NodeKind::Automatic => return Err(CoinError::FlipPending),
            NodeKind::Decision(expected) if expected != seat => {
                return Err(CoinError::OutOfTurn {
                    expected,
                    actual: seat,
                });
            }
            NodeKind::Decision(_) => {}
        }
        if option >= self.options {
            return Err(CoinError::UnknownOption {
                option,
                available: self.options,
            });
        }
        self.calls.push(option);
        self.flip_pending = true;
        Ok(())
    }

    fn resolve_automatic(&mut self, rng: &mut dyn RngCore) -> Result<(), CoinError> {
        if !self.flip_pending {
            return Err(CoinError::NoFlipPending);
        }
        let winner = rng.gen_range(0..self.players);
        self.points[winner] += 1;
        self.flip_pending = false;
        self.round += 1;
        Ok(())
    }

    fn determinize(&self, _seat: Seat, _rng: &mut dyn RngCore) -> Self {
        self.clone()
    }

    fn tree_location(&self) -> String {
        format!("round {}/{}", self.round + 1, self.rounds)
    }
}

#[cfg(test)]
mod tests {
    use super::{CoinError, CoinGame, CoinMutation};
    use crate::model::seat::Seat;
    use crate::tree::{GameWorld, NodeKind, ScoreAggregator};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn call(seat: usize, option: usize) -> CoinMutation {
        CoinMutation::Call {
            seat: Seat::new(seat),
            option,
        }
    }

    #[test]
    fn seats_take_turns_between_flips() {
        let mut game = CoinGame::new(2, 2, 2);
        let mut rng = SmallRng::seed_from_u64(5);
        assert_eq!(game.node(), NodeKind::Decision(Seat::new(0)));
        game.apply(&call(0, 1)).unwrap();
        assert_eq!(game.node(), NodeKind::Automatic);
        assert_eq!(game.apply(&call(0, 0)), Err(CoinError::FlipPending));
        game.resolve_automatic(&mut rng).unwrap();
        assert_eq!(game.node(), NodeKind::Decision(Seat::new(1)));
        assert!(matches!(
            game.apply(&call(0, 0)),
            Err(CoinError::OutOfTurn { .. })
        ));
        game.apply(&call(1, 0)).unwrap();
        game.resolve_automatic(&mut rng).unwrap();
        assert_eq!(game.node(), NodeKind::Terminal);
        assert_eq!(game.points().iter().sum::<u32>(), 2);
        assert_eq!(game.final_scores().len(), 2);
        assert_eq!(game.calls(), &[1, 0]);
        assert_eq!(game.apply(&call(0, 0)), Err(CoinError::GameOver));
    }

    #[test]
    fn rejects_unknown_option_and_stray_flip() {
        let mut game = CoinGame::new(2, 2, 1);
        let mut rng = SmallRng::seed_from_u64(5);
        assert!(matches!(
            game.apply(&call(0, 2)),
            Err(CoinError::UnknownOption { option: 2, available: 2 })
        ));
        assert_eq!(game.resolve_automatic(&mut rng), Err(CoinError::NoFlipPending));
        assert!(game.legal_actions().len() == 2);
    }

    #[test]
    fn flips_are_roughly_fair() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut wins = [0u32; 2];
        for _ in 0..4000 {
            let mut game = CoinGame::new(2, 1, 1);
            game.apply(&call(0, 0)).unwrap();
            game.resolve_automatic(&mut rng).unwrap();
            if game.points()[0] == 1 {
                wins[0] += 1;
            } else {
                wins[1] += 1;
            }
        }
        let share = f64::from(wins[0]) / 4000.0;
        assert!((share - 0.5).abs() < 0.05, "share {share}");
    }
}
