use crate::agent::Agent;
use pimc_core::model::seat::Seat;
use pimc_core::tree::{ActionCollection, GameIterator, GameWorld, SeatPolicy};
use pimc_core::{EngineError, EngineResult};
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use serde_json::Value;

/// Uniform choice among the legal options; the rollout policy for every seat.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPolicy;

impl<M> SeatPolicy<M> for RandomPolicy {
    fn choose(&self, options: &[ActionCollection<M>], rng: &mut dyn RngCore) -> usize {
        if options.is_empty() {
            return 0;
        }
        rng.gen_range(0..options.len())
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Seat that plays uniformly at random in the real game.
#[derive(Debug, Clone)]
pub struct RandomAgent {
    seat: Seat,
    rng: SmallRng,
}

impl RandomAgent {
    pub fn new(seat: Seat, seed: u64) -> Self {
        Self {
            seat,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn choose(&mut self, num_choices: usize) -> EngineResult<usize> {
        if num_choices == 0 {
            return Err(EngineError::contract("nothing to choose from"));
        }
        Ok(self.rng.gen_range(0..num_choices))
    }

    /// Picks an index into a JSON option list: either a bare array or an
    /// object carrying an `items` array.
    pub fn choose_from_json(&mut self, options: &Value) -> EngineResult<usize> {
        let items = match options {
            Value::Array(items) => items,
            Value::Object(map) => map
                .get("items")
                .and_then(Value::as_array)
                .ok_or_else(|| EngineError::contract("option object has no 'items' array"))?,
            other => {
                return Err(EngineError::contract(format!(
                    "expected an option list, got {other}"
                )));
            }
        };
        self.choose(items.len())
    }
}

impl<W: GameWorld> Agent<W> for RandomAgent {
    fn seat(&self) -> Seat {
        self.seat
    }

    fn name(&self) -> &str {
        "random"
    }

    fn make_action(&mut self, _cursor: &GameIterator<W>, num_choices: usize) -> EngineResult<usize> {
        self.choose(num_choices)
    }
}
