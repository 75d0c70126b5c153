use super::config::SearchConfig;
use super::rollout::run_rollout;
use super::utility::UtilityVector;
use crate::policy::RandomPolicy;
use pimc_core::model::seat::Seat;
use pimc_core::tree::{GameIterator, GameWorld, Perspective, SharedPolicy};
use pimc_core::{EngineError, EngineResult};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Level, event};

/// Result of one decision.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub choice: usize,
    pub utilities: UtilityVector,
    pub rollouts_planned: usize,
    pub rollouts_abandoned: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SearchOutcome {
    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }
}

/// Perfect-information Monte Carlo: determinize once per decision, then
/// score every candidate by the placements it reaches under random play.
#[derive(Debug, Clone, Default)]
pub struct MonteCarloEngine {
    config: SearchConfig,
}

impl MonteCarloEngine {
    pub fn new(config: SearchConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Chooses among the `num_choices` options `seat` has at `cursor`.
    ///
    /// The true world behind `cursor` is only read. `decision_seed` drives
    /// both the determinization and every rollout.
    pub fn evaluate<W: GameWorld>(
        &self,
        cursor: &GameIterator<W>,
        seat: Seat,
        num_choices: usize,
        decision_seed: u64,
    ) -> EngineResult<SearchOutcome> {
        if num_choices == 0 {
            return Err(EngineError::contract("a decision needs at least one choice"));
        }
        let started = Instant::now();
        let deadline = self.config.time_budget.map(|budget| started + budget);

        let mut rng = SmallRng::seed_from_u64(decision_seed);
        let root = Perspective::new(cursor, seat)
            .resolve(&mut rng)?
            .with_max_steps(self.config.max_steps);
        if root.current_seat() != Some(seat) {
            return Err(EngineError::contract(format!(
                "{seat} is not the seat to act ({:?})",
                root.state()
            )));
        }
        let available = root.build_options()?.len();
        if available != num_choices {
            return Err(EngineError::contract(format!(
                "asked to choose among {num_choices} options but {seat} has {available}"
            )));
        }

        let policy: SharedPolicy<W::Mutation> = Arc::new(RandomPolicy);
        let rollouts = self.config.rollouts;
        let evaluate_action = |action: usize| -> EngineResult<Vec<Option<usize>>> {
            (0..rollouts)
                .into_par_iter()
                .map(|rollout| {
                    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        return Ok(None);
                    }
                    let seed = rollout_seed(decision_seed, action, rollout);
                    run_rollout(&root, action, seat, &policy, seed).map(Some)
                })
                .collect()
        };

        let placements: Vec<Vec<Option<usize>>> = if self.config.parallel_actions {
            (0..num_choices)
                .into_par_iter()
                .map(evaluate_action)
                .collect::<EngineResult<_>>()?
        } else {
            (0..num_choices)
                .map(evaluate_action)
                .collect::<EngineResult<_>>()?
        };

        let mut utilities = UtilityVector::zeros(num_choices);
        for (action, batch) in placements.iter().enumerate() {
            utilities.accumulate(action, batch, rollouts);
        }
        let choice = utilities.argmax().unwrap_or(0);
        let completed: usize = utilities.completed().iter().sum();
        let outcome = SearchOutcome {
            choice,
            rollouts_planned: rollouts * num_choices,
            rollouts_abandoned: rollouts * num_choices - completed,
            utilities,
            elapsed: started.elapsed(),
        };
        log_decision(seat, &root, &outcome);
        Ok(outcome)
    }
}

/// Independent stream per (decision, action, rollout).
fn rollout_seed(decision_seed: u64, action: usize, rollout: usize) -> u64 {
    let mut z = decision_seed
        ^ (action as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (rollout as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn log_decision<W: GameWorld>(seat: Seat, root: &GameIterator<W>, outcome: &SearchOutcome) {
    if outcome.rollouts_abandoned > 0 {
        tracing::debug!(
            target: "pimc_bot::decision",
            seat = %seat,
            abandoned = outcome.rollouts_abandoned,
            planned = outcome.rollouts_planned,
            "time budget cut the search short"
        );
    }
    if !tracing::enabled!(Level::INFO) {
        return;
    }
    let utilities = outcome
        .utilities
        .values()
        .iter()
        .map(|value| format!("{value:.3}"))
        .collect::<Vec<_>>()
        .join(",");
    event!(
        target: "pimc_bot::decision",
        Level::INFO,
        seat = %seat,
        location = %root.world().tree_location(),
        num_choices = outcome.utilities.len(),
        chosen = outcome.choice,
        utilities = %utilities,
        rollouts = outcome.rollouts_planned,
        abandoned = outcome.rollouts_abandoned,
        elapsed_ms = outcome.elapsed_ms() as u64,
    );
}

#[cfg(test)]
mod tests {
    use super::{MonteCarloEngine, rollout_seed};
    use crate::search::SearchConfig;
    use pimc_core::games::{CoinGame, TrickConfig, TrickGame};
    use pimc_core::model::seat::Seat;
    use pimc_core::tree::GameIterator;
    use std::time::Duration;

    fn dealt(seed: u64) -> GameIterator<TrickGame> {
        let world = TrickGame::new(TrickConfig {
            players: 3,
            hand_size: 4,
        })
        .unwrap();
        let mut cursor = GameIterator::new(world, seed);
        cursor.advance_to_choice().unwrap();
        cursor
    }

    #[test]
    fn chooses_a_valid_index_with_bounded_utilities() {
        let engine = MonteCarloEngine::new(SearchConfig::default().with_rollouts(8)).unwrap();
        for seed in 0..5 {
            let cursor = dealt(seed);
            let seat = cursor.current_seat().unwrap();
            let choices = cursor.build_options().unwrap().len();
            let snapshot = cursor.world().clone();
            let outcome = engine.evaluate(&cursor, seat, choices, seed).unwrap();
            assert!(outcome.choice < choices);
            assert_eq!(outcome.utilities.len(), choices);
            assert!(outcome.utilities.values().iter().all(|u| (0.0..=1.0).contains(u)));
            assert!(outcome.utilities.values().iter().all(|u| *u >= 1.0 / 3.0 - 1e-9));
            assert_eq!(outcome.rollouts_abandoned, 0);
            assert_eq!(cursor.world(), &snapshot);
        }
    }

    #[test]
    fn rejects_zero_and_mismatched_choice_counts() {
        let engine = MonteCarloEngine::default();
        let cursor = dealt(3);
        let seat = cursor.current_seat().unwrap();
        let choices = cursor.build_options().unwrap().len();
        assert!(engine.evaluate(&cursor, seat, 0, 1).unwrap_err().is_contract_violation());
        assert!(
            engine
                .evaluate(&cursor, seat, choices + 1, 1)
                .unwrap_err()
                .is_contract_violation()
        );
        let other = seat.next(3);
        assert!(engine.evaluate(&cursor, other, choices, 1).unwrap_err().is_contract_violation());
    }

    #[test]
    fn same_seed_gives_same_outcome() {
        let cursor = dealt(11);
        let seat = cursor.current_seat().unwrap();
        let choices = cursor.build_options().unwrap().len();
        let sequential = MonteCarloEngine::new(SearchConfig::default().with_rollouts(16)).unwrap();
        let parallel =
            MonteCarloEngine::new(SearchConfig::default().with_rollouts(16).with_parallel_actions(true))
                .unwrap();
        let first = sequential.evaluate(&cursor, seat, choices, 77).unwrap();
        let second = sequential.evaluate(&cursor, seat, choices, 77).unwrap();
        let third = parallel.evaluate(&cursor, seat, choices, 77).unwrap();
        assert_eq!(first.utilities, second.utilities);
        assert_eq!(first.utilities, third.utilities);
        assert_eq!(first.choice, third.choice);
    }

    #[test]
    fn exhausted_budget_abandons_rollouts_without_failing() {
        let engine = MonteCarloEngine::new(
            SearchConfig::default()
                .with_rollouts(4)
                .with_time_budget(Duration::ZERO),
        )
        .unwrap();
        let cursor = GameIterator::new(CoinGame::new(2, 3, 4), 0);
        let outcome = engine.evaluate(&cursor, Seat::new(0), 3, 5).unwrap();
        assert_eq!(outcome.choice, 0);
        assert_eq!(outcome.utilities.values(), &[0.0, 0.0, 0.0]);
        assert_eq!(outcome.rollouts_abandoned, 12);
    }

    #[test]
    fn stuck_rollouts_abort_the_decision() {
        let engine =
            MonteCarloEngine::new(SearchConfig::default().with_rollouts(2).with_max_steps(3)).unwrap();
        let cursor = GameIterator::new(CoinGame::new(2, 2, 40), 0);
        let err = engine.evaluate(&cursor, Seat::new(0), 2, 1).unwrap_err();
        assert!(err.is_simulation_failure());
    }

    #[test]
    fn rollout_seeds_differ_per_action_and_rollout() {
        assert_ne!(rollout_seed(1, 0, 1), rollout_seed(1, 1, 0));
        assert_ne!(rollout_seed(1, 0, 0), rollout_seed(2, 0, 0));
        assert_eq!(rollout_seed(9, 3, 4), rollout_seed(9, 3, 4));
    }
}
