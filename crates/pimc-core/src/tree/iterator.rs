use super::action::ActionCollection;
use super::policy::SharedPolicy;
use super::rank::RankResult;
use super::world::{GameWorld, NodeKind};
use crate::error::{EngineError, EngineResult};
use crate::model::seat::Seat;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::fmt;

/// Where the cursor currently stands in the decision tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    AwaitingChoice(Seat),
    Resolving,
    Terminal,
}

/// Cursor over the decision tree of one owned world.
///
/// The usual cycle at a decision is `build_options` → `execute_all` →
/// `pop_current_node`. Chance events and seats with an installed policy are
/// resolved through `process_choice`; `advance_to_choice` drives automatic
/// nodes until a decision point or the end of the game.
#[derive(Clone)]
pub struct GameIterator<W: GameWorld> {
    world: W,
    state: CursorState,
    committed: bool,
    policies: Vec<Option<SharedPolicy<W::Mutation>>>,
    rng: SmallRng,
    steps: usize,
    max_steps: usize,
}

impl<W: GameWorld> GameIterator<W> {
    pub const DEFAULT_MAX_STEPS: usize = 100_000;

    pub fn new(world: W, seed: u64) -> Self {
        let players = world.num_players();
        let state = state_of(&world);
        Self {
            world,
            state,
            committed: false,
            policies: vec![None; players],
            rng: SmallRng::seed_from_u64(seed),
            steps: 0,
            max_steps: Self::DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// A cursor over `world` carrying this cursor's policies and limits.
    pub fn fork(&self, world: W, seed: u64) -> Self {
        let state = state_of(&world);
        Self {
            world,
            state,
            committed: false,
            policies: self.policies.clone(),
            rng: SmallRng::seed_from_u64(seed),
            steps: 0,
            max_steps: self.max_steps,
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn into_world(self) -> W {
        self.world
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn num_players(&self) -> usize {
        self.world.num_players()
    }

    pub fn current_seat(&self) -> Option<Seat> {
        match self.state {
            CursorState::AwaitingChoice(seat) if !self.committed => Some(seat),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, CursorState::Terminal)
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn set_policy(&mut self, seat: Seat, policy: SharedPolicy<W::Mutation>) -> EngineResult<()> {
        let slot = self.policies.get_mut(seat.index()).ok_or_else(|| {
            EngineError::contract(format!(
                "{seat} is out of range for a {}-player game",
                self.world.num_players()
            ))
        })?;
        *slot = Some(policy);
        Ok(())
    }

    pub fn set_all_policies(&mut self, policy: SharedPolicy<W::Mutation>) {
        for slot in &mut self.policies {
            *slot = Some(policy.clone());
        }
    }

    pub fn clear_policies(&mut self) {
        for slot in &mut self.policies {
            *slot = None;
        }
    }

    /// Legal actions at the pending decision; empty once the game is over.
    pub fn build_options(&self) -> EngineResult<Vec<ActionCollection<W::Mutation>>> {
        if self.committed {
            return Err(EngineError::contract(
                "current node is already resolved; pop it before building options",
            ));
        }
        match self.state {
            CursorState::Terminal => Ok(Vec::new()),
            CursorState::Resolving => Err(EngineError::contract(
                "options requested while an automatic node is pending",
            )),
            CursorState::AwaitingChoice(seat) => {
                let options = self.world.legal_actions();
                if options.is_empty() {
                    return Err(EngineError::simulation(format!(
                        "decision for {seat} at {} has no legal actions",
                        self.world.tree_location()
                    )));
                }
                Ok(options)
            }
        }
    }

    /// Applies `action` to the bound world and marks the node resolved.
    pub fn execute_all(&mut self, action: &ActionCollection<W::Mutation>) -> EngineResult<()> {
        if self.committed {
            return Err(EngineError::contract(
                "an action was already executed at this node",
            ));
        }
        let CursorState::AwaitingChoice(seat) = self.state else {
            return Err(EngineError::contract(format!(
                "execute_all requires a pending decision, cursor is {:?}",
                self.state
            )));
        };
        self.bump_step()?;
        action.execute_all(&mut self.world).map_err(|err| {
            EngineError::simulation(format!("action for {seat} rejected: {err}"))
        })?;
        self.committed = true;
        self.state = CursorState::Resolving;
        Ok(())
    }

    /// Discards the resolved node and exposes the next one.
    pub fn pop_current_node(&mut self) -> EngineResult<()> {
        if !self.committed {
            return Err(EngineError::contract("no resolved node to pop"));
        }
        self.committed = false;
        self.state = state_of(&self.world);
        Ok(())
    }

    /// Resolves automatic nodes until a decision is pending (`false`) or the
    /// game is over (`true`).
    pub fn advance_to_choice(&mut self) -> EngineResult<bool> {
        if self.committed {
            return Err(EngineError::contract(
                "pop the resolved node before advancing",
            ));
        }
        loop {
            match self.state {
                CursorState::Terminal => return Ok(true),
                CursorState::AwaitingChoice(_) => return Ok(false),
                CursorState::Resolving => self.process_choice()?,
            }
        }
    }

    /// Resolves exactly one pending node: a chance/forced node through the
    /// world, or a decision through the policy installed on that seat.
    pub fn process_choice(&mut self) -> EngineResult<()> {
        if self.committed {
            return Err(EngineError::contract(
                "pop the resolved node before processing the next one",
            ));
        }
        match self.state {
            CursorState::Terminal => Err(EngineError::contract(
                "process_choice called on a finished game",
            )),
            CursorState::Resolving => {
                self.bump_step()?;
                let location = self.world.tree_location();
                self.world
                    .resolve_automatic(&mut self.rng)
                    .map_err(|err| {
                        EngineError::simulation(format!(
                            "automatic node at {location} failed: {err}"
                        ))
                    })?;
                self.state = state_of(&self.world);
                Ok(())
            }
            CursorState::AwaitingChoice(seat) => {
                let policy = self
                    .policies
                    .get(seat.index())
                    .and_then(Option::clone)
                    .ok_or_else(|| {
                        EngineError::contract(format!(
                            "decision pending for {seat}, which has no installed policy"
                        ))
                    })?;
                let options = self.build_options()?;
                let index = policy.choose(&options, &mut self.rng);
                let action = options.get(index).ok_or_else(|| {
                    EngineError::contract(format!(
                        "policy '{}' chose option {index} of {}",
                        policy.name(),
                        options.len()
                    ))
                })?;
                self.execute_all(action)?;
                self.pop_current_node()
            }
        }
    }

    /// Final placement of every player; only valid once the game is over.
    pub fn process_score(&self) -> EngineResult<RankResult> {
        if !self.is_terminal() {
            return Err(EngineError::contract(format!(
                "scores requested before the game ended ({:?})",
                self.state
            )));
        }
        let scores = self.world.final_scores();
        if scores.len() != self.world.num_players() {
            return Err(EngineError::simulation(format!(
                "score aggregator returned {} scores for {} players",
                scores.len(),
                self.world.num_players()
            )));
        }
        Ok(RankResult::from_scores(&scores, self.world.score_order()))
    }

    fn bump_step(&mut self) -> EngineResult<()> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(EngineError::simulation(format!(
                "no terminal state after {} steps at {}",
                self.max_steps,
                self.world.tree_location()
            )));
        }
        Ok(())
    }
}

impl<W: GameWorld + fmt::Debug> fmt::Debug for GameIterator<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let installed: Vec<bool> = self.policies.iter().map(Option::is_some).collect();
        f.debug_struct("GameIterator")
            .field("world", &self.world)
            .field("state", &self.state)
            .field("committed", &self.committed)
            .field("policies", &installed)
            .field("steps", &self.steps)
            .field("max_steps", &self.max_steps)
            .finish()
    }
}

fn state_of<W: GameWorld>(world: &W) -> CursorState {
    match world.node() {
        NodeKind::Decision(seat) => CursorState::AwaitingChoice(seat),
        NodeKind::Automatic => CursorState::Resolving,
        NodeKind::Terminal => CursorState::Terminal,
    }
}

#[cfg(test)]
mod tests {
    use super::{CursorState, GameIterator};
    use crate::games::coin::CoinGame;
    use crate::model::seat::Seat;
    use crate::tree::{ActionCollection, SeatPolicy};
    use rand::RngCore;
    use std::sync::Arc;

    struct FirstOption;

    impl<M> SeatPolicy<M> for FirstOption {
        fn choose(&self, _options: &[ActionCollection<M>], _rng: &mut dyn RngCore) -> usize {
            0
        }
    }

    struct OutOfRange;

    impl<M> SeatPolicy<M> for OutOfRange {
        fn choose(&self, options: &[ActionCollection<M>], _rng: &mut dyn RngCore) -> usize {
            options.len()
        }
    }

    #[test]
    fn decision_cycle_moves_through_states() {
        let mut cursor = GameIterator::new(CoinGame::new(2, 2, 1), 7);
        assert_eq!(cursor.state(), CursorState::AwaitingChoice(Seat::new(0)));
        let options = cursor.build_options().unwrap();
        cursor.execute_all(&options[1]).unwrap();
        assert_eq!(cursor.state(), CursorState::Resolving);
        assert!(cursor.build_options().unwrap_err().is_contract_violation());
        assert!(cursor.execute_all(&options[0]).unwrap_err().is_contract_violation());
        cursor.pop_current_node().unwrap();
        assert_eq!(cursor.state(), CursorState::Resolving);
        assert!(cursor.advance_to_choice().unwrap());
        assert!(cursor.is_terminal());
        assert!(cursor.build_options().unwrap().is_empty());
        assert_eq!(cursor.process_score().unwrap().len(), 2);
    }

    #[test]
    fn pop_without_execution_is_rejected() {
        let mut cursor = GameIterator::new(CoinGame::new(2, 2, 1), 1);
        assert!(cursor.pop_current_node().unwrap_err().is_contract_violation());
    }

    #[test]
    fn process_choice_needs_an_installed_policy() {
        let mut cursor = GameIterator::new(CoinGame::new(2, 2, 3), 1);
        assert!(!cursor.advance_to_choice().unwrap());
        let err = cursor.process_choice().unwrap_err();
        assert!(err.is_contract_violation());

        cursor.set_all_policies(Arc::new(FirstOption));
        while !cursor.advance_to_choice().unwrap() {
            cursor.process_choice().unwrap();
        }
        assert!(cursor.process_choice().unwrap_err().is_contract_violation());
        let ranks = cursor.process_score().unwrap();
        assert!(ranks.is_permutation());
    }

    #[test]
    fn score_before_terminal_is_a_contract_violation() {
        let cursor = GameIterator::new(CoinGame::new(3, 2, 1), 1);
        assert!(cursor.process_score().unwrap_err().is_contract_violation());
    }

    #[test]
    fn step_limit_reports_simulation_failure() {
        let mut cursor = GameIterator::new(CoinGame::new(2, 2, 50), 3).with_max_steps(5);
        cursor.set_all_policies(Arc::new(FirstOption));
        let mut outcome = Ok(());
        while outcome.is_ok() {
            outcome = match cursor.advance_to_choice() {
                Ok(true) => break,
                Ok(false) => cursor.process_choice(),
                Err(err) => Err(err),
            };
        }
        assert!(outcome.unwrap_err().is_simulation_failure());
    }

    #[test]
    fn out_of_range_policy_choice_is_rejected() {
        let mut cursor = GameIterator::new(CoinGame::new(2, 2, 1), 1);
        cursor.set_all_policies(Arc::new(OutOfRange));
        assert!(cursor.process_choice().unwrap_err().is_contract_violation());
    }

    #[test]
    fn set_policy_rejects_unknown_seat() {
        let mut cursor = GameIterator::new(CoinGame::new(2, 2, 1), 1);
        assert!(
            cursor
                .set_policy(Seat::new(4), Arc::new(FirstOption))
                .unwrap_err()
                .is_contract_violation()
        );
    }
}
