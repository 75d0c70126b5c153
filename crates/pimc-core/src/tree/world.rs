use super::action::ActionCollection;
use crate::model::seat::Seat;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the world expects to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A player must pick one of the legal actions.
    Decision(Seat),
    /// A chance event or forced continuation the world resolves itself.
    Automatic,
    Terminal,
}

/// Direction in which final scores are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrder {
    #[default]
    LowestWins,
    HighestWins,
}

/// Produces one comparable score per player from a terminal world.
///
/// Only the order induced by the scores matters to the engine; magnitudes
/// are never compared across games.
pub trait ScoreAggregator {
    fn final_scores(&self) -> Vec<i64>;

    fn score_order(&self) -> ScoreOrder {
        ScoreOrder::LowestWins
    }
}

/// Applies `mutations` to a scratch copy of `world` and reports the first
/// failure.
pub fn stage_on_clone<W: GameWorld>(world: &W, mutations: &[W::Mutation]) -> Result<(), W::Error> {
    let mut staged = world.clone();
    mutations.iter().try_for_each(|mutation| staged.apply(mutation))
}

/// Full, fully observable state of one game instance.
///
/// `Clone` must be deep: a clone shares no mutable storage with its source.
pub trait GameWorld: ScoreAggregator + Clone + Send + Sync + 'static {
    /// Primitive mutation applied by [`ActionCollection::execute_all`].
    type Mutation: Clone + fmt::Debug + Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    fn num_players(&self) -> usize;

    fn node(&self) -> NodeKind;

    /// Ordered legal actions for the seat to act. Indices into this list are
    /// the action-id space used by agents.
    fn legal_actions(&self) -> Vec<ActionCollection<Self::Mutation>>;

    fn apply(&mut self, mutation: &Self::Mutation) -> Result<(), Self::Error>;

    /// Checks that `mutations` would apply cleanly, in order, without
    /// changing `self`. A group accepted here must not fail in [`apply`].
    ///
    /// The default stages the group on a clone; worlds with cheap legality
    /// checks should override it.
    ///
    /// [`apply`]: GameWorld::apply
    fn check_mutations(&self, mutations: &[Self::Mutation]) -> Result<(), Self::Error> {
        stage_on_clone(self, mutations)
    }

    /// Resolves the pending [`NodeKind::Automatic`] node.
    fn resolve_automatic(&mut self, rng: &mut dyn RngCore) -> Result<(), Self::Error>;

    /// A copy in which everything hidden from `seat` is re-randomized while
    /// public knowledge (hand sizes, revealed cards, voids) is preserved.
    fn determinize(&self, seat: Seat, rng: &mut dyn RngCore) -> Self;

    /// Coarse description of the current position, used by analytics.
    fn tree_location(&self) -> String {
        format!("{:?}", self.node())
    }
}
