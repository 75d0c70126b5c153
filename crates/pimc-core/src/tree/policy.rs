use super::action::ActionCollection;
use rand::RngCore;
use std::sync::Arc;

/// Behavior installed on a seat so the cursor can resolve that seat's
/// decisions on its own, as during a rollout.
pub trait SeatPolicy<M>: Send + Sync {
    /// Index into `options` of the chosen action.
    fn choose(&self, options: &[ActionCollection<M>], rng: &mut dyn RngCore) -> usize;

    fn name(&self) -> &'static str {
        "policy"
    }
}

pub type SharedPolicy<M> = Arc<dyn SeatPolicy<M>>;
