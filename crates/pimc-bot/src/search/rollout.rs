use pimc_core::model::seat::Seat;
use pimc_core::tree::{GameIterator, GameWorld, SharedPolicy};
use pimc_core::{EngineError, EngineResult};

/// Plays `action` on a private copy of `root`, hands every seat to
/// `policy`, and drives the copy to the end of the game.
///
/// Returns the 0-based placement of `deciding`.
pub fn run_rollout<W: GameWorld>(
    root: &GameIterator<W>,
    action: usize,
    deciding: Seat,
    policy: &SharedPolicy<W::Mutation>,
    seed: u64,
) -> EngineResult<usize> {
    let mut cursor = root.clone();
    cursor.reseed(seed);

    let options = cursor.build_options()?;
    let chosen = options.get(action).ok_or_else(|| {
        EngineError::contract(format!("action {action} of {} does not exist", options.len()))
    })?;
    cursor.execute_all(chosen)?;
    cursor.pop_current_node()?;

    cursor.set_all_policies(policy.clone());
    while !cursor.advance_to_choice()? {
        cursor.process_choice()?;
    }

    let ranks = cursor.process_score()?;
    tracing::trace!(
        target: "pimc_bot::rollout",
        action,
        steps = cursor.steps(),
        winner = ?ranks.winner(),
        "rollout finished"
    );
    ranks.rank_of(deciding).ok_or_else(|| {
        EngineError::simulation(format!("{deciding} missing from the final ranking"))
    })
}
