//! Determinized Monte Carlo search over rank-based utilities.

mod config;
mod engine;
mod rollout;
mod utility;

pub use config::SearchConfig;
pub use engine::{MonteCarloEngine, SearchOutcome};
pub use rollout::run_rollout;
pub use utility::{UtilityVector, min_max_idx};
