//! Abstract decision-tree primitives consumed by the search engine.
//!
//! - `world`: the [`GameWorld`] contract a game implements, including scoring.
//! - `action`: [`ActionCollection`], the atomic unit of a legal choice.
//! - `iterator`: [`GameIterator`], the cursor that drives a world node by node.
//! - `rank`: [`RankResult`], the placement order derived from final scores.
//! - `perspective`: [`Perspective`], determinized views for one seat.
//! - `policy`: [`SeatPolicy`], pluggable per-seat behavior used inside the cursor.

mod action;
mod iterator;
mod perspective;
mod policy;
mod rank;
mod world;

pub use action::{ActionCollection, ActionKind};
pub use iterator::{CursorState, GameIterator};
pub use perspective::Perspective;
pub use policy::{SeatPolicy, SharedPolicy};
pub use rank::{RankResult, Standing};
pub use world::{GameWorld, NodeKind, ScoreAggregator, ScoreOrder, stage_on_clone};
