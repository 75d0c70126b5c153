//! Small games implementing [`crate::tree::GameWorld`].
//!
//! `trick` is a trick-taking card game with hidden hands; `coin` is a fair
//! chance game with no hidden information, used to check that the search
//! stays unbiased.

pub mod coin;
pub mod trick;

pub use coin::{CoinError, CoinGame, CoinMutation};
pub use trick::{PlayError, TrickConfig, TrickGame, TrickMutation, TrickPhase};
