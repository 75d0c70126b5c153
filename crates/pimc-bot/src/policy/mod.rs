mod random;

pub use random::{RandomAgent, RandomPolicy};
