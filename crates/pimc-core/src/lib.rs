#![deny(warnings)]
pub mod context;
pub mod determinize;
pub mod error;
pub mod games;
pub mod model;
pub mod tree;

pub use error::{EngineError, EngineResult};
