pub mod agent;
pub mod heuristics;
pub mod policy;
pub mod search;

pub use agent::{Agent, PimcAgent};
pub use heuristics::{
    HeuristicSample, HeuristicsRecorder, MemorySink, NullSink, TelemetryError, TelemetrySink,
    TracingSink,
};
pub use policy::{RandomAgent, RandomPolicy};
pub use search::{MonteCarloEngine, SearchConfig, SearchOutcome, UtilityVector, min_max_idx};
