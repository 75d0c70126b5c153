//! Decision heuristics: how decisive the search was and how good the best
//! option looked, on a win-rate scale centered on a fair share.

mod sink;

pub use sink::{MemorySink, NullSink, TelemetryError, TelemetrySink, TracingSink};

use crate::search::min_max_idx;
use pimc_core::model::seat::Seat;
use pimc_core::{EngineError, EngineResult};
use serde::Serialize;

/// Statistics of one decision's utility vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeuristicSample {
    pub seat: Seat,
    pub decision: u64,
    /// Spread between the best and the worst option.
    pub variance: f64,
    pub average: f64,
    /// Rescaled utility of the best option.
    pub leader_utility: f64,
}

impl HeuristicSample {
    pub fn is_finite(&self) -> bool {
        self.variance.is_finite() && self.average.is_finite() && self.leader_utility.is_finite()
    }
}

/// Maps utilities onto `[-1/(P-1), 1]`, where a fair share of `1/P` lands
/// on zero.
pub fn win_rate_scale(utilities: &[f64], players: usize) -> EngineResult<Vec<f64>> {
    if players <= 1 {
        return Err(EngineError::contract(format!(
            "heuristics need at least two players, got {players}"
        )));
    }
    if utilities.is_empty() {
        return Err(EngineError::contract("empty utility vector"));
    }
    let p = players as f64;
    Ok(utilities
        .iter()
        .map(|u| u * p / (p - 1.0) - 1.0 / (p - 1.0))
        .collect())
}

/// Agent-owned recorder; keeps the append-only history of leader utilities.
#[derive(Debug, Clone)]
pub struct HeuristicsRecorder {
    seat: Seat,
    lead_history: Vec<f64>,
}

impl HeuristicsRecorder {
    pub fn new(seat: Seat) -> Self {
        Self {
            seat,
            lead_history: Vec::new(),
        }
    }

    /// Computes the sample for `utilities`, hands it to `sink` and appends
    /// the leader utility to the history. Sink failures are logged only.
    pub fn record(
        &mut self,
        utilities: &[f64],
        players: usize,
        decision: u64,
        sink: &dyn TelemetrySink,
    ) -> EngineResult<HeuristicSample> {
        let wrs = win_rate_scale(utilities, players)?;
        let (min_idx, max_idx) =
            min_max_idx(utilities).ok_or_else(|| EngineError::contract("empty utility vector"))?;
        let sample = HeuristicSample {
            seat: self.seat,
            decision,
            variance: (wrs[max_idx] - wrs[min_idx]).abs(),
            average: wrs.iter().sum::<f64>() / wrs.len() as f64,
            leader_utility: wrs[max_idx],
        };

        if let Err(err) = sink.add_info(&sample) {
            let err = EngineError::telemetry(err.to_string());
            tracing::warn!(
                target: "pimc_bot::heuristics",
                sink = sink.name(),
                seat = %self.seat,
                error = %err,
                "dropping heuristic sample"
            );
        }
        self.lead_history.push(sample.leader_utility);
        Ok(sample)
    }

    pub fn lead_history(&self) -> &[f64] {
        &self.lead_history
    }

    pub fn seat(&self) -> Seat {
        self.seat
    }
}
