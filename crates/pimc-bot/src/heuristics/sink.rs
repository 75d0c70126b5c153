use super::HeuristicSample;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{Level, event};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryError {
    #[error("sink is closed")]
    Closed,
    #[error("sample rejected: {0}")]
    Rejected(String),
}

/// Receives one sample per recorded decision. Failures stay inside the
/// recorder; they never reach the decision path.
pub trait TelemetrySink: Send + Sync {
    fn add_info(&self, sample: &HeuristicSample) -> Result<(), TelemetryError>;

    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Emits every sample as a structured `pimc_bot::heuristics` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn add_info(&self, sample: &HeuristicSample) -> Result<(), TelemetryError> {
        if !sample.is_finite() {
            return Err(TelemetryError::Rejected(format!(
                "non-finite statistics for {}",
                sample.seat
            )));
        }
        if tracing::enabled!(target: "pimc_bot::heuristics", Level::INFO) {
            event!(
                target: "pimc_bot::heuristics",
                Level::INFO,
                seat = sample.seat.index(),
                decision = sample.decision,
                variance = sample.variance,
                average = sample.average,
                leader_utility = sample.leader_utility,
            );
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}

/// Keeps the most recent samples in memory.
#[derive(Debug)]
pub struct MemorySink {
    retention: usize,
    samples: RwLock<Vec<HeuristicSample>>,
}

impl MemorySink {
    pub fn new(retention: usize) -> Self {
        Self {
            retention: retention.max(1),
            samples: RwLock::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> Vec<HeuristicSample> {
        self.samples.read().clone()
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    pub fn clear(&self) {
        self.samples.write().clear();
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl TelemetrySink for MemorySink {
    fn add_info(&self, sample: &HeuristicSample) -> Result<(), TelemetryError> {
        let mut samples = self.samples.write();
        samples.push(sample.clone());
        if samples.len() > self.retention {
            let overflow = samples.len() - self.retention;
            samples.drain(0..overflow);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn add_info(&self, _sample: &HeuristicSample) -> Result<(), TelemetryError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::{MemorySink, TelemetrySink, TracingSink};
    use crate::heuristics::HeuristicSample;
    use pimc_core::model::seat::Seat;

    fn sample(decision: u64) -> HeuristicSample {
        HeuristicSample {
            seat: Seat::new(0),
            decision,
            variance: 0.5,
            average: 0.0,
            leader_utility: 0.25,
        }
    }

    #[test]
    fn memory_sink_enforces_retention() {
        let sink = MemorySink::new(2);
        for decision in 0..5 {
            sink.add_info(&sample(decision)).unwrap();
        }
        let kept: Vec<u64> = sink.snapshot().iter().map(|s| s.decision).collect();
        assert_eq!(kept, vec![3, 4]);
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn tracing_sink_rejects_nan() {
        let mut bad = sample(1);
        bad.variance = f64::NAN;
        assert!(TracingSink.add_info(&bad).is_err());
        assert!(TracingSink.add_info(&sample(2)).is_ok());
    }
}
