//! Per-match analytics shared by every agent at the table.

use crate::model::seat::Seat;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// One real decision: how many options the seat had and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchingRecord {
    pub num_choices: usize,
    pub tree_location: String,
    pub time_step: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchingSummary {
    pub seat: Seat,
    pub decisions: usize,
    pub mean: f64,
    pub max: usize,
}

/// Branching factor observed at every real decision, per seat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchingFactor {
    records: BTreeMap<Seat, Vec<BranchingRecord>>,
}

impl BranchingFactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_count(
        &mut self,
        num_choices: usize,
        seat: Seat,
        tree_location: impl Into<String>,
        time_step: u64,
    ) {
        self.records.entry(seat).or_default().push(BranchingRecord {
            num_choices,
            tree_location: tree_location.into(),
            time_step,
        });
    }

    pub fn records_for(&self, seat: Seat) -> &[BranchingRecord] {
        self.records.get(&seat).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_decisions(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Mean and maximum branching factor per seat, in seat order.
    pub fn summary(&self) -> Vec<BranchingSummary> {
        self.records
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(seat, records)| {
                let total: usize = records.iter().map(|record| record.num_choices).sum();
                BranchingSummary {
                    seat: *seat,
                    decisions: records.len(),
                    mean: total as f64 / records.len() as f64,
                    max: records.iter().map(|record| record.num_choices).max().unwrap_or(0),
                }
            })
            .collect()
    }
}

impl fmt::Display for BranchingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (seat, records) in &self.records {
            writeln!(f, "Player {}", seat.index() + 1)?;
            for record in records {
                writeln!(
                    f,
                    "  step {:>4}: {:>2} choices at {}",
                    record.time_step, record.num_choices, record.tree_location
                )?;
            }
        }
        Ok(())
    }
}

/// Handle owning the analytics of one match. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct MatchContext {
    branching: RwLock<BranchingFactor>,
    steps: AtomicU64,
}

impl MatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a real decision and returns its time step. Steps are taken
    /// under the table lock so every seat's records stay in step order.
    pub fn record_decision(&self, num_choices: usize, seat: Seat, tree_location: impl Into<String>) -> u64 {
        let mut branching = self.branching.write();
        let step = self.steps.fetch_add(1, Ordering::Relaxed) + 1;
        branching.add_count(num_choices, seat, tree_location, step);
        step
    }

    pub fn time_step(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    pub fn branching(&self) -> BranchingFactor {
        self.branching.read().clone()
    }

    pub fn summary(&self) -> Vec<BranchingSummary> {
        self.branching.read().summary()
    }

    pub fn reset(&self) {
        let mut branching = self.branching.write();
        branching.clear();
        self.steps.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::{BranchingFactor, MatchContext};
    use crate::model::seat::Seat;
    use std::sync::Arc;

    #[test]
    fn summary_reports_mean_and_max_per_seat() {
        let mut table = BranchingFactor::new();
        table.add_count(4, Seat::new(1), "trick 1", 1);
        table.add_count(2, Seat::new(1), "trick 2", 5);
        table.add_count(3, Seat::new(0), "trick 1", 2);
        let summary = table.summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].seat, Seat::new(0));
        assert_eq!(summary[1].decisions, 2);
        assert!((summary[1].mean - 3.0).abs() < f64::EPSILON);
        assert_eq!(summary[1].max, 4);
        assert_eq!(table.total_decisions(), 3);
        assert!(table.records_for(Seat::new(3)).is_empty());
    }

    #[test]
    fn display_lists_each_player() {
        let mut table = BranchingFactor::new();
        table.add_count(2, Seat::new(0), "round 1/1", 1);
        table.add_count(3, Seat::new(2), "round 1/1", 2);
        let rendered = table.to_string();
        assert!(rendered.starts_with("Player 1\n"));
        assert!(rendered.contains("Player 3\n"));
        assert!(!rendered.contains("Player 0"));
        assert!(rendered.contains("2 choices at round 1/1"));
    }

    #[test]
    fn context_counts_steps_across_threads_and_resets() {
        let context = Arc::new(MatchContext::new());
        let handles: Vec<_> = (0..4)
            .map(|seat| {
                let context = Arc::clone(&context);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        context.record_decision(3, Seat::new(seat), "node");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(context.time_step(), 40);
        let table = context.branching();
        assert_eq!(table.total_decisions(), 40);
        let mut steps = Vec::new();
        for seat in 0..4 {
            let seat_steps: Vec<u64> = table
                .records_for(Seat::new(seat))
                .iter()
                .map(|record| record.time_step)
                .collect();
            assert!(seat_steps.windows(2).all(|pair| pair[0] < pair[1]));
            steps.extend(seat_steps);
        }
        steps.sort_unstable();
        assert_eq!(steps, (1..=40).collect::<Vec<u64>>());
        context.reset();
        assert_eq!(context.time_step(), 0);
        assert!(context.branching().is_empty());
    }
}
