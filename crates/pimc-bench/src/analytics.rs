use std::collections::HashMap;
use std::fs;
use std::path::Path;

use pimc_core::context::BranchingSummary;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

use crate::config::{AgentKind, BenchmarkConfig, GameKind};
use crate::runner::{DecisionSummary, MatchOutcome};

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("agent '{0}' appears in results but is missing from configuration")]
    UnknownAgent(String),
    #[error("invalid confidence level {0}")]
    Confidence(f64),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Folds match outcomes into per-agent placement statistics.
pub struct AnalyticsCollector {
    baseline: Option<String>,
    agents: HashMap<String, AgentAccumulator>,
    agent_order: Vec<String>,
    latency_budget_ms: u64,
    confidence: f64,
    header: String,
}

impl AnalyticsCollector {
    pub fn new(config: &BenchmarkConfig) -> Result<Self, AnalyticsError> {
        let confidence = config.metrics.confidence;
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(AnalyticsError::Confidence(confidence));
        }

        let mut agents = HashMap::new();
        let mut order = Vec::new();
        for agent in &config.agents {
            agents.insert(agent.name.clone(), AgentAccumulator::new(agent.kind));
            order.push(agent.name.clone());
        }

        Ok(Self {
            baseline: config.metrics.baseline.clone(),
            agents,
            agent_order: order,
            latency_budget_ms: config.metrics.latency_budget_ms,
            confidence,
            header: describe_game(config),
        })
    }

    pub fn record_match(&mut self, outcome: &MatchOutcome) -> Result<(), AnalyticsError> {
        for result in &outcome.seat_results {
            let acc = self
                .agents
                .get_mut(&result.agent_name)
                .ok_or_else(|| AnalyticsError::UnknownAgent(result.agent_name.clone()))?;
            acc.record(result.place, result.score, &result.metrics);
        }
        Ok(())
    }

    pub fn finalize(
        mut self,
        branching: Vec<BranchingSummary>,
    ) -> Result<AnalyticsSummary, AnalyticsError> {
        let z = z_score(self.confidence)?;
        let mut reports = Vec::with_capacity(self.agent_order.len());
        for name in &self.agent_order {
            if let Some(acc) = self.agents.remove(name) {
                reports.push(acc.into_report(name.clone(), z, self.latency_budget_ms));
            }
        }

        let baseline_place = self.baseline.as_ref().and_then(|baseline| {
            reports
                .iter()
                .find(|report| &report.name == baseline)
                .map(|report| report.avg_place)
        });
        if let Some(base) = baseline_place {
            for report in &mut reports {
                report.delta_vs_baseline = Some(report.avg_place - base);
            }
        }

        Ok(AnalyticsSummary {
            header: self.header,
            baseline: self.baseline,
            confidence: self.confidence,
            latency_budget_ms: self.latency_budget_ms,
            agents: reports,
            branching,
        })
    }
}

struct AgentAccumulator {
    kind: AgentKind,
    places: Vec<f64>,
    total_score: i64,
    wins: usize,
    total_latency_ms: f64,
    total_decisions: u64,
}

impl AgentAccumulator {
    fn new(kind: AgentKind) -> Self {
        Self {
            kind,
            places: Vec::new(),
            total_score: 0,
            wins: 0,
            total_latency_ms: 0.0,
            total_decisions: 0,
        }
    }

    fn record(&mut self, place: usize, score: i64, metrics: &DecisionSummary) {
        self.places.push(place as f64);
        self.total_score = self.total_score.saturating_add(score);
        if place == 1 {
            self.wins += 1;
        }
        self.total_latency_ms += metrics.total_ms;
        self.total_decisions += u64::from(metrics.decisions);
    }

    fn into_report(self, name: String, z: f64, latency_budget_ms: u64) -> AgentReport {
        let matches = self.places.len();
        let (avg_place, ci) = confidence_interval(&self.places, z);
        let avg_score = if matches == 0 {
            0.0
        } else {
            self.total_score as f64 / matches as f64
        };
        let win_rate = if matches == 0 {
            0.0
        } else {
            self.wins as f64 / matches as f64
        };
        let avg_latency = if self.total_decisions == 0 {
            0.0
        } else {
            self.total_latency_ms / self.total_decisions as f64
        };

        AgentReport {
            name,
            kind: self.kind,
            matches,
            avg_place,
            ci,
            avg_score,
            wins: self.wins,
            win_rate,
            decisions: self.total_decisions,
            average_ms_per_decision: avg_latency,
            delta_vs_baseline: None,
            over_budget: avg_latency > latency_budget_ms as f64,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub header: String,
    pub baseline: Option<String>,
    pub confidence: f64,
    pub latency_budget_ms: u64,
    pub agents: Vec<AgentReport>,
    pub branching: Vec<BranchingSummary>,
}

impl AnalyticsSummary {
    pub fn agent(&self, name: &str) -> Option<&AgentReport> {
        self.agents.iter().find(|agent| agent.name == name)
    }

    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Match Summary\n\n");
        out.push_str(&format!("{}\n\n", self.header));
        out.push_str(&format!(
            "Latency budget: {} ms average per decision\n\n",
            self.latency_budget_ms
        ));
        let ci_label = format!("{:.0}% CI", self.confidence * 100.0);
        out.push_str(&format!(
            "| Agent | Kind | Matches | Avg place | Δ vs baseline | {ci_label} | Win % | Avg score | Avg ms/decision | Over Budget |\n"
        ));
        out.push_str("|-------|------|---------|-----------|---------------|--------|-------|-----------|-----------------|-------------|\n");

        for agent in &self.agents {
            let delta = agent
                .delta_vs_baseline
                .map(|delta| format!("{delta:+.3}"))
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "| {name} | {kind:?} | {matches} | {avg:.3} | {delta} | [{lo:.3}, {hi:.3}] | {win:.1}% | {score:.2} | {latency:.2} | {over} |\n",
                name = agent.name,
                kind = agent.kind,
                matches = agent.matches,
                avg = agent.avg_place,
                lo = agent.ci.0,
                hi = agent.ci.1,
                win = agent.win_rate * 100.0,
                score = agent.avg_score,
                latency = agent.average_ms_per_decision,
                over = if agent.over_budget { "Yes" } else { "No" },
            ));
        }

        out.push_str("\n## Branching Factor\n\n");
        if self.branching.is_empty() {
            out.push_str("- <no decisions recorded>\n");
        } else {
            out.push_str("| Seat | Decisions | Mean choices | Max choices |\n");
            out.push_str("|------|-----------|--------------|-------------|\n");
            for seat in &self.branching {
                out.push_str(&format!(
                    "| {} | {} | {:.2} | {} |\n",
                    seat.seat, seat.decisions, seat.mean, seat.max
                ));
            }
        }
        out
    }

    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), AnalyticsError> {
        fs::write(path.as_ref(), self.render_markdown()).map_err(|source| AnalyticsError::Io {
            context: "writing summary markdown",
            source,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentReport {
    pub name: String,
    pub kind: AgentKind,
    pub matches: usize,
    /// Mean finishing place, 1 being the winner.
    pub avg_place: f64,
    pub ci: (f64, f64),
    pub avg_score: f64,
    pub wins: usize,
    pub win_rate: f64,
    pub decisions: u64,
    pub average_ms_per_decision: f64,
    pub delta_vs_baseline: Option<f64>,
    #[serde(skip)]
    pub over_budget: bool,
}

fn describe_game(config: &BenchmarkConfig) -> String {
    let game = &config.game;
    let shape = match game.kind {
        GameKind::Trick => format!("trick game, {} players, {} cards each", game.players, game.hand_size),
        GameKind::Coin => format!(
            "coin game, {} players, {} calls, {} rounds",
            game.players, game.options, game.rounds
        ),
    };
    format!(
        "Run `{}`: {shape}; {} matches x {} rotations",
        config.run_id, config.matches.count, config.matches.rotations
    )
}

/// Two-sided normal quantile for `confidence`.
fn z_score(confidence: f64) -> Result<f64, AnalyticsError> {
    let normal = Normal::new(0.0, 1.0).map_err(|_| AnalyticsError::Confidence(confidence))?;
    Ok(normal.inverse_cdf(0.5 + confidence / 2.0))
}

/// Mean of `values` and its normal-approximation interval.
fn confidence_interval(values: &[f64], z: f64) -> (f64, (f64, f64)) {
    if values.is_empty() {
        return (0.0, (0.0, 0.0));
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() == 1 {
        return (mean, (mean, mean));
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let margin = z * (variance / n).sqrt();
    (mean, (mean - margin, mean + margin))
}
