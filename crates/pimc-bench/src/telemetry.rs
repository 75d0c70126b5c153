use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

const HEURISTICS_TARGET: &str = "pimc_bot::heuristics";
const DECISION_TARGET: &str = "pimc_bot::decision";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse telemetry JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize)]
pub struct TelemetrySummary {
    pub heuristics: HeuristicsTelemetrySummary,
    pub decisions: DecisionTelemetrySummary,
}

/// Aggregate of the per-decision heuristic samples.
#[derive(Debug, Default, Serialize)]
pub struct HeuristicsTelemetrySummary {
    pub count: usize,
    pub avg_variance: Option<f64>,
    pub avg_average: Option<f64>,
    pub avg_leader_utility: Option<f64>,
    pub samples_by_seat: BTreeMap<String, usize>,
}

#[derive(Debug, Default, Serialize)]
pub struct DecisionTelemetrySummary {
    pub count: usize,
    pub avg_choices: Option<f64>,
    pub avg_elapsed_ms: Option<f64>,
    pub rollouts_abandoned: u64,
}

#[derive(Debug)]
struct Average {
    sum: f64,
    count: usize,
}

impl Average {
    fn new() -> Self {
        Self { sum: 0.0, count: 0 }
    }

    fn add(&mut self, value: f64) {
        if value.is_finite() {
            self.sum += value;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Aggregates engine events from a JSON-lines tracing log. A missing file
/// yields an empty summary.
pub fn summarise_telemetry(path: &Path) -> Result<TelemetrySummary, TelemetryError> {
    if !path.exists() {
        return Ok(TelemetrySummary::default());
    }

    let file = File::open(path).map_err(|source| TelemetryError::Io {
        context: "opening telemetry log",
        source,
    })?;

    let mut heuristics = HeuristicsTelemetrySummary::default();
    let mut variance = Average::new();
    let mut average = Average::new();
    let mut leader = Average::new();

    let mut decisions = DecisionTelemetrySummary::default();
    let mut choices = Average::new();
    let mut elapsed = Average::new();

    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| TelemetryError::Io {
            context: "reading telemetry line",
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let payload: Value = serde_json::from_str(&line)?;
        let target = payload
            .get("target")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let empty = Map::new();
        let fields = payload
            .get("fields")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let number = |key: &str| fields.get(key).and_then(Value::as_f64);

        match target {
            HEURISTICS_TARGET => {
                // Warnings about dropped samples share the target.
                let Some(value) = number("variance") else {
                    continue;
                };
                heuristics.count += 1;
                variance.add(value);
                if let Some(value) = number("average") {
                    average.add(value);
                }
                if let Some(value) = number("leader_utility") {
                    leader.add(value);
                }
                let seat = fields
                    .get("seat")
                    .and_then(Value::as_u64)
                    .map(|seat| format!("seat{seat}"))
                    .unwrap_or_else(|| "<unset>".to_string());
                *heuristics.samples_by_seat.entry(seat).or_insert(0) += 1;
            }
            DECISION_TARGET => {
                let Some(value) = number("num_choices") else {
                    continue;
                };
                decisions.count += 1;
                choices.add(value);
                if let Some(value) = number("elapsed_ms") {
                    elapsed.add(value);
                }
                decisions.rollouts_abandoned += fields
                    .get("abandoned")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
            }
            _ => {}
        }
    }

    heuristics.avg_variance = variance.mean();
    heuristics.avg_average = average.mean();
    heuristics.avg_leader_utility = leader.mean();
    decisions.avg_choices = choices.mean();
    decisions.avg_elapsed_ms = elapsed.mean();

    Ok(TelemetrySummary {
        heuristics,
        decisions,
    })
}

/// Writes `telemetry_summary.{json,md}` into `output_dir`; `None` when no
/// log exists.
pub fn write_summary_outputs(
    telemetry_path: &Path,
    output_dir: &Path,
) -> Result<Option<TelemetryOutputs>, TelemetryError> {
    if !telemetry_path.exists() {
        return Ok(None);
    }

    let summary = summarise_telemetry(telemetry_path)?;
    let json_path = output_dir.join("telemetry_summary.json");
    let md_path = output_dir.join("telemetry_summary.md");

    std::fs::write(&json_path, serde_json::to_vec_pretty(&summary)?).map_err(|source| {
        TelemetryError::Io {
            context: "writing telemetry summary json",
            source,
        }
    })?;
    std::fs::write(&md_path, render_markdown(&summary, telemetry_path)).map_err(|source| {
        TelemetryError::Io {
            context: "writing telemetry summary markdown",
            source,
        }
    })?;

    Ok(Some(TelemetryOutputs {
        summary,
        json_path,
        markdown_path: md_path,
    }))
}

pub fn append_highlights_to_markdown(
    summary_path: &Path,
    outputs: &TelemetryOutputs,
) -> Result<(), TelemetryError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(summary_path)
        .map_err(|source| TelemetryError::Io {
            context: "opening summary markdown for telemetry append",
            source,
        })?;

    let heuristics = &outputs.summary.heuristics;
    let mut section = String::new();
    section.push_str("\n## Telemetry Highlights\n");
    section.push_str(&format!("- Heuristic samples captured: {}\n", heuristics.count));
    if let Some(value) = heuristics.avg_variance {
        section.push_str(&format!("- Avg utility variance: {value:.3}\n"));
    }
    if let Some(value) = heuristics.avg_leader_utility {
        section.push_str(&format!("- Avg leader utility: {value:.3}\n"));
    }
    let decisions = &outputs.summary.decisions;
    section.push_str(&format!("- Searched decisions: {}\n", decisions.count));
    if decisions.rollouts_abandoned > 0 {
        section.push_str(&format!(
            "- Rollouts abandoned at the deadline: {}\n",
            decisions.rollouts_abandoned
        ));
    }

    write!(file, "{section}").map_err(|source| TelemetryError::Io {
        context: "writing telemetry highlights",
        source,
    })
}

fn render_markdown(summary: &TelemetrySummary, telemetry_path: &Path) -> String {
    let mut out = String::new();
    out.push_str("# Telemetry Summary\n\n");
    out.push_str(&format!("- Source: `{}`\n\n", telemetry_path.display()));

    let heuristics = &summary.heuristics;
    out.push_str("## Decision Heuristics\n");
    out.push_str(&format!("- Samples: {}\n", heuristics.count));
    if let Some(value) = heuristics.avg_variance {
        out.push_str(&format!("- Avg variance: {value:.3}\n"));
    }
    if let Some(value) = heuristics.avg_average {
        out.push_str(&format!("- Avg scaled utility: {value:.3}\n"));
    }
    if let Some(value) = heuristics.avg_leader_utility {
        out.push_str(&format!("- Avg leader utility: {value:.3}\n"));
    }
    for (seat, count) in &heuristics.samples_by_seat {
        out.push_str(&format!("  - {seat}: {count}\n"));
    }
    out.push('\n');

    let decisions = &summary.decisions;
    out.push_str("## Searched Decisions\n");
    out.push_str(&format!("- Events: {}\n", decisions.count));
    if let Some(value) = decisions.avg_choices {
        out.push_str(&format!("- Avg choices: {value:.2}\n"));
    }
    if let Some(value) = decisions.avg_elapsed_ms {
        out.push_str(&format!("- Avg search time: {value:.2} ms\n"));
    }
    out.push_str(&format!(
        "- Rollouts abandoned: {}\n",
        decisions.rollouts_abandoned
    ));
    out
}

#[derive(Debug)]
pub struct TelemetryOutputs {
    pub summary: TelemetrySummary,
    pub json_path: PathBuf,
    pub markdown_path: PathBuf,
}
