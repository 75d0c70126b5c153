mod agents;
mod rotations;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pimc_bot::Agent;
use pimc_core::EngineError;
use pimc_core::context::{BranchingSummary, MatchContext};
use pimc_core::games::{CoinGame, TrickConfig, TrickGame};
use pimc_core::model::seat::Seat;
use pimc_core::tree::{GameIterator, GameWorld};
use rand::{RngCore, SeedableRng, rngs::StdRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};

use crate::analytics::{AnalyticsCollector, AnalyticsError};
use crate::config::{AgentKind, BenchmarkConfig, GameKind, ResolvedOutputs};
use crate::logging::TELEMETRY_FILE;
use crate::telemetry::{
    TelemetryError, TelemetryOutputs, append_highlights_to_markdown, write_summary_outputs,
};

pub use agents::AgentError;
use agents::AgentBlueprint;
use rotations::SeatRotations;

/// Plays the configured matches and writes every artifact of a run.
pub struct MatchRunner {
    config: BenchmarkConfig,
    outputs: ResolvedOutputs,
    agents: Vec<AgentBlueprint>,
    rotations: SeatRotations,
    context: Arc<MatchContext>,
    logging_enabled: bool,
}

pub struct RunSummary {
    pub matches_played: usize,
    pub rotations: usize,
    pub rows_written: usize,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
    pub branching: Vec<BranchingSummary>,
    pub telemetry_path: Option<PathBuf>,
    pub telemetry_outputs: Option<TelemetryOutputs>,
}

impl MatchRunner {
    /// Build a runner from a validated configuration.
    pub fn new(config: BenchmarkConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let agents = AgentBlueprint::from_configs(&config.agents)?;
        if agents.len() != config.game.players {
            return Err(RunnerError::SeatCount {
                players: config.game.players,
                found: agents.len(),
            });
        }
        let rotations = SeatRotations::new(config.game.players, config.matches.rotations);

        Ok(Self {
            logging_enabled: config.logging.enable_structured,
            config,
            outputs,
            agents,
            rotations,
            context: Arc::new(MatchContext::new()),
        })
    }

    /// Branching-factor table shared by every match of the run.
    pub fn context(&self) -> &Arc<MatchContext> {
        &self.context
    }

    /// Execute every match, streaming JSONL rows to disk.
    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;

        self.context.reset();
        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let mut rng = StdRng::seed_from_u64(self.config.matches.seed.unwrap_or(0));
        let mut analytics = AnalyticsCollector::new(&self.config)?;
        let mut rows_written = 0usize;

        for match_index in 0..self.config.matches.count {
            let match_seed = rng.next_u64();
            for (rotation_index, rotation) in self.rotations.as_slice().iter().enumerate() {
                let ids = MatchIds {
                    match_id: format!("M{match_index:05}_R{rotation_index:02}"),
                    match_index,
                    rotation_index,
                    match_seed,
                };
                let outcome = self.play_match(ids, rotation)?;
                analytics.record_match(&outcome)?;
                rows_written += write_match_rows(&mut writer, &self.config.run_id, &outcome)?;
            }
        }
        writer.flush()?;

        let branching = self.context.summary();
        let summary = analytics.finalize(branching.clone())?;
        summary.write_markdown(&self.outputs.summary_md)?;

        let telemetry_dir = self.outputs.telemetry_dir();
        let telemetry_path = self
            .logging_enabled
            .then(|| telemetry_dir.join(TELEMETRY_FILE));
        let telemetry_outputs = match telemetry_path.as_ref() {
            Some(path) => write_summary_outputs(path, &telemetry_dir)?,
            None => None,
        };
        if let Some(outputs) = telemetry_outputs.as_ref() {
            append_highlights_to_markdown(&self.outputs.summary_md, outputs)?;
        }

        Ok(RunSummary {
            matches_played: self.config.matches.count,
            rotations: self.rotations.len(),
            rows_written,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
            branching,
            telemetry_path,
            telemetry_outputs,
        })
    }

    fn play_match(&self, ids: MatchIds, rotation: &[usize]) -> Result<MatchOutcome, RunnerError> {
        let game = &self.config.game;
        match game.kind {
            GameKind::Trick => {
                let world = TrickGame::new(TrickConfig {
                    players: game.players,
                    hand_size: game.hand_size,
                })
                .map_err(|err| RunnerError::game(format!("cannot set up trick game: {err}")))?;
                self.play_world(world, ids, rotation)
            }
            GameKind::Coin => {
                let world = CoinGame::new(game.players, game.options, game.rounds);
                self.play_world(world, ids, rotation)
            }
        }
    }

    fn play_world<W: GameWorld>(
        &self,
        world: W,
        ids: MatchIds,
        rotation: &[usize],
    ) -> Result<MatchOutcome, RunnerError> {
        let mut seats = build_seat_states::<W>(rotation, &self.agents, ids.match_seed)?;
        let mut cursor = GameIterator::new(world, ids.match_seed);

        while !cursor.advance_to_choice()? {
            let seat = cursor
                .current_seat()
                .ok_or_else(|| RunnerError::game("decision node without a seat to act"))?;
            let options = cursor.build_options()?;
            let location = cursor.world().tree_location();
            self.context
                .record_decision(options.len(), seat, location.clone());

            let state = seats.get_mut(seat.index()).ok_or_else(|| {
                RunnerError::game(format!("no agent seated at {seat}"))
            })?;
            let start = Instant::now();
            let choice = state.agent.make_action(&cursor, options.len())?;
            let elapsed_ms = state.metrics.record(start.elapsed());

            if self.logging_enabled && tracing::enabled!(Level::INFO) {
                event!(
                    target: "pimc_bench::decision",
                    Level::INFO,
                    run_id = %self.config.run_id,
                    match_id = %ids.match_id,
                    seat = seat.index() as u32,
                    agent = %state.agent_name,
                    location = %location,
                    num_choices = options.len() as u32,
                    choice = choice as u32,
                    elapsed_ms
                );
            }

            let action = options.get(choice).ok_or_else(|| {
                RunnerError::game(format!(
                    "{} picked option {choice} of {} at {seat}",
                    state.agent_name,
                    options.len()
                ))
            })?;
            cursor.execute_all(action)?;
            cursor.pop_current_node()?;
        }

        let ranks = cursor.process_score()?;
        let scores = cursor.world().final_scores();
        let seating: Vec<SeatSnapshot> = seats
            .iter()
            .map(|state| SeatSnapshot {
                seat: state.seat.index(),
                agent: state.agent_name.clone(),
            })
            .collect();

        let mut seat_results = Vec::with_capacity(seats.len());
        for state in seats {
            let rank = ranks.rank_of(state.seat).ok_or_else(|| {
                RunnerError::game(format!("{} missing from the final ranking", state.seat))
            })?;
            seat_results.push(SeatResult {
                agent_name: state.agent_name,
                agent_kind: state.agent_kind,
                seat: state.seat,
                score: scores.get(state.seat.index()).copied().unwrap_or_default(),
                place: rank + 1,
                metrics: state.metrics.finalize(),
            });
        }

        if self.logging_enabled && tracing::enabled!(Level::INFO) {
            let winner = seat_results
                .iter()
                .find(|result| result.place == 1)
                .map(|result| result.agent_name.as_str())
                .unwrap_or("<none>");
            event!(
                target: "pimc_bench::match",
                Level::INFO,
                run_id = %self.config.run_id,
                match_id = %ids.match_id,
                winner = %winner,
                steps = cursor.steps() as u64,
            );
        }

        Ok(MatchOutcome {
            ids,
            seating,
            seat_results,
        })
    }
}

fn build_seat_states<W: GameWorld>(
    rotation: &[usize],
    agents: &[AgentBlueprint],
    match_seed: u64,
) -> Result<Vec<SeatState<W>>, RunnerError> {
    let mut seats = Vec::with_capacity(rotation.len());
    for (seat_index, agent_index) in rotation.iter().enumerate() {
        let blueprint = agents
            .get(*agent_index)
            .ok_or(RunnerError::InvalidRotation {
                seat: seat_index,
                agent_index: *agent_index,
            })?;
        let seat = Seat::new(seat_index);
        seats.push(SeatState {
            seat,
            agent_name: blueprint.name.clone(),
            agent_kind: blueprint.kind,
            agent: blueprint.spawn::<W>(seat, match_seed)?,
            metrics: DecisionMetrics::default(),
        });
    }
    Ok(seats)
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn write_match_rows(
    writer: &mut BufWriter<File>,
    run_id: &str,
    outcome: &MatchOutcome,
) -> Result<usize, RunnerError> {
    let mut rows_written = 0usize;
    for result in &outcome.seat_results {
        let row = MatchLogRow {
            run_id,
            match_id: &outcome.ids.match_id,
            match_index: outcome.ids.match_index,
            rotation_index: outcome.ids.rotation_index,
            match_seed: outcome.ids.match_seed,
            seat: result.seat.index(),
            agent: &result.agent_name,
            seating: &outcome.seating,
            score: result.score,
            place: result.place,
            decisions: result.metrics.decisions,
            speed_ms_turn: result.metrics.avg_ms_per_decision,
        };
        serde_json::to_writer(&mut *writer, &row)?;
        writer.write_all(b"\n")?;
        rows_written += 1;
    }
    Ok(rows_written)
}

struct SeatState<W: GameWorld> {
    seat: Seat,
    agent_name: String,
    agent_kind: AgentKind,
    agent: Box<dyn Agent<W>>,
    metrics: DecisionMetrics,
}

#[derive(Debug, Clone)]
pub struct MatchIds {
    pub match_id: String,
    pub match_index: usize,
    pub rotation_index: usize,
    pub match_seed: u64,
}

pub struct MatchOutcome {
    pub ids: MatchIds,
    pub seating: Vec<SeatSnapshot>,
    pub seat_results: Vec<SeatResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatSnapshot {
    pub seat: usize,
    pub agent: String,
}

pub struct SeatResult {
    pub agent_name: String,
    pub agent_kind: AgentKind,
    pub seat: Seat,
    pub score: i64,
    /// 1 for the winner.
    pub place: usize,
    pub metrics: DecisionSummary,
}

#[derive(Default)]
struct DecisionMetrics {
    total: Duration,
    decisions: u32,
}

impl DecisionMetrics {
    fn record(&mut self, duration: Duration) -> f64 {
        self.total += duration;
        self.decisions += 1;
        duration.as_secs_f64() * 1000.0
    }

    fn finalize(self) -> DecisionSummary {
        let total_ms = self.total.as_secs_f64() * 1000.0;
        let avg_ms_per_decision = if self.decisions == 0 {
            0.0
        } else {
            total_ms / f64::from(self.decisions)
        };
        DecisionSummary {
            decisions: self.decisions,
            avg_ms_per_decision,
            total_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecisionSummary {
    pub decisions: u32,
    pub avg_ms_per_decision: f64,
    pub total_ms: f64,
}

#[derive(Serialize)]
struct MatchLogRow<'a> {
    run_id: &'a str,
    match_id: &'a str,
    match_index: usize,
    rotation_index: usize,
    match_seed: u64,
    seat: usize,
    agent: &'a str,
    seating: &'a [SeatSnapshot],
    score: i64,
    place: usize,
    decisions: u32,
    speed_ms_turn: f64,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0}")]
    Agent(#[from] AgentError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize log row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("game execution failed: {message}")]
    Game { message: String },
    #[error("{players} seats configured but {found} agents defined")]
    SeatCount { players: usize, found: usize },
    #[error("rotation seats agent {agent_index} at seat {seat}, which does not exist")]
    InvalidRotation { seat: usize, agent_index: usize },
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
    #[error("telemetry summarisation failed: {0}")]
    Telemetry(#[from] TelemetryError),
}

impl RunnerError {
    fn game(message: impl Into<String>) -> Self {
        RunnerError::Game {
            message: message.into(),
        }
    }
}
