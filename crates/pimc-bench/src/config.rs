use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

const DEFAULT_ROTATIONS: usize = 1;
const DEFAULT_LATENCY_BUDGET_MS: u64 = 1_000;
const DEFAULT_CONFIDENCE: f64 = 0.95;
const MAX_PLAYERS: usize = pimc_core::model::seat::Seat::MAX_PLAYERS;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root benchmark configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BenchmarkConfig {
    pub run_id: String,
    pub game: GameConfig,
    pub matches: MatchesConfig,
    pub agents: Vec<AgentConfig>,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BenchmarkConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let mut cfg: BenchmarkConfig = serde_yaml::from_reader(BufReader::new(file))
            .map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.game.validate()?;
        self.matches.validate(self.game.players)?;
        self.outputs.validate(&self.run_id)?;
        validate_agents(&mut self.agents, self.game.players)?;
        self.metrics.validate(&self.agents)?;
        self.logging.normalize();
        Ok(())
    }

    /// Forces `rollouts` on every PIMC agent.
    pub fn override_rollouts(&mut self, rollouts: usize) {
        for agent in self.agents.iter_mut().filter(|a| a.kind == AgentKind::Pimc) {
            if !agent.params.is_mapping() {
                agent.params = serde_yaml::Value::Mapping(Default::default());
            }
            if let Some(mapping) = agent.params.as_mapping_mut() {
                mapping.insert(
                    serde_yaml::Value::from("rollouts"),
                    serde_yaml::Value::from(rollouts as u64),
                );
            }
        }
    }

    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            summary_md: resolve_template(&self.run_id, &self.outputs.summary_md),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Trick,
    Coin,
}

/// Which reference game the matches are played on.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GameConfig {
    pub kind: GameKind,
    pub players: usize,
    #[serde(default = "default_hand_size")]
    pub hand_size: usize,
    #[serde(default = "default_options")]
    pub options: usize,
    #[serde(default = "default_rounds")]
    pub rounds: usize,
}

impl GameConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.kind {
            GameKind::Trick => {
                if !(2..=6).contains(&self.players) {
                    return Err(invalid("game.players", "trick games seat 2 to 6 players"));
                }
                if self.hand_size == 0 || self.players * self.hand_size > 52 {
                    return Err(invalid(
                        "game.hand_size",
                        format!(
                            "{} players x {} cards does not fit a 52-card deck",
                            self.players, self.hand_size
                        ),
                    ));
                }
            }
            GameKind::Coin => {
                if !(2..=MAX_PLAYERS).contains(&self.players) {
                    return Err(invalid(
                        "game.players",
                        format!("coin games seat 2 to {MAX_PLAYERS} players"),
                    ));
                }
                if self.options == 0 {
                    return Err(invalid("game.options", "at least one call is required"));
                }
                if self.rounds == 0 {
                    return Err(invalid("game.rounds", "at least one round is required"));
                }
            }
        }
        Ok(())
    }
}

fn default_hand_size() -> usize {
    5
}

fn default_options() -> usize {
    2
}

fn default_rounds() -> usize {
    3
}

/// Match scheduling: `count` seeds, each replayed under `rotations` seatings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MatchesConfig {
    pub seed: Option<u64>,
    pub count: usize,
    #[serde(default = "default_rotations")]
    pub rotations: usize,
}

impl MatchesConfig {
    fn validate(&self, players: usize) -> Result<(), ValidationError> {
        if self.count == 0 {
            return Err(invalid("matches.count", "number of matches must be greater than zero"));
        }
        if self.rotations == 0 || self.rotations > players {
            return Err(invalid(
                "matches.rotations",
                format!("rotations must be between 1 and {players}"),
            ));
        }
        Ok(())
    }
}

fn default_rotations() -> usize {
    DEFAULT_ROTATIONS
}

/// Definition of a seat occupant.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub name: String,
    pub kind: AgentKind,
    #[serde(default)]
    pub params: serde_yaml::Value,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Pimc,
    Random,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (label, value) in [
            ("outputs.jsonl", &self.jsonl),
            ("outputs.summary_md", &self.summary_md),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(label, "path must not be empty"));
            }
            if resolve_template(run_id, value).components().count() == 0 {
                return Err(invalid(label, "resolved path is invalid"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MetricsConfig {
    /// Agent the others are compared against; optional.
    #[serde(default)]
    pub baseline: Option<String>,
    #[serde(default = "default_latency_budget_ms")]
    pub latency_budget_ms: u64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            baseline: None,
            latency_budget_ms: DEFAULT_LATENCY_BUDGET_MS,
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

impl MetricsConfig {
    fn validate(&self, agents: &[AgentConfig]) -> Result<(), ValidationError> {
        if let Some(baseline) = self.baseline.as_ref()
            && !agents.iter().any(|a| &a.name == baseline)
        {
            return Err(invalid(
                "metrics.baseline",
                format!("baseline agent '{baseline}' is not defined in agents list"),
            ));
        }
        if self.latency_budget_ms == 0 {
            return Err(invalid(
                "metrics.latency_budget_ms",
                "latency budget must be greater than zero",
            ));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(invalid("metrics.confidence", "confidence must lie in (0, 1)"));
        }
        Ok(())
    }
}

fn default_latency_budget_ms() -> u64 {
    DEFAULT_LATENCY_BUDGET_MS
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

/// Structured logs are off unless requested.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(invalid("run_id", "run_id must not be empty"));
    }
    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(invalid(
            "run_id",
            "run_id may only contain alphanumeric characters, '.', '_' or '-'",
        ));
    }
    Ok(())
}

fn validate_agents(agents: &mut [AgentConfig], players: usize) -> Result<(), ValidationError> {
    if agents.len() != players {
        return Err(invalid(
            "agents",
            format!("{players} seats need {players} agents, found {}", agents.len()),
        ));
    }

    let mut seen = HashSet::new();
    for (index, agent) in agents.iter_mut().enumerate() {
        if agent.name.trim().is_empty() {
            return Err(invalid(format!("agents[{index}].name"), "agent name must not be empty"));
        }
        if !agent.name.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
            return Err(invalid(
                format!("agents[{index}].name"),
                "agent name contains invalid characters",
            ));
        }
        if !seen.insert(agent.name.clone()) {
            return Err(invalid(
                "agents",
                format!("agent name '{}' defined more than once", agent.name),
            ));
        }
        if agent.params.is_null() {
            agent.params = serde_yaml::Value::Mapping(Default::default());
        }
    }
    Ok(())
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    PathBuf::from(template.replace("{run_id}", run_id))
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidField {
        field: field.into(),
        message: message.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
}

impl ResolvedOutputs {
    /// Directory holding the summary; telemetry files land next to it.
    pub fn telemetry_dir(&self) -> PathBuf {
        self.summary_md
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}
