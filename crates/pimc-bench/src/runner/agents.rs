use std::time::Duration;

use pimc_bot::{Agent, PimcAgent, RandomAgent, SearchConfig};
use pimc_core::EngineResult;
use pimc_core::model::seat::Seat;
use pimc_core::tree::GameWorld;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{AgentConfig, AgentKind};

const SEAT_SEED_STRIDE: u64 = 0x2545_F491_4F6C_DD1D;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid pimc parameter for agent '{name}': {message}")]
    InvalidPimcParam { name: String, message: String },
    #[error("agent '{name}' takes no parameters")]
    UnexpectedParams { name: String },
}

/// Agent recipe built once from the config and spawned fresh per match.
pub(super) struct AgentBlueprint {
    pub(super) name: String,
    pub(super) kind: AgentKind,
    implementation: AgentImplementation,
}

enum AgentImplementation {
    Pimc(PimcParams),
    Random,
}

impl AgentBlueprint {
    pub(super) fn from_configs(configs: &[AgentConfig]) -> Result<Vec<Self>, AgentError> {
        configs.iter().map(Self::from_config).collect()
    }

    fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let implementation = match config.kind {
            AgentKind::Pimc => AgentImplementation::Pimc(PimcParams::from_params(
                &config.name,
                &config.params,
            )?),
            AgentKind::Random => {
                let empty = config.params.is_null()
                    || config.params.as_mapping().is_some_and(|m| m.is_empty());
                if !empty {
                    return Err(AgentError::UnexpectedParams {
                        name: config.name.clone(),
                    });
                }
                AgentImplementation::Random
            }
        };
        Ok(Self {
            name: config.name.clone(),
            kind: config.kind,
            implementation,
        })
    }

    /// A fresh agent for `seat`; `match_seed` decorrelates matches.
    pub(super) fn spawn<W: GameWorld>(
        &self,
        seat: Seat,
        match_seed: u64,
    ) -> EngineResult<Box<dyn Agent<W>>> {
        match &self.implementation {
            AgentImplementation::Pimc(params) => {
                let agent = PimcAgent::<W>::new(seat, params.search_config(match_seed))?
                    .with_heuristics(params.heuristics);
                Ok(Box::new(agent))
            }
            AgentImplementation::Random => {
                let seed = match_seed
                    .wrapping_add((seat.index() as u64 + 1).wrapping_mul(SEAT_SEED_STRIDE));
                Ok(Box::new(RandomAgent::new(seat, seed)))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PimcParams {
    rollouts: usize,
    seed: u64,
    parallel_actions: bool,
    time_budget_ms: Option<u64>,
    max_steps: usize,
    heuristics: bool,
}

impl Default for PimcParams {
    fn default() -> Self {
        let search = SearchConfig::default();
        Self {
            rollouts: search.rollouts,
            seed: search.seed,
            parallel_actions: search.parallel_actions,
            time_budget_ms: None,
            max_steps: search.max_steps,
            heuristics: true,
        }
    }
}

impl PimcParams {
    fn from_params(name: &str, params: &serde_yaml::Value) -> Result<Self, AgentError> {
        if params.is_null() {
            return Ok(Self::default());
        }
        let parsed: PimcParams =
            serde_yaml::from_value(params.clone()).map_err(|err| AgentError::InvalidPimcParam {
                name: name.to_string(),
                message: err.to_string(),
            })?;
        parsed
            .search_config(0)
            .validate()
            .map_err(|err| AgentError::InvalidPimcParam {
                name: name.to_string(),
                message: err.to_string(),
            })?;
        Ok(parsed)
    }

    fn search_config(&self, match_seed: u64) -> SearchConfig {
        let config = SearchConfig::default()
            .with_rollouts(self.rollouts)
            .with_seed(self.seed ^ match_seed)
            .with_parallel_actions(self.parallel_actions)
            .with_max_steps(self.max_steps);
        match self.time_budget_ms {
            Some(ms) => config.with_time_budget(Duration::from_millis(ms)),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::iter::FromIterator;

    fn mapping(entries: &[(&str, serde_yaml::Value)]) -> serde_yaml::Value {
        serde_yaml::Value::Mapping(serde_yaml::Mapping::from_iter(
            entries
                .iter()
                .map(|(key, value)| (serde_yaml::Value::from(*key), value.clone())),
        ))
    }

    #[test]
    fn pimc_params_default_to_search_defaults() {
        let params = PimcParams::from_params("bot", &serde_yaml::Value::Null).unwrap();
        assert_eq!(params.rollouts, SearchConfig::default().rollouts);
        assert!(params.heuristics);
        assert_eq!(params.search_config(0).time_budget, None);
    }

    #[test]
    fn pimc_params_parse_budget_and_rollouts() {
        let params = mapping(&[
            ("rollouts", serde_yaml::Value::from(40u64)),
            ("time_budget_ms", serde_yaml::Value::from(25u64)),
        ]);
        let params = PimcParams::from_params("bot", &params).unwrap();
        let config = params.search_config(5);
        assert_eq!(config.rollouts, 40);
        assert_eq!(config.time_budget, Some(Duration::from_millis(25)));
        assert_eq!(config.seed, 5);
    }

    #[test]
    fn pimc_params_reject_zero_rollouts_and_unknown_keys() {
        let zero = mapping(&[("rollouts", serde_yaml::Value::from(0u64))]);
        assert!(matches!(
            PimcParams::from_params("bot", &zero),
            Err(AgentError::InvalidPimcParam { .. })
        ));
        let typo = mapping(&[("rolouts", serde_yaml::Value::from(3u64))]);
        assert!(PimcParams::from_params("bot", &typo).is_err());
    }

    #[test]
    fn random_agents_reject_params() {
        let config = AgentConfig {
            name: "rnd".into(),
            kind: AgentKind::Random,
            params: mapping(&[("rollouts", serde_yaml::Value::from(3u64))]),
        };
        assert!(matches!(
            AgentBlueprint::from_configs(&[config]),
            Err(AgentError::UnexpectedParams { .. })
        ));
    }
}
