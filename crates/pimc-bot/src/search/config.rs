use pimc_core::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Knobs of the Monte Carlo search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Rollouts per candidate action.
    pub rollouts: usize,
    pub seed: u64,
    /// Evaluate candidate actions concurrently instead of one after another.
    pub parallel_actions: bool,
    /// Rollouts not started before this budget runs out are abandoned.
    #[serde(with = "budget_ms")]
    pub time_budget: Option<Duration>,
    /// Resolved nodes allowed per rollout before it is declared stuck.
    pub max_steps: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rollouts: 10,
            seed: 0,
            parallel_actions: false,
            time_budget: None,
            max_steps: 100_000,
        }
    }
}

impl SearchConfig {
    /// Defaults with `PIMC_ROLLOUTS` and `PIMC_PARALLEL_ACTIONS` applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(rollouts) = std::env::var("PIMC_ROLLOUTS")
            .ok()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
        {
            self.rollouts = rollouts;
        }
        if let Ok(raw) = std::env::var("PIMC_PARALLEL_ACTIONS") {
            self.parallel_actions = matches!(raw.trim(), "1" | "true" | "TRUE" | "on" | "ON");
        }
        self
    }

    pub fn with_rollouts(mut self, rollouts: usize) -> Self {
        self.rollouts = rollouts;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_parallel_actions(mut self, enabled: bool) -> Self {
        self.parallel_actions = enabled;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.rollouts == 0 {
            return Err(EngineError::contract("rollouts must be at least 1"));
        }
        if self.max_steps == 0 {
            return Err(EngineError::contract("max_steps must be at least 1"));
        }
        Ok(())
    }
}

mod budget_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(budget) => serializer.serialize_some(&(budget.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::SearchConfig;
    use std::time::Duration;

    #[test]
    fn defaults_run_ten_rollouts_sequentially() {
        let config = SearchConfig::default();
        assert_eq!(config.rollouts, 10);
        assert!(!config.parallel_actions);
        assert!(config.time_budget.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_rollouts_is_rejected() {
        let err = SearchConfig::default().with_rollouts(0).validate().unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn budget_round_trips_through_milliseconds() {
        let config = SearchConfig::default().with_time_budget(Duration::from_millis(250));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"time_budget\":250"));
        let parsed: SearchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
        let sparse: SearchConfig = serde_json::from_str(r#"{"rollouts":3}"#).unwrap();
        assert_eq!(sparse.rollouts, 3);
        assert_eq!(sparse.max_steps, SearchConfig::default().max_steps);
    }
}
