use thiserror::Error;

/// Failures surfaced by the decision engine and the tree cursor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Invalid arguments or a call made in the wrong cursor state. Fatal.
    #[error("contract violation: {0}")]
    ContractViolation(String),
    /// A playout could not be driven to a terminal state.
    #[error("simulation failure: {0}")]
    SimulationFailure(String),
    /// A telemetry sink rejected a sample.
    #[error("telemetry failure: {0}")]
    TelemetryFailure(String),
}

impl EngineError {
    pub fn contract(message: impl Into<String>) -> Self {
        Self::ContractViolation(message.into())
    }

    pub fn simulation(message: impl Into<String>) -> Self {
        Self::SimulationFailure(message.into())
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::TelemetryFailure(message.into())
    }

    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ContractViolation(_))
    }

    pub fn is_simulation_failure(&self) -> bool {
        matches!(self, Self::SimulationFailure(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
