use thiserror::Error;

/// Goal data that cannot be simulated. User-correctable, never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidGoalInput {
    #[error("target amount must be positive and finite (got {0})")]
    NonPositiveTarget(f64),
    #[error("{field} must be non-negative and finite (got {value})")]
    NegativeAmount { field: &'static str, value: f64 },
    #[error("allocation is empty")]
    EmptyAllocation,
    #[error("allocation weight for {asset_class} is invalid ({weight})")]
    InvalidWeight { asset_class: String, weight: f64 },
    #[error("allocation weights sum to {0}, expected 1.0")]
    AllocationSum(f64),
    #[error("timeframe {0} is in the past")]
    NegativeTimeframe(jiff::civil::Date),
    #[error("lumpsum year {year} is beyond the {years}-year horizon")]
    LumpsumOutOfRange { year: u32, years: u32 },
}

/// Allocation references an asset class with no return model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown asset class \"{0}\"")]
pub struct UnknownAssetClass(pub String);

/// Failure of a single Monte Carlo trial.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrialError {
    #[error("portfolio value became non-finite in year {year}")]
    NonFinite { year: u32 },
    #[error("{0}")]
    Other(String),
}

/// Every trial of a batch failed; there is nothing to aggregate.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("simulation failed: {attempted} trials attempted, none completed ({reason})")]
pub struct SimulationFailed {
    pub attempted: usize,
    pub reason: String,
}

/// Errors building a simulation from an input snapshot
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error(
        "invalid {distribution} parameters for {asset_class} (mean={mean}, volatility={volatility}): {reason}"
    )]
    InvalidDistribution {
        distribution: &'static str,
        asset_class: String,
        mean: f64,
        volatility: f64,
        reason: &'static str,
    },
    #[error(transparent)]
    Failed(#[from] SimulationFailed),
}

/// Persisted cache snapshot could not be read back.
#[derive(Debug, Error)]
pub enum CacheCorruption {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("snapshot version {found} does not match expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },
}

/// The external parameter service could not answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parameter service unavailable: {0}")]
pub struct ParameterServiceUnavailable(pub String);

/// Errors surfaced by the analyzer and scenario generator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    InvalidGoal(#[from] InvalidGoalInput),
    #[error(transparent)]
    UnknownAssetClass(#[from] UnknownAssetClass),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

impl From<SimulationFailed> for AnalysisError {
    fn from(err: SimulationFailed) -> Self {
        AnalysisError::Simulation(SimulationError::Failed(err))
    }
}
