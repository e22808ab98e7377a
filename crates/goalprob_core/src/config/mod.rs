//! Analyzer configuration
//!
//! `AnalyzerConfig` carries every knob of an analysis that is not a property
//! of the goal itself. All fields have defaults, so an empty YAML/JSON
//! document is a valid configuration.
//!
//! # Builder DSL
//!
//! Goals for tests and quick runs can be assembled fluently:
//!
//! ```ignore
//! use goalprob_core::config::GoalBuilder;
//!
//! let goal = GoalBuilder::new("house", 10_000_000.0)
//!     .current(1_000_000.0)
//!     .monthly(20_000.0)
//!     .years(15)
//!     .allocation("equity", 0.6)
//!     .allocation("debt", 0.3)
//!     .allocation("gold", 0.1)
//!     .build();
//! ```

mod builder;

use std::time::Duration;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

pub use builder::GoalBuilder;

use crate::cache::{DEFAULT_MAX_SIZE, DEFAULT_TTL_SECONDS};
use crate::model::{MarketContext, ResultPolicy, ReturnDistribution};
use crate::runner::default_workers;
use crate::stats::STANDARD_PERCENTILES;

pub const DEFAULT_ITERATIONS: usize = 1000;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_PARTIAL_SUCCESS_RATIO: f64 = 0.8;
pub const DEFAULT_IMPOSSIBLE_RATIO: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub iterations: usize,
    pub max_workers: usize,
    /// Wall-clock budget per simulation run
    pub deadline_ms: Option<u64>,
    /// Seed for inputs that carry none. `None` draws one per analysis.
    pub default_seed: Option<u64>,
    pub partial_success_ratio: f64,
    pub impossible_ratio: f64,
    pub percentiles: Vec<u8>,
    pub market: MarketContext,
    pub distribution: ReturnDistribution,
    pub cache: CacheConfig,
    pub scenarios: ScenarioConfig,
    /// Reference date for date timeframes, today when unset
    pub as_of: Option<Date>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            max_workers: default_workers(),
            deadline_ms: None,
            default_seed: Some(DEFAULT_SEED),
            partial_success_ratio: DEFAULT_PARTIAL_SUCCESS_RATIO,
            impossible_ratio: DEFAULT_IMPOSSIBLE_RATIO,
            percentiles: STANDARD_PERCENTILES.to_vec(),
            market: MarketContext::default(),
            distribution: ReturnDistribution::default(),
            cache: CacheConfig::default(),
            scenarios: ScenarioConfig::default(),
            as_of: None,
        }
    }
}

impl AnalyzerConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    pub fn result_policy(&self) -> ResultPolicy {
        ResultPolicy {
            impossible_ratio: self.impossible_ratio,
            percentiles: self.percentiles.clone(),
        }
    }

    /// `as_of`, or the current local date
    pub fn reference_date(&self) -> Date {
        self.as_of.unwrap_or_else(|| jiff::Zoned::now().date())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_size: usize,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }
}

/// Which what-if adjustments to try and how to evaluate them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Timeline extensions, in months
    pub extend_months: Vec<u32>,
    /// Fractional increases of the monthly contribution
    pub contribution_increases: Vec<f64>,
    /// Equity shift in percentage points (as a fraction), applied both ways
    pub equity_shift: f64,
    /// Fractional reductions of the target
    pub target_reductions: Vec<f64>,
    /// Iterations per re-simulated scenario; base / 4 when unset
    pub scenario_iterations: Option<usize>,
    pub min_scenario_iterations: usize,
    /// Re-simulate only while `iterations * years` stays within this
    /// budget, otherwise use the analytic estimate
    pub rerun_budget: usize,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            extend_months: vec![12, 24],
            contribution_increases: vec![0.10, 0.25],
            equity_shift: 0.10,
            target_reductions: vec![0.10, 0.20],
            scenario_iterations: None,
            min_scenario_iterations: 200,
            rerun_budget: 1_000_000,
        }
    }
}

impl ScenarioConfig {
    pub fn iterations_for(&self, base_iterations: usize) -> usize {
        self.scenario_iterations
            .unwrap_or(base_iterations / 4)
            .max(self.min_scenario_iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: AnalyzerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.iterations, 1000);
        assert_eq!(config.default_seed, Some(42));
        assert_eq!(config.cache, CacheConfig::default());
        assert_eq!(config.percentiles, vec![10, 25, 50, 75, 90]);
        assert!(config.max_workers >= 1);
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let config: AnalyzerConfig =
            serde_json::from_str(r#"{"iterations": 5000, "cache": {"ttl_seconds": 10}}"#).unwrap();
        assert_eq!(config.iterations, 5000);
        assert_eq!(config.cache.ttl_seconds, 10);
        assert_eq!(config.cache.max_size, 100);
        assert_eq!(config.scenarios.extend_months, vec![12, 24]);
    }

    #[test]
    fn test_scenario_iterations() {
        let config = ScenarioConfig::default();
        assert_eq!(config.iterations_for(4000), 1000);
        assert_eq!(config.iterations_for(400), 200);
        let fixed = ScenarioConfig {
            scenario_iterations: Some(300),
            ..Default::default()
        };
        assert_eq!(fixed.iterations_for(4000), 300);
    }
}
