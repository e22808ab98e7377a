//! Integration tests for the goal probability engine
//!
//! Tests are organized by topic:
//! - `determinism` - Seeding, reproducibility, parallel vs sequential
//! - `probability` - Bounds, monotonicity and the impossible-goal floor
//! - `runner` - Retries, degraded trials, deadlines and cancellation
//! - `cache` - Concurrency, single-flight and snapshots
//! - `analyzer` - Input building, parameters and cache integration
//! - `scenarios` - Candidate evaluation and ranking
//! - `properties` - Property-based checks

mod probability;
mod scenarios;

use std::sync::Arc;

use jiff::Timestamp;
use jiff::civil::date;

use crate::analyzer::GoalProbabilityAnalyzer;
use crate::cache::SimulationCache;
use crate::config::{AnalyzerConfig, GoalBuilder};
use crate::model::{
    AllocationStrategy, AssetAllocation, AssetClass, ContributionFrequency, ContributionPattern,
    Goal, ProbabilityResult, ResultPolicy, ReturnDistribution, RunMetadata, SimulationInput,
};
use crate::runner::Pool;

/// Small fixed result for cache tests
pub(crate) fn sample_result(partial: bool) -> ProbabilityResult {
    let input = simple_input(2, 100.0);
    ProbabilityResult::from_trials(
        vec![vec![100.0, 110.0, 121.0], vec![100.0, 90.0, 81.0]],
        &input,
        &ResultPolicy::default(),
        RunMetadata {
            iteration_count: 2,
            degraded_trial_count: 0,
            partial,
        },
        Timestamp::UNIX_EPOCH,
    )
}

/// Single-asset input with a yearly contribution of 12,000
pub(crate) fn simple_input(years: u32, target_amount: f64) -> SimulationInput {
    SimulationInput {
        initial_amount: 100_000.0,
        years,
        contribution_pattern: ContributionPattern {
            annual_amount: 12_000.0,
            growth_rate: 0.0,
            frequency: ContributionFrequency::Monthly,
            lumpsum_year: 0,
            horizon_years: years,
            frequency_factor: 1.0,
        },
        allocation_strategy: AllocationStrategy::new(vec![
            AssetAllocation {
                asset_class: AssetClass::Equity,
                weight: 0.7,
                mean_return: 0.12,
                volatility: 0.18,
            },
            AssetAllocation {
                asset_class: AssetClass::Debt,
                weight: 0.3,
                mean_return: 0.07,
                volatility: 0.05,
            },
        ]),
        target_amount,
        partial_threshold_ratio: 0.8,
        distribution: ReturnDistribution::LogNormal,
        iteration_count: 500,
        random_seed: Some(42),
    }
}

/// The reference goal: 1 crore in 15 years from 10 lakh and a 20k SIP
pub(crate) fn reference_goal() -> Goal {
    GoalBuilder::new("reference", 10_000_000.0)
        .current(1_000_000.0)
        .monthly(20_000.0)
        .years(15)
        .allocation("equity", 0.6)
        .allocation("debt", 0.3)
        .allocation("gold", 0.1)
        .build()
}

pub(crate) fn test_config() -> AnalyzerConfig {
    AnalyzerConfig {
        iterations: 1000,
        max_workers: 4,
        default_seed: Some(42),
        as_of: Some(date(2025, 1, 1)),
        ..Default::default()
    }
}

pub(crate) fn analyzer_with(config: AnalyzerConfig) -> GoalProbabilityAnalyzer {
    let cache = Arc::new(SimulationCache::new(config.cache.max_size, config.cache.ttl_seconds));
    GoalProbabilityAnalyzer::new(config, cache)
}

pub(crate) fn sequential_analyzer(config: AnalyzerConfig) -> GoalProbabilityAnalyzer {
    analyzer_with(config).with_pool(Pool::sequential())
}
