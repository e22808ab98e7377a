//! Aggregate output of a Monte Carlo run.
//!
//! A [`ProbabilityResult`] is built once from the raw trial matrix and never
//! mutated. Adjusted analyses produce new results.

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::stats::{self, STANDARD_PERCENTILES};

use super::input::SimulationInput;

/// Knobs for turning trial paths into probabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPolicy {
    /// If the 90th percentile final value is below this fraction of a
    /// threshold, the probability for that threshold is floored to 0.0.
    pub impossible_ratio: f64,
    pub percentiles: Vec<u8>,
}

impl Default for ResultPolicy {
    fn default() -> Self {
        Self {
            impossible_ratio: 0.5,
            percentiles: STANDARD_PERCENTILES.to_vec(),
        }
    }
}

/// Bookkeeping from the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunMetadata {
    /// Trials requested
    pub iteration_count: usize,
    /// Trials that failed twice and were excluded
    pub degraded_trial_count: usize,
    /// Run was cut short by a deadline or cancellation
    pub partial: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityResult {
    all_projections: Vec<Vec<f64>>,
    percentiles: BTreeMap<u8, Vec<f64>>,
    success_probability: f64,
    partial_success_probability: f64,
    computed_at: Timestamp,
    iteration_count: usize,
    completed_trials: usize,
    degraded_trial_count: usize,
    partial: bool,
    floored: bool,
    target_amount: f64,
    partial_threshold: f64,
}

impl ProbabilityResult {
    /// Aggregate completed trial paths. Each path holds `years + 1` values.
    pub fn from_trials(
        paths: Vec<Vec<f64>>,
        input: &SimulationInput,
        policy: &ResultPolicy,
        meta: RunMetadata,
        computed_at: Timestamp,
    ) -> Self {
        let target_amount = input.target_amount;
        let partial_threshold = input.partial_threshold();

        let mut finals: Vec<f64> = paths
            .iter()
            .map(|p| p.last().copied().unwrap_or(0.0))
            .collect();
        stats::sort_values(&mut finals);

        let mut success = stats::fraction_at_least(&finals, target_amount);
        let mut partial_success = stats::fraction_at_least(&finals, partial_threshold);

        // Sampling noise in the far tail should not show up as a small
        // positive chance for a goal no plausible path approaches.
        let p90_final = stats::percentile(&finals, 90.0);
        let mut floored = false;
        if p90_final < policy.impossible_ratio * target_amount {
            floored |= success > 0.0;
            success = 0.0;
        }
        if p90_final < policy.impossible_ratio * partial_threshold {
            floored |= partial_success > 0.0;
            partial_success = 0.0;
        }
        let success = success.clamp(0.0, 1.0);
        let partial_success = partial_success.max(success).clamp(0.0, 1.0);

        let percentiles = percentile_bands(&paths, &policy.percentiles);

        Self {
            completed_trials: paths.len(),
            all_projections: paths,
            percentiles,
            success_probability: success,
            partial_success_probability: partial_success,
            computed_at,
            iteration_count: meta.iteration_count,
            degraded_trial_count: meta.degraded_trial_count,
            partial: meta.partial,
            floored,
            target_amount,
            partial_threshold,
        }
    }

    pub fn all_projections(&self) -> &[Vec<f64>] {
        &self.all_projections
    }

    /// Percentile → value-at-year series
    pub fn percentiles(&self) -> &BTreeMap<u8, Vec<f64>> {
        &self.percentiles
    }

    pub fn success_probability(&self) -> f64 {
        self.success_probability
    }

    pub fn partial_success_probability(&self) -> f64 {
        self.partial_success_probability
    }

    pub fn computed_at(&self) -> Timestamp {
        self.computed_at
    }

    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    pub fn completed_trials(&self) -> usize {
        self.completed_trials
    }

    pub fn degraded_trial_count(&self) -> usize {
        self.degraded_trial_count
    }

    /// Deadline or cancellation cut the run short
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Some trials were excluded after failing twice
    pub fn is_degraded(&self) -> bool {
        self.degraded_trial_count > 0
    }

    /// The impossible-goal floor zeroed out a probability
    pub fn is_floored(&self) -> bool {
        self.floored
    }

    pub fn target_amount(&self) -> f64 {
        self.target_amount
    }

    pub fn partial_threshold(&self) -> f64 {
        self.partial_threshold
    }

    /// Number of simulated years (series length minus one)
    pub fn years(&self) -> usize {
        self.all_projections
            .first()
            .map_or(0, |p| p.len().saturating_sub(1))
    }

    /// Terminal value of every completed trial, in trial order
    pub fn final_values(&self) -> Vec<f64> {
        self.all_projections
            .iter()
            .map(|p| p.last().copied().unwrap_or(0.0))
            .collect()
    }

    /// Final-year value at a reported percentile
    pub fn percentile_final(&self, p: u8) -> Option<f64> {
        self.percentiles.get(&p).and_then(|s| s.last().copied())
    }

    /// Median terminal value, computed directly when 50 is not a reported band
    pub fn median_final(&self) -> f64 {
        self.percentile_final(50).unwrap_or_else(|| {
            let mut finals = self.final_values();
            stats::percentile_of(&mut finals, 50.0)
        })
    }

    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            success_probability: self.success_probability,
            partial_success_probability: self.partial_success_probability,
            final_percentiles: self
                .percentiles
                .iter()
                .filter_map(|(p, series)| series.last().map(|v| (*p, *v)))
                .collect(),
            computed_at: self.computed_at,
            iteration_count: self.iteration_count,
            completed_trials: self.completed_trials,
            degraded_trial_count: self.degraded_trial_count,
            partial: self.partial,
            target_amount: self.target_amount,
        }
    }
}

/// Compact, serializable view without the trial matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub success_probability: f64,
    pub partial_success_probability: f64,
    pub final_percentiles: BTreeMap<u8, f64>,
    pub computed_at: Timestamp,
    pub iteration_count: usize,
    pub completed_trials: usize,
    pub degraded_trial_count: usize,
    pub partial: bool,
    pub target_amount: f64,
}

/// Per-year percentile series across trials
fn percentile_bands(paths: &[Vec<f64>], percentiles: &[u8]) -> BTreeMap<u8, Vec<f64>> {
    let len = paths.iter().map(Vec::len).min().unwrap_or(0);
    let mut bands: BTreeMap<u8, Vec<f64>> = percentiles
        .iter()
        .map(|p| (*p, Vec::with_capacity(len)))
        .collect();

    let mut column = Vec::with_capacity(paths.len());
    for year in 0..len {
        column.clear();
        column.extend(paths.iter().map(|p| p[year]));
        stats::sort_values(&mut column);
        for (p, series) in bands.iter_mut() {
            series.push(stats::percentile(&column, f64::from(*p)));
        }
    }
    bands
}
