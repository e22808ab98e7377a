//! Simulation-ready snapshot of a goal.
//!
//! Everything that affects simulation output lives here, and only that:
//! the cache key is derived from this struct, so two goals with the same
//! financial parameters share cached results.

use serde::{Deserialize, Serialize};

use super::goal::ContributionFrequency;
use super::market::{AssetClass, ReturnDistribution};

/// How much is contributed each simulated year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionPattern {
    /// Base contribution for year 0
    pub annual_amount: f64,
    /// Yearly step-up applied as `(1 + growth_rate)^year`
    pub growth_rate: f64,
    pub frequency: ContributionFrequency,
    /// Year of the single injection when `frequency` is `Lumpsum`
    #[serde(default)]
    pub lumpsum_year: u32,
    /// Contributions stop at this year (exclusive)
    pub horizon_years: u32,
    /// Multiplier for the frequency, from `contribution.frequency_factor.*`
    pub frequency_factor: f64,
}

impl ContributionPattern {
    /// A pattern that never contributes
    pub fn none() -> Self {
        Self {
            annual_amount: 0.0,
            growth_rate: 0.0,
            frequency: ContributionFrequency::Annual,
            lumpsum_year: 0,
            horizon_years: 0,
            frequency_factor: 1.0,
        }
    }
}

/// One asset class in the portfolio with its return assumptions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetAllocation {
    pub asset_class: AssetClass,
    pub weight: f64,
    pub mean_return: f64,
    pub volatility: f64,
}

/// Weighted portfolio, ordered by asset class
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AllocationStrategy {
    assets: Vec<AssetAllocation>,
}

impl AllocationStrategy {
    /// Sorts by asset class and merges duplicates so equal portfolios
    /// compare (and hash) equal regardless of input order.
    pub fn new(mut assets: Vec<AssetAllocation>) -> Self {
        assets.sort_by_key(|a| a.asset_class);
        let mut merged: Vec<AssetAllocation> = Vec::with_capacity(assets.len());
        for asset in assets {
            match merged.last_mut() {
                Some(last) if last.asset_class == asset.asset_class => last.weight += asset.weight,
                _ => merged.push(asset),
            }
        }
        Self { assets: merged }
    }

    pub fn assets(&self) -> &[AssetAllocation] {
        &self.assets
    }

    pub fn weight_of(&self, asset_class: AssetClass) -> f64 {
        self.assets
            .iter()
            .find(|a| a.asset_class == asset_class)
            .map_or(0.0, |a| a.weight)
    }

    /// Weighted arithmetic mean return
    pub fn expected_return(&self) -> f64 {
        self.assets.iter().map(|a| a.weight * a.mean_return).sum()
    }

    /// Portfolio volatility assuming independent asset classes
    pub fn volatility(&self) -> f64 {
        self.assets
            .iter()
            .map(|a| (a.weight * a.volatility).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// Immutable input for one Monte Carlo analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationInput {
    pub initial_amount: f64,
    pub years: u32,
    pub contribution_pattern: ContributionPattern,
    pub allocation_strategy: AllocationStrategy,
    /// Nominal amount required at the horizon
    pub target_amount: f64,
    /// Fraction of the target counted as partial success
    pub partial_threshold_ratio: f64,
    #[serde(default)]
    pub distribution: ReturnDistribution,
    pub iteration_count: usize,
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl SimulationInput {
    pub fn partial_threshold(&self) -> f64 {
        self.target_amount * self.partial_threshold_ratio
    }

    /// Copy with a different iteration count (scenario re-runs)
    #[must_use]
    pub fn with_iterations(&self, iteration_count: usize) -> Self {
        Self {
            iteration_count,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(asset_class: AssetClass, weight: f64) -> AssetAllocation {
        AssetAllocation {
            asset_class,
            weight,
            mean_return: 0.1,
            volatility: 0.2,
        }
    }

    #[test]
    fn test_allocation_is_order_independent() {
        let a = AllocationStrategy::new(vec![
            asset(AssetClass::Gold, 0.1),
            asset(AssetClass::Equity, 0.9),
        ]);
        let b = AllocationStrategy::new(vec![
            asset(AssetClass::Equity, 0.9),
            asset(AssetClass::Gold, 0.1),
        ]);
        assert_eq!(a, b);
        assert_eq!(a.assets()[0].asset_class, AssetClass::Equity);
    }

    #[test]
    fn test_allocation_merges_duplicates() {
        let strategy = AllocationStrategy::new(vec![
            asset(AssetClass::Debt, 0.25),
            asset(AssetClass::Debt, 0.25),
            asset(AssetClass::Equity, 0.5),
        ]);
        assert_eq!(strategy.assets().len(), 2);
        assert!((strategy.weight_of(AssetClass::Debt) - 0.5).abs() < 1e-12);
        assert_eq!(strategy.weight_of(AssetClass::Gold), 0.0);
    }

    #[test]
    fn test_portfolio_moments() {
        let strategy = AllocationStrategy::new(vec![
            AssetAllocation {
                asset_class: AssetClass::Equity,
                weight: 0.5,
                mean_return: 0.12,
                volatility: 0.2,
            },
            AssetAllocation {
                asset_class: AssetClass::Debt,
                weight: 0.5,
                mean_return: 0.06,
                volatility: 0.0,
            },
        ]);
        assert!((strategy.expected_return() - 0.09).abs() < 1e-12);
        assert!((strategy.volatility() - 0.1).abs() < 1e-12);
    }
}
