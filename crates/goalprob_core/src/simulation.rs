use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::contribution::ContributionModel;
use crate::error::{SimulationError, TrialError};
use crate::model::{ReturnSampler, SimulationInput};

/// Single-path simulator with samplers prebuilt for one input.
///
/// Build once per analysis, then call [`simulate_path`](Self::simulate_path)
/// for every trial. Holds no mutable state, so one instance is shared by
/// all workers.
#[derive(Debug, Clone)]
pub struct PathSimulator<'a> {
    input: &'a SimulationInput,
    samplers: Vec<(f64, ReturnSampler)>,
}

impl<'a> PathSimulator<'a> {
    pub fn new(input: &'a SimulationInput) -> Result<Self, SimulationError> {
        let samplers = input
            .allocation_strategy
            .assets()
            .iter()
            .map(|asset| {
                input
                    .distribution
                    .sampler(asset.asset_class, asset.mean_return, asset.volatility)
                    .map(|sampler| (asset.weight, sampler))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { input, samplers })
    }

    pub fn input(&self) -> &SimulationInput {
        self.input
    }

    /// Portfolio value at the start and at the end of each year
    /// (`years + 1` values). The same seed always yields the same path.
    pub fn simulate_path(&self, seed: u64) -> Result<Vec<f64>, TrialError> {
        let input = self.input;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut path = Vec::with_capacity(input.years as usize + 1);

        let mut balance = input.initial_amount.max(0.0);
        path.push(balance);

        for year in 0..input.years {
            // One independent draw per asset class per year
            let blended: f64 = self
                .samplers
                .iter()
                .map(|(weight, sampler)| weight * sampler.sample(&mut rng))
                .sum();
            let contribution =
                ContributionModel::contribution_for_year(year, &input.contribution_pattern);

            balance = (balance * (1.0 + blended) + contribution).max(0.0);
            if !balance.is_finite() {
                return Err(TrialError::NonFinite { year: year + 1 });
            }
            path.push(balance);
        }

        Ok(path)
    }
}

/// Build a simulator for `input` and run one path
pub fn simulate_path(input: &SimulationInput, seed: u64) -> Result<Vec<f64>, SimulationError> {
    let simulator = PathSimulator::new(input)?;
    simulator.simulate_path(seed).map_err(|err| {
        SimulationError::Failed(crate::error::SimulationFailed {
            attempted: 1,
            reason: err.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AllocationStrategy, AssetAllocation, AssetClass, ContributionFrequency,
        ContributionPattern, ReturnDistribution,
    };

    fn input(mean: f64, volatility: f64) -> SimulationInput {
        SimulationInput {
            initial_amount: 100_000.0,
            years: 10,
            contribution_pattern: ContributionPattern {
                annual_amount: 12_000.0,
                growth_rate: 0.0,
                frequency: ContributionFrequency::Monthly,
                lumpsum_year: 0,
                horizon_years: 10,
                frequency_factor: 1.0,
            },
            allocation_strategy: AllocationStrategy::new(vec![AssetAllocation {
                asset_class: AssetClass::Equity,
                weight: 1.0,
                mean_return: mean,
                volatility,
            }]),
            target_amount: 500_000.0,
            partial_threshold_ratio: 0.8,
            distribution: ReturnDistribution::LogNormal,
            iteration_count: 100,
            random_seed: Some(42),
        }
    }

    #[test]
    fn test_path_length_and_start() {
        let input = input(0.1, 0.2);
        let path = simulate_path(&input, 1).unwrap();
        assert_eq!(path.len(), 11);
        assert_eq!(path[0], 100_000.0);
    }

    #[test]
    fn test_same_seed_same_path() {
        let input = input(0.1, 0.2);
        let sim = PathSimulator::new(&input).unwrap();
        let a = sim.simulate_path(99).unwrap();
        let b = sim.simulate_path(99).unwrap();
        assert_eq!(a, b);
        let c = sim.simulate_path(100).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_deterministic_growth_matches_closed_form() {
        // Zero volatility: balance_{t+1} = balance_t * 1.08 + 12_000
        let input = input(0.08, 0.0);
        let path = simulate_path(&input, 7).unwrap();

        let mut expected = 100_000.0;
        for value in path.iter().skip(1) {
            expected = expected * 1.08 + 12_000.0;
            assert!((value - expected).abs() < 1e-6, "{value} vs {expected}");
        }
    }

    #[test]
    fn test_value_floored_at_zero() {
        let mut input = input(-0.5, 0.9);
        input.distribution = ReturnDistribution::Normal;
        input.contribution_pattern = ContributionPattern::none();
        let sim = PathSimulator::new(&input).unwrap();
        for seed in 0..50 {
            let path = sim.simulate_path(seed).unwrap();
            assert!(path.iter().all(|v| *v >= 0.0));
        }
    }

    #[test]
    fn test_zero_years() {
        let mut input = input(0.1, 0.2);
        input.years = 0;
        assert_eq!(simulate_path(&input, 3).unwrap(), vec![100_000.0]);
    }

    #[test]
    fn test_overflow_reports_non_finite() {
        let mut input = input(0.1, 0.2);
        input.initial_amount = f64::MAX;
        input.distribution = ReturnDistribution::Normal;
        input.allocation_strategy = AllocationStrategy::new(vec![AssetAllocation {
            asset_class: AssetClass::Equity,
            weight: 1.0,
            mean_return: 10.0,
            volatility: 0.0,
        }]);
        let sim = PathSimulator::new(&input).unwrap();
        assert_eq!(sim.simulate_path(1), Err(TrialError::NonFinite { year: 1 }));
    }

    #[test]
    fn test_invalid_distribution_rejected_up_front() {
        let input = input(-2.0, 0.2);
        assert!(matches!(
            PathSimulator::new(&input),
            Err(SimulationError::InvalidDistribution { .. })
        ));
    }
}
