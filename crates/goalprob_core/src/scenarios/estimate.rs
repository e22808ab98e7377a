//! Closed-form success estimate for when re-simulation is too expensive.
//!
//! Terminal wealth is approximated as lognormal around the deterministic
//! projection at the portfolio's expected return, with log-variance growing
//! linearly in the horizon. Exact for a single deposit; contributions make
//! it an approximation that errs towards the mean.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::contribution::ContributionModel;
use crate::model::SimulationInput;

/// Deterministic projection at the expected portfolio return
pub fn expected_terminal_value(input: &SimulationInput) -> f64 {
    let growth = input.allocation_strategy.expected_return();
    (0..input.years).fold(input.initial_amount.max(0.0), |balance, year| {
        let contribution = ContributionModel::contribution_for_year(year, &input.contribution_pattern);
        (balance * (1.0 + growth) + contribution).max(0.0)
    })
}

/// Estimated `P(final >= threshold)`
pub fn analytic_probability(input: &SimulationInput, threshold: f64) -> f64 {
    let expected = expected_terminal_value(input);
    if threshold <= 0.0 {
        return 1.0;
    }
    if expected <= 0.0 {
        return 0.0;
    }

    let mean = input.allocation_strategy.expected_return();
    let volatility = input.allocation_strategy.volatility();
    let gross = 1.0 + mean;
    if gross <= 0.0 {
        return 0.0;
    }
    let sigma_sq = (1.0 + (volatility * volatility) / (gross * gross)).ln();
    let variance = sigma_sq * f64::from(input.years);
    if variance <= 0.0 || !variance.is_finite() {
        return if expected >= threshold { 1.0 } else { 0.0 };
    }

    let z = (threshold.ln() - (expected.ln() - variance / 2.0)) / variance.sqrt();
    (1.0 - Normal::standard().cdf(z)).clamp(0.0, 1.0)
}

/// Estimated success probability against the input's target
pub fn analytic_success_probability(input: &SimulationInput) -> f64 {
    analytic_probability(input, input.target_amount)
}
