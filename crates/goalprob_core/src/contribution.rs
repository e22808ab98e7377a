//! Yearly contribution amounts.

use serde::{Deserialize, Serialize};

use crate::model::{ContributionFrequency, ContributionPattern};

/// Multipliers applied per contribution frequency.
///
/// They are configuration, not invariants: the host can tune them through
/// `contribution.frequency_factor.*` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyFactors {
    pub monthly: f64,
    pub annual: f64,
    pub lumpsum: f64,
}

impl Default for FrequencyFactors {
    fn default() -> Self {
        Self {
            monthly: 1.0,
            annual: 1.0,
            lumpsum: 1.0,
        }
    }
}

impl FrequencyFactors {
    pub fn factor_for(&self, frequency: ContributionFrequency) -> f64 {
        match frequency {
            ContributionFrequency::Monthly => self.monthly,
            ContributionFrequency::Annual => self.annual,
            ContributionFrequency::Lumpsum => self.lumpsum,
        }
    }
}

pub struct ContributionModel;

impl ContributionModel {
    /// Amount added to the portfolio at the end of simulation year `year`
    /// (0-based).
    #[inline]
    pub fn contribution_for_year(year: u32, pattern: &ContributionPattern) -> f64 {
        if year >= pattern.horizon_years {
            return 0.0;
        }
        if pattern.frequency == ContributionFrequency::Lumpsum && year != pattern.lumpsum_year {
            return 0.0;
        }
        let grown = pattern.annual_amount * (1.0 + pattern.growth_rate).powi(year as i32);
        grown * pattern.frequency_factor
    }

    /// Sum of all scheduled contributions, undiscounted
    pub fn total_contributions(pattern: &ContributionPattern) -> f64 {
        (0..pattern.horizon_years)
            .map(|year| Self::contribution_for_year(year, pattern))
            .sum()
    }
}
