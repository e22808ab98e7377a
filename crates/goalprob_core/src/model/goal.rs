//! Goal and profile records consumed read-only by the engine.
//!
//! These mirror what the web layer stores for a user. Nothing here is
//! simulation-ready yet: allocation keys are raw strings and the timeframe
//! may still be a calendar date. The analyzer turns a validated goal into a
//! [`SimulationInput`](super::SimulationInput).

use std::collections::BTreeMap;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::error::InvalidGoalInput;

use super::market::Locale;

/// Tolerance on the sum of allocation weights
pub const ALLOCATION_EPSILON: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalCategory {
    EmergencyFund,
    Retirement,
    Education,
    HomePurchase,
    Wedding,
    Vehicle,
    Travel,
    #[default]
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionFrequency {
    /// Systematic investment plan, paid every month
    #[default]
    Monthly,
    Annual,
    /// Single injection at `Goal::lumpsum_year`
    Lumpsum,
}

/// When the goal is due: a whole number of years or a calendar date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timeframe {
    Years(u32),
    Date(Date),
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::Years(10)
    }
}

impl Timeframe {
    /// Whole years remaining from `as_of`. Partial years round up, so a goal
    /// due in 9 years and 2 months simulates 10 annual steps.
    pub fn years_from(&self, as_of: Date) -> Result<u32, InvalidGoalInput> {
        match *self {
            Timeframe::Years(years) => Ok(years),
            Timeframe::Date(due) => {
                if due < as_of {
                    return Err(InvalidGoalInput::NegativeTimeframe(due));
                }
                let whole = i32::from(due.year() - as_of.year());
                let past_anniversary =
                    (due.month(), due.day()) > (as_of.month(), as_of.day());
                let years = if past_anniversary { whole + 1 } else { whole };
                Ok(years.max(0) as u32)
            }
        }
    }
}

/// A financial goal as stored by the host application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    #[serde(default)]
    pub category: GoalCategory,
    pub target_amount: f64,
    #[serde(default)]
    pub current_amount: f64,
    #[serde(default)]
    pub monthly_contribution: f64,
    #[serde(default)]
    pub timeframe: Timeframe,
    /// Asset class name to weight; weights sum to 1.0
    pub allocation: BTreeMap<String, f64>,
    #[serde(default)]
    pub contribution_frequency: ContributionFrequency,
    /// Size of the single injection for lumpsum goals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lumpsum_amount: Option<f64>,
    #[serde(default)]
    pub lumpsum_year: u32,
    /// Yearly step-up of contributions, overrides `contribution.growth_rate`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contribution_growth_rate: Option<f64>,
    /// Target is in today's money and is inflated to the horizon
    #[serde(default)]
    pub adjust_target_for_inflation: bool,
}

impl Goal {
    /// Check the invariants that do not depend on the calendar.
    pub fn validate(&self) -> Result<(), InvalidGoalInput> {
        if !self.target_amount.is_finite() || self.target_amount <= 0.0 {
            return Err(InvalidGoalInput::NonPositiveTarget(self.target_amount));
        }
        let amounts = [
            ("current_amount", self.current_amount),
            ("monthly_contribution", self.monthly_contribution),
            ("lumpsum_amount", self.lumpsum_amount.unwrap_or(0.0)),
        ];
        for (field, value) in amounts {
            if !value.is_finite() || value < 0.0 {
                return Err(InvalidGoalInput::NegativeAmount { field, value });
            }
        }

        if self.allocation.is_empty() {
            return Err(InvalidGoalInput::EmptyAllocation);
        }
        for (asset_class, &weight) in &self.allocation {
            if !weight.is_finite() || weight < 0.0 {
                return Err(InvalidGoalInput::InvalidWeight {
                    asset_class: asset_class.clone(),
                    weight,
                });
            }
        }
        let total: f64 = self.allocation.values().sum();
        if (total - 1.0).abs() > ALLOCATION_EPSILON {
            return Err(InvalidGoalInput::AllocationSum(total));
        }
        Ok(())
    }

    /// Annual amount fed into the contribution pattern
    pub fn annual_contribution(&self) -> f64 {
        match self.contribution_frequency {
            ContributionFrequency::Monthly | ContributionFrequency::Annual => {
                self.monthly_contribution * 12.0
            }
            ContributionFrequency::Lumpsum => self
                .lumpsum_amount
                .unwrap_or(self.monthly_contribution * 12.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskProfile {
    Conservative,
    Moderate,
    Aggressive,
}

/// User profile. Every field is optional; missing data falls back to
/// defaults instead of failing the analysis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_income: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_profile: Option<RiskProfile>,
    /// Marginal income tax rate (0.0 - 0.5)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_bracket: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<Locale>,
}

impl Profile {
    /// Tax bracket clamped to a sane range; `None` when absent or garbage
    pub fn effective_tax_bracket(&self) -> Option<f64> {
        self.tax_bracket
            .filter(|rate| rate.is_finite())
            .map(|rate| rate.clamp(0.0, 0.5))
    }
}
