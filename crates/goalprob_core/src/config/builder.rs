//! Goal Builder DSL

use std::collections::BTreeMap;

use jiff::civil::Date;

use crate::model::{ContributionFrequency, Goal, GoalCategory, Timeframe};

/// Fluent construction of a [`Goal`]. Nothing is validated until analysis.
#[derive(Debug, Clone)]
pub struct GoalBuilder {
    goal: Goal,
}

impl GoalBuilder {
    #[must_use]
    pub fn new(id: impl Into<String>, target_amount: f64) -> Self {
        Self {
            goal: Goal {
                id: id.into(),
                category: GoalCategory::default(),
                target_amount,
                current_amount: 0.0,
                monthly_contribution: 0.0,
                timeframe: Timeframe::default(),
                allocation: BTreeMap::new(),
                contribution_frequency: ContributionFrequency::Monthly,
                lumpsum_amount: None,
                lumpsum_year: 0,
                contribution_growth_rate: None,
                adjust_target_for_inflation: false,
            },
        }
    }

    // =========================================================================
    // Presets
    // =========================================================================

    /// Retirement corpus, equity heavy
    #[must_use]
    pub fn retirement(id: impl Into<String>, target_amount: f64, years: u32) -> Self {
        Self::new(id, target_amount)
            .category(GoalCategory::Retirement)
            .years(years)
            .allocation("equity", 0.7)
            .allocation("debt", 0.3)
    }

    /// Emergency fund: short horizon, debt and cash
    #[must_use]
    pub fn emergency_fund(id: impl Into<String>, target_amount: f64) -> Self {
        Self::new(id, target_amount)
            .category(GoalCategory::EmergencyFund)
            .years(1)
            .allocation("debt", 0.5)
            .allocation("cash", 0.5)
    }

    // =========================================================================
    // Fields
    // =========================================================================

    #[must_use]
    pub fn category(mut self, category: GoalCategory) -> Self {
        self.goal.category = category;
        self
    }

    #[must_use]
    pub fn current(mut self, amount: f64) -> Self {
        self.goal.current_amount = amount;
        self
    }

    #[must_use]
    pub fn monthly(mut self, amount: f64) -> Self {
        self.goal.monthly_contribution = amount;
        self.goal.contribution_frequency = ContributionFrequency::Monthly;
        self
    }

    /// Same yearly total as [`monthly`](Self::monthly), paid once a year
    #[must_use]
    pub fn annual(mut self, monthly_equivalent: f64) -> Self {
        self.goal.monthly_contribution = monthly_equivalent;
        self.goal.contribution_frequency = ContributionFrequency::Annual;
        self
    }

    #[must_use]
    pub fn lumpsum(mut self, amount: f64, year: u32) -> Self {
        self.goal.contribution_frequency = ContributionFrequency::Lumpsum;
        self.goal.lumpsum_amount = Some(amount);
        self.goal.lumpsum_year = year;
        self
    }

    #[must_use]
    pub fn years(mut self, years: u32) -> Self {
        self.goal.timeframe = Timeframe::Years(years);
        self
    }

    #[must_use]
    pub fn due(mut self, date: Date) -> Self {
        self.goal.timeframe = Timeframe::Date(date);
        self
    }

    /// Add (or replace) the weight of one asset class
    #[must_use]
    pub fn allocation(mut self, asset_class: impl Into<String>, weight: f64) -> Self {
        self.goal.allocation.insert(asset_class.into(), weight);
        self
    }

    #[must_use]
    pub fn growth_rate(mut self, rate: f64) -> Self {
        self.goal.contribution_growth_rate = Some(rate);
        self
    }

    #[must_use]
    pub fn inflation_adjusted(mut self) -> Self {
        self.goal.adjust_target_for_inflation = true;
        self
    }

    #[must_use]
    pub fn build(self) -> Goal {
        self.goal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_fields() {
        let goal = GoalBuilder::new("g", 1_000.0)
            .current(100.0)
            .monthly(10.0)
            .years(3)
            .allocation("equity", 0.5)
            .allocation("debt", 0.5)
            .build();
        assert_eq!(goal.id, "g");
        assert_eq!(goal.timeframe, Timeframe::Years(3));
        assert_eq!(goal.allocation.len(), 2);
        assert!(goal.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(GoalBuilder::retirement("r", 1e7, 25).build().validate().is_ok());
        let fund = GoalBuilder::emergency_fund("e", 5e5).build();
        assert_eq!(fund.category, GoalCategory::EmergencyFund);
        assert!(fund.validate().is_ok());
    }

    #[test]
    fn test_lumpsum_sets_frequency() {
        let goal = GoalBuilder::new("l", 1e6).lumpsum(2e5, 2).build();
        assert_eq!(goal.contribution_frequency, ContributionFrequency::Lumpsum);
        assert_eq!(goal.annual_contribution(), 2e5);
    }
}
