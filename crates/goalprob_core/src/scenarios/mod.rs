//! What-if scenarios for a goal.
//!
//! Each candidate pulls one lever on the goal (more time, more money, a
//! different equity share, a smaller target) and reports how the success
//! probability moves. Candidates are compared against a baseline evaluated
//! the same way and with the same seed, so the delta reflects the lever and
//! not sampling noise.

mod estimate;

use serde::{Deserialize, Serialize};

pub use estimate::{analytic_probability, analytic_success_probability, expected_terminal_value};

use crate::analyzer::GoalProbabilityAnalyzer;
use crate::config::ScenarioConfig;
use crate::error::AnalysisError;
use crate::model::{
    AllocationStrategy, AssetClass, Goal, ProbabilityResult, Profile, RiskProfile,
    SimulationInput, Timeframe,
};

/// The lever a scenario pulls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Adjustment {
    Baseline,
    ExtendTimeline { months: u32 },
    IncreaseContribution { fraction: f64 },
    ShiftEquity { delta: f64 },
    ReduceTarget { fraction: f64 },
}

impl Adjustment {
    /// Relative cost to the user of making this change. One year of delay
    /// or a 10% higher contribution both count as 1.0.
    pub fn effort(&self) -> f64 {
        match *self {
            Adjustment::Baseline => 0.0,
            Adjustment::ExtendTimeline { months } => f64::from(months) / 12.0,
            Adjustment::IncreaseContribution { fraction } => fraction * 10.0,
            Adjustment::ShiftEquity { .. } => 0.5,
            // Giving up part of the goal weighs more than funding it
            Adjustment::ReduceTarget { fraction } => fraction * 15.0,
        }
    }

    pub fn name(&self) -> String {
        match *self {
            Adjustment::Baseline => "baseline".to_string(),
            Adjustment::ExtendTimeline { months } => format!("extend_timeline_{months}m"),
            Adjustment::IncreaseContribution { fraction } => {
                format!("increase_contribution_{}pct", percent(fraction))
            }
            Adjustment::ShiftEquity { delta } if delta >= 0.0 => {
                format!("more_equity_{}pp", percent(delta))
            }
            Adjustment::ShiftEquity { delta } => format!("less_equity_{}pp", percent(-delta)),
            Adjustment::ReduceTarget { fraction } => {
                format!("reduce_target_{}pct", percent(fraction))
            }
        }
    }

    pub fn description(&self) -> String {
        match *self {
            Adjustment::Baseline => "Current plan".to_string(),
            Adjustment::ExtendTimeline { months } => {
                format!("Extend the timeline by {months} months")
            }
            Adjustment::IncreaseContribution { fraction } => {
                format!("Increase contributions by {}%", percent(fraction))
            }
            Adjustment::ShiftEquity { delta } if delta >= 0.0 => {
                format!("Move {} percentage points into equity", percent(delta))
            }
            Adjustment::ShiftEquity { delta } => {
                format!("Move {} percentage points out of equity", percent(-delta))
            }
            Adjustment::ReduceTarget { fraction } => {
                format!("Reduce the target by {}%", percent(fraction))
            }
        }
    }
}

fn percent(fraction: f64) -> i64 {
    (fraction * 100.0).round() as i64
}

/// Fields of the simulation input a scenario changed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_contribution: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation: Option<AllocationStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_amount: Option<f64>,
}

impl ScenarioOverrides {
    fn between(base: &SimulationInput, modified: &SimulationInput) -> Self {
        let changed = |a: f64, b: f64| (a != b).then_some(b);
        Self {
            years: (base.years != modified.years).then_some(modified.years),
            annual_contribution: changed(
                base.contribution_pattern.annual_amount,
                modified.contribution_pattern.annual_amount,
            ),
            allocation: (base.allocation_strategy != modified.allocation_strategy)
                .then(|| modified.allocation_strategy.clone()),
            target_amount: changed(base.target_amount, modified.target_amount),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateMethod {
    ReSimulated,
    Analytic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub adjustment: Adjustment,
    pub parameter_overrides: ScenarioOverrides,
    pub resulting_probability: f64,
    pub probability_delta: f64,
    pub effort: f64,
    pub estimate_method: EstimateMethod,
    pub is_baseline: bool,
}

impl Scenario {
    /// Probability gained per unit of effort
    pub fn score(&self) -> f64 {
        if self.effort > 0.0 {
            self.probability_delta / self.effort
        } else {
            0.0
        }
    }
}

pub struct ScenarioGenerator<'a> {
    analyzer: &'a GoalProbabilityAnalyzer,
    config: ScenarioConfig,
}

impl<'a> ScenarioGenerator<'a> {
    #[must_use]
    pub fn new(analyzer: &'a GoalProbabilityAnalyzer) -> Self {
        Self {
            config: analyzer.config().scenarios.clone(),
            analyzer,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ScenarioConfig) -> Self {
        self.config = config;
        self
    }

    /// Candidate adjustments for `goal`, before evaluation
    pub fn candidates(&self, goal: &Goal, profile: Option<&Profile>) -> Vec<Adjustment> {
        let mut out = Vec::new();
        for &months in &self.config.extend_months {
            if months > 0 {
                out.push(Adjustment::ExtendTimeline { months });
            }
        }
        let contributes = goal.monthly_contribution > 0.0 || goal.lumpsum_amount.is_some_and(|a| a > 0.0);
        if contributes {
            for &fraction in &self.config.contribution_increases {
                if fraction > 0.0 {
                    out.push(Adjustment::IncreaseContribution { fraction });
                }
            }
        }
        let shift = self.config.equity_shift;
        if shift > 0.0 {
            let equity = equity_weight(goal);
            let conservative =
                profile.and_then(|p| p.risk_profile) == Some(RiskProfile::Conservative);
            if equity < 1.0 && !conservative {
                out.push(Adjustment::ShiftEquity { delta: shift });
            }
            if equity > 0.0 {
                out.push(Adjustment::ShiftEquity { delta: -shift });
            }
        }
        for &fraction in &self.config.target_reductions {
            if fraction > 0.0 && fraction < 1.0 {
                out.push(Adjustment::ReduceTarget { fraction });
            }
        }
        out
    }

    /// Baseline first, then the evaluated candidates ranked by probability
    /// gained per unit of effort, ties broken by name.
    pub fn generate_scenarios(
        &self,
        goal: &Goal,
        profile: Option<&Profile>,
        base_result: &ProbabilityResult,
    ) -> Result<Vec<Scenario>, AnalysisError> {
        let seed = self
            .analyzer
            .config()
            .default_seed
            .unwrap_or_else(rand::random);
        let (base_input, _) = self.analyzer.prepare(goal, profile, Some(seed))?;
        let iterations = self.config.iterations_for(base_result.iteration_count());
        let reference = self.evaluate(&base_input.with_iterations(iterations));

        let mut scenarios = Vec::new();
        for adjustment in self.candidates(goal, profile) {
            let modified_goal = apply(goal, adjustment);
            let (input, _) = self.analyzer.prepare(&modified_goal, profile, Some(seed))?;
            let input = input.with_iterations(iterations);
            let (probability, method) = self.evaluate(&input);

            // Compare like with like
            let baseline_probability = match (method, reference.1) {
                (EstimateMethod::ReSimulated, EstimateMethod::ReSimulated) => reference.0,
                _ => analytic_success_probability(&base_input),
            };
            let overrides = ScenarioOverrides::between(&base_input, &input);
            scenarios.push(Scenario {
                name: adjustment.name(),
                description: adjustment.description(),
                adjustment,
                parameter_overrides: overrides,
                resulting_probability: probability,
                probability_delta: probability - baseline_probability,
                effort: adjustment.effort(),
                estimate_method: method,
                is_baseline: false,
            });
        }

        scenarios.sort_by(|a, b| {
            b.score()
                .total_cmp(&a.score())
                .then_with(|| a.name.cmp(&b.name))
        });

        let baseline = Scenario {
            name: Adjustment::Baseline.name(),
            description: Adjustment::Baseline.description(),
            adjustment: Adjustment::Baseline,
            parameter_overrides: ScenarioOverrides::default(),
            resulting_probability: base_result.success_probability(),
            probability_delta: 0.0,
            effort: 0.0,
            estimate_method: EstimateMethod::ReSimulated,
            is_baseline: true,
        };
        scenarios.insert(0, baseline);

        tracing::info!(goal = %goal.id, scenarios = scenarios.len(), "Generated scenarios");
        Ok(scenarios)
    }

    fn evaluate(&self, input: &SimulationInput) -> (f64, EstimateMethod) {
        let work = input
            .iteration_count
            .saturating_mul(input.years.max(1) as usize);
        if work <= self.config.rerun_budget {
            match self.analyzer.simulate(input) {
                Ok(run) => return (run.result.success_probability(), EstimateMethod::ReSimulated),
                Err(err) => tracing::warn!(
                    error = %err,
                    "Scenario re-simulation failed, using analytic estimate"
                ),
            }
        }
        (analytic_success_probability(input), EstimateMethod::Analytic)
    }
}

fn equity_weight(goal: &Goal) -> f64 {
    goal.allocation
        .iter()
        .filter(|(name, _)| name.parse::<AssetClass>() == Ok(AssetClass::Equity))
        .map(|(_, w)| *w)
        .sum()
}

/// Goal with one adjustment applied
fn apply(goal: &Goal, adjustment: Adjustment) -> Goal {
    let mut goal = goal.clone();
    match adjustment {
        Adjustment::Baseline => {}
        Adjustment::ExtendTimeline { months } => {
            goal.timeframe = match goal.timeframe {
                Timeframe::Years(years) => Timeframe::Years(years + months.div_ceil(12)),
                Timeframe::Date(date) => date
                    .checked_add(jiff::Span::new().months(i64::from(months)))
                    .map_or(Timeframe::Date(date), Timeframe::Date),
            };
        }
        Adjustment::IncreaseContribution { fraction } => {
            goal.monthly_contribution *= 1.0 + fraction;
            goal.lumpsum_amount = goal.lumpsum_amount.map(|a| a * (1.0 + fraction));
        }
        Adjustment::ShiftEquity { delta } => shift_equity(&mut goal, delta),
        Adjustment::ReduceTarget { fraction } => {
            goal.target_amount *= 1.0 - fraction;
        }
    }
    goal
}

/// Move `delta` of weight into (or out of) equity, scaling the other classes
/// so the total stays the same.
fn shift_equity(goal: &mut Goal, delta: f64) {
    let total: f64 = goal.allocation.values().sum();
    let equity_key = goal
        .allocation
        .keys()
        .find(|name| name.parse::<AssetClass>() == Ok(AssetClass::Equity))
        .cloned()
        .unwrap_or_else(|| AssetClass::Equity.as_str().to_string());

    let equity = goal.allocation.get(&equity_key).copied().unwrap_or(0.0);
    let new_equity = (equity + delta).clamp(0.0, total);
    let rest_before = total - equity;
    let rest_after = total - new_equity;

    if rest_before > 0.0 {
        let scale = rest_after / rest_before;
        for (name, weight) in goal.allocation.iter_mut() {
            if *name != equity_key {
                *weight *= scale;
            }
        }
    } else if rest_after > 0.0 {
        let debt = AssetClass::Debt.as_str().to_string();
        *goal.allocation.entry(debt).or_insert(0.0) += rest_after;
    }
    goal.allocation.insert(equity_key, new_equity);
}
