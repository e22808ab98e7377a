//! JSON views printed by the CLI

use goalprob_core::GoalAnalysis;
use goalprob_core::model::ResultSummary;
use goalprob_core::scenarios::{EstimateMethod, Scenario, ScenarioOverrides};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub goal_id: String,
    pub cache_key: String,
    pub from_cache: bool,
    #[serde(flatten)]
    pub summary: ResultSummary,
    pub years: u32,
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sustainable_income: Option<f64>,
}

impl From<&GoalAnalysis> for AnalysisReport {
    fn from(analysis: &GoalAnalysis) -> Self {
        Self {
            goal_id: analysis.goal_id.clone(),
            cache_key: analysis.cache_key.to_string(),
            from_cache: analysis.from_cache,
            summary: analysis.result.summary(),
            years: analysis.input.years,
            seed: analysis.input.random_seed,
            sustainable_income: analysis.sustainable_income,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioLine {
    pub rank: usize,
    pub name: String,
    pub description: String,
    pub probability: f64,
    pub delta: f64,
    pub effort: f64,
    pub score: f64,
    pub method: EstimateMethod,
    #[serde(skip_serializing_if = "ScenarioOverrides::is_empty")]
    pub overrides: ScenarioOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub base: AnalysisReport,
    pub scenarios: Vec<ScenarioLine>,
}

impl ScenarioReport {
    pub fn new(analysis: &GoalAnalysis, scenarios: &[Scenario]) -> Self {
        let scenarios = scenarios
            .iter()
            .enumerate()
            .map(|(rank, s)| ScenarioLine {
                rank,
                name: s.name.clone(),
                description: s.description.clone(),
                probability: s.resulting_probability,
                delta: s.probability_delta,
                effort: s.effort,
                score: s.score(),
                method: s.estimate_method,
                overrides: s.parameter_overrides.clone(),
            })
            .collect();
        Self {
            base: AnalysisReport::from(analysis),
            scenarios,
        }
    }
}

/// Contents of the persisted snapshot. Hit and miss counters live only
/// for one process and are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheReport {
    pub snapshot: String,
    pub snapshot_exists: bool,
    /// Live entries a new process would start with
    pub entries: usize,
    pub max_size: usize,
}

pub fn to_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}
