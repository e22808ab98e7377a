//! Goal analysis façade.
//!
//! Turns a stored goal and profile into a [`SimulationInput`], then answers
//! from the cache or runs the simulation. The seed is fixed before anything
//! stochastic happens and travels inside the input, so the same goal and
//! configuration always map to the same cache key and the same result.

use std::sync::Arc;

use crate::cache::{CacheKey, SimulationCache};
use crate::config::AnalyzerConfig;
use crate::contribution::FrequencyFactors;
use crate::error::{AnalysisError, InvalidGoalInput};
use crate::model::{
    AllocationStrategy, AssetAllocation, AssetClass, ContributionFrequency, ContributionPattern,
    Goal, GoalCategory, MarketContext, ProbabilityResult, Profile, SimulationInput,
};
use crate::parameters::{
    self, FinancialParameterService, ParameterPlan, ResolvedParameters, paths,
};
use crate::returns::{AssetReturnModel, TaxTreatment};
use crate::runner::{ParallelSimulationRunner, Pool, RunOptions, SimulationProgress};

/// Outcome of one analysis
#[derive(Debug, Clone)]
pub struct GoalAnalysis {
    pub goal_id: String,
    pub result: Arc<ProbabilityResult>,
    pub from_cache: bool,
    pub cache_key: CacheKey,
    pub input: SimulationInput,
    /// Annual income the median corpus supports (retirement goals only)
    pub sustainable_income: Option<f64>,
}

/// Result of simulating a prepared input through the cache
#[derive(Debug, Clone)]
pub struct CachedRun {
    pub result: Arc<ProbabilityResult>,
    pub from_cache: bool,
    pub cache_key: CacheKey,
}

pub struct GoalProbabilityAnalyzer {
    config: AnalyzerConfig,
    cache: Arc<SimulationCache>,
    runner: ParallelSimulationRunner,
    parameter_service: Option<Arc<dyn FinancialParameterService>>,
    plan: ParameterPlan,
    progress: Option<SimulationProgress>,
}

impl std::fmt::Debug for GoalProbabilityAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoalProbabilityAnalyzer")
            .field("config", &self.config)
            .field("runner", &self.runner)
            .field("has_parameter_service", &self.parameter_service.is_some())
            .finish_non_exhaustive()
    }
}

impl GoalProbabilityAnalyzer {
    #[must_use]
    pub fn new(config: AnalyzerConfig, cache: Arc<SimulationCache>) -> Self {
        let runner = ParallelSimulationRunner::with_pool(
            Pool::build(config.max_workers),
            config.result_policy(),
        );
        Self {
            config,
            cache,
            runner,
            parameter_service: None,
            plan: ParameterPlan::standard(),
            progress: None,
        }
    }

    #[must_use]
    pub fn with_parameter_service(mut self, service: Arc<dyn FinancialParameterService>) -> Self {
        self.parameter_service = Some(service);
        self
    }

    #[must_use]
    pub fn with_pool(mut self, pool: Pool) -> Self {
        self.runner = ParallelSimulationRunner::with_pool(pool, self.config.result_policy());
        self
    }

    /// Share a progress/cancellation handle with every run
    #[must_use]
    pub fn with_progress(mut self, progress: SimulationProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<SimulationCache> {
        &self.cache
    }

    pub fn runner(&self) -> &ParallelSimulationRunner {
        &self.runner
    }

    pub fn analyze(
        &self,
        goal: &Goal,
        profile: Option<&Profile>,
    ) -> Result<GoalAnalysis, AnalysisError> {
        let seed = self.config.default_seed.unwrap_or_else(rand::random);
        let (input, resolved) = self.prepare(goal, profile, Some(seed))?;
        let run = self.simulate(&input)?;

        let sustainable_income = (goal.category == GoalCategory::Retirement).then(|| {
            let rate = resolved.value_or(paths::WITHDRAWAL_RATE, parameters::DEFAULT_WITHDRAWAL_RATE);
            run.result.median_final() * rate
        });

        tracing::info!(
            goal = %goal.id,
            success = run.result.success_probability(),
            partial_success = run.result.partial_success_probability(),
            from_cache = run.from_cache,
            "Goal analyzed"
        );

        Ok(GoalAnalysis {
            goal_id: goal.id.clone(),
            result: run.result,
            from_cache: run.from_cache,
            cache_key: run.cache_key,
            input,
            sustainable_income,
        })
    }

    /// Validate `goal` and build its simulation input using the configured
    /// seed. Parameters are resolved once.
    pub fn build_input(
        &self,
        goal: &Goal,
        profile: Option<&Profile>,
    ) -> Result<SimulationInput, AnalysisError> {
        self.prepare(goal, profile, self.config.default_seed)
            .map(|(input, _)| input)
    }

    /// Run `input` through the cache. Concurrent identical inputs simulate
    /// once.
    pub fn simulate(&self, input: &SimulationInput) -> Result<CachedRun, AnalysisError> {
        let cache_key = CacheKey::from_input(input);
        let options = RunOptions {
            deadline: self.config.deadline(),
            progress: self.progress.clone(),
        };

        let (result, from_cache) = self.cache.get_or_compute(&cache_key, None, || {
            self.runner.run(input, input.iteration_count, &options)
        })?;

        Ok(CachedRun {
            result,
            from_cache,
            cache_key,
        })
    }

    pub(crate) fn prepare(
        &self,
        goal: &Goal,
        profile: Option<&Profile>,
        seed: Option<u64>,
    ) -> Result<(SimulationInput, ResolvedParameters), AnalysisError> {
        goal.validate()?;
        let years = goal.timeframe.years_from(self.config.reference_date())?;
        if goal.contribution_frequency == ContributionFrequency::Lumpsum
            && years > 0
            && goal.lumpsum_year >= years
        {
            return Err(InvalidGoalInput::LumpsumOutOfRange {
                year: goal.lumpsum_year,
                years,
            }
            .into());
        }

        let profile_id = profile.and_then(|p| p.id.as_deref());
        let resolved = self
            .plan
            .resolve(self.parameter_service.as_deref(), profile_id);

        let input = self.input_from(goal, profile, years, &resolved, seed)?;
        Ok((input, resolved))
    }

    fn input_from(
        &self,
        goal: &Goal,
        profile: Option<&Profile>,
        years: u32,
        resolved: &ResolvedParameters,
        seed: Option<u64>,
    ) -> Result<SimulationInput, AnalysisError> {
        let context = MarketContext {
            locale: profile
                .and_then(|p| p.locale)
                .unwrap_or(self.config.market.locale),
            regime: self.config.market.regime,
        };

        let mut model = AssetReturnModel::new();
        for class in AssetClass::ALL {
            model = model.with_overrides(
                class,
                resolved.get(&paths::asset_return_mean(class)),
                resolved.get(&paths::asset_return_volatility(class)),
            );
        }

        let tax = profile
            .and_then(Profile::effective_tax_bracket)
            .map(|income_tax_rate| TaxTreatment {
                income_tax_rate,
                equity_ltcg_rate: resolved
                    .value_or(paths::EQUITY_LTCG_RATE, parameters::DEFAULT_LTCG_RATE),
                gold_ltcg_rate: resolved
                    .value_or(paths::GOLD_LTCG_RATE, parameters::DEFAULT_LTCG_RATE),
            });

        let mut assets = Vec::with_capacity(goal.allocation.len());
        for (name, &weight) in &goal.allocation {
            let asset_class: AssetClass = name.parse()?;
            if weight == 0.0 {
                continue;
            }
            let mut params = model.get_return_params(asset_class, &context);
            if let Some(tax) = &tax {
                params = tax.after_tax(asset_class, params);
            }
            assets.push(AssetAllocation {
                asset_class,
                weight,
                mean_return: params.mean,
                volatility: params.volatility,
            });
        }

        let factors = FrequencyFactors {
            monthly: resolved.value_or(paths::FREQUENCY_FACTOR_MONTHLY, 1.0),
            annual: resolved.value_or(paths::FREQUENCY_FACTOR_ANNUAL, 1.0),
            lumpsum: resolved.value_or(paths::FREQUENCY_FACTOR_LUMPSUM, 1.0),
        };
        let contribution_pattern = ContributionPattern {
            annual_amount: goal.annual_contribution(),
            growth_rate: goal.contribution_growth_rate.unwrap_or_else(|| {
                resolved.value_or(
                    paths::CONTRIBUTION_GROWTH_RATE,
                    parameters::DEFAULT_CONTRIBUTION_GROWTH,
                )
            }),
            frequency: goal.contribution_frequency,
            lumpsum_year: goal.lumpsum_year,
            horizon_years: years,
            frequency_factor: factors.factor_for(goal.contribution_frequency),
        };

        let target_amount = if goal.adjust_target_for_inflation {
            let inflation =
                resolved.value_or(paths::INFLATION_GENERAL, parameters::DEFAULT_INFLATION);
            goal.target_amount * (1.0 + inflation).powi(years as i32)
        } else {
            goal.target_amount
        };

        let partial_threshold_ratio = resolved
            .value_or(paths::PARTIAL_SUCCESS_RATIO, self.config.partial_success_ratio)
            .clamp(0.0, 1.0);

        Ok(SimulationInput {
            initial_amount: goal.current_amount,
            years,
            contribution_pattern,
            allocation_strategy: AllocationStrategy::new(assets),
            target_amount,
            partial_threshold_ratio,
            distribution: self.config.distribution,
            iteration_count: self.config.iterations,
            random_seed: seed,
        })
    }
}
