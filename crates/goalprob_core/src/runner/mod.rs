//! Fan-out of independent Monte Carlo trials.
//!
//! Trials are grouped into fixed-size batches so that each pool task does a
//! meaningful amount of work. Trial `i` is always seeded from the base seed
//! and its index, never from a shared generator, so the matrix of paths is
//! identical whichever pool runs it and in whatever order batches finish.

mod pool;
mod progress;

use std::time::{Duration, Instant};

use jiff::Timestamp;

pub use pool::{Pool, SequentialPool, WorkerPool, default_workers};
#[cfg(feature = "parallel")]
pub use pool::RayonPool;
pub use progress::SimulationProgress;

use crate::error::{SimulationError, SimulationFailed, TrialError};
use crate::model::{ProbabilityResult, ResultPolicy, RunMetadata, SimulationInput};
use crate::simulation::PathSimulator;

/// Trials per pool task
pub const MAX_BATCH_SIZE: usize = 100;

/// Added to a trial's seed for its single retry
pub const RETRY_SEED_OFFSET: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seed used when an input carries none
pub const FALLBACK_SEED: u64 = 0;

/// Per-run controls
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Wall-clock budget measured from the start of the run
    pub deadline: Option<Duration>,
    pub progress: Option<SimulationProgress>,
}

impl RunOptions {
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: SimulationProgress) -> Self {
        self.progress = Some(progress);
        self
    }
}

enum TrialOutcome {
    Completed(Vec<f64>),
    Failed(TrialError),
    Skipped,
}

#[derive(Debug, Clone)]
pub struct ParallelSimulationRunner {
    pool: Pool,
    policy: ResultPolicy,
}

impl Default for ParallelSimulationRunner {
    fn default() -> Self {
        Self::new(default_workers())
    }
}

impl ParallelSimulationRunner {
    /// Runner over a pool of at most `max_workers` threads
    #[must_use]
    pub fn new(max_workers: usize) -> Self {
        Self::with_pool(Pool::build(max_workers), ResultPolicy::default())
    }

    #[must_use]
    pub fn with_pool(pool: Pool, policy: ResultPolicy) -> Self {
        Self { pool, policy }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ResultPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn policy(&self) -> &ResultPolicy {
        &self.policy
    }

    /// Simulate `iterations` paths for `input` and aggregate them.
    pub fn run(
        &self,
        input: &SimulationInput,
        iterations: usize,
        options: &RunOptions,
    ) -> Result<ProbabilityResult, SimulationError> {
        let simulator = PathSimulator::new(input)?;
        let result = self.run_with(input, iterations, options, |seed| {
            simulator.simulate_path(seed)
        })?;
        Ok(result)
    }

    /// Same as [`run`](Self::run) with a caller-supplied trial function
    /// mapping a seed to a path.
    pub fn run_with<F>(
        &self,
        input: &SimulationInput,
        iterations: usize,
        options: &RunOptions,
        trial: F,
    ) -> Result<ProbabilityResult, SimulationFailed>
    where
        F: Fn(u64) -> Result<Vec<f64>, TrialError> + Send + Sync,
    {
        if iterations == 0 {
            return Err(SimulationFailed {
                attempted: 0,
                reason: "no trials requested".to_string(),
            });
        }

        let started = Instant::now();
        let deadline = options.deadline.map(|d| started + d);
        let progress = options.progress.as_ref();
        let base_seed = input.random_seed.unwrap_or(FALLBACK_SEED);
        let num_batches = iterations.div_ceil(MAX_BATCH_SIZE);

        tracing::info!(
            iterations,
            years = input.years,
            pool = self.pool.name(),
            workers = self.pool.workers(),
            "Starting Monte Carlo run"
        );

        let should_stop = || {
            deadline.is_some_and(|d| Instant::now() >= d)
                || progress.is_some_and(SimulationProgress::is_cancelled)
        };

        let batches = self.pool.map_indexed(num_batches, |batch| {
            let start = batch * MAX_BATCH_SIZE;
            let end = (start + MAX_BATCH_SIZE).min(iterations);

            (start..end)
                .map(|i| {
                    if should_stop() {
                        return TrialOutcome::Skipped;
                    }
                    let seed = base_seed.wrapping_add(i as u64);
                    let outcome = match trial(seed) {
                        Ok(path) => TrialOutcome::Completed(path),
                        Err(_) => match trial(seed.wrapping_add(RETRY_SEED_OFFSET)) {
                            Ok(path) => TrialOutcome::Completed(path),
                            Err(err) => TrialOutcome::Failed(err),
                        },
                    };
                    if let Some(progress) = progress {
                        progress.increment();
                    }
                    outcome
                })
                .collect::<Vec<_>>()
        });

        let mut paths = Vec::with_capacity(iterations);
        let mut degraded = 0;
        let mut skipped = 0;
        let mut last_error = None;
        for outcome in batches.into_iter().flatten() {
            match outcome {
                TrialOutcome::Completed(path) => paths.push(path),
                TrialOutcome::Failed(err) => {
                    degraded += 1;
                    last_error = Some(err);
                }
                TrialOutcome::Skipped => skipped += 1,
            }
        }

        if degraded > 0 {
            tracing::warn!(
                degraded,
                iterations,
                error = ?last_error,
                "Trials failed twice and were excluded"
            );
        }

        if paths.is_empty() {
            let reason = match last_error {
                Some(err) => err.to_string(),
                None => "stopped before any trial completed".to_string(),
            };
            return Err(SimulationFailed {
                attempted: iterations - skipped,
                reason,
            });
        }

        let partial = skipped > 0;
        if partial {
            tracing::warn!(
                completed = paths.len(),
                skipped,
                "Run stopped early, result is partial"
            );
        }

        let meta = RunMetadata {
            iteration_count: iterations,
            degraded_trial_count: degraded,
            partial,
        };
        let result =
            ProbabilityResult::from_trials(paths, input, &self.policy, meta, Timestamp::now());

        tracing::info!(
            iterations,
            completed = result.completed_trials(),
            success = result.success_probability(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Monte Carlo run finished"
        );

        Ok(result)
    }
}
