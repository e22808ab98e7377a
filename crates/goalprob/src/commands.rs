//! Command implementations shared by the binary and the tests

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use color_eyre::eyre::WrapErr;
use goalprob_core::config::AnalyzerConfig;
use goalprob_core::{GoalProbabilityAnalyzer, ScenarioGenerator, SimulationCache};

use crate::report::{AnalysisReport, CacheReport, ScenarioReport};
use crate::storage::{DataDirectory, InputFile, StorageError};

/// Command-line overrides applied on top of the input file's analyzer
/// section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOverrides {
    pub iterations: Option<usize>,
    pub seed: Option<u64>,
    pub workers: Option<usize>,
    /// Skip loading and saving the cache snapshot
    pub no_cache_persist: bool,
}

impl RunOverrides {
    pub fn apply(&self, config: &mut AnalyzerConfig) {
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(seed) = self.seed {
            config.default_seed = Some(seed);
        }
        if let Some(workers) = self.workers {
            config.max_workers = workers;
        }
    }
}

/// An analyzer wired to the data directory's cache snapshot
pub struct Session {
    data_dir: DataDirectory,
    analyzer: GoalProbabilityAnalyzer,
    persist: bool,
}

impl Session {
    pub fn open(
        data_dir: DataDirectory,
        input: &InputFile,
        overrides: &RunOverrides,
    ) -> Result<Self, StorageError> {
        let mut config = input.analyzer.clone();
        overrides.apply(&mut config);

        let cache = Arc::new(SimulationCache::new(
            config.cache.max_size,
            config.cache.ttl_seconds,
        ));
        let persist = !overrides.no_cache_persist;
        if persist {
            data_dir.init()?;
            let restored = cache.load_snapshot(&data_dir.snapshot_path());
            tracing::debug!(restored, "Cache snapshot loaded");
        }

        let mut analyzer = GoalProbabilityAnalyzer::new(config, cache);
        if !input.parameters.is_empty() {
            analyzer = analyzer.with_parameter_service(Arc::new(input.parameters.clone()));
        }

        Ok(Self {
            data_dir,
            analyzer,
            persist,
        })
    }

    pub fn analyzer(&self) -> &GoalProbabilityAnalyzer {
        &self.analyzer
    }

    /// Write the cache snapshot back unless persistence is off
    pub fn close(self) -> color_eyre::Result<()> {
        if !self.persist {
            return Ok(());
        }
        let path = self.data_dir.snapshot_path();
        let written = self
            .analyzer
            .cache()
            .save_snapshot(&path)
            .wrap_err_with(|| format!("Failed to write cache snapshot {}", path.display()))?;
        tracing::info!(entries = written, path = %path.display(), "Cache snapshot saved");
        Ok(())
    }
}

pub fn analyze(
    data_dir: &DataDirectory,
    input_path: &Path,
    overrides: &RunOverrides,
) -> color_eyre::Result<AnalysisReport> {
    let input = InputFile::load(input_path)?;
    let session = Session::open(data_dir.clone(), &input, overrides)?;

    let start = Instant::now();
    let analysis = session
        .analyzer()
        .analyze(&input.goal, input.profile.as_ref())
        .wrap_err_with(|| format!("Failed to analyze goal {}", input.goal.id))?;
    tracing::info!(
        goal = %input.goal.id,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Analysis complete"
    );

    let report = AnalysisReport::from(&analysis);
    session.close()?;
    Ok(report)
}

pub fn scenarios(
    data_dir: &DataDirectory,
    input_path: &Path,
    overrides: &RunOverrides,
) -> color_eyre::Result<ScenarioReport> {
    let input = InputFile::load(input_path)?;
    let session = Session::open(data_dir.clone(), &input, overrides)?;
    let analyzer = session.analyzer();

    let analysis = analyzer
        .analyze(&input.goal, input.profile.as_ref())
        .wrap_err_with(|| format!("Failed to analyze goal {}", input.goal.id))?;
    let scenarios = ScenarioGenerator::new(analyzer)
        .generate_scenarios(&input.goal, input.profile.as_ref(), &analysis.result)
        .wrap_err("Failed to generate scenarios")?;
    tracing::info!(
        goal = %input.goal.id,
        scenarios = scenarios.len(),
        "Scenarios ranked"
    );

    let report = ScenarioReport::new(&analysis, &scenarios);
    session.close()?;
    Ok(report)
}

/// Live entries of the persisted cache, loaded into a default-sized cache
pub fn cache_stats(data_dir: &DataDirectory) -> CacheReport {
    let path = data_dir.snapshot_path();
    let cache = SimulationCache::default();
    let entries = cache.load_snapshot(&path);
    CacheReport {
        snapshot: path.display().to_string(),
        snapshot_exists: path.exists(),
        entries,
        max_size: cache.max_size(),
    }
}

/// Remove the persisted snapshot. Returns whether one existed.
pub fn cache_clear(data_dir: &DataDirectory) -> color_eyre::Result<bool> {
    let removed = data_dir.remove_snapshot()?;
    tracing::info!(removed, "Cache snapshot cleared");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    const INPUT: &str = "\
goal:
  id: house
  target_amount: 10000000
  current_amount: 1000000
  monthly_contribution: 20000
  timeframe: 15
  allocation:
    equity: 0.6
    debt: 0.3
    gold: 0.1
analyzer:
  iterations: 400
  max_workers: 2
  scenarios:
    min_scenario_iterations: 100
";

    fn setup() -> (TempDir, DataDirectory, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let data_dir = DataDirectory::new(dir.path().join("data"));
        let input_path = dir.path().join("goal.yaml");
        fs::write(&input_path, INPUT).unwrap();
        (dir, data_dir, input_path)
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = AnalyzerConfig::default();
        RunOverrides {
            iterations: Some(50),
            seed: Some(7),
            workers: Some(1),
            no_cache_persist: false,
        }
        .apply(&mut config);
        assert_eq!(config.iterations, 50);
        assert_eq!(config.default_seed, Some(7));
        assert_eq!(config.max_workers, 1);

        let before = AnalyzerConfig::default();
        let mut after = before.clone();
        RunOverrides::default().apply(&mut after);
        assert_eq!(before, after);
    }

    #[test]
    fn test_analyze_persists_and_reuses_cache() {
        let (_dir, data_dir, input_path) = setup();
        let overrides = RunOverrides::default();

        let first = analyze(&data_dir, &input_path, &overrides).unwrap();
        assert!(!first.from_cache);
        assert!(data_dir.snapshot_path().exists());
        assert_eq!(first.summary.iteration_count, 400);
        assert!((0.0..=1.0).contains(&first.summary.success_probability));

        let second = analyze(&data_dir, &input_path, &overrides).unwrap();
        assert!(second.from_cache);
        assert_eq!(first.cache_key, second.cache_key);
        assert_eq!(
            first.summary.success_probability,
            second.summary.success_probability
        );

        let report = cache_stats(&data_dir);
        assert!(report.snapshot_exists);
        assert_eq!(report.entries, 1);
        assert_eq!(report.max_size, 100);
    }

    #[test]
    fn test_no_cache_persist_writes_nothing() {
        let (_dir, data_dir, input_path) = setup();
        let overrides = RunOverrides {
            no_cache_persist: true,
            ..Default::default()
        };
        let report = analyze(&data_dir, &input_path, &overrides).unwrap();
        assert!(!report.from_cache);
        assert!(!data_dir.root().exists());
    }

    #[test]
    fn test_session_creates_data_directory() {
        let (_dir, data_dir, input_path) = setup();
        let input = InputFile::load(&input_path).unwrap();
        assert!(!data_dir.root().exists());

        let session = Session::open(data_dir.clone(), &input, &RunOverrides::default()).unwrap();
        assert!(data_dir.root().is_dir());
        session.close().unwrap();
        assert!(data_dir.snapshot_path().exists());
    }

    #[test]
    fn test_seed_override_changes_key() {
        let (_dir, data_dir, input_path) = setup();
        let a = analyze(&data_dir, &input_path, &RunOverrides::default()).unwrap();
        let b = analyze(
            &data_dir,
            &input_path,
            &RunOverrides {
                seed: Some(7),
                ..Default::default()
            },
        )
        .unwrap();
        assert_ne!(a.cache_key, b.cache_key);
        assert_eq!(b.seed, Some(7));
        assert!(!b.from_cache);
    }

    #[test]
    fn test_scenarios_report_baseline_first() {
        let (_dir, data_dir, input_path) = setup();
        let report = scenarios(&data_dir, &input_path, &RunOverrides::default()).unwrap();
        assert_eq!(report.scenarios[0].name, "baseline");
        assert_eq!(report.scenarios[0].rank, 0);
        assert_eq!(
            report.scenarios[0].probability,
            report.base.summary.success_probability
        );
        assert!(report.scenarios.len() > 1);

        let json = crate::report::to_json(&report).unwrap();
        assert!(json.contains("\"scenarios\""));
        assert!(json.contains("\"50\""));
    }

    #[test]
    fn test_cache_clear() {
        let (_dir, data_dir, input_path) = setup();
        assert!(!cache_clear(&data_dir).unwrap());
        analyze(&data_dir, &input_path, &RunOverrides::default()).unwrap();
        assert!(cache_clear(&data_dir).unwrap());
        assert!(!cache_stats(&data_dir).snapshot_exists);
        assert_eq!(cache_stats(&data_dir).entries, 0);
    }

    #[test]
    fn test_invalid_goal_is_reported() {
        let (dir, data_dir, _) = setup();
        let path = dir.path().join("bad.yaml");
        fs::write(
            &path,
            "goal:\n  id: g\n  target_amount: 0\n  allocation:\n    cash: 1.0\n",
        )
        .unwrap();
        let err = analyze(&data_dir, &path, &RunOverrides::default()).unwrap_err();
        assert!(format!("{err:?}").contains("target amount"));
    }
}
