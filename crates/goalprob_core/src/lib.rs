//! Goal probability engine
//!
//! Estimates how likely a financial goal is to be reached by simulating
//! thousands of market paths. It supports:
//! - Per-asset-class return assumptions for Indian and global markets, with
//!   market regimes, host-supplied overrides and tax drag
//! - Monthly, annual and lumpsum contributions with yearly step-ups
//! - Seeded, reproducible trials run in parallel batches
//! - Success and partial-success probabilities with percentile bands
//! - An LRU/TTL result cache with single-flight misses and JSON snapshots
//! - What-if scenarios ranked by probability gained per unit of effort
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use goalprob_core::{AnalyzerConfig, GoalBuilder, GoalProbabilityAnalyzer, SimulationCache};
//!
//! let cache = Arc::new(SimulationCache::default());
//! let analyzer = GoalProbabilityAnalyzer::new(AnalyzerConfig::default(), cache);
//!
//! let goal = GoalBuilder::new("house", 10_000_000.0)
//!     .current(1_000_000.0)
//!     .monthly(20_000.0)
//!     .years(15)
//!     .allocation("equity", 0.6)
//!     .allocation("debt", 0.3)
//!     .allocation("gold", 0.1)
//!     .build();
//!
//! let analysis = analyzer.analyze(&goal, None)?;
//! println!("{:.1}%", analysis.result.success_probability() * 100.0);
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod analyzer;
pub mod cache;
pub mod contribution;
pub mod error;
pub mod parameters;
pub mod returns;
pub mod runner;
pub mod scenarios;
pub mod simulation;
pub mod stats;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod config;
pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use analyzer::{CachedRun, GoalAnalysis, GoalProbabilityAnalyzer};
pub use cache::{CacheKey, CacheStats, SimulationCache};
pub use config::{AnalyzerConfig, GoalBuilder};
pub use error::AnalysisError;
pub use parameters::{FinancialParameterService, StaticParameters};
pub use runner::{ParallelSimulationRunner, RunOptions};
pub use scenarios::{Scenario, ScenarioGenerator};
