//! Command-line driver for the goal probability engine
//!
//! Reads goals from YAML, runs them through
//! [`goalprob_core::GoalProbabilityAnalyzer`] and prints JSON reports. The
//! simulation cache survives between runs as a snapshot in the data
//! directory.

pub mod commands;
pub mod logging;
pub mod report;
pub mod storage;

pub use commands::{RunOverrides, Session};
pub use logging::{LogTarget, init_logging};
pub use storage::{DataDirectory, InputFile, StorageError};
