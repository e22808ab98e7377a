//! Domain types: goals and profiles, market assumptions, simulation inputs
//! and aggregated results.

pub mod goal;
pub mod input;
pub mod market;
pub mod results;

pub use goal::*;
pub use input::*;
pub use market::*;
pub use results::*;
