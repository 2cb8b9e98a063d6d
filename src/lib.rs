//! Rule engine benchmark harness
//!
//! Drives synthetic device events into an event-driven rule engine, collects
//! the actions it sends back and scores them against expectations.

pub mod assembly;
pub mod cli;
pub mod commands;
pub mod common;
pub mod engine;
pub mod model;
pub mod session;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use engine::{BenchmarkExecutor, ResultEvaluator, SuiteRegistry};
