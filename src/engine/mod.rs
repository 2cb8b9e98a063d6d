//! Benchmark execution and scoring

pub mod collector;
pub mod evaluator;
pub mod executor;
pub mod registry;
pub mod runner;

pub use collector::ActionCollector;
pub use evaluator::{score_actions, ResultEvaluator};
pub use executor::BenchmarkExecutor;
pub use registry::SuiteRegistry;
pub use runner::UnitRunner;
