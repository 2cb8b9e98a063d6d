//! Sequential suite execution
//!
//! Walks suite → scenario → case → unit in order. A failing unit never stops
//! its siblings; only an operator interrupt ends the walk early.

use std::sync::Arc;
use tokio::sync::watch;

use super::evaluator::ResultEvaluator;
use super::registry::SuiteRegistry;
use super::runner::UnitRunner;
use crate::common::config::Config;
use crate::model::{TestCase, TestScenario, TestSuite, TestSuiteReport};
use crate::session::Connector;

pub struct BenchmarkExecutor {
    runner: UnitRunner,
    evaluator: ResultEvaluator,
    shutdown: Option<watch::Receiver<bool>>,
}

impl BenchmarkExecutor {
    pub fn new(connector: Arc<dyn Connector>, config: &Config) -> Self {
        Self {
            runner: UnitRunner::new(
                connector,
                config.endpoints.clone(),
                config.timeouts.clone(),
            ),
            evaluator: ResultEvaluator::new(config.thresholds.clone()),
            shutdown: None,
        }
    }

    /// Stop after the unit in flight once the receiver flips to `true`
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.runner = self.runner.with_shutdown(shutdown.clone());
        self.shutdown = Some(shutdown);
        self
    }

    pub fn evaluator(&self) -> &ResultEvaluator {
        &self.evaluator
    }

    fn stopping(&self) -> bool {
        self.shutdown.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Run every registered suite in registration order
    pub async fn execute_all(&mut self, registry: &SuiteRegistry) -> Vec<TestSuiteReport> {
        let mut reports = Vec::new();
        for suite in registry.suites() {
            if self.stopping() {
                tracing::warn!(suite_id = %suite.id, "Interrupted, skipping suite");
                continue;
            }
            reports.push(self.execute_suite(&suite).await);
        }
        reports
    }

    /// Run one suite and build its report from whatever completed
    pub async fn execute_suite(&mut self, suite: &TestSuite) -> TestSuiteReport {
        tracing::info!(
            suite_id = %suite.id,
            suite = %suite.name,
            product = %suite.product.label(),
            units = suite.unit_count(),
            "Executing suite"
        );

        let mut passed = true;
        for scenario in &suite.scenarios {
            if self.stopping() {
                tracing::warn!(scenario_id = %scenario.id, "Interrupted, skipping scenario");
                passed = false;
                continue;
            }
            passed &= self.execute_scenario(scenario).await;
        }
        tracing::info!(suite_id = %suite.id, "{} Suite {}", mark(passed), verdict(passed));

        self.evaluator.evaluate_suite(suite).clone()
    }

    async fn execute_scenario(&mut self, scenario: &TestScenario) -> bool {
        tracing::info!(scenario_id = %scenario.id, scenario = %scenario.name, cases = scenario.cases.len(), "Executing scenario");

        let mut passed = true;
        for case in &scenario.cases {
            if self.stopping() {
                passed = false;
                continue;
            }
            passed &= self.execute_case(case).await;
        }
        tracing::info!(scenario_id = %scenario.id, "{} Scenario {}", mark(passed), verdict(passed));
        passed
    }

    async fn execute_case(&mut self, case: &TestCase) -> bool {
        if case.units.is_empty() {
            tracing::warn!(case_id = %case.id, "Case has no units");
            return false;
        }
        tracing::info!(case_id = %case.id, case = %case.name, units = case.units.len(), "Executing case");

        let mut passed = true;
        for unit in &case.units {
            if self.stopping() {
                tracing::warn!(unit_id = %unit.id, "Interrupted, skipping unit");
                passed = false;
                continue;
            }
            let ok = self.runner.run_unit(unit, &mut self.evaluator).await;
            tracing::info!(unit_id = %unit.id, mode = %unit.mode, "{} Unit {}", mark(ok), verdict(ok));
            if let Some(result) = self.evaluator.result(&unit.id) {
                tracing::debug!("\n{}", result.summary());
            }
            passed &= ok;
        }
        tracing::info!(case_id = %case.id, "{} Case {}", mark(passed), verdict(passed));
        passed
    }
}

fn mark(passed: bool) -> &'static str {
    if passed {
        "✓"
    } else {
        "✗"
    }
}

fn verdict(passed: bool) -> &'static str {
    if passed {
        "passed"
    } else {
        "failed"
    }
}
