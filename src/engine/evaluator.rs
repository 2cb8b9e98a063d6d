//! Scoring and result stores
//!
//! [`score_actions`] is the pure scoring function. [`ResultEvaluator`] owns
//! the unit-result and suite-report stores and applies the mode thresholds.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::common::config::ScoreThresholds;
use crate::model::{
    MatchEvaluation, Mode, TerminalAction, TestSuite, TestSuiteReport, TestUnitResult,
};

/// Score received meta-action ids against the expected ones
///
/// Both inputs are treated as sets. `missing` and `unexpected` keep the order
/// in which ids first appear.
pub fn score_actions(mode: Mode, expected: &[String], received: &[String]) -> MatchEvaluation {
    let expected = unique(expected);
    let received = unique(received);

    match mode {
        Mode::NegativeMatch => {
            let quiet = received.is_empty();
            MatchEvaluation {
                score: if quiet { 1.0 } else { 0.0 },
                exact_match: quiet,
                matched_count: 0,
                expected_count: 0,
                missing_action_ids: Vec::new(),
                unexpected_action_ids: received.iter().map(|s| s.to_string()).collect(),
                details: if quiet {
                    "No actions received, as expected".to_string()
                } else {
                    format!("Expected no actions but received {}", received.len())
                },
            }
        }
        Mode::PositiveMatch | Mode::BoundaryCondition => {
            if expected.is_empty() {
                let quiet = received.is_empty();
                return MatchEvaluation {
                    score: if quiet { 1.0 } else { 0.0 },
                    exact_match: quiet,
                    matched_count: 0,
                    expected_count: 0,
                    missing_action_ids: Vec::new(),
                    unexpected_action_ids: received.iter().map(|s| s.to_string()).collect(),
                    details: if quiet {
                        "No actions expected and none received".to_string()
                    } else {
                        format!("No actions expected but received {}", received.len())
                    },
                };
            }

            if received.is_empty() {
                return MatchEvaluation {
                    score: 0.0,
                    exact_match: false,
                    matched_count: 0,
                    expected_count: expected.len(),
                    missing_action_ids: expected.iter().map(|s| s.to_string()).collect(),
                    unexpected_action_ids: Vec::new(),
                    details: format!(
                        "No actions received; expected {} (is the rule engine reachable?)",
                        expected.len()
                    ),
                };
            }

            let expected_set: HashSet<&str> = expected.iter().copied().collect();
            let received_set: HashSet<&str> = received.iter().copied().collect();
            let missing: Vec<String> = expected
                .iter()
                .filter(|id| !received_set.contains(*id))
                .map(|s| s.to_string())
                .collect();
            let unexpected: Vec<String> = received
                .iter()
                .filter(|id| !expected_set.contains(*id))
                .map(|s| s.to_string())
                .collect();
            let matched = expected.len() - missing.len();
            let score = matched as f64 / expected.len() as f64;

            MatchEvaluation {
                score,
                exact_match: score >= 1.0,
                matched_count: matched,
                expected_count: expected.len(),
                details: format!(
                    "Matched {}/{} expected actions, {} missing, {} unexpected",
                    matched,
                    expected.len(),
                    missing.len(),
                    unexpected.len()
                ),
                missing_action_ids: missing,
                unexpected_action_ids: unexpected,
            }
        }
    }
}

fn unique(ids: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(String::as_str)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Owner of the unit-result and suite-report stores
#[derive(Debug, Default)]
pub struct ResultEvaluator {
    thresholds: ScoreThresholds,
    results: HashMap<String, TestUnitResult>,
    /// Unit ids in first-stored order
    order: Vec<String>,
    reports: HashMap<String, TestSuiteReport>,
}

impl ResultEvaluator {
    pub fn new(thresholds: ScoreThresholds) -> Self {
        Self {
            thresholds,
            ..Default::default()
        }
    }

    /// Score a running result against what was received and store it
    pub fn evaluate_unit(
        &mut self,
        mut result: TestUnitResult,
        received: Vec<TerminalAction>,
    ) -> &TestUnitResult {
        let received_ids: Vec<String> = received.iter().map(|a| a.meta_action_id.clone()).collect();
        let evaluation = score_actions(result.mode, &result.expected_action_ids, &received_ids);
        let details = evaluation.details.clone();

        tracing::info!(
            unit_id = %result.unit_id,
            mode = %result.mode,
            score = evaluation.score,
            matched = evaluation.matched_count,
            expected = evaluation.expected_count,
            "Unit evaluated"
        );
        if let Err(e) = result.complete(evaluation, received, details) {
            tracing::warn!(unit_id = %result.unit_id, error = %e, "Result already final");
        }
        self.store(result)
    }

    /// Store a unit that failed before it could be scored
    pub fn record_failure(&mut self, mut result: TestUnitResult, message: impl Into<String>) -> &TestUnitResult {
        if let Err(e) = result.fail(message) {
            tracing::warn!(unit_id = %result.unit_id, error = %e, "Result already final");
        }
        self.store(result)
    }

    /// Store a unit that overran its deadline
    pub fn record_timeout(
        &mut self,
        mut result: TestUnitResult,
        received: Vec<TerminalAction>,
        message: impl Into<String>,
    ) -> &TestUnitResult {
        if let Err(e) = result.time_out(received, message) {
            tracing::warn!(unit_id = %result.unit_id, error = %e, "Result already final");
        }
        self.store(result)
    }

    /// Store a unit that an operator interrupt cut short
    pub fn record_interrupt(&mut self, mut result: TestUnitResult, received: Vec<TerminalAction>) -> &TestUnitResult {
        if let Err(e) = result.interrupt(received) {
            tracing::warn!(unit_id = %result.unit_id, error = %e, "Result already final");
        }
        self.store(result)
    }

    fn store(&mut self, result: TestUnitResult) -> &TestUnitResult {
        match self.results.entry(result.unit_id.clone()) {
            Entry::Occupied(mut slot) => {
                slot.insert(result);
                slot.into_mut()
            }
            Entry::Vacant(slot) => {
                self.order.push(result.unit_id.clone());
                slot.insert(result)
            }
        }
    }

    /// Whether a stored result passes its mode's threshold
    pub fn is_successful(&self, result: &TestUnitResult) -> bool {
        result.meets(self.thresholds.success_threshold(result.mode))
    }

    pub fn result(&self, unit_id: &str) -> Option<&TestUnitResult> {
        self.results.get(unit_id)
    }

    /// Stored results of one suite, in the order they were first stored
    pub fn suite_results(&self, suite_id: &str) -> Vec<&TestUnitResult> {
        self.order
            .iter()
            .filter_map(|id| self.results.get(id))
            .filter(|r| r.suite_id == suite_id)
            .collect()
    }

    /// Build a fresh report for a suite, replacing any earlier one
    pub fn evaluate_suite(&mut self, suite: &TestSuite) -> &TestSuiteReport {
        let report = {
            let results = self.suite_results(&suite.id);
            TestSuiteReport::build(suite, &results, &self.thresholds)
        };
        report.log_summary();

        match self.reports.entry(suite.id.clone()) {
            Entry::Occupied(mut slot) => {
                slot.insert(report);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(report),
        }
    }

    pub fn report(&self, suite_id: &str) -> Option<&TestSuiteReport> {
        self.reports.get(suite_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Product, ProductSettings, TestCase, TestScenario, TestUnit};
    use std::sync::Arc;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_partial_match() {
        let eval = score_actions(Mode::PositiveMatch, &ids(&["a", "b"]), &ids(&["a"]));
        assert_eq!(eval.score, 0.5);
        assert_eq!(eval.missing_action_ids, ids(&["b"]));
        assert!(eval.unexpected_action_ids.is_empty());
        assert!(!eval.exact_match);
    }

    #[test]
    fn test_nothing_expected_nothing_received() {
        let eval = score_actions(Mode::PositiveMatch, &[], &[]);
        assert_eq!(eval.score, 1.0);
        assert!(eval.exact_match);

        let noisy = score_actions(Mode::BoundaryCondition, &[], &ids(&["z"]));
        assert_eq!(noisy.score, 0.0);
        assert_eq!(noisy.unexpected_action_ids, ids(&["z"]));
    }

    #[test]
    fn test_extra_actions_do_not_lower_score() {
        let eval = score_actions(Mode::PositiveMatch, &ids(&["a"]), &ids(&["a", "z"]));
        assert_eq!(eval.score, 1.0);
        assert!(eval.exact_match);
        assert_eq!(eval.unexpected_action_ids, ids(&["z"]));
    }

    #[test]
    fn test_nothing_received_short_circuits() {
        let eval = score_actions(Mode::BoundaryCondition, &ids(&["a", "b"]), &[]);
        assert_eq!(eval.score, 0.0);
        assert_eq!(eval.matched_count, 0);
        assert_eq!(eval.missing_action_ids, ids(&["a", "b"]));
    }

    #[test]
    fn test_negative_ignores_expected() {
        let eval = score_actions(Mode::NegativeMatch, &ids(&["x"]), &ids(&["x"]));
        assert_eq!(eval.score, 0.0);
        let quiet = score_actions(Mode::NegativeMatch, &ids(&["x"]), &[]);
        assert_eq!(quiet.score, 1.0);
    }

    #[test]
    fn test_duplicates_are_set_semantics() {
        let eval = score_actions(
            Mode::PositiveMatch,
            &ids(&["a", "a", "b"]),
            &ids(&["b", "b", "c", "c"]),
        );
        assert_eq!(eval.expected_count, 2);
        assert_eq!(eval.score, 0.5);
        assert_eq!(eval.missing_action_ids, ids(&["a"]));
        assert_eq!(eval.unexpected_action_ids, ids(&["c"]));
    }

    #[test]
    fn test_score_matches_set_formula() {
        let universe = ["a", "b", "c", "d"];
        for e_mask in 1u8..16 {
            for r_mask in 0u8..16 {
                let pick = |mask: u8| -> Vec<String> {
                    universe
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| mask & (1 << i) != 0)
                        .map(|(_, s)| s.to_string())
                        .collect()
                };
                let (e, r) = (pick(e_mask), pick(r_mask));
                let eval = score_actions(Mode::PositiveMatch, &e, &r);
                let both = (e_mask & r_mask).count_ones() as f64;
                assert_eq!(eval.score, both / e_mask.count_ones() as f64);
                assert_eq!(
                    eval.missing_action_ids.len() as u32,
                    (e_mask & !r_mask).count_ones()
                );
                if r_mask != 0 {
                    assert_eq!(
                        eval.unexpected_action_ids.len() as u32,
                        (r_mask & !e_mask).count_ones()
                    );
                }
            }
        }
    }

    fn suite_with(units: Vec<TestUnit>) -> TestSuite {
        let product = units[0].product.clone();
        TestSuite {
            id: "s1".into(),
            name: "Suite".into(),
            description: None,
            product,
            scenarios: vec![TestScenario {
                id: "sc1".into(),
                name: String::new(),
                product_id: "p1".into(),
                scene_id: None,
                cases: vec![TestCase {
                    id: "c1".into(),
                    name: String::new(),
                    product_id: "p1".into(),
                    scene_id: None,
                    rule: None,
                    units,
                }],
            }],
        }
    }

    fn unit(expected: &[&str]) -> TestUnit {
        let product = Arc::new(Product {
            id: "p1".into(),
            name: "Lamp".into(),
            settings: ProductSettings::default(),
        });
        let mut unit = TestUnit::new(Mode::PositiveMatch, product).within("s1", "sc1", "c1");
        unit.expected_action_ids = ids(expected);
        unit
    }

    #[test]
    fn test_suite_report_overwrites_previous() {
        let units = vec![unit(&["a"]), unit(&["a", "b"]), unit(&["a"])];
        let suite = suite_with(units.clone());
        let mut evaluator = ResultEvaluator::new(ScoreThresholds::uniform(0.75));

        evaluator.evaluate_unit(TestUnitResult::start(&units[0]), vec![TerminalAction::new("1", "a")]);
        let first = evaluator.evaluate_suite(&suite);
        assert_eq!(first.statistics.total_units, 1);

        evaluator.evaluate_unit(TestUnitResult::start(&units[1]), vec![TerminalAction::new("2", "a")]);
        evaluator.record_failure(TestUnitResult::start(&units[2]), "send failed");
        let report = evaluator.evaluate_suite(&suite).clone();

        assert_eq!(report.statistics.total_units, 3);
        assert_eq!(report.statistics.passed_units, 1);
        assert_eq!(report.statistics.distribution.no_score, 1);
        assert_eq!(report.statistics.average_score, Some(0.75));
        assert_eq!(evaluator.report("s1").map(|r| r.statistics.total_units), Some(3));
    }

    #[test]
    fn test_results_of_other_suites_are_excluded() {
        let mine = unit(&["a"]);
        let mut other = unit(&["a"]);
        other.suite_id = "s2".into();
        let suite = suite_with(vec![mine.clone()]);

        let mut evaluator = ResultEvaluator::default();
        evaluator.evaluate_unit(TestUnitResult::start(&mine), Vec::new());
        evaluator.evaluate_unit(TestUnitResult::start(&other), Vec::new());

        assert_eq!(evaluator.suite_results("s1").len(), 1);
        assert_eq!(evaluator.evaluate_suite(&suite).statistics.total_units, 1);
    }

    #[test]
    fn test_success_uses_mode_threshold() {
        let u = unit(&["a", "b", "c", "d", "e"]);
        let mut evaluator = ResultEvaluator::new(ScoreThresholds::default());
        let received = ["a", "b", "c", "d"]
            .iter()
            .enumerate()
            .map(|(i, m)| TerminalAction::new(i.to_string(), *m))
            .collect();
        let stored = evaluator.evaluate_unit(TestUnitResult::start(&u), received).clone();
        assert_eq!(stored.match_score(), Some(0.8));
        assert!(!stored.exact_match());
        assert!(evaluator.is_successful(&stored));
    }
}
