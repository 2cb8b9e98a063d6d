//! Suite-level reports
//!
//! A report is a fresh reduction over the unit results of one suite. It is
//! never updated after it is built.

use serde::Serialize;
use std::collections::BTreeMap;
use chrono::{DateTime, Utc};

use crate::common::config::ScoreThresholds;

use super::{Mode, ScoreTier, TestSuite, TestUnitResult, UnitStatus};

/// How many results landed in each tier, plus those with no score
///
/// Bucket boundaries are the [`ScoreTier`] boundaries: `perfect` is
/// Excellent, `high` Good, `medium` Acceptable, `low` Poor and `very_low`
/// Failed. Results without a score only ever count as `no_score`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScoreDistribution {
    pub perfect: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub very_low: usize,
    pub no_score: usize,
}

impl ScoreDistribution {
    fn record(&mut self, score: Option<f64>) {
        match score.map(ScoreTier::from_score) {
            None => self.no_score += 1,
            Some(ScoreTier::Excellent) => self.perfect += 1,
            Some(ScoreTier::Good) => self.high += 1,
            Some(ScoreTier::Acceptable) => self.medium += 1,
            Some(ScoreTier::Poor) => self.low += 1,
            Some(ScoreTier::Failed) => self.very_low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.perfect + self.high + self.medium + self.low + self.very_low + self.no_score
    }
}

/// Pass/fail and score figures for a subset of results (one mode, one scenario)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupStatistics {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub average_score: Option<f64>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
}

impl GroupStatistics {
    fn tally(results: &[&TestUnitResult], thresholds: &ScoreThresholds) -> Self {
        let total = results.len();
        let passed = results
            .iter()
            .filter(|r| {
                r.match_score()
                    .is_some_and(|score| thresholds.is_successful(score, r.mode))
            })
            .count();
        let scores = ScoreSummary::of(results);
        Self {
            total,
            passed,
            failed: total - passed,
            pass_rate: ratio(passed, total),
            average_score: scores.average,
            min_score: scores.min,
            max_score: scores.max,
        }
    }
}

/// Aggregate statistics over all results of a suite
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestStatistics {
    pub total_units: usize,
    /// Units whose score met their mode's success threshold
    pub passed_units: usize,
    pub failed_units: usize,
    pub pass_rate: f64,
    pub failure_rate: f64,
    /// Units whose received actions matched the expectation exactly
    pub exact_matches: usize,
    pub timed_out_units: usize,
    pub errored_units: usize,
    pub interrupted_units: usize,
    /// Tier of the average score; absent when no unit produced a score
    pub overall_tier: Option<ScoreTier>,
    pub average_duration_ms: f64,
    pub average_score: Option<f64>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub distribution: ScoreDistribution,
    pub modes: BTreeMap<Mode, GroupStatistics>,
    pub scenarios: BTreeMap<String, GroupStatistics>,
}

impl TestStatistics {
    /// Reduce unit results using each unit's mode-specific threshold
    pub fn from_results(results: &[&TestUnitResult], thresholds: &ScoreThresholds) -> Self {
        let overall = GroupStatistics::tally(results, thresholds);
        let count_status = |status: UnitStatus| results.iter().filter(|r| r.status() == status).count();

        let mut distribution = ScoreDistribution::default();
        for result in results {
            distribution.record(result.match_score());
        }

        let durations: Vec<u64> = results.iter().filter_map(|r| r.duration_ms()).collect();
        let average_duration_ms = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<u64>() as f64 / durations.len() as f64
        };

        let mut by_mode: BTreeMap<Mode, Vec<&TestUnitResult>> = BTreeMap::new();
        let mut by_scenario: BTreeMap<String, Vec<&TestUnitResult>> = BTreeMap::new();
        for result in results {
            by_mode.entry(result.mode).or_default().push(result);
            by_scenario
                .entry(result.scenario_id.clone())
                .or_default()
                .push(result);
        }

        Self {
            total_units: overall.total,
            passed_units: overall.passed,
            failed_units: overall.failed,
            pass_rate: overall.pass_rate,
            failure_rate: ratio(overall.failed, overall.total),
            exact_matches: results.iter().filter(|r| r.exact_match()).count(),
            timed_out_units: count_status(UnitStatus::Timeout),
            errored_units: count_status(UnitStatus::Failed),
            interrupted_units: count_status(UnitStatus::Interrupted),
            overall_tier: overall.average_score.map(ScoreTier::from_score),
            average_duration_ms,
            average_score: overall.average_score,
            min_score: overall.min_score,
            max_score: overall.max_score,
            distribution,
            modes: by_mode
                .into_iter()
                .map(|(mode, rs)| (mode, GroupStatistics::tally(&rs, thresholds)))
                .collect(),
            scenarios: by_scenario
                .into_iter()
                .map(|(id, rs)| (id, GroupStatistics::tally(&rs, thresholds)))
                .collect(),
        }
    }
}

/// Report for one suite
#[derive(Debug, Clone, Serialize)]
pub struct TestSuiteReport {
    pub suite_id: String,
    pub suite_name: String,
    pub product_id: String,
    pub product_name: String,
    pub generated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_duration_ms: Option<u64>,
    pub statistics: TestStatistics,
}

impl TestSuiteReport {
    pub fn build(suite: &TestSuite, results: &[&TestUnitResult], thresholds: &ScoreThresholds) -> Self {
        let started_at = results.iter().map(|r| r.started_at()).min();
        let ended_at = results.iter().filter_map(|r| r.ended_at()).max();
        let total_duration_ms = match (started_at, ended_at) {
            (Some(start), Some(end)) => {
                u64::try_from(end.signed_duration_since(start).num_milliseconds()).ok()
            }
            _ => None,
        };

        Self {
            suite_id: suite.id.clone(),
            suite_name: suite.name.clone(),
            product_id: suite.product.id.clone(),
            product_name: suite.product.name.clone(),
            generated_at: Utc::now(),
            started_at,
            ended_at,
            total_duration_ms,
            statistics: TestStatistics::from_results(results, thresholds),
        }
    }

    /// Log the full report
    pub fn log_report(&self) {
        let stats = &self.statistics;
        tracing::info!(
            suite_id = %self.suite_id,
            suite = %self.suite_name,
            product_id = %self.product_id,
            duration_ms = ?self.total_duration_ms,
            "Suite report"
        );
        tracing::info!(
            total = stats.total_units,
            passed = stats.passed_units,
            failed = stats.failed_units,
            pass_rate = stats.pass_rate,
            exact_matches = stats.exact_matches,
            timed_out = stats.timed_out_units,
            errored = stats.errored_units,
            interrupted = stats.interrupted_units,
            "Unit outcomes"
        );
        tracing::info!(
            average = ?stats.average_score,
            min = ?stats.min_score,
            max = ?stats.max_score,
            tier = ?stats.overall_tier,
            average_duration_ms = stats.average_duration_ms,
            "Scores"
        );
        let d = &stats.distribution;
        tracing::info!(
            perfect = d.perfect,
            high = d.high,
            medium = d.medium,
            low = d.low,
            very_low = d.very_low,
            no_score = d.no_score,
            "Score distribution"
        );
        for (mode, m) in &stats.modes {
            tracing::info!(
                %mode,
                total = m.total,
                passed = m.passed,
                failed = m.failed,
                pass_rate = m.pass_rate,
                average = ?m.average_score,
                "Mode statistics"
            );
        }
    }

    /// Log a one-line summary
    pub fn log_summary(&self) {
        let stats = &self.statistics;
        tracing::info!(
            suite = %self.suite_name,
            total = stats.total_units,
            passed = stats.passed_units,
            failed = stats.failed_units,
            pass_rate_pct = stats.pass_rate * 100.0,
            average_score = ?stats.average_score,
            "Suite finished"
        );
    }
}

struct ScoreSummary {
    average: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
}

impl ScoreSummary {
    fn of(results: &[&TestUnitResult]) -> Self {
        let scores: Vec<f64> = results.iter().filter_map(|r| r.match_score()).collect();
        if scores.is_empty() {
            return Self {
                average: None,
                min: None,
                max: None,
            };
        }
        Self {
            average: Some(scores.iter().sum::<f64>() / scores.len() as f64),
            min: scores.iter().copied().reduce(f64::min),
            max: scores.iter().copied().reduce(f64::max),
        }
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
