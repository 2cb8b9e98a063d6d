//! Per-unit results and score tiers

use serde::{Deserialize, Serialize};
use std::fmt;
use chrono::{DateTime, Utc};

use crate::common::{Error, Result};

use super::{Mode, TerminalAction, TestUnit};

/// Fixed quality label derived from a match score
///
/// Boundaries are inclusive and checked top-down, so a score sitting exactly
/// on a boundary lands in the higher tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreTier {
    Excellent,
    Good,
    Acceptable,
    Poor,
    Failed,
}

impl ScoreTier {
    pub const EXCELLENT_MIN: f64 = 0.95;
    pub const GOOD_MIN: f64 = 0.85;
    pub const ACCEPTABLE_MIN: f64 = 0.75;
    pub const POOR_MIN: f64 = 0.60;

    pub fn from_score(score: f64) -> Self {
        if score >= Self::EXCELLENT_MIN {
            ScoreTier::Excellent
        } else if score >= Self::GOOD_MIN {
            ScoreTier::Good
        } else if score >= Self::ACCEPTABLE_MIN {
            ScoreTier::Acceptable
        } else if score >= Self::POOR_MIN {
            ScoreTier::Poor
        } else {
            ScoreTier::Failed
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScoreTier::Excellent => "Excellent",
            ScoreTier::Good => "Good",
            ScoreTier::Acceptable => "Acceptable",
            ScoreTier::Poor => "Poor",
            ScoreTier::Failed => "Failed",
        }
    }
}

impl fmt::Display for ScoreTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Execution status of one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Running,
    Completed,
    Timeout,
    Failed,
    Interrupted,
}

impl UnitStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UnitStatus::Running)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitStatus::Running => write!(f, "RUNNING"),
            UnitStatus::Completed => write!(f, "COMPLETED"),
            UnitStatus::Timeout => write!(f, "TIMEOUT"),
            UnitStatus::Failed => write!(f, "FAILED"),
            UnitStatus::Interrupted => write!(f, "INTERRUPTED"),
        }
    }
}

/// Outcome of scoring received actions against expectations
#[derive(Debug, Clone, PartialEq)]
pub struct MatchEvaluation {
    pub score: f64,
    /// Exact-match signal: every expected action and nothing else was required
    pub exact_match: bool,
    pub matched_count: usize,
    pub expected_count: usize,
    pub missing_action_ids: Vec<String>,
    pub unexpected_action_ids: Vec<String>,
    pub details: String,
}

/// Outcome of one test unit
///
/// A score exists exactly when the status is COMPLETED. Once a terminal
/// status is reached it never changes.
#[derive(Debug, Clone, Serialize)]
pub struct TestUnitResult {
    pub unit_id: String,
    pub suite_id: String,
    pub scenario_id: String,
    pub mode: Mode,
    pub expected_action_ids: Vec<String>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    duration_ms: Option<u64>,
    status: UnitStatus,
    match_score: Option<f64>,
    exact_match: bool,
    matched_count: usize,
    expected_count: usize,
    missing_action_ids: Vec<String>,
    unexpected_action_ids: Vec<String>,
    received_actions: Vec<TerminalAction>,
    evaluation_details: String,
    error_message: Option<String>,
}

impl TestUnitResult {
    /// Begin tracking a unit, stamped now
    pub fn start(unit: &TestUnit) -> Self {
        Self::start_at(unit, Utc::now())
    }

    /// Begin tracking a unit that started at `started_at`
    pub fn start_at(unit: &TestUnit, started_at: DateTime<Utc>) -> Self {
        Self {
            unit_id: unit.id.clone(),
            suite_id: unit.suite_id.clone(),
            scenario_id: unit.scenario_id.clone(),
            mode: unit.mode,
            expected_action_ids: unit.expected_action_ids.clone(),
            started_at,
            ended_at: None,
            duration_ms: None,
            status: UnitStatus::Running,
            match_score: None,
            exact_match: false,
            matched_count: 0,
            expected_count: 0,
            missing_action_ids: Vec::new(),
            unexpected_action_ids: Vec::new(),
            received_actions: Vec::new(),
            evaluation_details: String::new(),
            error_message: None,
        }
    }

    /// Record a scored completion
    pub fn complete(
        &mut self,
        evaluation: MatchEvaluation,
        received: Vec<TerminalAction>,
        details: String,
    ) -> Result<()> {
        self.finish("complete", UnitStatus::Completed)?;
        self.match_score = Some(evaluation.score);
        self.exact_match = evaluation.exact_match;
        self.matched_count = evaluation.matched_count;
        self.expected_count = evaluation.expected_count;
        self.missing_action_ids = evaluation.missing_action_ids;
        self.unexpected_action_ids = evaluation.unexpected_action_ids;
        self.received_actions = received;
        self.evaluation_details = details;
        Ok(())
    }

    /// Record a failure (configuration or transport)
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.finish("fail", UnitStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    /// Record a deadline overrun, keeping whatever arrived before it
    pub fn time_out(&mut self, received: Vec<TerminalAction>, message: impl Into<String>) -> Result<()> {
        self.finish("time out", UnitStatus::Timeout)?;
        self.received_actions = received;
        self.error_message = Some(message.into());
        Ok(())
    }

    /// Record an operator interrupt
    pub fn interrupt(&mut self, received: Vec<TerminalAction>) -> Result<()> {
        self.finish("interrupt", UnitStatus::Interrupted)?;
        self.received_actions = received;
        self.error_message = Some("Test unit execution was interrupted".to_string());
        Ok(())
    }

    fn finish(&mut self, action: &str, status: UnitStatus) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::invalid_state(action, self.status));
        }
        let now = Utc::now();
        self.ended_at = Some(now);
        self.duration_ms = Some(
            now.signed_duration_since(self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.status = status;
        Ok(())
    }

    pub fn status(&self) -> UnitStatus {
        self.status
    }

    pub fn match_score(&self) -> Option<f64> {
        self.match_score
    }

    pub fn exact_match(&self) -> bool {
        self.exact_match
    }

    pub fn matched_count(&self) -> usize {
        self.matched_count
    }

    pub fn expected_count(&self) -> usize {
        self.expected_count
    }

    pub fn missing_action_ids(&self) -> &[String] {
        &self.missing_action_ids
    }

    pub fn unexpected_action_ids(&self) -> &[String] {
        &self.unexpected_action_ids
    }

    pub fn received_actions(&self) -> &[TerminalAction] {
        &self.received_actions
    }

    pub fn evaluation_details(&self) -> &str {
        &self.evaluation_details
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    /// Tier of the score, or `None` when the unit never produced one
    pub fn tier(&self) -> Option<ScoreTier> {
        self.match_score.map(ScoreTier::from_score)
    }

    /// Whether the unit completed with a score at or above `threshold`
    pub fn meets(&self, threshold: f64) -> bool {
        self.status == UnitStatus::Completed
            && self.match_score.map(|s| s >= threshold).unwrap_or(false)
    }

    /// Multi-line human summary
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Unit: {}\nMode: {}\nStatus: {}\n",
            self.unit_id, self.mode, self.status
        );
        match (self.match_score, self.tier()) {
            (Some(score), Some(tier)) => out.push_str(&format!("Score: {:.2} ({})\n", score, tier)),
            _ => out.push_str("Score: not evaluated\n"),
        }
        match self.duration_ms {
            Some(ms) => out.push_str(&format!("Duration: {}ms\n", ms)),
            None => out.push_str("Duration: unknown\n"),
        }
        if let Some(err) = &self.error_message {
            out.push_str(&format!("Error: {}\n", err));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Product, ProductSettings};
    use std::sync::Arc;

    fn unit(mode: Mode) -> TestUnit {
        let product = Arc::new(Product {
            id: "p1".into(),
            name: "Thermostat".into(),
            settings: ProductSettings::default(),
        });
        TestUnit::new(mode, product).within("s1", "sc1", "c1")
    }

    fn evaluation(score: f64) -> MatchEvaluation {
        MatchEvaluation {
            score,
            exact_match: score >= 1.0,
            matched_count: 1,
            expected_count: 1,
            missing_action_ids: Vec::new(),
            unexpected_action_ids: Vec::new(),
            details: String::new(),
        }
    }

    #[test]
    fn test_tier_boundaries_go_to_higher_tier() {
        assert_eq!(ScoreTier::from_score(1.0), ScoreTier::Excellent);
        assert_eq!(ScoreTier::from_score(0.95), ScoreTier::Excellent);
        assert_eq!(ScoreTier::from_score(0.9499), ScoreTier::Good);
        assert_eq!(ScoreTier::from_score(0.85), ScoreTier::Good);
        assert_eq!(ScoreTier::from_score(0.75), ScoreTier::Acceptable);
        assert_eq!(ScoreTier::from_score(0.60), ScoreTier::Poor);
        assert_eq!(ScoreTier::from_score(0.5999), ScoreTier::Failed);
        assert_eq!(ScoreTier::from_score(0.0), ScoreTier::Failed);
    }

    #[test]
    fn test_tiers_are_monotonic() {
        let mut previous = ScoreTier::Failed;
        for step in 0..=100 {
            let tier = ScoreTier::from_score(step as f64 / 100.0);
            // Derived Ord puts better tiers first
            assert!(tier <= previous, "tier went down at {}", step);
            previous = tier;
        }
    }

    #[test]
    fn test_score_only_when_completed() {
        let u = unit(Mode::PositiveMatch);

        let mut running = TestUnitResult::start(&u);
        assert_eq!(running.status(), UnitStatus::Running);
        assert_eq!(running.match_score(), None);

        running.complete(evaluation(0.5), Vec::new(), String::new()).unwrap();
        assert_eq!(running.status(), UnitStatus::Completed);
        assert_eq!(running.match_score(), Some(0.5));
        assert!(running.duration_ms().is_some());

        let mut failed = TestUnitResult::start(&u);
        failed.fail("send failed").unwrap();
        assert_eq!(failed.match_score(), None);
        assert_eq!(failed.tier(), None);
        assert!(!failed.meets(0.0));

        let mut timed_out = TestUnitResult::start(&u);
        timed_out.time_out(Vec::new(), "deadline").unwrap();
        assert_eq!(timed_out.status(), UnitStatus::Timeout);
        assert_eq!(timed_out.match_score(), None);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let u = unit(Mode::NegativeMatch);
        let mut result = TestUnitResult::start(&u);
        result.time_out(Vec::new(), "deadline").unwrap();

        let err = result
            .complete(evaluation(1.0), Vec::new(), String::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        assert_eq!(result.status(), UnitStatus::Timeout);
        assert_eq!(result.match_score(), None);

        assert!(result.fail("later").is_err());
        assert!(result.interrupt(Vec::new()).is_err());
        assert_eq!(result.error_message(), Some("deadline"));
    }

    #[test]
    fn test_meets_threshold() {
        let u = unit(Mode::BoundaryCondition);
        let mut result = TestUnitResult::start(&u);
        result.complete(evaluation(0.8), Vec::new(), String::new()).unwrap();
        assert!(result.meets(0.75));
        assert!(result.meets(0.8));
        assert!(!result.meets(0.81));
        assert!(!result.exact_match());
    }

    #[test]
    fn test_timestamps_serialize_as_rfc3339() {
        let u = unit(Mode::PositiveMatch);
        let started = Utc::now() - chrono::Duration::milliseconds(1_500);
        let mut result = TestUnitResult::start_at(&u, started);
        result
            .time_out(vec![TerminalAction::new("a1", "fan_on")], "deadline")
            .unwrap();
        assert!(result.duration_ms().unwrap() >= 1_500);

        let json = serde_json::to_value(&result).unwrap();
        let started_at = json["started_at"].as_str().unwrap();
        assert_eq!(
            DateTime::parse_from_rfc3339(started_at).unwrap().with_timezone(&Utc),
            started
        );
        assert!(json["ended_at"].is_string());
        assert!(json["received_actions"][0]["received_at"].is_string());
    }

    #[test]
    fn test_summary_mentions_missing_score() {
        let u = unit(Mode::PositiveMatch);
        let mut result = TestUnitResult::start(&u);
        result.fail("no transport").unwrap();
        let summary = result.summary();
        assert!(summary.contains("Status: FAILED"));
        assert!(summary.contains("Score: not evaluated"));
        assert!(summary.contains("Error: no transport"));
    }
}
