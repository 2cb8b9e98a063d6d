//! Benchmark data model
//!
//! The tree is suite → scenario → case → unit. Everything here is built once
//! during assembly and only read while the benchmark runs.

mod product;
mod report;
mod result;

pub use product::*;
pub use report::*;
pub use result::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::common::Error;

/// Default overall budget for one test unit
pub const DEFAULT_UNIT_TIMEOUT: Duration = Duration::from_millis(50_000);

/// What a test unit is probing for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    /// The rule should fire and produce the expected actions
    PositiveMatch,
    /// The rule should not fire at all
    NegativeMatch,
    /// Edge-of-threshold input; the rule should still fire
    BoundaryCondition,
}

impl Mode {
    /// All modes in reporting order
    pub const ALL: [Mode; 3] = [Mode::PositiveMatch, Mode::NegativeMatch, Mode::BoundaryCondition];

    /// Natural-language description handed to event generators
    pub fn description(&self) -> &'static str {
        match self {
            Mode::PositiveMatch => {
                "Generate an event sequence that fully satisfies the rule so that it fires. \
                 Keep the order the rule requires, stay inside its time window and meet every condition."
            }
            Mode::NegativeMatch => {
                "Generate an event sequence that deliberately does not satisfy the rule. \
                 Drop a key event, reorder events, exceed the time window or violate a condition."
            }
            Mode::BoundaryCondition => {
                "Generate an event sequence at the edge of the rule. Use the minimum number of events, \
                 intervals close to the window limit and values close to the thresholds."
            }
        }
    }

    /// Whether units of this mode expect the rule to produce actions
    pub fn expects_actions(&self) -> bool {
        !matches!(self, Mode::NegativeMatch)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::PositiveMatch => write!(f, "POSITIVE_MATCH"),
            Mode::NegativeMatch => write!(f, "NEGATIVE_MATCH"),
            Mode::BoundaryCondition => write!(f, "BOUNDARY_CONDITION"),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "POSITIVE_MATCH" => Ok(Mode::PositiveMatch),
            "NEGATIVE_MATCH" => Ok(Mode::NegativeMatch),
            "BOUNDARY_CONDITION" => Ok(Mode::BoundaryCondition),
            _ => Err(Error::UnknownMode(s.to_string())),
        }
    }
}

/// One synthetic event sent to the device-facing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    /// Meta-event type
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl InputEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: serde_json::Map::new(),
        }
    }
}

/// An action callback observed during a unit's collection window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalAction {
    /// Delivery id; redeliveries of the same action share it
    pub id: String,
    /// Catalog id of the action the rule engine emitted
    pub meta_action_id: String,
    pub received_at: DateTime<Utc>,
}

impl TerminalAction {
    pub fn new(id: impl Into<String>, meta_action_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            meta_action_id: meta_action_id.into(),
            received_at: Utc::now(),
        }
    }
}

/// The smallest executable probe
#[derive(Debug, Clone)]
pub struct TestUnit {
    pub id: String,
    /// Suite the unit's result is grouped under
    pub suite_id: String,
    pub scenario_id: String,
    pub case_id: String,
    pub mode: Mode,
    pub product: Arc<Product>,
    pub scene_id: Option<String>,
    pub input_events: Vec<InputEvent>,
    /// Empty for NEGATIVE_MATCH units
    pub expected_action_ids: Vec<String>,
    pub timeout: Duration,
}

impl TestUnit {
    /// Create a unit with a fresh id and the default timeout
    pub fn new(mode: Mode, product: Arc<Product>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            suite_id: String::new(),
            scenario_id: String::new(),
            case_id: String::new(),
            mode,
            product,
            scene_id: None,
            input_events: Vec::new(),
            expected_action_ids: Vec::new(),
            timeout: DEFAULT_UNIT_TIMEOUT,
        }
    }

    /// Place the unit in the tree
    pub fn within(mut self, suite_id: &str, scenario_id: &str, case_id: &str) -> Self {
        self.suite_id = suite_id.to_string();
        self.scenario_id = scenario_id.to_string();
        self.case_id = case_id.to_string();
        self
    }
}

/// Units probing one rule from different angles
#[derive(Debug, Clone)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    pub product_id: String,
    pub scene_id: Option<String>,
    pub rule: Option<RuleDefinition>,
    pub units: Vec<TestUnit>,
}

/// One scene of one product
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub id: String,
    pub name: String,
    pub product_id: String,
    pub scene_id: Option<String>,
    pub cases: Vec<TestCase>,
}

/// Top of the tree, one per product or benchmark file
#[derive(Debug, Clone)]
pub struct TestSuite {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub product: Arc<Product>,
    pub scenarios: Vec<TestScenario>,
}

impl TestSuite {
    /// Iterate every unit in tree order
    pub fn units(&self) -> impl Iterator<Item = &TestUnit> {
        self.scenarios
            .iter()
            .flat_map(|s| s.cases.iter())
            .flat_map(|c| c.units.iter())
    }

    pub fn unit_count(&self) -> usize {
        self.units().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trips_through_names() {
        for mode in Mode::ALL {
            assert_eq!(mode.to_string().parse::<Mode>().unwrap(), mode);
        }
        assert_eq!(
            "negative_match".parse::<Mode>().unwrap(),
            Mode::NegativeMatch
        );
        assert!(matches!(
            "FUZZ".parse::<Mode>(),
            Err(Error::UnknownMode(m)) if m == "FUZZ"
        ));
    }

    #[test]
    fn test_mode_serde_names() {
        let json = serde_json::to_string(&Mode::BoundaryCondition).unwrap();
        assert_eq!(json, "\"BOUNDARY_CONDITION\"");
        assert!(serde_json::from_str::<Mode>("\"SOMETHING_ELSE\"").is_err());
    }

    #[test]
    fn test_new_units_get_distinct_ids() {
        let product = Arc::new(Product {
            id: "p".into(),
            name: String::new(),
            settings: ProductSettings::default(),
        });
        let a = TestUnit::new(Mode::PositiveMatch, product.clone());
        let b = TestUnit::new(Mode::PositiveMatch, product);
        assert_ne!(a.id, b.id);
        assert_eq!(a.timeout, DEFAULT_UNIT_TIMEOUT);
    }

    #[test]
    fn test_input_event_wire_shape() {
        let event: InputEvent =
            serde_json::from_str(r#"{"type": "temperature", "payload": {"value": 31}}"#).unwrap();
        assert_eq!(event.event_type, "temperature");
        assert_eq!(event.payload["value"], 31);

        let bare: InputEvent = serde_json::from_str(r#"{"type": "door_open"}"#).unwrap();
        assert!(bare.payload.is_empty());
    }
}
