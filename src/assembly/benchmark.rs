//! Benchmark suite files
//!
//! A benchmark file describes one suite against one product: a list of event
//! groups, the actions the rule engine should answer with, and how long to
//! wait for them. Each event group becomes one test unit.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::template::{process_payload, TemplateEngine};
use crate::common::config::Timeouts;
use crate::common::{Error, Result};
use crate::model::{
    InputEvent, Mode, Product, ProductSettings, TestCase, TestScenario, TestSuite, TestUnit,
    TransportKind,
};

/// One benchmark file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub secret_key: String,
    /// `MQTT` or `WS`; MQTT when absent
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub event_groups: Vec<EventGroup>,
    /// How long to wait for actions after the last event, in milliseconds
    #[serde(default)]
    pub duration_of_waiting_actions: Option<u64>,
    #[serde(default)]
    pub expected_action_ids: Vec<String>,
}

/// Events sent by one test unit
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventGroup {
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub name: String,
    /// Mode name; POSITIVE_MATCH when absent
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub auto_generate: bool,
    /// Events to generate, only with `autoGenerate`
    #[serde(default)]
    pub count: Option<usize>,
    /// Fixed events, only without `autoGenerate`
    #[serde(default)]
    pub input_events: Vec<InputEvent>,
    #[serde(default)]
    pub event_template: Option<EventTemplate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTemplate {
    #[serde(default)]
    pub type_selector: Vec<String>,
    #[serde(default)]
    pub payload_templates: HashMap<String, serde_json::Map<String, serde_json::Value>>,
}

impl EventGroup {
    pub fn mode(&self) -> Result<Mode> {
        match &self.mode {
            Some(name) => name.parse(),
            None => Ok(Mode::PositiveMatch),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.group_id.trim().is_empty() {
            return Err(Error::invalid_group("<unnamed>", "groupId must not be empty"));
        }
        let id = self.group_id.as_str();
        self.mode()?;

        if !self.auto_generate {
            if self.input_events.is_empty() {
                return Err(Error::invalid_group(id, "inputEvents must not be empty"));
            }
            return Ok(());
        }

        let template = self
            .event_template
            .as_ref()
            .ok_or_else(|| Error::invalid_group(id, "autoGenerate is set but eventTemplate is missing"))?;
        if template.type_selector.is_empty() {
            return Err(Error::invalid_group(id, "eventTemplate.typeSelector must not be empty"));
        }
        if template.payload_templates.is_empty() {
            return Err(Error::invalid_group(id, "eventTemplate.payloadTemplates must not be empty"));
        }
        if let Some(missing) = template
            .type_selector
            .iter()
            .find(|t| !template.payload_templates.contains_key(*t))
        {
            return Err(Error::invalid_group(
                id,
                format!("event type '{}' has no payload template", missing),
            ));
        }
        if self.count == Some(0) {
            return Err(Error::invalid_group(id, "count must be at least 1"));
        }
        Ok(())
    }

    /// Events for this group, generating them when `autoGenerate` is set
    pub fn events(&self, templates: &dyn TemplateEngine, rng: &mut impl Rng) -> Vec<InputEvent> {
        let template = match (&self.event_template, self.auto_generate) {
            (Some(template), true) => template,
            _ => return self.input_events.clone(),
        };

        let count = self.count.unwrap_or(1);
        let mut events = Vec::with_capacity(count);
        for round in 1..=count {
            let Some(event_type) = template.type_selector.choose(rng) else {
                tracing::warn!(group_id = %self.group_id, round, "No event type to choose from");
                continue;
            };
            let Some(payload_template) = template.payload_templates.get(event_type) else {
                tracing::warn!(group_id = %self.group_id, round, %event_type, "No payload template");
                continue;
            };
            events.push(InputEvent {
                event_type: event_type.clone(),
                payload: process_payload(templates, payload_template),
            });
        }
        events
    }
}

impl BenchmarkConfig {
    /// Load and validate a benchmark file (JSON, or YAML by extension)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| Error::ConfigParse(format!("{}: {}", path.display(), e)))?,
            _ => serde_json::from_str(&content)
                .map_err(|e| Error::ConfigParse(format!("{}: {}", path.display(), e)))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check everything that can be checked before any session is opened
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Config("benchmark id must not be empty".to_string()));
        }
        if self.product_id.trim().is_empty() {
            return Err(Error::Config(format!(
                "benchmark '{}' has no productId",
                self.id
            )));
        }
        if self.secret_key.trim().is_empty() {
            return Err(Error::MissingSecretKey {
                product: self.product_id.clone(),
            });
        }
        self.transport()?;
        if self.event_groups.is_empty() {
            return Err(Error::Config(format!(
                "benchmark '{}' has no eventGroups; add at least one",
                self.id
            )));
        }
        for group in &self.event_groups {
            group.validate()?;
        }
        Ok(())
    }

    pub fn transport(&self) -> Result<TransportKind> {
        match &self.protocol {
            Some(name) => name.parse(),
            None => Ok(TransportKind::Mqtt),
        }
    }

    /// Budget for every unit of this benchmark
    ///
    /// With a configured wait the positive collection window equals that wait.
    pub fn unit_timeout(&self, timeouts: &Timeouts) -> Duration {
        match self.duration_of_waiting_actions {
            Some(wait) => Duration::from_millis(wait) + timeouts.delivery_reserve(),
            None => timeouts.unit_default(),
        }
    }

    fn product(&self) -> Result<Product> {
        Ok(Product {
            id: self.product_id.clone(),
            name: self.name.clone(),
            settings: ProductSettings {
                secret_keys: vec![self.secret_key.clone()],
                transports: vec![self.transport()?],
            },
        })
    }

    /// Build the suite: one scenario, one case, one unit per event group
    pub fn into_suite(&self, templates: &dyn TemplateEngine, timeouts: &Timeouts) -> Result<TestSuite> {
        self.into_suite_with(templates, timeouts, &mut rand::thread_rng())
    }

    pub fn into_suite_with(
        &self,
        templates: &dyn TemplateEngine,
        timeouts: &Timeouts,
        rng: &mut impl Rng,
    ) -> Result<TestSuite> {
        self.validate()?;
        let product = Arc::new(self.product()?);
        let scenario_id = format!("{}-scenario", self.id);
        let case_id = format!("{}-case", self.id);
        let timeout = self.unit_timeout(timeouts);

        let mut units = Vec::with_capacity(self.event_groups.len());
        for group in &self.event_groups {
            let mode = group.mode()?;
            let mut unit =
                TestUnit::new(mode, Arc::clone(&product)).within(&self.id, &scenario_id, &case_id);
            unit.input_events = group.events(templates, rng);
            unit.expected_action_ids = if mode.expects_actions() {
                self.expected_action_ids.clone()
            } else {
                Vec::new()
            };
            unit.timeout = timeout;
            tracing::info!(
                group_id = %group.group_id,
                unit_id = %unit.id,
                %mode,
                events = unit.input_events.len(),
                "Event group assembled"
            );
            units.push(unit);
        }

        Ok(TestSuite {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            scenarios: vec![TestScenario {
                id: scenario_id,
                name: self.name.clone(),
                product_id: self.product_id.clone(),
                scene_id: None,
                cases: vec![TestCase {
                    id: case_id,
                    name: self.name.clone(),
                    product_id: self.product_id.clone(),
                    scene_id: None,
                    rule: None,
                    units,
                }],
            }],
            product,
        })
    }
}
