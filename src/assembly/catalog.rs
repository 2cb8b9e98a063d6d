//! Suites assembled from the product catalog
//!
//! Every product becomes a suite, every scene a scenario and every rule
//! with output actions a case. Each case probes its rule in all three modes
//! with events produced by an [`EventGenerator`].

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{Error, Result};
use crate::engine::SuiteRegistry;
use crate::model::{
    InputEvent, MetaAction, MetaEvent, Mode, Product, RuleDefinition, Scene, TestCase,
    TestScenario, TestSuite, TestUnit,
};

/// Read-only lookups into the product catalog
pub trait Catalog: Send + Sync {
    fn products(&self) -> Vec<Product>;

    fn product(&self, id: &str) -> Option<Product> {
        self.products().into_iter().find(|p| p.id == id)
    }

    fn scenes(&self, product_id: &str) -> Vec<Scene>;

    fn meta_events(&self, product_id: &str) -> Vec<MetaEvent>;

    fn meta_actions(&self, product_id: &str) -> Vec<MetaAction>;
}

/// In-memory catalog, loadable from YAML or JSON
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticCatalog {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub meta_events: Vec<MetaEvent>,
    #[serde(default)]
    pub meta_actions: Vec<MetaAction>,
}

impl StaticCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            _ => Ok(serde_yaml::from_str(&content)?),
        }
    }
}

impl Catalog for StaticCatalog {
    fn products(&self) -> Vec<Product> {
        self.products.clone()
    }

    fn scenes(&self, product_id: &str) -> Vec<Scene> {
        self.scenes
            .iter()
            .filter(|s| s.product_id == product_id)
            .cloned()
            .collect()
    }

    fn meta_events(&self, product_id: &str) -> Vec<MetaEvent> {
        self.meta_events
            .iter()
            .filter(|e| e.product_id == product_id)
            .cloned()
            .collect()
    }

    fn meta_actions(&self, product_id: &str) -> Vec<MetaAction> {
        self.meta_actions
            .iter()
            .filter(|a| a.product_id == product_id)
            .cloned()
            .collect()
    }
}

/// Produces input events that probe a rule in a given mode
#[async_trait]
pub trait EventGenerator: Send + Sync {
    async fn generate(
        &self,
        rule: &RuleDefinition,
        meta_events: &[MetaEvent],
        mode: Mode,
        guidance: &str,
    ) -> Result<Vec<InputEvent>>;
}

pub struct CatalogAssembler<'a> {
    catalog: &'a dyn Catalog,
    generator: &'a dyn EventGenerator,
    unit_timeout: Duration,
}

impl<'a> CatalogAssembler<'a> {
    pub fn new(catalog: &'a dyn Catalog, generator: &'a dyn EventGenerator, unit_timeout: Duration) -> Self {
        Self {
            catalog,
            generator,
            unit_timeout,
        }
    }

    /// Assemble and register a suite per catalog product
    ///
    /// Products that cannot host a terminal session are rejected here,
    /// before anything touches the network.
    pub async fn assemble(&self, registry: &mut SuiteRegistry) -> Result<Vec<Arc<TestSuite>>> {
        let mut suites = Vec::new();
        for product in self.catalog.products() {
            let suite = self.assemble_product(product, registry).await?;
            suites.push(registry.register_suite(suite));
        }
        Ok(suites)
    }

    async fn assemble_product(&self, product: Product, registry: &mut SuiteRegistry) -> Result<TestSuite> {
        if product.secret_key().is_none() {
            return Err(Error::MissingSecretKey {
                product: product.id.clone(),
            });
        }
        if product.settings.transports.is_empty() {
            return Err(Error::UnsupportedTransport {
                product: product.id.clone(),
            });
        }

        let product = Arc::new(product);
        let meta_events = self.catalog.meta_events(&product.id);
        // Empty when the catalog does not list actions; nothing is checked then
        let known_actions: HashSet<String> = self
            .catalog
            .meta_actions(&product.id)
            .into_iter()
            .map(|a| a.id)
            .collect();
        let mut scenarios = Vec::new();

        for scene in self.catalog.scenes(&product.id) {
            let mut cases = Vec::new();
            for rule in &scene.rules {
                if rule.output_action_ids.is_empty() {
                    tracing::debug!(rule_id = %rule.id, "Rule has no output actions, skipping");
                    continue;
                }
                if let Some(unknown) = rule
                    .output_action_ids
                    .iter()
                    .find(|id| !known_actions.is_empty() && !known_actions.contains(*id))
                {
                    tracing::warn!(rule_id = %rule.id, action_id = %unknown, "Rule outputs an action the catalog does not know, skipping");
                    continue;
                }
                let case = self.assemble_case(&product, &scene, rule, &meta_events).await;
                cases.push(case.clone());
                registry.register_case(case);
            }

            let scenario = TestScenario {
                id: scene.id.clone(),
                name: scene.name.clone(),
                product_id: product.id.clone(),
                scene_id: Some(scene.id.clone()),
                cases,
            };
            registry.register_scenario(scenario.clone());
            scenarios.push(scenario);
        }

        tracing::info!(product_id = %product.id, scenarios = scenarios.len(), "Product assembled");
        Ok(TestSuite {
            id: product.id.clone(),
            name: product.label().to_string(),
            description: None,
            product,
            scenarios,
        })
    }

    async fn assemble_case(
        &self,
        product: &Arc<Product>,
        scene: &Scene,
        rule: &RuleDefinition,
        meta_events: &[MetaEvent],
    ) -> TestCase {
        let mut units = Vec::with_capacity(Mode::ALL.len());
        for mode in Mode::ALL {
            let input_events = match self
                .generator
                .generate(rule, meta_events, mode, mode.description())
                .await
            {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!(rule_id = %rule.id, %mode, error = %e, "Event generation failed, unit gets no events");
                    Vec::new()
                }
            };

            let mut unit = TestUnit::new(mode, Arc::clone(product)).within(&product.id, &scene.id, &rule.id);
            unit.scene_id = Some(scene.id.clone());
            unit.input_events = input_events;
            unit.timeout = self.unit_timeout;
            if mode.expects_actions() {
                unit.expected_action_ids = rule.output_action_ids.clone();
            }
            units.push(unit);
        }

        TestCase {
            id: rule.id.clone(),
            name: format!("{}:{}", scene.name, rule.name),
            product_id: product.id.clone(),
            scene_id: Some(scene.id.clone()),
            rule: Some(rule.clone()),
            units,
        }
    }
}
