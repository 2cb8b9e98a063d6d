//! Identity-keyed store of the assembled tree
//!
//! Registering an id twice replaces the earlier entry but keeps its place in
//! iteration order.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{TestCase, TestScenario, TestSuite};

#[derive(Debug)]
struct Keyed<T> {
    items: HashMap<String, Arc<T>>,
    order: Vec<String>,
}

impl<T> Default for Keyed<T> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T> Keyed<T> {
    fn insert(&mut self, id: &str, item: T) -> Arc<T> {
        let item = Arc::new(item);
        if self.items.insert(id.to_string(), Arc::clone(&item)).is_none() {
            self.order.push(id.to_string());
        }
        item
    }

    fn get(&self, id: &str) -> Option<Arc<T>> {
        self.items.get(id).cloned()
    }

    fn iter(&self) -> impl Iterator<Item = Arc<T>> + '_ {
        self.order.iter().filter_map(|id| self.items.get(id).cloned())
    }
}

/// Suites, scenarios and cases available for execution
#[derive(Debug, Default)]
pub struct SuiteRegistry {
    suites: Keyed<TestSuite>,
    scenarios: Keyed<TestScenario>,
    cases: Keyed<TestCase>,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_suite(&mut self, suite: TestSuite) -> Arc<TestSuite> {
        let id = suite.id.clone();
        tracing::debug!(suite_id = %id, units = suite.unit_count(), "Suite registered");
        self.suites.insert(&id, suite)
    }

    pub fn register_scenario(&mut self, scenario: TestScenario) -> Arc<TestScenario> {
        let id = scenario.id.clone();
        self.scenarios.insert(&id, scenario)
    }

    pub fn register_case(&mut self, case: TestCase) -> Arc<TestCase> {
        let id = case.id.clone();
        self.cases.insert(&id, case)
    }

    pub fn suite(&self, id: &str) -> Option<Arc<TestSuite>> {
        self.suites.get(id)
    }

    pub fn scenario(&self, id: &str) -> Option<Arc<TestScenario>> {
        self.scenarios.get(id)
    }

    pub fn case(&self, id: &str) -> Option<Arc<TestCase>> {
        self.cases.get(id)
    }

    /// All suites in registration order
    pub fn suites(&self) -> Vec<Arc<TestSuite>> {
        self.suites.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.suites.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.order.is_empty()
    }
}
