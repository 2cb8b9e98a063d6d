//! Single-unit execution
//!
//! A unit runs inside its own session, raced against its deadline and an
//! optional operator interrupt. The session lives in a slot owned by the
//! caller of the race, so it is closed on every exit path before the unit is
//! evaluated.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;

use super::collector::ActionCollector;
use super::evaluator::ResultEvaluator;
use crate::common::config::{Endpoints, Timeouts};
use crate::common::{Error, Result};
use crate::session::{resolve_endpoint, Connector, EndpointConfig, Session};
use crate::model::{TestUnit, TestUnitResult};

/// How the raced part of a unit ended
enum Outcome {
    Collected,
    Failed(String),
    TimedOut,
    Interrupted,
}

/// Runs one unit at a time against a connector
pub struct UnitRunner {
    connector: Arc<dyn Connector>,
    endpoints: Endpoints,
    timeouts: Timeouts,
    shutdown: Option<watch::Receiver<bool>>,
}

impl UnitRunner {
    pub fn new(connector: Arc<dyn Connector>, endpoints: Endpoints, timeouts: Timeouts) -> Self {
        Self {
            connector,
            endpoints,
            timeouts,
            shutdown: None,
        }
    }

    /// Interrupt the unit in flight when the receiver flips to `true`
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Run a unit, store its result in `evaluator` and report whether it passed
    #[tracing::instrument(skip_all, fields(unit_id = %unit.id, mode = %unit.mode))]
    pub async fn run_unit(&self, unit: &TestUnit, evaluator: &mut ResultEvaluator) -> bool {
        let result = TestUnitResult::start(unit);

        let endpoint = match resolve_endpoint(unit, &self.endpoints) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                tracing::error!(error = %e, "Cannot resolve endpoint");
                evaluator.record_failure(result, e.to_string());
                return false;
            }
        };

        let collector = Arc::new(ActionCollector::new());
        let mut slot: Option<Box<dyn Session>> = None;

        let outcome = {
            let drive = AssertUnwindSafe(self.drive(unit, &endpoint, &collector, &mut slot))
                .catch_unwind();
            let deadline = tokio::time::timeout(unit.timeout, drive);
            let mut shutdown = self.shutdown.clone();

            tokio::select! {
                raced = deadline => match raced {
                    Ok(Ok(Ok(()))) => Outcome::Collected,
                    Ok(Ok(Err(e))) => {
                        tracing::debug!(transport = e.is_transport(), error = %e, "Unit drive stopped");
                        Outcome::Failed(e.to_string())
                    }
                    Ok(Err(_panic)) => Outcome::Failed("unit execution panicked".to_string()),
                    Err(_elapsed) => Outcome::TimedOut,
                },
                _ = interrupted(&mut shutdown) => Outcome::Interrupted,
            }
        };

        if let Some(mut session) = slot.take() {
            if let Err(e) = session.close().await {
                tracing::warn!(error = %e, "Closing session failed");
            }
        }

        let received = collector.drain();
        match outcome {
            Outcome::Collected => {
                evaluator.evaluate_unit(result, received);
                let passed = evaluator
                    .result(&unit.id)
                    .is_some_and(|stored| evaluator.is_successful(stored));
                tracing::info!(passed, "Unit finished");
                passed
            }
            Outcome::Failed(message) => {
                tracing::error!(error = %message, "Unit failed");
                evaluator.record_failure(result, message);
                false
            }
            Outcome::TimedOut => {
                let e = Error::UnitTimeout {
                    unit_id: unit.id.clone(),
                    timeout_ms: unit.timeout.as_millis() as u64,
                };
                tracing::error!(error = %e, received = received.len(), "Unit timed out");
                evaluator.record_timeout(result, received, e.to_string());
                false
            }
            Outcome::Interrupted => {
                tracing::warn!("Unit interrupted");
                evaluator.record_interrupt(result, received);
                false
            }
        }
    }

    /// Open the session, send every event, then wait out the collection window
    async fn drive(
        &self,
        unit: &TestUnit,
        endpoint: &EndpointConfig,
        collector: &Arc<ActionCollector>,
        slot: &mut Option<Box<dyn Session>>,
    ) -> Result<()> {
        let mut session = self.connector.open(endpoint).await?;
        let sink = Arc::clone(collector);
        session.on_action(Arc::new(move |action| {
            sink.collect(action);
        }));
        let session = slot.insert(session);
        tracing::debug!(terminal_id = %endpoint.terminal_id, url = %endpoint.url, "Session opened");

        let send_timeout = self.timeouts.send();
        for (index, event) in unit.input_events.iter().enumerate() {
            match tokio::time::timeout(send_timeout, session.send(event)).await {
                Ok(Ok(())) => {
                    tracing::debug!(index, event_type = %event.event_type, "Event sent");
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(Error::SendTimeout {
                        event_type: event.event_type.clone(),
                        timeout_ms: send_timeout.as_millis() as u64,
                    })
                }
            }
        }

        let window = self.timeouts.collection_window(unit.mode, unit.timeout);
        tracing::debug!(window_ms = window.as_millis() as u64, "Waiting for actions");
        tokio::time::sleep(window).await;
        Ok(())
    }
}

/// Resolves once the shutdown flag is set; never without a receiver
async fn interrupted(shutdown: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = shutdown {
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
    std::future::pending::<()>().await
}
