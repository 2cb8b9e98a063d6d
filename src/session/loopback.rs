//! In-process loopback transport
//!
//! Stands in for the rule engine: a script maps event types to the actions
//! the engine would send back. Used by `rulebench run` and the tests.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{ActionHandler, Connector, EndpointConfig, Session};
use crate::common::{Error, Result};
use crate::model::{InputEvent, TerminalAction};

/// Scripted behaviour of the loopback rule engine
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopbackScript {
    #[serde(default)]
    pub rules: Vec<LoopbackRule>,

    /// Delay before a send is acknowledged
    #[serde(default)]
    pub ack_delay_ms: u64,

    /// Event types whose send is refused
    #[serde(default)]
    pub rejected_types: Vec<String>,

    /// Event types whose send panics, for exercising unit isolation
    #[serde(default)]
    pub panic_types: Vec<String>,

    /// Refuse every session
    #[serde(default)]
    pub refuse_sessions: bool,
}

/// One `event type → actions` reaction
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopbackRule {
    /// Event type that triggers the reaction
    pub event: String,
    /// Meta-action ids delivered back
    pub actions: Vec<String>,
    /// Delay between the acknowledged send and delivery
    #[serde(default)]
    pub delay_ms: u64,
    /// Deliver every action twice with the same id
    #[serde(default)]
    pub redeliver: bool,
}

impl LoopbackRule {
    pub fn new(event: &str, actions: &[&str]) -> Self {
        Self {
            event: event.to_string(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
            delay_ms: 0,
            redeliver: false,
        }
    }

    pub fn delayed(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn redelivered(mut self) -> Self {
        self.redeliver = true;
        self
    }
}

impl LoopbackScript {
    /// Load a script from YAML or JSON, chosen by extension
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

/// Connector whose sessions are served by a [`LoopbackScript`]
pub struct LoopbackConnector {
    script: Arc<LoopbackScript>,
    next_action: Arc<AtomicU64>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl LoopbackConnector {
    pub fn new(script: LoopbackScript) -> Self {
        Self {
            script: Arc::new(script),
            next_action: Arc::new(AtomicU64::new(1)),
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sessions opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Sessions closed so far
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn open(&self, endpoint: &EndpointConfig) -> Result<Box<dyn Session>> {
        if self.script.refuse_sessions {
            return Err(Error::SessionOpenFailed {
                url: endpoint.url.clone(),
                reason: "loopback script refuses sessions".to_string(),
            });
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(terminal_id = %endpoint.terminal_id, transport = %endpoint.transport, "Loopback session opened");
        Ok(Box::new(LoopbackSession {
            terminal_id: endpoint.terminal_id.clone(),
            script: Arc::clone(&self.script),
            next_action: Arc::clone(&self.next_action),
            closed_count: Arc::clone(&self.closed),
            handler: Arc::new(Mutex::new(None)),
            closed: false,
        }))
    }
}

/// Handler slot shared with delivery tasks; `None` once the session closes
type HandlerSlot = Arc<Mutex<Option<ActionHandler>>>;

struct LoopbackSession {
    terminal_id: String,
    script: Arc<LoopbackScript>,
    next_action: Arc<AtomicU64>,
    closed_count: Arc<AtomicUsize>,
    handler: HandlerSlot,
    closed: bool,
}

impl LoopbackSession {
    fn shut(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // Holding the lock here waits out any delivery in progress
        self.handler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        self.closed_count.fetch_add(1, Ordering::SeqCst);
    }

    fn schedule(&self, rule: &LoopbackRule) {
        let actions: Vec<TerminalAction> = rule
            .actions
            .iter()
            .map(|meta| {
                let n = self.next_action.fetch_add(1, Ordering::SeqCst);
                TerminalAction::new(format!("{}-{}", self.terminal_id, n), meta.clone())
            })
            .collect();
        let copies = if rule.redeliver { 2 } else { 1 };
        let delay = Duration::from_millis(rule.delay_ms);
        let slot = Arc::clone(&self.handler);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for _ in 0..copies {
                for action in &actions {
                    let guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                    match guard.as_ref() {
                        Some(handler) => handler(action.clone()),
                        None => return,
                    }
                }
            }
        });
    }
}

#[async_trait]
impl Session for LoopbackSession {
    fn on_action(&mut self, handler: ActionHandler) {
        if !self.closed {
            *self
                .handler
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handler);
        }
    }

    async fn send(&mut self, event: &InputEvent) -> Result<()> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        if self.script.panic_types.contains(&event.event_type) {
            panic!("loopback session asked to panic on '{}'", event.event_type);
        }
        if self.script.rejected_types.contains(&event.event_type) {
            return Err(Error::send_failed(&event.event_type, "rejected by loopback script"));
        }
        if self.script.ack_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.script.ack_delay_ms)).await;
        }

        for rule in self.script.rules.iter().filter(|r| r.event == event.event_type) {
            self.schedule(rule);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.shut();
        tracing::debug!(terminal_id = %self.terminal_id, "Loopback session closed");
        Ok(())
    }
}

impl Drop for LoopbackSession {
    fn drop(&mut self) {
        self.shut();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransportKind;

    fn endpoint() -> EndpointConfig {
        EndpointConfig {
            url: "loopback".into(),
            transport: TransportKind::Mqtt,
            product_id: "p1".into(),
            terminal_id: "Test-p1-u1".into(),
            secret_key: "k".into(),
            protocol_version: "v1".into(),
        }
    }

    fn recorder() -> (ActionHandler, Arc<Mutex<Vec<TerminalAction>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: ActionHandler = Arc::new(move |a| sink.lock().unwrap().push(a));
        (handler, seen)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rule_delivers_after_delay() {
        let connector = LoopbackConnector::new(LoopbackScript {
            rules: vec![LoopbackRule::new("door_open", &["light_on", "alarm"]).delayed(500)],
            ..Default::default()
        });
        let mut session = connector.open(&endpoint()).await.unwrap();
        let (handler, seen) = recorder();
        session.on_action(handler);

        session.send(&InputEvent::new("door_open")).await.unwrap();
        session.send(&InputEvent::new("unrelated")).await.unwrap();
        assert!(seen.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        let metas: Vec<String> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.meta_action_id.clone())
            .collect();
        assert_eq!(metas, vec!["light_on", "alarm"]);

        session.close().await.unwrap();
        assert_eq!(connector.opened(), 1);
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delivery_after_close() {
        let connector = LoopbackConnector::new(LoopbackScript {
            rules: vec![LoopbackRule::new("door_open", &["light_on"]).delayed(1_000)],
            ..Default::default()
        });
        let mut session = connector.open(&endpoint()).await.unwrap();
        let (handler, seen) = recorder();
        session.on_action(handler);
        session.send(&InputEvent::new("door_open")).await.unwrap();
        session.close().await.unwrap();

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert!(seen.lock().unwrap().is_empty());
        assert!(matches!(
            session.send(&InputEvent::new("door_open")).await,
            Err(Error::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_rejected_type_fails_send() {
        let connector = LoopbackConnector::new(LoopbackScript {
            rejected_types: vec!["bad".into()],
            ..Default::default()
        });
        let mut session = connector.open(&endpoint()).await.unwrap();
        let err = session.send(&InputEvent::new("bad")).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_script_from_yaml() {
        let script: LoopbackScript = serde_yaml::from_str(
            "ackDelayMs: 10\nrules:\n  - event: temp_high\n    actions: [fan_on]\n    delayMs: 200\n    redeliver: true\n",
        )
        .unwrap();
        assert_eq!(script.ack_delay_ms, 10);
        assert_eq!(script.rules[0].event, "temp_high");
        assert!(script.rules[0].redeliver);
        assert!(script.rejected_types.is_empty());
    }
}
