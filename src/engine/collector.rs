//! Per-unit action buffer

use std::collections::HashSet;
use std::sync::Mutex;

use crate::model::TerminalAction;

/// Deduplicating, insertion-ordered buffer of received actions
///
/// One collector exists per unit. The transport may redeliver an action, so
/// only the first occurrence of each action id is kept.
#[derive(Debug, Default)]
pub struct ActionCollector {
    inner: Mutex<Collected>,
}

#[derive(Debug, Default)]
struct Collected {
    seen: HashSet<String>,
    actions: Vec<TerminalAction>,
}

impl ActionCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an action unless its id was already seen
    ///
    /// Returns whether the action was new.
    pub fn collect(&self, action: TerminalAction) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if !inner.seen.insert(action.id.clone()) {
            tracing::trace!(action_id = %action.id, "Dropping redelivered action");
            return false;
        }
        tracing::debug!(action_id = %action.id, meta_action_id = %action.meta_action_id, "Action received");
        inner.actions.push(action);
        true
    }

    /// Snapshot of the buffer in arrival order; the buffer is left intact
    pub fn drain(&self) -> Vec<TerminalAction> {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .actions
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
