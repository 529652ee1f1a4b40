//! Capability-based action dispatch

use rules_hub_core::{Action, ActionHandler};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Routes action batches to registered handlers by capability
///
/// Every handler whose supported types intersect the types present in a
/// batch receives the matching actions, once per batch (fan-out, not
/// exclusive ownership). Handler invocations run as independent tasks; a
/// failing handler is reported and never prevents the others.
pub struct ActionDispatcher {
    handlers: RwLock<Vec<Arc<dyn ActionHandler>>>,
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register a handler for the action types it supports
    pub fn register(&self, handler: Arc<dyn ActionHandler>) {
        self.handlers.write().unwrap().push(handler);
    }

    /// Dispatch one batch of actions to every capable handler
    pub async fn dispatch(&self, actions: Vec<Action>) {
        if actions.is_empty() {
            return;
        }

        let handlers: Vec<_> = self.handlers.read().unwrap().clone();
        let mut invocations = Vec::new();

        for handler in handlers {
            let supported: HashSet<&String> = handler.supporting_action_types().iter().collect();
            let matching: Vec<Action> = actions
                .iter()
                .filter(|action| supported.contains(&action.action_type))
                .cloned()
                .collect();
            if matching.is_empty() {
                continue;
            }

            invocations.push(tokio::spawn(async move {
                if let Err(e) = handler.execute_action(matching).await {
                    tracing::error!("Action handler execution failed: {:#}", e);
                }
            }));
        }

        for invocation in invocations {
            if invocation.await.is_err() {
                tracing::error!("Action handler task panicked");
            }
        }
    }
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
