//! Action handler interface

use async_trait::async_trait;

use crate::models::Action;

/// Handler executed by the engine for the action types it supports
///
/// Handlers are registered once with the dispatcher and invoked with the
/// subset of a batch matching their supported types. Execution failures are
/// reported by the dispatcher and never affect other handlers.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Action types supported by the handler
    fn supporting_action_types(&self) -> &[String];

    /// Execute the actions of one dispatch batch matching the supported types
    async fn execute_action(&self, actions: Vec<Action>) -> anyhow::Result<()>;
}
