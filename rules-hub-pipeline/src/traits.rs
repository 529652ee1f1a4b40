//! Store publication interface

use async_trait::async_trait;
use rules_hub_core::RenderedEntity;

use crate::StoreError;

/// State store the pipeline publishes rendered entities into
///
/// `set_entity` mirrors a "set entity" state transition: the entity
/// replaces any previously published one with the same id.
#[async_trait]
pub trait PlaceholderStore: Send + Sync {
    /// Publish a rendered entity, keyed by its id
    async fn set_entity(&self, entity: RenderedEntity) -> Result<(), StoreError>;

    /// Get a published entity by id
    async fn get_entity(&self, id: &str) -> Result<Option<RenderedEntity>, StoreError>;
}
