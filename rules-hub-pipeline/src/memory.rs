//! In-memory placeholder store for development and testing

use async_trait::async_trait;
use rules_hub_core::RenderedEntity;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::{PlaceholderStore, StoreError};

/// In-memory store keyed by placeholder id
pub struct InMemoryPlaceholderStore {
    entities: RwLock<HashMap<String, RenderedEntity>>,
}

impl InMemoryPlaceholderStore {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPlaceholderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaceholderStore for InMemoryPlaceholderStore {
    async fn set_entity(&self, entity: RenderedEntity) -> Result<(), StoreError> {
        let mut entities = self.entities.write().unwrap();
        entities.insert(entity.id.clone(), entity);
        Ok(())
    }

    async fn get_entity(&self, id: &str) -> Result<Option<RenderedEntity>, StoreError> {
        let entities = self.entities.read().unwrap();
        Ok(entities.get(id).cloned())
    }
}
