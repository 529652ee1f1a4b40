//! End-to-end placeholder orchestration with last-trigger-wins supersede

use parking_lot::Mutex;
use rules_hub_core::{RenderedEntity, TemplateReply};
use rules_hub_resolver::TemplateResolver;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::{PipelineError, PlaceholderStore};

/// External trigger carrying the identity and location of a placeholder
#[derive(Debug, Clone)]
pub struct PlaceholderTrigger {
    /// Identity the rendered entity is published under
    pub id: String,
    /// Template url the reply was fetched from
    pub url: String,
    /// Resolved template url, if the caller rewrote it
    pub resolved_url: Option<String>,
}

impl PlaceholderTrigger {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            resolved_url: None,
        }
    }
}

struct Inner {
    resolver: Arc<TemplateResolver>,
    store: Arc<dyn PlaceholderStore>,
    generations: Mutex<HashMap<String, u64>>,
    publish_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Fetches, resolves and publishes placeholder templates
///
/// Each trigger registers a per-id generation at submission time; a
/// resolution whose generation is stale once it completes publishes
/// nothing (last-trigger-wins per id). That discard is the pipeline's only
/// cancellation semantic.
#[derive(Clone)]
pub struct PlaceholderContentPipeline {
    inner: Arc<Inner>,
}

impl PlaceholderContentPipeline {
    pub fn new(resolver: Arc<TemplateResolver>, store: Arc<dyn PlaceholderStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                resolver,
                store,
                generations: Mutex::new(HashMap::new()),
                publish_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Submit a trigger, spawning its resolution
    ///
    /// The supersede generation is registered synchronously, so submission
    /// order decides which trigger wins for an id. The handle yields the
    /// published entity, or `None` when the resolution was superseded.
    pub fn submit<F>(
        &self,
        trigger: PlaceholderTrigger,
        pending_fetch: F,
    ) -> JoinHandle<Result<Option<RenderedEntity>, PipelineError>>
    where
        F: Future<Output = anyhow::Result<TemplateReply>> + Send + 'static,
    {
        let generation = self.inner.begin(&trigger.id);
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.process(trigger, generation, pending_fetch).await })
    }

    /// Handle a trigger inline, awaiting the published entity
    pub async fn handle_trigger<F>(
        &self,
        trigger: PlaceholderTrigger,
        pending_fetch: F,
    ) -> Result<Option<RenderedEntity>, PipelineError>
    where
        F: Future<Output = anyhow::Result<TemplateReply>> + Send,
    {
        let generation = self.inner.begin(&trigger.id);
        self.inner.process(trigger, generation, pending_fetch).await
    }
}

impl Inner {
    fn begin(&self, id: &str) -> u64 {
        let mut generations = self.generations.lock();
        let entry = generations.entry(id.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    fn is_current(&self, id: &str, generation: u64) -> bool {
        self.generations.lock().get(id) == Some(&generation)
    }

    /// Lock serializing check-and-publish for one id
    fn publish_lock(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.publish_locks.lock();
        locks.entry(id.to_string()).or_default().clone()
    }

    async fn process<F>(
        &self,
        trigger: PlaceholderTrigger,
        generation: u64,
        pending_fetch: F,
    ) -> Result<Option<RenderedEntity>, PipelineError>
    where
        F: Future<Output = anyhow::Result<TemplateReply>> + Send,
    {
        let reply = pending_fetch.await.map_err(PipelineError::Fetch)?;
        let rendered = self.resolver.resolve(reply).await?;

        // Check-and-publish must be atomic per id: without the lock a stale
        // resolution could pass the generation check, suspend inside
        // `set_entity` and overwrite a newer publication.
        let lock = self.publish_lock(&trigger.id);
        let _publishing = lock.lock().await;

        if !self.is_current(&trigger.id, generation) {
            tracing::debug!(id = %trigger.id, "discarding superseded placeholder resolution");
            return Ok(None);
        }

        if rendered.unknown_type_found {
            tracing::warn!(
                id = %trigger.id,
                url = %trigger.url,
                "placeholder template contains variables of an unknown type"
            );
        }

        let entity = RenderedEntity::new(
            trigger.id,
            Some(trigger.url),
            trigger.resolved_url,
            rendered,
        );
        self.store.set_entity(entity.clone()).await?;

        // A newer trigger submitted during the write is queued on the lock
        // and publishes right after it, so this result counts as discarded.
        if !self.is_current(&entity.id, generation) {
            tracing::debug!(id = %entity.id, "discarding superseded placeholder resolution");
            return Ok(None);
        }
        Ok(Some(entity))
    }
}
