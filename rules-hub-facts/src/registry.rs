//! Named broadcast fact streams with replay-of-latest semantics

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::FactError;

/// One named stream: the latest pushed value plus the live subscribers
#[derive(Default)]
struct FactStream {
    latest: Option<Value>,
    subscribers: Vec<mpsc::UnboundedSender<Value>>,
}

/// Registry state guarded by a single lock so stream creation and pushes
/// are serialized under concurrent first-access
#[derive(Default)]
struct Inner {
    streams: HashMap<String, FactStream>,
    change_feeds: Vec<mpsc::UnboundedSender<String>>,
}

/// Sole owner and mutator of the named fact streams
///
/// Subscribers hold only an observe capability; reads never mutate stream
/// state. Unknown names are lazily created, never an error.
#[derive(Default)]
pub struct FactRegistry {
    inner: Mutex<Inner>,
}

impl FactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the latest value of a fact and notify all current subscribers
    ///
    /// Called by external fact producers. Creates the stream if absent.
    /// Deliveries happen in `push` call order, per fact name.
    pub fn push(&self, name: &str, value: Value) {
        let mut inner = self.inner.lock();
        let stream = inner.streams.entry(name.to_string()).or_default();
        stream.latest = Some(value.clone());
        stream
            .subscribers
            .retain(|tx| tx.send(value.clone()).is_ok());
        inner
            .change_feeds
            .retain(|tx| tx.send(name.to_string()).is_ok());
    }

    /// Retrieve or lazily create the named fact stream and subscribe to it
    ///
    /// The subscription immediately replays the most recent value if one
    /// was pushed before it joined, then observes every subsequent push.
    pub fn subscribe(&self, name: &str) -> FactSubscription {
        let mut inner = self.inner.lock();
        let stream = match inner.streams.entry(name.to_string()) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                tracing::debug!(fact = name, "created fact stream");
                entry.insert(FactStream::default())
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(latest) = &stream.latest {
            // Replay before the sender joins the live set, so the first
            // received value is always the latest-at-subscription.
            let _ = tx.send(latest.clone());
        }
        stream.subscribers.push(tx);

        FactSubscription {
            name: name.to_string(),
            rx,
        }
    }

    /// One-shot read: await the first emission of the named fact stream
    ///
    /// Suspends until the fact has emitted at least once; further updates do
    /// not affect the returned snapshot. There is no timeout here; callers
    /// needing one must wrap externally.
    pub async fn snapshot(&self, name: &str) -> Result<Value, FactError> {
        self.subscribe(name).recv().await
    }

    /// Current value of a fact, if it ever emitted
    pub fn latest(&self, name: &str) -> Option<Value> {
        let inner = self.inner.lock();
        inner.streams.get(name).and_then(|s| s.latest.clone())
    }

    /// Non-blocking snapshot of the already-known values for a set of facts
    ///
    /// Facts that never emitted are omitted from the map. Used by rule
    /// evaluation, which reads facts as known snapshots and never suspends.
    pub fn current_values<'a>(
        &self,
        names: impl IntoIterator<Item = &'a String>,
    ) -> HashMap<String, Value> {
        let inner = self.inner.lock();
        names
            .into_iter()
            .filter_map(|name| {
                inner
                    .streams
                    .get(name)
                    .and_then(|s| s.latest.clone())
                    .map(|value| (name.clone(), value))
            })
            .collect()
    }

    /// Feed of fact names, one message per `push`, with no replay
    ///
    /// Consumed by the rule engine's run loop to coalesce change ticks.
    pub fn changes(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().change_feeds.push(tx);
        rx
    }
}

/// Observe capability over one named fact stream
pub struct FactSubscription {
    name: String,
    rx: mpsc::UnboundedReceiver<Value>,
}

impl FactSubscription {
    /// Name of the observed fact
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Receive the next value, replayed or live
    ///
    /// Fails only if the registry was dropped while waiting.
    pub async fn recv(mut self) -> Result<Value, FactError> {
        self.next().await
    }

    /// Receive the next value without consuming the subscription
    pub async fn next(&mut self) -> Result<Value, FactError> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| FactError::Closed(self.name.clone()))
    }

    /// Adapt the subscription into a `Stream` of values
    pub fn into_stream(self) -> UnboundedReceiverStream<Value> {
        UnboundedReceiverStream::new(self.rx)
    }
}
