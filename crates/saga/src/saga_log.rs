//! Append-only in-memory log of saga events.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{OrderId, SagaId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::events::SagaEvent;
use crate::instance::SagaInstance;

/// One recorded saga event with its position in the saga's stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaLogEntry {
    pub saga_id: SagaId,
    /// 1-based position within the saga's stream.
    pub version: u64,
    pub event_type: String,
    pub recorded_at: DateTime<Utc>,
    pub event: SagaEvent,
}

#[derive(Debug, Default)]
struct LogState {
    streams: HashMap<SagaId, Vec<SagaLogEntry>>,
    by_order: HashMap<OrderId, SagaId>,
}

/// Stores every saga's events and rebuilds saga instances on demand.
///
/// Entries are never modified or removed. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct SagaLog {
    state: Arc<RwLock<LogState>>,
}

impl SagaLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event to the saga's stream and returns its version.
    pub async fn append(&self, saga_id: SagaId, event: SagaEvent) -> u64 {
        let mut state = self.state.write().await;
        if let Some(order_id) = event.order_id() {
            state.by_order.insert(order_id.clone(), saga_id);
        }
        let stream = state.streams.entry(saga_id).or_default();
        let version = stream.len() as u64 + 1;
        stream.push(SagaLogEntry {
            saga_id,
            version,
            event_type: event.event_type().to_string(),
            recorded_at: Utc::now(),
            event,
        });
        version
    }

    /// Returns the saga's entries, oldest first.
    pub async fn entries(&self, saga_id: SagaId) -> Vec<SagaLogEntry> {
        self.state
            .read()
            .await
            .streams
            .get(&saga_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Rebuilds the saga from its events.
    pub async fn load(&self, saga_id: SagaId) -> Option<SagaInstance> {
        let state = self.state.read().await;
        let stream = state.streams.get(&saga_id)?;
        Some(SagaInstance::replay(
            stream.iter().map(|entry| entry.event.clone()),
        ))
    }

    /// Rebuilds the saga that created the given order.
    pub async fn load_for_order(&self, order_id: &OrderId) -> Option<SagaInstance> {
        let saga_id = self.saga_id_for_order(order_id).await?;
        self.load(saga_id).await
    }

    /// Returns the saga that created the given order.
    pub async fn saga_id_for_order(&self, order_id: &OrderId) -> Option<SagaId> {
        self.state.read().await.by_order.get(order_id).copied()
    }

    /// Returns the ids of every recorded saga, in no particular order.
    pub async fn saga_ids(&self) -> Vec<SagaId> {
        self.state.read().await.streams.keys().copied().collect()
    }

    /// Returns the number of sagas recorded.
    pub async fn saga_count(&self) -> usize {
        self.state.read().await.streams.len()
    }

    /// Returns the total number of events recorded.
    pub async fn event_count(&self) -> usize {
        self.state
            .read()
            .await
            .streams
            .values()
            .map(Vec::len)
            .sum()
    }
}
