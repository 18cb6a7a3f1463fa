// Page lifecycle events and an in-process broadcast bus

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::PageId;
use crate::infrastructure::traits::EventBus;
use crate::models::{OrderedForest, Page};

const EVENT_CHANNEL_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum PageEvent {
    PageOrdered {
        order: OrderedForest,
        root_pages: Vec<PageId>,
    },
    PageCreated(Page),
    PageUpdated(Page),
    PageDuplicated {
        source: PageId,
        copy: PageId,
    },
    PageDeleted(Vec<PageId>),
}

impl PageEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PageEvent::PageOrdered { .. } => "page_ordered",
            PageEvent::PageCreated(_) => "page_created",
            PageEvent::PageUpdated(_) => "page_updated",
            PageEvent::PageDuplicated { .. } => "page_duplicated",
            PageEvent::PageDeleted(_) => "page_deleted",
        }
    }

    pub fn payload(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => map.remove("payload").unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

/// An emitted event with delivery metadata
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub emitted_at: i64,
    pub event: PageEvent,
}

/// Fan-out bus; events emitted with no subscriber are dropped
#[derive(Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_DEPTH);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn emit(&self, event: PageEvent) {
        let envelope = EventEnvelope {
            id: Uuid::new_v4(),
            emitted_at: chrono::Utc::now().timestamp_millis(),
            event,
        };
        info!(event = envelope.event.name(), id = %envelope.id, "Page event emitted");
        if self.sender.send(envelope).is_err() {
            debug!("No subscribers for page event");
        }
    }
}
