use async_trait::async_trait;

use crate::core::PageId;
use crate::error::AppResult;
use crate::infrastructure::database::PageTransaction;
use crate::infrastructure::events::PageEvent;

/// Recomputes materialized URIs for a page and all of its descendants
#[async_trait]
pub trait LookupRebuilder: Send + Sync {
    async fn rebuild(&self, tx: &mut PageTransaction, root: PageId) -> AppResult<()>;
}

/// Drops cached projections for a named scope
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, scope: &str);
}

/// Publishes page lifecycle events
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn emit(&self, event: PageEvent);
}
