// Page Repository - storage seam for the pages core
// Every call runs inside a caller-owned transaction so multi-row mutations
// commit or roll back as a unit.

use async_trait::async_trait;
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::collections::HashSet;

use crate::core::{PageId, PageTypeId};
use crate::error::{AppError, AppResult};
use crate::models::{NewPage, Page, PageType, PageUpdate};

/// Transaction wrapper for page repository operations
pub struct PageTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl PageTransaction {
    pub fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }

    /// Connection the statements of this transaction execute on
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    /// Commit the transaction
    pub async fn commit(self) -> AppResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit transaction: {}", e)))
    }

    /// Rollback the transaction
    pub async fn rollback(self) -> AppResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to rollback transaction: {}", e)))
    }
}

/// Page persistence operations
#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn begin(&self) -> AppResult<PageTransaction>;

    // Page reads
    async fn find_by_id(&self, tx: &mut PageTransaction, id: PageId) -> AppResult<Option<Page>>;
    /// Direct children of `parent_id`, sorted by sibling order
    async fn find_children(&self, tx: &mut PageTransaction, parent_id: PageId)
        -> AppResult<Vec<Page>>;
    /// One past the highest sibling order under `parent_id`, or 0
    async fn next_order(&self, tx: &mut PageTransaction, parent_id: PageId) -> AppResult<i64>;
    async fn find_by_slug_and_parent(
        &self,
        tx: &mut PageTransaction,
        slug: &str,
        parent_id: PageId,
    ) -> AppResult<Option<Page>>;
    /// Subset of `ids` that exist
    async fn existing_ids(&self, tx: &mut PageTransaction, ids: &[PageId])
        -> AppResult<HashSet<PageId>>;
    async fn list_all(&self, tx: &mut PageTransaction) -> AppResult<Vec<Page>>;

    // Page writes
    async fn create(&self, tx: &mut PageTransaction, page: &NewPage) -> AppResult<Page>;
    /// Fails with `NotFound` when no page has `id`
    async fn update(&self, tx: &mut PageTransaction, id: PageId, fields: &PageUpdate)
        -> AppResult<()>;
    /// Detach every page from its parent; returns the number of rows touched
    async fn bulk_reset_parent(&self, tx: &mut PageTransaction) -> AppResult<u64>;
    async fn delete(&self, tx: &mut PageTransaction, id: PageId) -> AppResult<bool>;
    /// Clear the home flag on every page except `keep`
    async fn clear_home(&self, tx: &mut PageTransaction, keep: PageId) -> AppResult<()>;

    // Page types
    async fn list_page_types(&self, tx: &mut PageTransaction) -> AppResult<Vec<PageType>>;
    async fn find_page_type(&self, tx: &mut PageTransaction, id: PageTypeId)
        -> AppResult<Option<PageType>>;
    async fn create_page_type(
        &self,
        tx: &mut PageTransaction,
        title: &str,
        description: &str,
    ) -> AppResult<PageType>;
}
