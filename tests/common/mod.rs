// Shared fixtures for the page tree integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pages_admin::config::PagesConfig;
use pages_admin::core::{PageId, PageTypeId};
use pages_admin::error::{AppError, AppResult};
use pages_admin::infrastructure::{
    AdminViewer, BroadcastEventBus, PageCache, PageRepository, PageTransaction, SqlitePageStore,
};
use pages_admin::models::{NewPage, Page, PageType, PageUpdate};
use pages_admin::services::{PageInput, PageService};

pub struct Fixture {
    pub store: Arc<SqlitePageStore>,
    pub service: PageService,
    pub cache: Arc<PageCache>,
    pub events: BroadcastEventBus,
    pub type_id: PageTypeId,
}

pub async fn fixture() -> Fixture {
    let store = Arc::new(SqlitePageStore::new_in_memory().await.unwrap());
    fixture_with(store.clone(), store).await
}

/// Build a service over `repo`, which must share `store`'s database
pub async fn fixture_with(store: Arc<SqlitePageStore>, repo: Arc<dyn PageRepository>) -> Fixture {
    fixture_with_config(store, repo, PagesConfig::default()).await
}

pub async fn fixture_with_config(
    store: Arc<SqlitePageStore>,
    repo: Arc<dyn PageRepository>,
    config: PagesConfig,
) -> Fixture {
    let cache = Arc::new(PageCache::new(16));
    let events = BroadcastEventBus::new();
    let service = PageService::new(repo, cache.clone(), Arc::new(events.clone()), config);
    let page_type = service.create_page_type("Default", "").await.unwrap();
    Fixture {
        store,
        service,
        cache,
        events,
        type_id: page_type.id,
    }
}

impl Fixture {
    pub async fn page(&self, title: &str, parent: Option<PageId>) -> Page {
        self.service
            .create(
                &AdminViewer::admin(),
                PageInput {
                    title: title.to_string(),
                    parent_id: parent,
                    type_id: Some(self.type_id),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }

    pub async fn get(&self, id: PageId) -> Page {
        self.service.find(id).await.unwrap()
    }

    pub async fn all(&self) -> Vec<Page> {
        let mut tx = self.store.begin().await.unwrap();
        let pages = self.store.list_all(&mut tx).await.unwrap();
        tx.commit().await.unwrap();
        pages
    }

    pub async fn children(&self, parent: PageId) -> Vec<Page> {
        let mut tx = self.store.begin().await.unwrap();
        let pages = self.store.find_children(&mut tx, parent).await.unwrap();
        tx.commit().await.unwrap();
        pages
    }
}

/// Delegates to a SQLite store but fails the nth positional update or the
/// nth insert
pub struct FailingRepository {
    inner: Arc<SqlitePageStore>,
    fail_update_at: Option<usize>,
    fail_create_at: Option<usize>,
    positional_updates: AtomicUsize,
    creates: AtomicUsize,
}

impl FailingRepository {
    pub fn on_update(inner: Arc<SqlitePageStore>, nth: usize) -> Self {
        Self::build(inner, Some(nth), None)
    }

    pub fn on_create(inner: Arc<SqlitePageStore>, nth: usize) -> Self {
        Self::build(inner, None, Some(nth))
    }

    fn build(inner: Arc<SqlitePageStore>, fail_update_at: Option<usize>, fail_create_at: Option<usize>) -> Self {
        Self {
            inner,
            fail_update_at,
            fail_create_at,
            positional_updates: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PageRepository for FailingRepository {
    async fn begin(&self) -> AppResult<PageTransaction> {
        self.inner.begin().await
    }

    async fn find_by_id(&self, tx: &mut PageTransaction, id: PageId) -> AppResult<Option<Page>> {
        self.inner.find_by_id(tx, id).await
    }

    async fn find_children(&self, tx: &mut PageTransaction, parent_id: PageId) -> AppResult<Vec<Page>> {
        self.inner.find_children(tx, parent_id).await
    }

    async fn next_order(&self, tx: &mut PageTransaction, parent_id: PageId) -> AppResult<i64> {
        self.inner.next_order(tx, parent_id).await
    }

    async fn find_by_slug_and_parent(
        &self,
        tx: &mut PageTransaction,
        slug: &str,
        parent_id: PageId,
    ) -> AppResult<Option<Page>> {
        self.inner.find_by_slug_and_parent(tx, slug, parent_id).await
    }

    async fn existing_ids(&self, tx: &mut PageTransaction, ids: &[PageId]) -> AppResult<HashSet<PageId>> {
        self.inner.existing_ids(tx, ids).await
    }

    async fn list_all(&self, tx: &mut PageTransaction) -> AppResult<Vec<Page>> {
        self.inner.list_all(tx).await
    }

    async fn create(&self, tx: &mut PageTransaction, page: &NewPage) -> AppResult<Page> {
        let seen = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        if Some(seen) == self.fail_create_at {
            return Err(AppError::DatabaseError(format!("Injected failure creating '{}'", page.slug)));
        }
        self.inner.create(tx, page).await
    }

    async fn update(&self, tx: &mut PageTransaction, id: PageId, fields: &PageUpdate) -> AppResult<()> {
        if fields.order.is_some() {
            let seen = self.positional_updates.fetch_add(1, Ordering::SeqCst) + 1;
            if Some(seen) == self.fail_update_at {
                return Err(AppError::DatabaseError(format!("Injected failure updating page {}", id)));
            }
        }
        self.inner.update(tx, id, fields).await
    }

    async fn bulk_reset_parent(&self, tx: &mut PageTransaction) -> AppResult<u64> {
        self.inner.bulk_reset_parent(tx).await
    }

    async fn delete(&self, tx: &mut PageTransaction, id: PageId) -> AppResult<bool> {
        self.inner.delete(tx, id).await
    }

    async fn clear_home(&self, tx: &mut PageTransaction, keep: PageId) -> AppResult<()> {
        self.inner.clear_home(tx, keep).await
    }

    async fn list_page_types(&self, tx: &mut PageTransaction) -> AppResult<Vec<PageType>> {
        self.inner.list_page_types(tx).await
    }

    async fn find_page_type(&self, tx: &mut PageTransaction, id: PageTypeId) -> AppResult<Option<PageType>> {
        self.inner.find_page_type(tx, id).await
    }

    async fn create_page_type(
        &self,
        tx: &mut PageTransaction,
        title: &str,
        description: &str,
    ) -> AppResult<PageType> {
        self.inner.create_page_type(tx, title, description).await
    }
}
