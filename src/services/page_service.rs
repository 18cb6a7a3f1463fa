// Page Service - admin operations over the page tree
// Structural mutations run under one tree lock and one transaction each;
// caches are invalidated and events emitted only after commit.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::PagesConfig;
use crate::core::increment::is_valid_slug;
use crate::core::{slugify, PageId, PageTypeId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::cache::{PageCache, NAVIGATION_SCOPE, PAGES_SCOPE};
use crate::infrastructure::database::{PageRepository, PageTransaction};
use crate::infrastructure::events::PageEvent;
use crate::infrastructure::lookup::PageLookupRebuilder;
use crate::infrastructure::traits::{CacheInvalidator, EventBus, LookupRebuilder};
use crate::infrastructure::viewer::{AdminViewer, PagePermission};
use crate::models::{NewPage, Page, PageNode, PageStatus, PageType, PageUpdate};

const TREE_CACHE_KEY: &str = "tree";

/// Editable page fields submitted by the create and edit forms
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageInput {
    pub title: String,
    /// Derived from the title when blank
    pub slug: Option<String>,
    pub parent_id: Option<PageId>,
    /// Required on create, ignored on edit
    pub type_id: Option<PageTypeId>,
    pub css: Option<String>,
    pub js: Option<String>,
    pub meta_title: Option<String>,
    pub meta_keywords: Option<String>,
    pub meta_description: Option<String>,
    pub rss_enabled: bool,
    pub comments_enabled: bool,
    pub status: Option<PageStatus>,
    pub restricted_to: Option<Vec<i64>>,
    pub strict_uri: bool,
    pub is_home: bool,
}

impl PageInput {
    fn status(&self) -> PageStatus {
        self.status.unwrap_or(PageStatus::Draft)
    }

    fn parent(&self) -> PageId {
        self.parent_id.unwrap_or(PageId::ROOT)
    }

    /// Trimmed title and a valid slug
    fn title_and_slug(&self) -> AppResult<(String, String)> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("Page title is required".to_string()));
        }
        let slug = match self.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => {
                let derived = slugify(&title);
                if derived.is_empty() {
                    return Err(AppError::Validation(format!(
                        "No slug can be derived from the title '{}', provide a slug",
                        title
                    )));
                }
                derived
            }
        };
        if !is_valid_slug(&slug) {
            return Err(AppError::Validation(format!("Invalid page slug '{}'", slug)));
        }
        Ok((title, slug))
    }
}

/// Page types offered when creating a page
#[derive(Debug, Clone, Serialize)]
pub struct TypeChoice {
    pub types: Vec<PageType>,
    /// Set when only one type exists and no choice is needed
    pub direct: Option<PageTypeId>,
}

/// Result of a (possibly bulk) delete
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeleteOutcome {
    /// Requested pages and their descendants that were removed
    pub deleted: Vec<PageId>,
    pub missing: Vec<PageId>,
    pub refused_home: Vec<PageId>,
}

pub struct PageService {
    pub(crate) repo: Arc<dyn PageRepository>,
    pub(crate) lookups: Arc<dyn LookupRebuilder>,
    pub(crate) tree_cache: Arc<PageCache>,
    pub(crate) invalidator: Arc<dyn CacheInvalidator>,
    pub(crate) events: Arc<dyn EventBus>,
    pub(crate) config: PagesConfig,
    /// Serializes structural mutations of the page tree
    pub(crate) tree_lock: Mutex<()>,
}

impl PageService {
    pub fn new(
        repo: Arc<dyn PageRepository>,
        cache: Arc<PageCache>,
        events: Arc<dyn EventBus>,
        config: PagesConfig,
    ) -> Self {
        let lookups = Arc::new(PageLookupRebuilder::new(repo.clone(), config.max_tree_depth));
        Self {
            repo,
            lookups,
            invalidator: cache.clone(),
            tree_cache: cache,
            events,
            config,
            tree_lock: Mutex::new(()),
        }
    }

    pub fn with_lookups(mut self, lookups: Arc<dyn LookupRebuilder>) -> Self {
        self.lookups = lookups;
        self
    }

    pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.invalidator = invalidator;
        self
    }

    pub fn config(&self) -> &PagesConfig {
        &self.config
    }

    /// Run after a structural transaction commits
    pub(crate) async fn publish(&self, scopes: &[&str], event: PageEvent) {
        for scope in scopes {
            self.invalidator.invalidate(scope).await;
        }
        self.events.emit(event).await;
    }

    /// Insert a "Default" page type when the store has none
    pub async fn seed_default_type(&self) -> AppResult<()> {
        let mut tx = self.repo.begin().await?;
        let result = self.ensure_default_type(&mut tx).await;
        settle(tx, result).await
    }

    async fn ensure_default_type(&self, tx: &mut PageTransaction) -> AppResult<()> {
        if self.repo.list_page_types(tx).await?.is_empty() {
            let created = self
                .repo
                .create_page_type(tx, "Default", "A simple page with a body")
                .await?;
            info!("Seeded page type {} ({})", created.title, created.id);
        }
        Ok(())
    }

    /// Whole page tree, served from the cache when warm
    #[instrument(skip(self))]
    pub async fn index(&self) -> AppResult<Vec<PageNode>> {
        if let Some(tree) = self.tree_cache.get(PAGES_SCOPE, TREE_CACHE_KEY).await {
            debug!("Page tree served from cache");
            return Ok(tree);
        }

        let mut tx = self.repo.begin().await?;
        let pages = self.repo.list_all(&mut tx).await;
        let pages = settle(tx, pages).await?;

        let tree = PageNode::build_forest(pages);
        self.tree_cache
            .put(PAGES_SCOPE, TREE_CACHE_KEY, tree.clone())
            .await;
        Ok(tree)
    }

    pub async fn find(&self, id: PageId) -> AppResult<Page> {
        let mut tx = self.repo.begin().await?;
        let page = self.repo.find_by_id(&mut tx, id).await;
        settle(tx, page)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Page {} not found", id)))
    }

    pub async fn choose_type(&self) -> AppResult<TypeChoice> {
        let mut tx = self.repo.begin().await?;
        let types = self.repo.list_page_types(&mut tx).await;
        let types = settle(tx, types).await?;
        let direct = match types.as_slice() {
            [only] => Some(only.id),
            _ => None,
        };
        Ok(TypeChoice { types, direct })
    }

    pub async fn create_page_type(&self, title: &str, description: &str) -> AppResult<PageType> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Page type title is required".to_string()));
        }
        let mut tx = self.repo.begin().await?;
        let created = self.repo.create_page_type(&mut tx, title, description).await;
        settle(tx, created).await
    }

    #[instrument(skip(self, viewer, input), fields(title = %input.title))]
    pub async fn create(&self, viewer: &AdminViewer, input: PageInput) -> AppResult<Page> {
        if input.status() == PageStatus::Live {
            viewer.require(PagePermission::PutLive)?;
        }
        let type_id = input
            .type_id
            .ok_or_else(|| AppError::Validation("A page type is required".to_string()))?;
        let (title, slug) = input.title_and_slug()?;

        let _guard = self.tree_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        let result = self.insert_page(&mut tx, type_id, title, slug, &input).await;
        let page = settle(tx, result).await?;

        info!("Created page {} '{}'", page.id, page.uri);
        self.publish(&[PAGES_SCOPE], PageEvent::PageCreated(page.clone()))
            .await;
        Ok(page)
    }

    async fn insert_page(
        &self,
        tx: &mut PageTransaction,
        type_id: PageTypeId,
        title: String,
        slug: String,
        input: &PageInput,
    ) -> AppResult<Page> {
        if self.repo.find_page_type(tx, type_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Page type {} not found", type_id)));
        }
        let parent = input.parent();
        self.ensure_parent_exists(tx, parent).await?;
        if self.repo.find_by_slug_and_parent(tx, &slug, parent).await?.is_some() {
            return Err(AppError::SlugConflict(format!(
                "A sibling page already uses the slug '{}'",
                slug
            )));
        }

        let order = self.repo.next_order(tx, parent).await?;
        let page = self
            .repo
            .create(
                tx,
                &NewPage {
                    parent_id: parent,
                    type_id,
                    order,
                    slug,
                    title,
                    css: input.css.clone(),
                    js: input.js.clone(),
                    meta_title: input.meta_title.clone(),
                    meta_keywords: input.meta_keywords.clone(),
                    meta_description: input.meta_description.clone(),
                    rss_enabled: input.rss_enabled,
                    comments_enabled: input.comments_enabled,
                    status: input.status(),
                    restricted_to: input.restricted_to.clone(),
                    strict_uri: input.strict_uri,
                    is_home: input.is_home,
                    navigation_group_id: None,
                },
            )
            .await?;

        if page.is_home {
            self.repo.clear_home(tx, page.id).await?;
        }
        self.lookups.rebuild(tx, page.id).await?;
        self.reload(tx, page.id).await
    }

    #[instrument(skip(self, viewer, input))]
    pub async fn update(&self, viewer: &AdminViewer, id: PageId, input: PageInput) -> AppResult<Page> {
        viewer.require(PagePermission::EditLive)?;
        if input.status() == PageStatus::Live {
            viewer.require(PagePermission::PutLive)?;
        }
        let (title, slug) = input.title_and_slug()?;

        let _guard = self.tree_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        let result = self.apply_edit(&mut tx, id, title, slug, &input).await;
        let page = settle(tx, result).await?;

        info!("Updated page {} '{}'", page.id, page.uri);
        self.publish(
            &[PAGES_SCOPE, NAVIGATION_SCOPE],
            PageEvent::PageUpdated(page.clone()),
        )
        .await;
        Ok(page)
    }

    async fn apply_edit(
        &self,
        tx: &mut PageTransaction,
        id: PageId,
        title: String,
        slug: String,
        input: &PageInput,
    ) -> AppResult<Page> {
        let current = self
            .repo
            .find_by_id(tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Page {} not found", id)))?;

        let parent = input.parent();
        if parent != current.parent_id {
            self.ensure_parent_exists(tx, parent).await?;
            if parent == id || self.subtree_ids(tx, id).await?.contains(&parent) {
                return Err(AppError::Validation(format!(
                    "Page {} cannot be moved under itself",
                    id
                )));
            }
        }
        if let Some(other) = self.repo.find_by_slug_and_parent(tx, &slug, parent).await? {
            if other.id != id {
                return Err(AppError::SlugConflict(format!(
                    "A sibling page already uses the slug '{}'",
                    slug
                )));
            }
        }

        let order = if parent != current.parent_id {
            Some(self.repo.next_order(tx, parent).await?)
        } else {
            None
        };
        let fields = PageUpdate {
            parent_id: Some(parent),
            order,
            slug: Some(slug),
            title: Some(title),
            css: Some(input.css.clone()),
            js: Some(input.js.clone()),
            meta_title: Some(input.meta_title.clone()),
            meta_keywords: Some(input.meta_keywords.clone()),
            meta_description: Some(input.meta_description.clone()),
            rss_enabled: Some(input.rss_enabled),
            comments_enabled: Some(input.comments_enabled),
            status: Some(input.status()),
            updated_on: Some(chrono::Utc::now().timestamp()),
            restricted_to: Some(input.restricted_to.clone()),
            strict_uri: Some(input.strict_uri),
            // the home page can be moved elsewhere but not unset by its own form
            is_home: input.is_home.then_some(true),
            ..Default::default()
        };
        self.repo.update(tx, id, &fields).await?;

        if input.is_home {
            self.repo.clear_home(tx, id).await?;
        }
        self.lookups.rebuild(tx, id).await?;
        self.reload(tx, id).await
    }

    /// Delete pages with their subtrees; the home page is never deleted
    #[instrument(skip(self, viewer))]
    pub async fn delete(&self, viewer: &AdminViewer, ids: &[PageId]) -> AppResult<DeleteOutcome> {
        viewer.require(PagePermission::DeleteLive)?;
        if ids.is_empty() {
            return Err(AppError::BadRequest("No pages selected".to_string()));
        }

        let _guard = self.tree_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        let result = self.remove_pages(&mut tx, ids).await;
        let outcome = settle(tx, result).await?;

        if outcome.deleted.is_empty() {
            info!("No pages deleted");
        } else {
            info!("Deleted {} pages", outcome.deleted.len());
            self.publish(
                &[PAGES_SCOPE, NAVIGATION_SCOPE],
                PageEvent::PageDeleted(outcome.deleted.clone()),
            )
            .await;
        }
        Ok(outcome)
    }

    async fn remove_pages(&self, tx: &mut PageTransaction, ids: &[PageId]) -> AppResult<DeleteOutcome> {
        let mut outcome = DeleteOutcome::default();
        let mut removed = HashSet::new();

        for &id in ids {
            if removed.contains(&id) {
                continue;
            }
            let Some(page) = self.repo.find_by_id(tx, id).await? else {
                outcome.missing.push(id);
                continue;
            };
            if page.is_home {
                warn!("Refusing to delete home page {}", id);
                outcome.refused_home.push(id);
                continue;
            }

            let subtree = self.subtree_ids(tx, id).await?;
            if let Some(home) = self.home_in(tx, &subtree).await? {
                warn!("Refusing to delete page {} containing home page {}", id, home);
                outcome.refused_home.push(id);
                continue;
            }
            for page_id in subtree {
                if self.repo.delete(tx, page_id).await? {
                    removed.insert(page_id);
                    outcome.deleted.push(page_id);
                }
            }
        }
        Ok(outcome)
    }

    async fn home_in(&self, tx: &mut PageTransaction, ids: &[PageId]) -> AppResult<Option<PageId>> {
        for &id in ids {
            if let Some(page) = self.repo.find_by_id(tx, id).await? {
                if page.is_home {
                    return Ok(Some(id));
                }
            }
        }
        Ok(None)
    }

    /// `root` followed by all of its descendants, breadth first
    pub(crate) async fn subtree_ids(
        &self,
        tx: &mut PageTransaction,
        root: PageId,
    ) -> AppResult<Vec<PageId>> {
        let mut ids = vec![root];
        let mut seen = HashSet::from([root]);
        let mut cursor = 0;
        while cursor < ids.len() {
            let parent = ids[cursor];
            cursor += 1;
            for child in self.repo.find_children(tx, parent).await? {
                if seen.insert(child.id) {
                    ids.push(child.id);
                }
            }
        }
        Ok(ids)
    }

    async fn ensure_parent_exists(&self, tx: &mut PageTransaction, parent: PageId) -> AppResult<()> {
        if parent.is_root() {
            return Ok(());
        }
        if self.repo.find_by_id(tx, parent).await?.is_none() {
            return Err(AppError::NotFound(format!("Parent page {} not found", parent)));
        }
        Ok(())
    }

    pub(crate) async fn reload(&self, tx: &mut PageTransaction, id: PageId) -> AppResult<Page> {
        self.repo
            .find_by_id(tx, id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Page {} vanished mid-transaction", id)))
    }
}

/// Commit on success, roll back on failure
pub(crate) async fn settle<T>(tx: PageTransaction, result: AppResult<T>) -> AppResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback failed after '{}': {}", err, rollback_err);
            }
            Err(err)
        }
    }
}
