use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row};
use std::collections::HashSet;
use std::str::FromStr;
use tracing::info;

use crate::core::{PageId, PageTypeId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{PageRepository, PageTransaction};
use crate::models::{NewPage, Page, PageStatus, PageType, PageUpdate};

const PAGE_COLUMNS: &str = "id, parent_id, type_id, sort_order, slug, title, uri, css, js, \
    meta_title, meta_keywords, meta_description, rss_enabled, comments_enabled, status, \
    created_on, updated_on, restricted_to, strict_uri, is_home, navigation_group_id";

/// Keeps `IN (...)` lists under SQLite's bound-parameter limit
const ID_CHUNK: usize = 500;

/// SQLite implementation of the page repository
pub struct SqlitePageStore {
    pool: SqlitePool,
}

impl SqlitePageStore {
    /// Connect to `url` and create the page tables if missing
    pub async fn connect(url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AppError::ConfigurationError(format!("Invalid database URL {}: {}", url, e)))?
            .create_if_missing(true);

        // every connection to an in-memory database sees its own empty database,
        // so those pools are pinned to one long-lived connection
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to connect to SQLite at {}: {}", url, e))
        })?;

        let store = Self { pool };
        store.initialize().await?;
        info!("Page store ready at {}", url);
        Ok(store)
    }

    pub async fn new_in_memory() -> AppResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Health check to verify database connectivity
    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Database health check failed: {}", e)))?;
        Ok(())
    }

    /// Create page tables
    pub async fn initialize(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS page_types (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create page_types table: {}", e)))?;

        // slugs are only unique per parent, and a reorder passes through a state
        // where every page sits at the root, so uniqueness is checked in the service
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                parent_id INTEGER NOT NULL DEFAULT 0,
                type_id INTEGER NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0,
                slug TEXT NOT NULL,
                title TEXT NOT NULL,
                uri TEXT NOT NULL DEFAULT '',
                css TEXT,
                js TEXT,
                meta_title TEXT,
                meta_keywords TEXT,
                meta_description TEXT,
                rss_enabled INTEGER NOT NULL DEFAULT 0,
                comments_enabled INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'draft',
                created_on INTEGER NOT NULL,
                updated_on INTEGER,
                restricted_to TEXT,
                strict_uri INTEGER NOT NULL DEFAULT 0,
                is_home INTEGER NOT NULL DEFAULT 0,
                navigation_group_id INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create pages table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pages_parent ON pages(parent_id, sort_order)")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create pages parent index: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pages_slug ON pages(slug, parent_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create pages slug index: {}", e)))?;

        Ok(())
    }
}

fn encode_restricted(groups: &Option<Vec<i64>>) -> Option<String> {
    groups.as_ref().filter(|g| !g.is_empty()).map(|g| {
        g.iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    })
}

fn decode_restricted(raw: Option<String>) -> Option<Vec<i64>> {
    let groups: Vec<i64> = raw?
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .filter(|id| *id > 0)
        .collect();
    if groups.is_empty() {
        None
    } else {
        Some(groups)
    }
}

fn page_from_row(row: &SqliteRow) -> AppResult<Page> {
    let status: String = row.try_get("status")?;
    Ok(Page {
        id: PageId(row.try_get("id")?),
        parent_id: PageId(row.try_get("parent_id")?),
        type_id: PageTypeId(row.try_get("type_id")?),
        order: row.try_get("sort_order")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        uri: row.try_get("uri")?,
        css: row.try_get("css")?,
        js: row.try_get("js")?,
        meta_title: row.try_get("meta_title")?,
        meta_keywords: row.try_get("meta_keywords")?,
        meta_description: row.try_get("meta_description")?,
        rss_enabled: row.try_get("rss_enabled")?,
        comments_enabled: row.try_get("comments_enabled")?,
        status: PageStatus::parse(&status)?,
        created_on: row.try_get("created_on")?,
        updated_on: row.try_get("updated_on")?,
        restricted_to: decode_restricted(row.try_get("restricted_to")?),
        strict_uri: row.try_get("strict_uri")?,
        is_home: row.try_get("is_home")?,
        navigation_group_id: row.try_get("navigation_group_id")?,
    })
}

fn page_type_from_row(row: &SqliteRow) -> AppResult<PageType> {
    Ok(PageType {
        id: PageTypeId(row.try_get("id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
    })
}

#[async_trait]
impl PageRepository for SqlitePageStore {
    async fn begin(&self) -> AppResult<PageTransaction> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;
        Ok(PageTransaction::new(tx))
    }

    async fn find_by_id(&self, tx: &mut PageTransaction, id: PageId) -> AppResult<Option<Page>> {
        let row = sqlx::query(&format!("SELECT {} FROM pages WHERE id = ?", PAGE_COLUMNS))
            .bind(id.0)
            .fetch_optional(tx.connection())
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to get page {}: {}", id, e)))?;
        row.as_ref().map(page_from_row).transpose()
    }

    async fn find_children(
        &self,
        tx: &mut PageTransaction,
        parent_id: PageId,
    ) -> AppResult<Vec<Page>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM pages WHERE parent_id = ? ORDER BY sort_order, id",
            PAGE_COLUMNS
        ))
        .bind(parent_id.0)
        .fetch_all(tx.connection())
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to get children of page {}: {}", parent_id, e))
        })?;
        rows.iter().map(page_from_row).collect()
    }

    async fn next_order(&self, tx: &mut PageTransaction, parent_id: PageId) -> AppResult<i64> {
        let next: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM pages WHERE parent_id = ?",
        )
        .bind(parent_id.0)
        .fetch_one(tx.connection())
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to get next order under {}: {}", parent_id, e))
        })?;
        Ok(next)
    }

    async fn find_by_slug_and_parent(
        &self,
        tx: &mut PageTransaction,
        slug: &str,
        parent_id: PageId,
    ) -> AppResult<Option<Page>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pages WHERE slug = ? AND parent_id = ? LIMIT 1",
            PAGE_COLUMNS
        ))
        .bind(slug)
        .bind(parent_id.0)
        .fetch_optional(tx.connection())
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to look up slug '{}': {}", slug, e)))?;
        row.as_ref().map(page_from_row).transpose()
    }

    async fn existing_ids(
        &self,
        tx: &mut PageTransaction,
        ids: &[PageId],
    ) -> AppResult<HashSet<PageId>> {
        let mut found = HashSet::new();
        for chunk in ids.chunks(ID_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM pages WHERE id IN (");
            let mut separated = qb.separated(",");
            for id in chunk {
                separated.push_bind(id.0);
            }
            qb.push(")");

            let rows = qb
                .build()
                .fetch_all(tx.connection())
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to check page ids: {}", e)))?;
            for row in rows {
                found.insert(PageId(row.try_get("id")?));
            }
        }
        Ok(found)
    }

    async fn list_all(&self, tx: &mut PageTransaction) -> AppResult<Vec<Page>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM pages ORDER BY parent_id, sort_order, id",
            PAGE_COLUMNS
        ))
        .fetch_all(tx.connection())
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list pages: {}", e)))?;
        rows.iter().map(page_from_row).collect()
    }

    async fn create(&self, tx: &mut PageTransaction, page: &NewPage) -> AppResult<Page> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO pages (parent_id, type_id, sort_order, slug, title, uri, css, js,
                meta_title, meta_keywords, meta_description, rss_enabled, comments_enabled,
                status, created_on, restricted_to, strict_uri, is_home, navigation_group_id)
            VALUES (?, ?, ?, ?, ?, '', ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(page.parent_id.0)
        .bind(page.type_id.0)
        .bind(page.order)
        .bind(&page.slug)
        .bind(&page.title)
        .bind(&page.css)
        .bind(&page.js)
        .bind(&page.meta_title)
        .bind(&page.meta_keywords)
        .bind(&page.meta_description)
        .bind(page.rss_enabled)
        .bind(page.comments_enabled)
        .bind(page.status.as_str())
        .bind(now)
        .bind(encode_restricted(&page.restricted_to))
        .bind(page.strict_uri)
        .bind(page.is_home)
        .bind(page.navigation_group_id)
        .execute(tx.connection())
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to create page '{}': {}", page.slug, e))
        })?;

        let id = PageId(result.last_insert_rowid());
        self.find_by_id(tx, id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Page {} vanished after insert", id)))
    }

    async fn update(
        &self,
        tx: &mut PageTransaction,
        id: PageId,
        fields: &PageUpdate,
    ) -> AppResult<()> {
        if fields.is_empty() {
            let exists = self.existing_ids(tx, &[id]).await?;
            return if exists.contains(&id) {
                Ok(())
            } else {
                Err(AppError::NotFound(format!("Page {} not found", id)))
            };
        }

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE pages SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(parent_id) = fields.parent_id {
                set.push("parent_id = ").push_bind_unseparated(parent_id.0);
            }
            if let Some(order) = fields.order {
                set.push("sort_order = ").push_bind_unseparated(order);
            }
            if let Some(slug) = &fields.slug {
                set.push("slug = ").push_bind_unseparated(slug.clone());
            }
            if let Some(title) = &fields.title {
                set.push("title = ").push_bind_unseparated(title.clone());
            }
            if let Some(uri) = &fields.uri {
                set.push("uri = ").push_bind_unseparated(uri.clone());
            }
            if let Some(css) = &fields.css {
                set.push("css = ").push_bind_unseparated(css.clone());
            }
            if let Some(js) = &fields.js {
                set.push("js = ").push_bind_unseparated(js.clone());
            }
            if let Some(meta_title) = &fields.meta_title {
                set.push("meta_title = ").push_bind_unseparated(meta_title.clone());
            }
            if let Some(meta_keywords) = &fields.meta_keywords {
                set.push("meta_keywords = ").push_bind_unseparated(meta_keywords.clone());
            }
            if let Some(meta_description) = &fields.meta_description {
                set.push("meta_description = ")
                    .push_bind_unseparated(meta_description.clone());
            }
            if let Some(rss_enabled) = fields.rss_enabled {
                set.push("rss_enabled = ").push_bind_unseparated(rss_enabled);
            }
            if let Some(comments_enabled) = fields.comments_enabled {
                set.push("comments_enabled = ").push_bind_unseparated(comments_enabled);
            }
            if let Some(status) = fields.status {
                set.push("status = ").push_bind_unseparated(status.as_str());
            }
            if let Some(updated_on) = fields.updated_on {
                set.push("updated_on = ").push_bind_unseparated(updated_on);
            }
            if let Some(restricted_to) = &fields.restricted_to {
                set.push("restricted_to = ")
                    .push_bind_unseparated(encode_restricted(restricted_to));
            }
            if let Some(strict_uri) = fields.strict_uri {
                set.push("strict_uri = ").push_bind_unseparated(strict_uri);
            }
            if let Some(is_home) = fields.is_home {
                set.push("is_home = ").push_bind_unseparated(is_home);
            }
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id.0);

        let result = qb
            .build()
            .execute(tx.connection())
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to update page {}: {}", id, e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Page {} not found", id)));
        }
        Ok(())
    }

    async fn bulk_reset_parent(&self, tx: &mut PageTransaction) -> AppResult<u64> {
        let result = sqlx::query("UPDATE pages SET parent_id = 0")
            .execute(tx.connection())
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to reset page parents: {}", e)))?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, tx: &mut PageTransaction, id: PageId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM pages WHERE id = ?")
            .bind(id.0)
            .execute(tx.connection())
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete page {}: {}", id, e)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_home(&self, tx: &mut PageTransaction, keep: PageId) -> AppResult<()> {
        sqlx::query("UPDATE pages SET is_home = 0 WHERE id != ? AND is_home != 0")
            .bind(keep.0)
            .execute(tx.connection())
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to clear home page: {}", e)))?;
        Ok(())
    }

    async fn list_page_types(&self, tx: &mut PageTransaction) -> AppResult<Vec<PageType>> {
        let rows = sqlx::query("SELECT id, title, description FROM page_types ORDER BY title, id")
            .fetch_all(tx.connection())
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list page types: {}", e)))?;
        rows.iter().map(page_type_from_row).collect()
    }

    async fn find_page_type(
        &self,
        tx: &mut PageTransaction,
        id: PageTypeId,
    ) -> AppResult<Option<PageType>> {
        let row = sqlx::query("SELECT id, title, description FROM page_types WHERE id = ?")
            .bind(id.0)
            .fetch_optional(tx.connection())
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to get page type {}: {}", id, e)))?;
        row.as_ref().map(page_type_from_row).transpose()
    }

    async fn create_page_type(
        &self,
        tx: &mut PageTransaction,
        title: &str,
        description: &str,
    ) -> AppResult<PageType> {
        let result = sqlx::query("INSERT INTO page_types (title, description) VALUES (?, ?)")
            .bind(title)
            .bind(description)
            .execute(tx.connection())
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to create page type '{}': {}", title, e))
            })?;
        Ok(PageType {
            id: PageTypeId(result.last_insert_rowid()),
            title: title.to_string(),
            description: description.to_string(),
        })
    }
}
