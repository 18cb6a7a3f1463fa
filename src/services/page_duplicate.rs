// Page duplication - copies a page and its subtree next to the original

use std::collections::HashSet;
use tracing::{debug, info, instrument};

use crate::core::{increment_string, PageId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::cache::{NAVIGATION_SCOPE, PAGES_SCOPE};
use crate::infrastructure::database::PageTransaction;
use crate::infrastructure::events::PageEvent;
use crate::models::Page;
use crate::services::page_service::{settle, PageService};

const TITLE_SEPARATOR: &str = " ";
const SLUG_SEPARATOR: &str = "-";
const FIRST_SUFFIX: u64 = 2;

/// State threaded through one duplication
struct CopyContext {
    max_depth: usize,
    /// Source pages already copied
    visited: HashSet<PageId>,
    created: usize,
}

impl CopyContext {
    fn new(root: PageId, max_depth: usize) -> Self {
        Self {
            max_depth,
            visited: HashSet::from([root]),
            created: 1,
        }
    }
}

impl PageService {
    /// Copy `page_id` and its descendants. The copy stays under the same
    /// parent with a title and slug that no sibling uses; descendants keep
    /// their own titles and slugs.
    #[instrument(skip(self))]
    pub async fn duplicate(&self, page_id: PageId) -> AppResult<PageId> {
        let _guard = self.tree_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        let result = self.duplicate_tree(&mut tx, page_id).await;
        let (copy, created) = settle(tx, result).await?;

        info!("Duplicated page {} as {} ({} pages)", page_id, copy, created);
        self.publish(
            &[PAGES_SCOPE, NAVIGATION_SCOPE],
            PageEvent::PageDuplicated {
                source: page_id,
                copy,
            },
        )
        .await;
        Ok(copy)
    }

    async fn duplicate_tree(
        &self,
        tx: &mut PageTransaction,
        page_id: PageId,
    ) -> AppResult<(PageId, usize)> {
        let source = self
            .repo
            .find_by_id(tx, page_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Page {} not found", page_id)))?;
        let children = self.repo.find_children(tx, source.id).await?;

        let (title, slug) = self.unused_title_and_slug(tx, &source).await?;
        let order = self.repo.next_order(tx, source.parent_id).await?;
        let copy = self
            .repo
            .create(tx, &source.to_copy(source.parent_id, title, slug, order))
            .await?;

        let mut ctx = CopyContext::new(source.id, self.config.max_tree_depth);
        self.copy_children(tx, children, copy.id, &mut ctx).await?;

        self.lookups.rebuild(tx, copy.id).await?;
        Ok((copy.id, ctx.created))
    }

    /// Bump title and slug suffixes until the slug is free under the
    /// source's parent. Every candidate slug is distinct, so at most one
    /// attempt per existing sibling can collide.
    async fn unused_title_and_slug(
        &self,
        tx: &mut PageTransaction,
        source: &Page,
    ) -> AppResult<(String, String)> {
        let siblings = self.repo.find_children(tx, source.parent_id).await?.len();
        let mut title = source.title.clone();
        let mut slug = source.slug.clone();

        for _ in 0..=siblings {
            title = increment_string(&title, TITLE_SEPARATOR, FIRST_SUFFIX);
            slug = increment_string(&slug, SLUG_SEPARATOR, FIRST_SUFFIX);
            let taken = self
                .repo
                .find_by_slug_and_parent(tx, &slug, source.parent_id)
                .await?
                .is_some();
            if !taken {
                return Ok((title, slug));
            }
            debug!("Slug '{}' taken under parent {}", slug, source.parent_id);
        }

        Err(AppError::SlugConflict(format!(
            "No free slug for a copy of '{}' after {} attempts",
            source.slug,
            siblings + 1
        )))
    }

    /// Copy `children` and everything below them under `parent`
    async fn copy_children(
        &self,
        tx: &mut PageTransaction,
        children: Vec<Page>,
        parent: PageId,
        ctx: &mut CopyContext,
    ) -> AppResult<()> {
        let mut pending = vec![(children, parent, 1usize)];

        while let Some((children, parent, depth)) = pending.pop() {
            if children.is_empty() {
                continue;
            }
            if depth >= ctx.max_depth {
                return Err(AppError::Validation(format!(
                    "Page tree is deeper than {} levels",
                    ctx.max_depth
                )));
            }
            for child in children {
                if !ctx.visited.insert(child.id) {
                    return Err(AppError::Validation(format!(
                        "Page {} is its own ancestor",
                        child.id
                    )));
                }
                let copy = self
                    .repo
                    .create(
                        tx,
                        &child.to_copy(parent, child.title.clone(), child.slug.clone(), child.order),
                    )
                    .await?;
                ctx.created += 1;

                let grandchildren = self.repo.find_children(tx, child.id).await?;
                pending.push((grandchildren, copy.id, depth + 1));
            }
        }
        Ok(())
    }
}
