// URI lookup rebuild - materializes the slug chain of every page in a subtree

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::PageId;
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{PageRepository, PageTransaction};
use crate::infrastructure::traits::LookupRebuilder;
use crate::models::{Page, PageUpdate};

pub struct PageLookupRebuilder {
    repo: Arc<dyn PageRepository>,
    max_depth: usize,
}

impl PageLookupRebuilder {
    pub fn new(repo: Arc<dyn PageRepository>, max_depth: usize) -> Self {
        Self { repo, max_depth }
    }

    /// URI of `page` computed from its ancestors' slugs
    async fn uri_of(&self, tx: &mut PageTransaction, page: &Page) -> AppResult<String> {
        let mut slugs = vec![page.slug.clone()];
        let mut seen = HashSet::from([page.id]);
        let mut parent = page.parent_id;

        while !parent.is_root() {
            if !seen.insert(parent) || seen.len() > self.max_depth {
                return Err(AppError::Validation(format!(
                    "Page {} has a cyclic or over-deep ancestry",
                    page.id
                )));
            }
            match self.repo.find_by_id(tx, parent).await? {
                Some(ancestor) => {
                    slugs.push(ancestor.slug);
                    parent = ancestor.parent_id;
                }
                // dangling parent link: treat as top level
                None => break,
            }
        }

        slugs.reverse();
        Ok(slugs.join("/"))
    }
}

#[async_trait]
impl LookupRebuilder for PageLookupRebuilder {
    #[instrument(skip(self, tx))]
    async fn rebuild(&self, tx: &mut PageTransaction, root: PageId) -> AppResult<()> {
        let page = self
            .repo
            .find_by_id(tx, root)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Page {} not found", root)))?;

        let uri = self.uri_of(tx, &page).await?;
        let mut queue = VecDeque::from([(page, uri, 1usize)]);
        let mut visited = HashSet::new();
        let mut written = 0usize;

        while let Some((page, uri, depth)) = queue.pop_front() {
            if !visited.insert(page.id) {
                return Err(AppError::Validation(format!(
                    "Page {} is its own ancestor",
                    page.id
                )));
            }
            if depth > self.max_depth {
                return Err(AppError::Validation(format!(
                    "Page tree under {} is deeper than {} levels",
                    root, self.max_depth
                )));
            }

            if page.uri != uri {
                self.repo.update(tx, page.id, &PageUpdate::uri(uri.clone())).await?;
                written += 1;
            }

            for child in self.repo.find_children(tx, page.id).await? {
                let child_uri = format!("{}/{}", uri, child.slug);
                queue.push_back((child, child_uri, depth + 1));
            }
        }

        debug!("Rebuilt lookups under page {} ({} changed)", root, written);
        Ok(())
    }
}
