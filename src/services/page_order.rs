// Tree reorder - applies the tree editor's arrangement to the stored pages

use std::collections::HashSet;
use tracing::{debug, info, instrument};

use crate::core::PageId;
use crate::error::{AppError, AppResult};
use crate::infrastructure::cache::{NAVIGATION_SCOPE, PAGES_SCOPE};
use crate::infrastructure::database::PageTransaction;
use crate::infrastructure::events::PageEvent;
use crate::models::{OrderedForest, PageUpdate};
use crate::services::page_service::{settle, PageService};

impl PageService {
    /// Re-parent and re-order every page named in `submission`, then rebuild
    /// the URI lookups under each of `root_pages`.
    ///
    /// Pages missing from the submission end up at the top level after the
    /// submitted top-level pages, and their lookups are rebuilt too. Nothing
    /// is written when the submission is empty or any id is unknown.
    #[instrument(skip(self, submission), fields(nodes = submission.len()))]
    pub async fn reorder(&self, submission: &OrderedForest, root_pages: &[PageId]) -> AppResult<()> {
        if submission.is_empty() {
            debug!("Empty page order submitted, nothing to do");
            return Ok(());
        }
        submission.validate(self.config.max_tree_depth)?;

        let _guard = self.tree_lock.lock().await;
        let mut tx = self.repo.begin().await?;
        let result = self.apply_order(&mut tx, submission, root_pages).await;
        settle(tx, result).await?;

        info!("Reordered {} pages", submission.len());
        self.publish(
            &[NAVIGATION_SCOPE, PAGES_SCOPE],
            PageEvent::PageOrdered {
                order: submission.clone(),
                root_pages: root_pages.to_vec(),
            },
        )
        .await;
        Ok(())
    }

    async fn apply_order(
        &self,
        tx: &mut PageTransaction,
        submission: &OrderedForest,
        root_pages: &[PageId],
    ) -> AppResult<()> {
        let mut referenced = submission.page_ids();
        referenced.extend_from_slice(root_pages);
        let existing = self.repo.existing_ids(tx, &referenced).await?;

        let mut missing: Vec<PageId> = referenced
            .into_iter()
            .filter(|id| !existing.contains(id))
            .collect();
        if !missing.is_empty() {
            missing.sort();
            missing.dedup();
            let listed = missing
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(AppError::NotFound(format!("Pages not found: {}", listed)));
        }

        let reset = self.repo.bulk_reset_parent(tx).await?;
        debug!("Detached {} pages before reorder", reset);

        for (page, parent, order) in submission.positions() {
            self.repo
                .update(tx, page, &PageUpdate::position(parent, order))
                .await?;
        }

        // pages left out of the submission follow the submitted top level
        let submitted: HashSet<PageId> = submission.page_ids().into_iter().collect();
        let mut detached = Vec::new();
        for page in self.repo.find_children(tx, PageId::ROOT).await? {
            if submitted.contains(&page.id) {
                continue;
            }
            let order = (submission.nodes.len() + detached.len()) as i64;
            self.repo
                .update(tx, page.id, &PageUpdate::position(PageId::ROOT, order))
                .await?;
            detached.push(page.id);
        }
        if !detached.is_empty() {
            debug!("Appended {} unsubmitted pages at the top level", detached.len());
        }

        for &root in root_pages.iter().chain(detached.iter()) {
            self.lookups.rebuild(tx, root).await?;
        }
        Ok(())
    }
}
