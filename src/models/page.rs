use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::{PageId, PageTypeId};
use crate::error::{AppError, AppResult};

/// Publication status of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Draft,
    Live,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Draft => "draft",
            PageStatus::Live => "live",
        }
    }

    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "draft" => Ok(PageStatus::Draft),
            "live" => Ok(PageStatus::Live),
            other => Err(AppError::Validation(format!("Unknown page status '{}'", other))),
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted page row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub parent_id: PageId,
    pub type_id: PageTypeId,
    pub order: i64,
    pub slug: String,
    pub title: String,
    /// Materialized `/`-joined slug chain, rebuilt by the lookup rebuilder
    pub uri: String,
    pub css: Option<String>,
    pub js: Option<String>,
    pub meta_title: Option<String>,
    pub meta_keywords: Option<String>,
    pub meta_description: Option<String>,
    pub rss_enabled: bool,
    pub comments_enabled: bool,
    pub status: PageStatus,
    pub created_on: i64,
    pub updated_on: Option<i64>,
    /// User group ids allowed to view the page; `None` means public
    pub restricted_to: Option<Vec<i64>>,
    pub strict_uri: bool,
    pub is_home: bool,
    pub navigation_group_id: Option<i64>,
}

impl Page {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_root()
    }

    /// Field values for inserting a copy of this page.
    ///
    /// Access restrictions, navigation membership and the home flag never
    /// carry over to a copy.
    pub fn to_copy(&self, parent_id: PageId, title: String, slug: String, order: i64) -> NewPage {
        NewPage {
            parent_id,
            type_id: self.type_id,
            order,
            slug,
            title,
            css: self.css.clone(),
            js: self.js.clone(),
            meta_title: self.meta_title.clone(),
            meta_keywords: self.meta_keywords.clone(),
            meta_description: self.meta_description.clone(),
            rss_enabled: self.rss_enabled,
            comments_enabled: self.comments_enabled,
            status: self.status,
            restricted_to: None,
            strict_uri: self.strict_uri,
            is_home: false,
            navigation_group_id: None,
        }
    }
}

/// Field values for a page insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPage {
    pub parent_id: PageId,
    pub type_id: PageTypeId,
    pub order: i64,
    pub slug: String,
    pub title: String,
    pub css: Option<String>,
    pub js: Option<String>,
    pub meta_title: Option<String>,
    pub meta_keywords: Option<String>,
    pub meta_description: Option<String>,
    pub rss_enabled: bool,
    pub comments_enabled: bool,
    pub status: PageStatus,
    pub restricted_to: Option<Vec<i64>>,
    pub strict_uri: bool,
    pub is_home: bool,
    pub navigation_group_id: Option<i64>,
}

/// Partial update; `None` leaves the column untouched.
///
/// Nullable columns use `Option<Option<_>>` so they can be cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageUpdate {
    pub parent_id: Option<PageId>,
    pub order: Option<i64>,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub uri: Option<String>,
    pub css: Option<Option<String>>,
    pub js: Option<Option<String>>,
    pub meta_title: Option<Option<String>>,
    pub meta_keywords: Option<Option<String>>,
    pub meta_description: Option<Option<String>>,
    pub rss_enabled: Option<bool>,
    pub comments_enabled: Option<bool>,
    pub status: Option<PageStatus>,
    pub updated_on: Option<i64>,
    pub restricted_to: Option<Option<Vec<i64>>>,
    pub strict_uri: Option<bool>,
    pub is_home: Option<bool>,
}

impl PageUpdate {
    /// Sibling position written by the reorder walk
    pub fn position(parent_id: PageId, order: i64) -> Self {
        Self {
            parent_id: Some(parent_id),
            order: Some(order),
            ..Default::default()
        }
    }

    pub fn uri(uri: String) -> Self {
        Self {
            uri: Some(uri),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == PageUpdate::default()
    }
}

/// A page type that new pages are created against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageType {
    pub id: PageTypeId,
    pub title: String,
    pub description: String,
}

/// Tree projection served by the admin index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageNode {
    #[serde(flatten)]
    pub page: Page,
    pub children: Vec<PageNode>,
}

impl PageNode {
    /// Nest a flat page list under its parents, siblings sorted by `order`.
    ///
    /// Pages whose parent is missing from the list are treated as top level.
    pub fn build_forest(mut pages: Vec<Page>) -> Vec<PageNode> {
        use std::collections::{HashMap, HashSet};

        pages.sort_by_key(|p| (p.order, p.id));
        let known: HashSet<PageId> = pages.iter().map(|p| p.id).collect();

        let mut by_parent: HashMap<PageId, Vec<Page>> = HashMap::new();
        for page in pages {
            let parent = if page.parent_id.is_root() || !known.contains(&page.parent_id) {
                PageId::ROOT
            } else {
                page.parent_id
            };
            by_parent.entry(parent).or_default().push(page);
        }

        fn attach(
            parent: PageId,
            by_parent: &mut HashMap<PageId, Vec<Page>>,
            seen: &mut HashSet<PageId>,
        ) -> Vec<PageNode> {
            let siblings = by_parent.remove(&parent).unwrap_or_default();
            let mut nodes = Vec::with_capacity(siblings.len());
            for page in siblings {
                if seen.insert(page.id) {
                    let children = attach(page.id, by_parent, seen);
                    nodes.push(PageNode { page, children });
                }
            }
            nodes
        }

        let mut seen = HashSet::new();
        attach(PageId::ROOT, &mut by_parent, &mut seen)
    }
}
