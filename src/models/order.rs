// Tree editor submission - the on-screen arrangement of the page tree

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::core::PageId;
use crate::error::{AppError, AppResult};

/// Element id prefix used by the nested sortable tree editor
const PAGE_REF_PREFIX: &str = "page_";

/// Raw id as submitted: `"page_12"`, `"12"` or `12`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawPageRef {
    Number(i64),
    Text(String),
}

impl TryFrom<RawPageRef> for PageId {
    type Error = String;

    fn try_from(raw: RawPageRef) -> Result<Self, Self::Error> {
        let id = match raw {
            RawPageRef::Number(id) => id,
            RawPageRef::Text(text) => {
                let digits = text.strip_prefix(PAGE_REF_PREFIX).unwrap_or(&text);
                digits
                    .parse::<i64>()
                    .map_err(|_| format!("invalid page reference '{}'", text))?
            }
        };
        let id = PageId::new(id);
        if id.is_valid() {
            Ok(id)
        } else {
            Err(format!("invalid page id {}", id))
        }
    }
}

/// One node of the submitted tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNode {
    #[serde(deserialize_with = "deserialize_page_ref")]
    pub id: PageId,
    #[serde(default)]
    pub children: Vec<OrderNode>,
}

fn deserialize_page_ref<'de, D>(deserializer: D) -> Result<PageId, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = RawPageRef::deserialize(deserializer)?;
    PageId::try_from(raw).map_err(serde::de::Error::custom)
}

impl OrderNode {
    pub fn leaf(id: i64) -> Self {
        Self {
            id: PageId::new(id),
            children: Vec::new(),
        }
    }

    pub fn with_children(id: i64, children: Vec<OrderNode>) -> Self {
        Self {
            id: PageId::new(id),
            children,
        }
    }
}

/// Ordered forest of page references
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderedForest {
    pub nodes: Vec<OrderNode>,
}

impl OrderedForest {
    pub fn new(nodes: Vec<OrderNode>) -> Self {
        Self { nodes }
    }

    /// Parse the `order` field of a reorder request.
    ///
    /// An absent field or a value that is not a sequence yields `None`; a
    /// sequence with malformed nodes is rejected.
    pub fn from_submission(value: Option<&Value>) -> AppResult<Option<Self>> {
        let value = match value {
            Some(value) if value.is_array() => value,
            _ => return Ok(None),
        };
        let nodes: Vec<OrderNode> = serde_json::from_value(value.clone())
            .map_err(|e| AppError::Validation(format!("Malformed page order: {}", e)))?;
        Ok(Some(Self { nodes }))
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every referenced id, depth first
    pub fn page_ids(&self) -> Vec<PageId> {
        let mut ids = Vec::new();
        let mut stack: Vec<&OrderNode> = self.nodes.iter().rev().collect();
        while let Some(node) = stack.pop() {
            ids.push(node.id);
            stack.extend(node.children.iter().rev());
        }
        ids
    }

    pub fn len(&self) -> usize {
        self.page_ids().len()
    }

    /// Reject shapes that cannot describe a tree: repeated ids or nesting
    /// beyond `max_depth` levels.
    pub fn validate(&self, max_depth: usize) -> AppResult<()> {
        let mut seen = HashSet::new();
        let mut stack: Vec<(&OrderNode, usize)> = self.nodes.iter().map(|n| (n, 1)).collect();
        while let Some((node, depth)) = stack.pop() {
            if depth > max_depth {
                return Err(AppError::Validation(format!(
                    "Page order nests deeper than {} levels",
                    max_depth
                )));
            }
            if !seen.insert(node.id) {
                return Err(AppError::Validation(format!(
                    "Page {} appears more than once in the submitted order",
                    node.id
                )));
            }
            stack.extend(node.children.iter().map(|child| (child, depth + 1)));
        }
        Ok(())
    }

    /// `(page, parent, order)` assignments in walk order
    pub fn positions(&self) -> Vec<(PageId, PageId, i64)> {
        let mut out = Vec::new();
        let mut stack: Vec<(PageId, &[OrderNode])> = vec![(PageId::ROOT, self.nodes.as_slice())];
        while let Some((parent, siblings)) = stack.pop() {
            for (index, node) in siblings.iter().enumerate() {
                out.push((node.id, parent, index as i64));
                if !node.children.is_empty() {
                    stack.push((node.id, node.children.as_slice()));
                }
            }
        }
        out
    }
}
