// Strong Types - newtypes for identifiers flowing through the pages core

use serde::{Deserialize, Serialize};
use std::fmt;

/// Strongly-typed page ID - prevents confusion with orders and timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub i64);

impl PageId {
    /// Parent sentinel for top-level pages
    pub const ROOT: PageId = PageId(0);

    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn is_root(self) -> bool {
        self.0 == 0
    }

    /// Store-assigned ids are always positive
    pub fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PageId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<PageId> for i64 {
    fn from(id: PageId) -> Self {
        id.0
    }
}

/// Strongly-typed page type ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageTypeId(pub i64);

impl fmt::Display for PageTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PageTypeId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_operations() {
        let id = PageId::new(123);
        assert_eq!(id.value(), 123);
        assert!(id.is_valid());
        assert!(!id.is_root());

        assert!(PageId::ROOT.is_root());
        assert!(!PageId::ROOT.is_valid());
        assert!(!PageId::new(-4).is_valid());
    }

    #[test]
    fn test_page_id_serializes_as_integer() {
        let json = serde_json::to_string(&PageId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: PageId = serde_json::from_str("7").unwrap();
        assert_eq!(back, PageId::new(7));
    }
}
