// Page domain models

pub mod order;
pub mod page;

pub use order::{OrderNode, OrderedForest};
pub use page::{NewPage, Page, PageNode, PageStatus, PageType, PageUpdate};
