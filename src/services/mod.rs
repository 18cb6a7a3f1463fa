pub mod page_duplicate;
pub mod page_order;
pub mod page_service;

pub use page_service::{DeleteOutcome, PageInput, PageService, TypeChoice};
