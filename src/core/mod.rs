// Core types and pure helpers shared by the pages services

pub mod strong_types;
pub mod increment;

pub use strong_types::{PageId, PageTypeId};
pub use increment::{increment_string, slugify};
