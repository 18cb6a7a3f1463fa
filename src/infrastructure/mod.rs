// Core infrastructure modules
pub mod database;              // Page repository seam and transactions
pub mod sqlite_database;       // SQLite page store
pub mod cache;                 // LRU page projection cache
pub mod events;                // Page lifecycle events
pub mod lookup;                // URI lookup rebuild
pub mod viewer;                // Admin permissions per request
pub mod traits;                // Collaborator traits

pub use database::{PageRepository, PageTransaction};
pub use sqlite_database::SqlitePageStore;
pub use cache::{PageCache, NAVIGATION_SCOPE, PAGES_SCOPE};
pub use events::{BroadcastEventBus, EventEnvelope, PageEvent};
pub use lookup::PageLookupRebuilder;
pub use viewer::{AdminViewer, PagePermission};
pub use traits::{CacheInvalidator, EventBus, LookupRebuilder};
