use std::sync::Arc;
use crate::{
    config::Config,
    infrastructure::{BroadcastEventBus, PageCache, SqlitePageStore},
    pages_interface::PagesInterface,
    services::PageService,
};

#[derive(Clone)]
pub struct AppState {
    pub pages: PagesInterface,
    pub events: BroadcastEventBus,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Initialize database
        let store = SqlitePageStore::connect(&config.database.url).await?;
        let cache = Arc::new(PageCache::new(config.cache.capacity));
        let events = BroadcastEventBus::new();

        let service = PageService::new(
            Arc::new(store),
            cache,
            Arc::new(events.clone()),
            config.pages.clone(),
        );
        if config.pages.seed_default_type {
            service.seed_default_type().await?;
        }

        Ok(Self {
            pages: PagesInterface::new(Arc::new(service)),
            events,
            config,
        })
    }
}
