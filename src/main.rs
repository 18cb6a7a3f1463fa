// Pages Admin Server

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pages_admin::{
    app_state::AppState,
    config::Config,
    pages_interface::create_pages_router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;

    let app = Router::new()
        .nest("/admin/pages", create_pages_router(app_state.pages.clone()))
        .layer(CorsLayer::permissive());

    let addr = config.server_address();
    info!("Pages admin server starting on http://{}", addr);
    info!("  GET    /admin/pages                 - Page tree");
    info!("  GET    /admin/pages/types           - Choose page type");
    info!("  POST   /admin/pages                 - Create page");
    info!("  POST   /admin/pages/order           - Reorder tree");
    info!("  POST   /admin/pages/duplicate/{{id}}  - Duplicate page");
    info!("  GET    /admin/pages/{{id}}            - Page details");
    info!("  PUT    /admin/pages/{{id}}            - Edit page");
    info!("  DELETE /admin/pages/{{id}}            - Delete page");
    info!("  POST   /admin/pages/delete          - Bulk delete");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
