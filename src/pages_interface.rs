// Pages admin HTTP interface - JSON endpoints over the page service

use std::sync::Arc;
use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    core::PageId,
    error::{AppError, AppResult},
    infrastructure::viewer::AdminViewer,
    models::OrderedForest,
    services::{PageInput, PageService},
};

#[derive(Clone)]
pub struct PagesInterface {
    service: Arc<PageService>,
}

impl PagesInterface {
    pub fn new(service: Arc<PageService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> Arc<PageService> {
        self.service.clone()
    }
}

// HTTP Request types

/// Body posted by the tree editor
#[derive(Deserialize)]
pub struct OrderRequest {
    pub order: Option<Value>,
    #[serde(default)]
    pub data: OrderData,
}

#[derive(Deserialize, Default)]
pub struct OrderData {
    #[serde(default)]
    pub root_pages: Vec<Value>,
}

#[derive(Deserialize)]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub action_to: Vec<PageId>,
}

fn parse_root_pages(raw: &[Value]) -> AppResult<Vec<PageId>> {
    raw.iter()
        .map(|value| {
            let id = match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.strip_prefix("page_").unwrap_or(s).parse().ok(),
                _ => None,
            };
            id.map(PageId::new)
                .filter(|id| id.is_valid())
                .ok_or_else(|| AppError::Validation(format!("Invalid root page reference {}", value)))
        })
        .collect()
}

// HTTP Handlers

pub async fn index_handler(State(pages): State<PagesInterface>) -> AppResult<Json<Value>> {
    let tree = pages.service.index().await?;
    Ok(Json(json!({ "pages": tree })))
}

pub async fn choose_type_handler(State(pages): State<PagesInterface>) -> AppResult<Json<Value>> {
    let choice = pages.service.choose_type().await?;
    Ok(Json(json!(choice)))
}

pub async fn order_handler(
    State(pages): State<PagesInterface>,
    Json(req): Json<OrderRequest>,
) -> AppResult<Json<Value>> {
    let Some(forest) = OrderedForest::from_submission(req.order.as_ref())? else {
        return Ok(Json(json!({ "ordered": false })));
    };
    let root_pages = parse_root_pages(&req.data.root_pages)?;
    pages.service.reorder(&forest, &root_pages).await?;
    Ok(Json(json!({ "ordered": !forest.is_empty() })))
}

pub async fn duplicate_handler(
    State(pages): State<PagesInterface>,
    AxumPath(id): AxumPath<i64>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let copy = pages.service.duplicate(PageId::new(id)).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": copy, "source": id }))))
}

pub async fn create_handler(
    State(pages): State<PagesInterface>,
    viewer: AdminViewer,
    Json(input): Json<PageInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let page = pages.service.create(&viewer, input).await?;
    Ok((StatusCode::CREATED, Json(json!(page))))
}

pub async fn details_handler(
    State(pages): State<PagesInterface>,
    AxumPath(id): AxumPath<i64>,
) -> AppResult<Json<Value>> {
    let page = pages.service.find(PageId::new(id)).await?;
    Ok(Json(json!(page)))
}

pub async fn update_handler(
    State(pages): State<PagesInterface>,
    viewer: AdminViewer,
    AxumPath(id): AxumPath<i64>,
    Json(input): Json<PageInput>,
) -> AppResult<Json<Value>> {
    let page = pages.service.update(&viewer, PageId::new(id), input).await?;
    Ok(Json(json!(page)))
}

pub async fn delete_handler(
    State(pages): State<PagesInterface>,
    viewer: AdminViewer,
    AxumPath(id): AxumPath<i64>,
) -> AppResult<Json<Value>> {
    let outcome = pages.service.delete(&viewer, &[PageId::new(id)]).await?;
    Ok(Json(json!(outcome)))
}

pub async fn bulk_delete_handler(
    State(pages): State<PagesInterface>,
    viewer: AdminViewer,
    Json(req): Json<BulkDeleteRequest>,
) -> AppResult<Json<Value>> {
    let outcome = pages.service.delete(&viewer, &req.action_to).await?;
    Ok(Json(json!(outcome)))
}

// Create pages admin router
pub fn create_pages_router(pages: PagesInterface) -> Router {
    Router::new()
        .route("/", get(index_handler).post(create_handler))
        .route("/types", get(choose_type_handler))
        .route("/order", post(order_handler))
        .route("/duplicate/{id}", post(duplicate_handler))
        .route("/delete", post(bulk_delete_handler))
        .route(
            "/{id}",
            get(details_handler).put(update_handler).delete(delete_handler),
        )
        .with_state(pages)
}
