//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::core::ServerState;
use crate::db::models::{LineItem, ModificationState, Order};
use crate::edits::{EditOutcome, LineItemInput};
use crate::query::{OrderFilter, OrderPage, Pagination};
use crate::utils::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct OrderListParams {
    pub date: Option<NaiveDate>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Comma-separated status list, e.g. `COMPLETED,CANCELLED`
    pub status: Option<String>,
    pub city: Option<String>,
    pub rider: Option<String>,
    pub vehicle: Option<String>,
    pub client: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl OrderListParams {
    fn split(self) -> (OrderFilter, Pagination) {
        let statuses = self
            .status
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let filter = OrderFilter {
            date: self.date,
            date_from: self.date_from,
            date_to: self.date_to,
            statuses,
            city: self.city,
            rider: self.rider,
            vehicle: self.vehicle,
            client: self.client,
            search: self.search,
        };
        let mut pagination = Pagination::default();
        if let Some(page) = self.page {
            pagination.page = page;
        }
        if let Some(per_page) = self.per_page {
            pagination.per_page = per_page;
        }
        (filter, pagination)
    }
}

/// GET /api/orders - 过滤 / 分页订单列表（走查询缓存）
pub async fn list(
    State(state): State<ServerState>,
    Query(params): Query<OrderListParams>,
) -> AppResult<Json<OrderPage>> {
    let (filter, pagination) = params.split();
    let page = state.query_service().list_orders(&filter, pagination).await?;
    Ok(Json(page))
}

#[derive(Serialize)]
pub struct OrderDetailResponse {
    #[serde(flatten)]
    pub order: Order,
    pub line_items: Vec<LineItem>,
}

/// GET /api/orders/:id - 单个订单详情（含 line items）
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<OrderDetailResponse>> {
    let store = state.entity_store();
    let order = store
        .orders()
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?;
    let line_items = store.orders().line_items(&id).await?;
    Ok(Json(OrderDetailResponse { order, line_items }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct OrderEditRequest {
    #[validate(length(min = 1, message = "modified_by must not be empty"))]
    pub modified_by: String,
    pub data: Map<String, Value>,
}

/// PUT /api/orders/:id/edit - 操作员改单
pub async fn edit(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<OrderEditRequest>,
) -> AppResult<Json<EditOutcome>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let outcome = state
        .edit_service()
        .apply_order_edit(&id, &payload.data, &payload.modified_by)
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LineItemsEditRequest {
    #[validate(length(min = 1, message = "modified_by must not be empty"))]
    pub modified_by: String,
    pub line_items: Vec<LineItemInput>,
}

#[derive(Serialize)]
pub struct LineItemsEditResponse {
    pub replaced_items: usize,
}

/// PUT /api/orders/:id/line-items/edit - 整体替换 line items
pub async fn edit_line_items(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<LineItemsEditRequest>,
) -> AppResult<Json<LineItemsEditResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let replaced_items = state
        .edit_service()
        .replace_line_items(&id, &payload.line_items, &payload.modified_by)
        .await?;
    Ok(Json(LineItemsEditResponse { replaced_items }))
}

/// GET /api/orders/:id/modification-status - 修改状态
pub async fn modification_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ModificationState>> {
    let order = state
        .entity_store()
        .orders()
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?;
    Ok(Json(order.modification))
}
