//! Tour API Handlers
//!
//! Tour id 出现在 path 里（含 `*` 分隔符）；axum 在进入 handler 前
//! 已经做了 percent-decoding。

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Map, Value};
use validator::Validate;

use crate::core::ServerState;
use crate::db::models::{ModificationState, Tour};
use crate::edits::TourEditOutcome;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct TourListParams {
    /// Calendar day, e.g. `2024-09-23`; prefix match on the tour id's
    /// timestamp part.
    pub date: Option<String>,
}

/// GET /api/tours - Tour 列表（含聚合统计）
pub async fn list(
    State(state): State<ServerState>,
    Query(params): Query<TourListParams>,
) -> AppResult<Json<Vec<Tour>>> {
    let tours = state
        .query_service()
        .list_tours(params.date.as_deref())
        .await?;
    Ok(Json(tours))
}

#[derive(Debug, Deserialize, Validate)]
pub struct TourEditRequest {
    #[validate(length(min = 1, message = "modified_by must not be empty"))]
    pub modified_by: String,
    pub data: Map<String, Value>,
    #[serde(default = "default_propagate")]
    pub propagate_to_orders: bool,
}

fn default_propagate() -> bool {
    true
}

/// PUT /api/tours/:id/edit - Tour 编辑（可传播到订单）
pub async fn edit(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<TourEditRequest>,
) -> AppResult<Json<TourEditOutcome>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let outcome = state
        .edit_service()
        .apply_tour_edit(
            &id,
            &payload.data,
            &payload.modified_by,
            payload.propagate_to_orders,
        )
        .await?;
    Ok(Json(outcome))
}

/// GET /api/tours/:id/modification-status - 修改状态
pub async fn modification_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ModificationState>> {
    let tour = state
        .entity_store()
        .tours()
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Tour {id} not found")))?;
    Ok(Json(tour.modification))
}
