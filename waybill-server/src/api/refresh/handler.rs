//! Refresh API Handlers

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::ServerState;
use crate::sync::{RefreshMode, RefreshReport};
use crate::utils::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct RefreshParams {
    pub mode: RefreshMode,
    /// Single day; defaults to today when no range is given.
    pub date: Option<NaiveDate>,
    /// Inclusive multi-day range (overrides `date`).
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub client: Option<String>,
    /// Comma-separated upstream status filter.
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub reports: Vec<RefreshReport>,
}

/// POST /api/refresh?mode=force|smart - 驱动同步服务
///
/// `force` 先清再拉，`smart` 不清直接合并（保护字段不被覆盖）。
pub async fn refresh(
    State(state): State<ServerState>,
    Query(params): Query<RefreshParams>,
) -> AppResult<Json<RefreshResponse>> {
    let client_key = params
        .client
        .unwrap_or_else(|| state.config.fleet_client_key.clone());
    let statuses: Vec<String> = params
        .status
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let status_filter = (!statuses.is_empty()).then_some(statuses.as_slice());

    let sync = state.sync_service();

    let reports = match (params.date_from, params.date_to) {
        (Some(from), Some(to)) => {
            if from > to {
                return Err(AppError::validation("date_from must not be after date_to"));
            }
            sync.refresh_range(params.mode, &client_key, from, to, &CancellationToken::new())
                .await?
        }
        (None, None) => {
            let date = params.date.unwrap_or_else(|| Utc::now().date_naive());
            vec![
                sync.refresh(params.mode, &client_key, date, status_filter)
                    .await?,
            ]
        }
        _ => {
            return Err(AppError::validation(
                "date_from and date_to must be provided together",
            ));
        }
    };

    Ok(Json(RefreshResponse { reports }))
}
