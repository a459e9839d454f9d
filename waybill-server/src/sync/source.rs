//! Snapshot Source
//!
//! The upstream fleet-management API, behind a trait so the sync service
//! can be exercised against a stub. Pagination and retries are the
//! source's concern, not the caller's.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};
use thiserror::Error;

use crate::core::Config;
use crate::reconcile::SnapshotFields;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("upstream payload malformed: {0}")]
    Decode(String),
}

/// Anything that can produce a full snapshot of one client/date.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(
        &self,
        client_key: &str,
        date: NaiveDate,
        status_filter: Option<&[String]>,
    ) -> Result<Vec<SnapshotFields>, SourceError>;
}

/// Reqwest-based client for the upstream fleet API's order-search endpoint.
#[derive(Clone)]
pub struct FleetApiClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
    team_id: String,
    page_size: usize,
}

impl FleetApiClient {
    // 防御上游分页异常：单次快照最多翻这么多页
    const MAX_PAGES: usize = 400;

    pub fn from_config(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            http,
            base_url: config.fleet_api_url.clone(),
            api_token: config.fleet_api_token.clone(),
            team_id: config.fleet_team_id.clone(),
            page_size: 50,
        }
    }

    fn search_payload(
        &self,
        date: NaiveDate,
        page: usize,
        status_filter: Option<&[String]>,
    ) -> Value {
        let next_date = date.succ_opt().unwrap_or(date);
        let mut filters = vec![
            json!({
                "name": "teamId",
                "operation": "EQUALS",
                "values": [self.team_id],
            }),
            json!({
                "name": "date",
                "operation": "GREATER_THAN_OR_EQUAL_TO",
                "value": date.to_string(),
            }),
            json!({
                "name": "date",
                "operation": "LESSER_THAN",
                "value": next_date.to_string(),
            }),
        ];
        if let Some(statuses) = status_filter
            && !statuses.is_empty()
        {
            filters.push(json!({
                "name": "orderStatus",
                "operation": "EQUALS",
                "values": statuses,
            }));
        }

        json!({
            "page": page,
            "size": self.page_size,
            "sortingInfo": [],
            "filters": filters,
        })
    }
}

#[async_trait]
impl SnapshotSource for FleetApiClient {
    async fn fetch_snapshot(
        &self,
        client_key: &str,
        date: NaiveDate,
        status_filter: Option<&[String]>,
    ) -> Result<Vec<SnapshotFields>, SourceError> {
        let url = format!("{}/v1/client/{client_key}/order-search", self.base_url);
        let mut all = Vec::new();

        for page in 1..=Self::MAX_PAGES {
            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.api_token)
                .json(&self.search_payload(date, page, status_filter))
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(SourceError::Status(response.status().as_u16()));
            }

            let body: Value = response.json().await?;
            let content = body
                .get("content")
                .and_then(Value::as_array)
                .ok_or_else(|| SourceError::Decode("missing 'content' array".to_string()))?;

            tracing::debug!(
                client = client_key,
                %date,
                page,
                fetched = content.len(),
                total = all.len() + content.len(),
                "Snapshot page fetched"
            );

            if content.is_empty() {
                break;
            }
            let last_page = content.len() < self.page_size;
            all.extend(content.iter().cloned().map(SnapshotFields::new));
            if last_page {
                break;
            }
        }

        tracing::info!(client = client_key, %date, orders = all.len(), "Snapshot fetched");
        Ok(all)
    }
}
