//! Sync Service
//!
//! Drives the fetch → protected-merge → persist pipeline.
//!
//! Mode semantics:
//! - `force`: clear the client/date scope, then rebuild it from the fresh
//!   snapshot (the fetch happens first, so an upstream failure leaves the
//!   existing rows untouched).
//! - `smart`: merge the snapshot into existing rows without clearing;
//!   hand-edited fields survive per the modification ledger.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::EntityStore;
use crate::query::SharedQueryCache;
use crate::utils::{AppError, AppResult};

use super::source::SnapshotSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    Force,
    Smart,
}

/// Per-date refresh outcome, reported back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub date: NaiveDate,
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub orders_cleared: i64,
    pub line_items_cleared: i64,
}

#[derive(Clone)]
pub struct SyncService {
    source: Arc<dyn SnapshotSource>,
    store: EntityStore,
    cache: SharedQueryCache,
}

impl SyncService {
    pub fn new(source: Arc<dyn SnapshotSource>, store: EntityStore, cache: SharedQueryCache) -> Self {
        Self {
            source,
            store,
            cache,
        }
    }

    /// Refresh one client/date from the upstream snapshot.
    pub async fn refresh(
        &self,
        mode: RefreshMode,
        client_key: &str,
        date: NaiveDate,
        status_filter: Option<&[String]>,
    ) -> AppResult<RefreshReport> {
        let run_id = Uuid::new_v4();
        tracing::info!(%run_id, client = client_key, %date, ?mode, "Refresh started");

        // Fetch before any destructive step: an upstream failure must leave
        // previously committed rows valid.
        let snapshots = self
            .source
            .fetch_snapshot(client_key, date, status_filter)
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let mut report = RefreshReport {
            date,
            fetched: snapshots.len(),
            created: 0,
            updated: 0,
            failed: 0,
            orders_cleared: 0,
            line_items_cleared: 0,
        };

        if mode == RefreshMode::Force {
            let cleared = self.store.clear_for_key(client_key, date).await?;
            report.orders_cleared = cleared.orders_deleted;
            report.line_items_cleared = cleared.line_items_deleted;
        }

        let upsert = self.store.upsert_batch(&snapshots, client_key, date).await;
        report.created = upsert.created;
        report.updated = upsert.updated;
        report.failed = upsert.failed;

        self.cache.invalidate_all();

        tracing::info!(
            %run_id,
            client = client_key,
            %date,
            fetched = report.fetched,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            "Refresh finished"
        );
        Ok(report)
    }

    /// Refresh an inclusive date range, one per-day unit at a time.
    ///
    /// Cancellable between days: committed days stay committed. A day whose
    /// upstream fetch fails is logged and skipped; the range continues.
    pub async fn refresh_range(
        &self,
        mode: RefreshMode,
        client_key: &str,
        from: NaiveDate,
        to: NaiveDate,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<RefreshReport>> {
        let mut reports = Vec::new();
        let mut date = from;

        while date <= to {
            if cancel.is_cancelled() {
                tracing::info!(
                    client = client_key,
                    %date,
                    completed = reports.len(),
                    "Range refresh cancelled; committed days kept"
                );
                break;
            }

            match self.refresh(mode, client_key, date, None).await {
                Ok(report) => reports.push(report),
                Err(AppError::Upstream(e)) => {
                    tracing::warn!(client = client_key, %date, error = %e, "Day skipped after upstream failure");
                }
                Err(e) => return Err(e),
            }

            let Some(next) = date.succ_opt() else { break };
            date = next;
        }

        Ok(reports)
    }
}
