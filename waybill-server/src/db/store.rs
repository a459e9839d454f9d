//! Entity Store
//!
//! 批量 upsert / 范围清除的门面。每个实体的落库是一个独立的
//! row-scoped 事务：单个实体失败只影响它自己，兄弟条目照常提交。

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::db::models::LineItem;
use crate::db::repository::{EntityLocks, OrderRepository, RepoResult, TourRepository};
use crate::reconcile::snapshot::TourDetailFields;
use crate::reconcile::{SnapshotFields, ledger, merge};

pub use crate::db::repository::order::ClearReport;

/// Outcome of one batch upsert.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct UpsertReport {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Durable Orders/Tours/LineItems with batch upsert and scoped clear.
#[derive(Clone)]
pub struct EntityStore {
    orders: OrderRepository,
    tours: TourRepository,
    locks: EntityLocks,
}

impl EntityStore {
    pub fn new(db: Surreal<Db>, locks: EntityLocks) -> Self {
        Self {
            orders: OrderRepository::new(db.clone()),
            tours: TourRepository::new(db),
            locks,
        }
    }

    pub fn orders(&self) -> &OrderRepository {
        &self.orders
    }

    pub fn tours(&self) -> &TourRepository {
        &self.tours
    }

    pub fn locks(&self) -> &EntityLocks {
        &self.locks
    }

    /// Upsert a batch of snapshots for one client/date.
    ///
    /// Per element: look up by primary key, protected-merge when found,
    /// construct fresh otherwise. Failures are logged and counted without
    /// aborting sibling elements. Tours referenced by the batch are lazily
    /// created and their statistics recomputed afterwards.
    pub async fn upsert_batch(
        &self,
        snapshots: &[SnapshotFields],
        client_key: &str,
        date: NaiveDate,
    ) -> UpsertReport {
        let mut report = UpsertReport::default();
        let mut touched_tours: HashMap<String, Option<TourDetailFields>> = HashMap::new();

        for snap in snapshots {
            let Some(order_id) = snap.order_id().map(str::to_string) else {
                tracing::warn!(client = client_key, "Snapshot without order id skipped");
                report.failed += 1;
                continue;
            };

            // Serialize against concurrent edits of the same order
            let _guard = self.locks.acquire(&format!("order:{order_id}")).await;
            let now = Utc::now();

            let existing = match self.orders.find_by_id(&order_id).await {
                Ok(existing) => existing,
                Err(e) => {
                    tracing::warn!(order_id = %order_id, error = %e, "Lookup failed; snapshot skipped");
                    report.failed += 1;
                    continue;
                }
            };

            let is_new = existing.is_none();
            let order = match existing {
                Some(mut order) => {
                    merge::merge_order(&mut order, snap, now);
                    order
                }
                None => merge::order_from_snapshot(&order_id, client_key, date, snap, now).0,
            };

            let items: Vec<LineItem>;
            let items_for_save = if ledger::is_protected(&order, "line_items") {
                tracing::info!(order_id = %order_id, "Line items hand-modified; snapshot items ignored");
                None
            } else if snap.has_line_items() {
                items = snap.line_items(&order_id, now);
                Some(items.as_slice())
            } else {
                None
            };

            match self.orders.save_with_line_items(&order, items_for_save).await {
                Ok(()) => {
                    if is_new {
                        report.created += 1;
                    } else {
                        report.updated += 1;
                    }
                    if let Some(tour_id) = &order.tour_id {
                        touched_tours
                            .entry(tour_id.clone())
                            .or_insert_with(|| snap.tour_detail());
                    }
                }
                Err(e) => {
                    // Row-scoped transaction: only this entity rolled back
                    tracing::warn!(order_id = %order_id, error = %e, "Persist rejected; sibling entries unaffected");
                    report.failed += 1;
                }
            }
        }

        // Tours are independent rows; maintain them concurrently
        futures::future::join_all(touched_tours.iter().map(|(tour_id, detail)| async move {
            if let Err(e) = self.ensure_tour(tour_id, detail.as_ref()).await {
                tracing::warn!(tour_id = %tour_id, error = %e, "Tour maintenance failed");
            }
        }))
        .await;

        tracing::info!(
            client = client_key,
            %date,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            "Batch upsert finished"
        );
        report
    }

    /// Delete every order (and its line items first) for one client/date.
    pub async fn clear_for_key(&self, client_key: &str, date: NaiveDate) -> RepoResult<ClearReport> {
        let report = self.orders.clear_for_key(client_key, date).await?;
        tracing::info!(
            client = client_key,
            %date,
            orders = report.orders_deleted,
            line_items = report.line_items_deleted,
            "Cleared cached orders"
        );
        Ok(report)
    }

    /// Lazily create the tour row and refresh its aggregates.
    async fn ensure_tour(
        &self,
        tour_id: &str,
        detail: Option<&TourDetailFields>,
    ) -> RepoResult<()> {
        if self.tours.get_or_create(tour_id, detail).await?.is_none() {
            return Ok(());
        }
        self.refresh_tour_statistics(tour_id).await
    }

    /// Recompute one tour's aggregate counts from its orders.
    pub async fn refresh_tour_statistics(&self, tour_id: &str) -> RepoResult<()> {
        let Some(mut tour) = self.tours.find_by_id(tour_id).await? else {
            return Ok(());
        };
        let orders = self.orders.find_by_tour_id(tour_id).await?;
        tour.recompute_statistics(&orders);
        tour.updated_at = Utc::now();
        self.tours.save(&tour).await
    }
}
