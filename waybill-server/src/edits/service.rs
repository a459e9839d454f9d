//! Edit Service
//!
//! Applies operator edits, records them in the modification ledger, and
//! propagates tour edits onto the tour's orders. A tour edit and all of
//! its propagated order edits commit as one transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::EntityStore;
use crate::db::models::{LineItem, Order, Tour};
use crate::reconcile::ledger;
use crate::query::SharedQueryCache;
use crate::utils::{AppError, AppResult};

use super::fields::{
    self, FieldError, ORDER_EDITABLE_FIELDS, TOUR_EDITABLE_FIELDS, TOUR_TO_ORDER_FIELDS,
};

const STATUS_CANCELLED: &str = "CANCELLED";

/// Outcome of an order edit: which fields actually changed.
#[derive(Debug, Clone, Serialize)]
pub struct EditOutcome {
    pub updated_fields: Vec<String>,
}

/// Outcome of a tour edit, including how many orders the change reached.
#[derive(Debug, Clone, Serialize)]
pub struct TourEditOutcome {
    pub updated_fields: Vec<String>,
    pub propagated_orders: usize,
}

/// Operator-supplied replacement line item.
#[derive(Debug, Clone, Deserialize)]
pub struct LineItemInput {
    pub sku_id: String,
    pub name: String,
    #[serde(default)]
    pub quantity: i64,
    pub quantity_unit: Option<String>,
    pub transacted_quantity: Option<i64>,
    pub transaction_status: Option<String>,
}

#[derive(Clone)]
pub struct EditService {
    store: EntityStore,
    cache: SharedQueryCache,
}

impl EditService {
    pub fn new(store: EntityStore, cache: SharedQueryCache) -> Self {
        Self { store, cache }
    }

    /// Apply operator edits to one order.
    ///
    /// Fields whose new value equals the current one are no-ops: they do
    /// not appear in `updated_fields` and do not touch the ledger.
    pub async fn apply_order_edit(
        &self,
        order_id: &str,
        edit: &Map<String, Value>,
        actor: &str,
    ) -> AppResult<EditOutcome> {
        validate_field_names(edit, ORDER_EDITABLE_FIELDS)?;

        let _guard = self
            .store
            .locks()
            .acquire(&format!("order:{order_id}"))
            .await;

        let mut order = self
            .store
            .orders()
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;

        let now = Utc::now();
        let mut updated = Vec::new();

        for (field, value) in edit {
            let old_status = order.order_status.clone();
            let changed = fields::apply_order_field(&mut order, field, value)
                .map_err(field_error_to_validation)?;
            if !changed {
                continue;
            }
            ledger::mark_modified(&mut order, field, actor, now);
            updated.push(field.clone());

            if field == "order_status" {
                clear_order_cancellation_on_uncancel(&mut order, &old_status, actor, now, Some(&mut updated));
            }
        }

        if !updated.is_empty() {
            order.updated_at = now;
            self.store.orders().save(&order).await?;
            self.cache.invalidate_all();
            tracing::info!(order_id, actor, fields = ?updated, "Order edited");
        }

        Ok(EditOutcome {
            updated_fields: updated,
        })
    }

    /// Replace an order's line items with an operator-supplied set.
    ///
    /// Marks the synthetic `line_items` field modified, so later snapshots
    /// keep their own item lists to themselves.
    pub async fn replace_line_items(
        &self,
        order_id: &str,
        items: &[LineItemInput],
        actor: &str,
    ) -> AppResult<usize> {
        if items.is_empty() {
            return Err(AppError::validation("No line items provided"));
        }

        let _guard = self
            .store
            .locks()
            .acquire(&format!("order:{order_id}"))
            .await;

        let mut order = self
            .store
            .orders()
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;

        let now = Utc::now();
        let rows: Vec<LineItem> = items
            .iter()
            .map(|item| LineItem {
                order_id: order_id.to_string(),
                sku_id: item.sku_id.clone(),
                name: item.name.clone(),
                quantity: item.quantity,
                quantity_unit: item.quantity_unit.clone(),
                transacted_quantity: item.transacted_quantity,
                transaction_status: item.transaction_status.clone(),
                created_at: now,
            })
            .collect();

        ledger::mark_modified(&mut order, "line_items", actor, now);
        order.updated_at = now;
        self.store
            .orders()
            .save_with_line_items(&order, Some(&rows))
            .await?;
        self.cache.invalidate_all();

        tracing::info!(order_id, actor, items = rows.len(), "Line items replaced");
        Ok(rows.len())
    }

    /// Apply operator edits to one tour and, when requested, re-apply the
    /// updated fields onto every linked order.
    ///
    /// Propagated writes are attributed to `"Tour Update: <actor>"`, so
    /// later snapshots cannot clobber them either. Everything commits as a
    /// single transaction: a propagation failure rolls back the tour edit.
    pub async fn apply_tour_edit(
        &self,
        tour_id: &str,
        edit: &Map<String, Value>,
        actor: &str,
        propagate: bool,
    ) -> AppResult<TourEditOutcome> {
        validate_field_names(edit, TOUR_EDITABLE_FIELDS)?;

        let _tour_guard = self.store.locks().acquire(&format!("tour:{tour_id}")).await;

        let mut tour = self
            .store
            .tours()
            .find_by_id(tour_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Tour {tour_id} not found")))?;

        let now = Utc::now();
        let mut updated = Vec::new();

        for (field, value) in edit {
            let old_status = tour.tour_status.clone();
            let changed = fields::apply_tour_field(&mut tour, field, value)
                .map_err(field_error_to_validation)?;
            if !changed {
                continue;
            }
            ledger::mark_modified(&mut tour, field, actor, now);
            updated.push(field.clone());

            if field == "tour_status"
                && old_status == STATUS_CANCELLED
                && tour.tour_status != STATUS_CANCELLED
                && tour.cancellation_reason.is_some()
            {
                tour.cancellation_reason = None;
                ledger::mark_modified(&mut tour, "cancellation_reason", actor, now);
                if !updated.iter().any(|f| f == "cancellation_reason") {
                    updated.push("cancellation_reason".to_string());
                }
            }
        }

        if updated.is_empty() {
            return Ok(TourEditOutcome {
                updated_fields: updated,
                propagated_orders: 0,
            });
        }

        // Guards stay alive until the commit below so no sync can slip in
        // between computing a propagated row and persisting it.
        let (changed_orders, _order_guards) = if propagate {
            self.propagate_tour_edit(&tour, &updated, actor, now).await?
        } else {
            (Vec::new(), Vec::new())
        };

        let propagated_orders = changed_orders.len();
        tour.updated_at = now;
        self.store
            .tours()
            .commit_with_orders(&tour, &changed_orders)
            .await?;
        self.cache.invalidate_all();

        tracing::info!(
            tour_id,
            actor,
            fields = ?updated,
            propagated_orders,
            "Tour edited"
        );

        // Propagated status changes shift the tour's aggregates
        if propagated_orders > 0
            && let Err(e) = self.store.refresh_tour_statistics(tour_id).await
        {
            tracing::warn!(tour_id, error = %e, "Tour statistics refresh failed after edit");
        }

        Ok(TourEditOutcome {
            updated_fields: updated,
            propagated_orders,
        })
    }

    /// Compute the propagated order rows (not yet persisted; the caller
    /// commits them together with the tour while the returned guards are
    /// still held).
    async fn propagate_tour_edit(
        &self,
        tour: &Tour,
        updated_fields: &[String],
        actor: &str,
        now: DateTime<Utc>,
    ) -> AppResult<(Vec<Order>, Vec<tokio::sync::OwnedMutexGuard<()>>)> {
        let to_propagate: Vec<(&str, &str)> = TOUR_TO_ORDER_FIELDS
            .iter()
            .filter(|(tour_field, _)| updated_fields.iter().any(|f| f == tour_field))
            .copied()
            .collect();
        if to_propagate.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let mut targets = self.find_linked_orders(tour).await?;
        // Deterministic lock order across concurrent tour edits
        targets.sort_by(|a, b| a.order_id.cmp(&b.order_id));

        let tour_actor = format!("Tour Update: {actor}");
        let mut changed_orders = Vec::new();
        let mut guards = Vec::with_capacity(targets.len());

        for target in targets {
            let guard = self
                .store
                .locks()
                .acquire(&format!("order:{}", target.order_id))
                .await;
            guards.push(guard);

            // Re-read under the lock so the propagation sees fresh state
            let Some(mut order) = self.store.orders().find_by_id(&target.order_id).await? else {
                continue;
            };

            let mut order_changed = false;
            for (tour_field, order_field) in &to_propagate {
                let Some(value) = fields::tour_field_as_value(tour, tour_field) else {
                    continue;
                };
                let old_status = order.order_status.clone();
                let changed = fields::apply_order_field(&mut order, order_field, &value)
                    .map_err(field_error_to_validation)?;
                if !changed {
                    continue;
                }
                ledger::mark_modified(&mut order, order_field, &tour_actor, now);
                order_changed = true;

                if *order_field == "order_status" {
                    clear_order_cancellation_on_uncancel(
                        &mut order,
                        &old_status,
                        &tour_actor,
                        now,
                        None,
                    );
                }
            }

            if order_changed {
                order.updated_at = now;
                changed_orders.push(order);
            }
        }

        Ok((changed_orders, guards))
    }

    /// Orders linked to a tour: primary `tour_id` match, falling back to
    /// the rider+vehicle lookup only when the primary returns nothing.
    async fn find_linked_orders(&self, tour: &Tour) -> AppResult<Vec<Order>> {
        let direct = self.store.orders().find_by_tour_id(&tour.tour_id).await?;
        if !direct.is_empty() {
            return Ok(direct);
        }

        if let (Some(rider), Some(vehicle)) = (&tour.rider_name, &tour.vehicle_registration) {
            tracing::debug!(
                tour_id = %tour.tour_id,
                "No direct tour linkage; using rider+vehicle fallback"
            );
            return Ok(self
                .store
                .orders()
                .find_by_rider_vehicle(rider, vehicle)
                .await?);
        }

        Ok(Vec::new())
    }
}

fn validate_field_names(edit: &Map<String, Value>, allowed: &[&str]) -> AppResult<()> {
    if edit.is_empty() {
        return Err(AppError::validation("No update data provided"));
    }
    let unknown: Vec<&str> = edit
        .keys()
        .map(String::as_str)
        .filter(|k| !allowed.contains(k))
        .collect();
    if !unknown.is_empty() {
        return Err(AppError::validation(format!(
            "Unknown or non-editable fields: {}",
            unknown.join(", ")
        )));
    }
    Ok(())
}

fn field_error_to_validation(err: FieldError) -> AppError {
    AppError::Validation(err.to_string())
}

/// An order leaving CANCELLED no longer has a cancellation reason.
fn clear_order_cancellation_on_uncancel(
    order: &mut Order,
    old_status: &str,
    actor: &str,
    now: DateTime<Utc>,
    updated: Option<&mut Vec<String>>,
) {
    if old_status == STATUS_CANCELLED
        && order.order_status != STATUS_CANCELLED
        && order.cancellation_reason.is_some()
    {
        order.cancellation_reason = None;
        ledger::mark_modified(order, "cancellation_reason", actor, now);
        if let Some(updated) = updated
            && !updated.iter().any(|f| f == "cancellation_reason")
        {
            updated.push("cancellation_reason".to_string());
        }
    }
}
