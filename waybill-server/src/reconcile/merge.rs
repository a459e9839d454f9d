//! Protected Merge Engine
//!
//! 把一份上游快照逐字段落到已有订单行上：
//! 台账保护的字段跳过，其余字段以上游为准（包括显式 null 清空）。
//! 单个字段转换失败只影响该字段，整体合并继续。

use chrono::{DateTime, NaiveDate, Utc};

use crate::db::models::{Order, Tour};

use super::ledger;
use super::snapshot::{FieldValue, SnapshotFields};

/// Per-merge tally, logged as the protection summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct MergeReport {
    /// Fields assigned from the snapshot (including null clears).
    pub assigned: usize,
    /// Fields skipped because the ledger protects them.
    pub protected: usize,
    /// Fields skipped because conversion failed.
    pub failed: usize,
}

impl MergeReport {
    fn absorb(&mut self, other: MergeReport) {
        self.assigned += other.assigned;
        self.protected += other.protected;
        self.failed += other.failed;
    }
}

fn apply<T>(
    order: &mut Order,
    field: &'static str,
    value: FieldValue<T>,
    report: &mut MergeReport,
    set: impl FnOnce(&mut Order, Option<T>),
) {
    if matches!(value, FieldValue::Missing) {
        return;
    }
    if ledger::is_protected(order, field) {
        tracing::debug!(order_id = %order.order_id, field, "Protected field skipped during merge");
        report.protected += 1;
        return;
    }
    match value {
        FieldValue::Null => {
            set(order, None);
            report.assigned += 1;
        }
        FieldValue::Value(v) => {
            set(order, Some(v));
            report.assigned += 1;
        }
        FieldValue::Invalid(err) => {
            tracing::warn!(
                order_id = %order.order_id,
                field,
                error = %err,
                "Field conversion failed; local value left unchanged"
            );
            report.failed += 1;
        }
        FieldValue::Missing => unreachable!(),
    }
}

fn present<T>(value: Option<T>) -> FieldValue<T> {
    match value {
        Some(v) => FieldValue::Value(v),
        None => FieldValue::Missing,
    }
}

/// Construct a brand-new order from a snapshot.
///
/// Degenerate merge: nothing is protected yet, so every snapshot field
/// lands as-is.
pub fn order_from_snapshot(
    order_id: &str,
    client_key: &str,
    date: NaiveDate,
    snap: &SnapshotFields,
    now: DateTime<Utc>,
) -> (Order, MergeReport) {
    let mut order = Order::new(order_id, client_key, date);
    order.created_at = now;
    let report = merge_order(&mut order, snap, now);
    (order, report)
}

/// Fold `snap` into `order`, honoring the modification ledger.
///
/// System-owned metadata (`raw_data`, `updated_at`) is always refreshed
/// and never enters `modified_fields`.
pub fn merge_order(order: &mut Order, snap: &SnapshotFields, now: DateTime<Utc>) -> MergeReport {
    let mut report = MergeReport::default();

    order.raw_data = Some(snap.raw().clone());
    order.updated_at = now;

    apply(
        order,
        "order_status",
        snap.string(&["orderStatus"]),
        &mut report,
        |o, v| o.order_status = v.unwrap_or_default(),
    );

    // Location merges at leaf granularity: a protected city survives even
    // when the whole location object is re-sent.
    apply(
        order,
        "location_name",
        snap.string(&["location", "name"]),
        &mut report,
        |o, v| o.location_name = v,
    );
    apply(
        order,
        "location_address",
        snap.string(&["location", "address", "formattedAddress"]),
        &mut report,
        |o, v| o.location_address = v,
    );
    apply(
        order,
        "location_city",
        snap.string(&["location", "address", "city"]),
        &mut report,
        |o, v| o.location_city = v,
    );
    apply(
        order,
        "location_country_code",
        snap.string(&["location", "address", "countryCode"]),
        &mut report,
        |o, v| o.location_country_code = v,
    );
    apply(
        order,
        "location_latitude",
        snap.latitude(),
        &mut report,
        |o, v| o.location_latitude = v,
    );
    apply(
        order,
        "location_longitude",
        snap.longitude(),
        &mut report,
        |o, v| o.location_longitude = v,
    );

    // Fleet fields delivered flat on the snapshot
    apply(
        order,
        "rider_id",
        snap.string(&["riderId"]),
        &mut report,
        |o, v| o.rider_id = v,
    );
    apply(
        order,
        "rider_phone",
        snap.string(&["riderPhone"]),
        &mut report,
        |o, v| o.rider_phone = v,
    );
    apply(
        order,
        "vehicle_id",
        snap.string(&["vehicleId"]),
        &mut report,
        |o, v| o.vehicle_id = v,
    );
    apply(
        order,
        "vehicle_model",
        snap.string(&["vehicleModel"]),
        &mut report,
        |o, v| o.vehicle_model = v,
    );
    apply(
        order,
        "transporter_name",
        snap.string(&["transporterName"]),
        &mut report,
        |o, v| o.transporter_name = v,
    );

    // Task data
    apply(
        order,
        "task_source",
        snap.string(&["taskSource"]),
        &mut report,
        |o, v| o.task_source = v,
    );
    apply(
        order,
        "plan_id",
        snap.string(&["planId"]),
        &mut report,
        |o, v| o.plan_id = v,
    );
    apply(
        order,
        "planned_tour_name",
        snap.string(&["plannedTourName"]),
        &mut report,
        |o, v| o.planned_tour_name = v,
    );
    apply(
        order,
        "sequence_in_batch",
        snap.i32_num(&["sequenceInBatch"]),
        &mut report,
        |o, v| o.sequence_in_batch = v,
    );
    apply(
        order,
        "partially_delivered",
        snap.boolean(&["partiallyDelivered"]),
        &mut report,
        |o, v| o.partially_delivered = v.unwrap_or(false),
    );
    apply(
        order,
        "reassigned",
        snap.boolean(&["reassigned"]),
        &mut report,
        |o, v| o.reassigned = v.unwrap_or(false),
    );
    apply(
        order,
        "rejected",
        snap.boolean(&["rejected"]),
        &mut report,
        |o, v| o.rejected = v.unwrap_or(false),
    );
    apply(
        order,
        "unassigned",
        snap.boolean(&["unassigned"]),
        &mut report,
        |o, v| o.unassigned = v.unwrap_or(false),
    );
    apply(
        order,
        "cancellation_reason",
        snap.string(&["cancellationReason"]),
        &mut report,
        |o, v| o.cancellation_reason = v,
    );

    // Performance metrics
    apply(
        order,
        "tardiness",
        snap.f64_num(&["tardiness"]),
        &mut report,
        |o, v| o.tardiness = v,
    );
    apply(
        order,
        "sla_status",
        snap.string(&["slaStatus"]),
        &mut report,
        |o, v| o.sla_status = v,
    );
    apply(
        order,
        "amount_collected",
        snap.decimal(&["amountCollected"]),
        &mut report,
        |o, v| o.amount_collected = v,
    );
    apply(
        order,
        "effective_tat",
        snap.i64_num(&["effectiveTat"]),
        &mut report,
        |o, v| o.effective_tat = v,
    );
    apply(
        order,
        "allowed_dwell_time",
        snap.i64_num(&["allowedDwellTime"]),
        &mut report,
        |o, v| o.allowed_dwell_time = v,
    );

    // Time tracking
    apply(
        order,
        "eta_updated_on",
        snap.timestamp(&["etaUpdatedOn"]),
        &mut report,
        |o, v| o.eta_updated_on = v,
    );
    apply(
        order,
        "tour_updated_on",
        snap.timestamp(&["tourUpdatedOn"]),
        &mut report,
        |o, v| o.tour_updated_on = v,
    );
    apply(
        order,
        "initial_assignment_at",
        snap.timestamp(&["initialAssignmentAt"]),
        &mut report,
        |o, v| o.initial_assignment_at = v,
    );
    apply(
        order,
        "initial_assignment_by",
        snap.string(&["initialAssignmentBy"]),
        &mut report,
        |o, v| o.initial_assignment_by = v,
    );
    apply(
        order,
        "completed_on",
        snap.timestamp(&["orderMetadata", "homebaseCompleteOn"]),
        &mut report,
        |o, v| o.completed_on = v,
    );

    // Additional metadata
    apply(
        order,
        "task_time_slot",
        snap.string(&["taskTimeSlot"]),
        &mut report,
        |o, v| o.task_time_slot = v,
    );
    apply(
        order,
        "skills",
        snap.string_list(&["skills"]),
        &mut report,
        |o, v| o.skills = v.unwrap_or_default(),
    );
    apply(
        order,
        "tags",
        snap.string_list(&["tags"]),
        &mut report,
        |o, v| o.tags = v.unwrap_or_default(),
    );
    apply(
        order,
        "custom_fields",
        snap.object(&["customFields"]),
        &mut report,
        |o, v| o.custom_fields = v,
    );

    report.absorb(merge_tour_linkage(order, snap));

    log_protection_summary(order, &report);
    report
}

/// Fold the snapshot's `tourDetail` block into the order's tour linkage,
/// parsing the tour id into its components (each leaf individually
/// protected).
fn merge_tour_linkage(order: &mut Order, snap: &SnapshotFields) -> MergeReport {
    let mut report = MergeReport::default();
    let Some(detail) = snap.tour_detail() else {
        return report;
    };

    if let Some(tour_id) = detail.tour_id {
        if ledger::is_protected(order, "tour_id") {
            tracing::debug!(order_id = %order.order_id, field = "tour_id", "Protected field skipped during merge");
            report.protected += 1;
        } else {
            let parsed = Tour::parse_tour_id(&tour_id);
            order.tour_id = Some(tour_id);
            report.assigned += 1;

            if let Some(parsed) = parsed {
                apply(
                    order,
                    "tour_date",
                    FieldValue::Value(parsed.tour_date),
                    &mut report,
                    |o, v| o.tour_date = v,
                );
                apply(
                    order,
                    "tour_plan_id",
                    FieldValue::Value(parsed.plan_id),
                    &mut report,
                    |o, v| o.tour_plan_id = v,
                );
                apply(
                    order,
                    "tour_name",
                    FieldValue::Value(parsed.tour_name),
                    &mut report,
                    |o, v| o.tour_name = v,
                );
                apply(
                    order,
                    "tour_number",
                    FieldValue::Value(parsed.tour_number),
                    &mut report,
                    |o, v| o.tour_number = v,
                );
            }
        }
    }

    apply(
        order,
        "rider_name",
        present(detail.rider_name),
        &mut report,
        |o, v| o.rider_name = v,
    );
    apply(
        order,
        "vehicle_registration",
        present(detail.vehicle_registration),
        &mut report,
        |o, v| o.vehicle_registration = v,
    );

    report
}

fn log_protection_summary(order: &Order, report: &MergeReport) {
    if report.protected > 0 {
        tracing::info!(
            order_id = %order.order_id,
            assigned = report.assigned,
            protected = report.protected,
            failed = report.failed,
            "Merge kept protected fields"
        );
    } else {
        tracing::debug!(
            order_id = %order.order_id,
            assigned = report.assigned,
            failed = report.failed,
            "Merge applied snapshot"
        );
    }
}
