//! Editable-field registry and typed setter dispatch
//!
//! 每种实体有一份显式的可编辑字段清单；未知字段在任何写入发生之前
//! 被拒绝，类型不符的值同样拒绝，不存在悄悄落空的拼写错误。

use rust_decimal::Decimal;
use serde_json::{Value, json};

use crate::db::models::{Order, Tour};
use crate::utils::time::parse_upstream_timestamp;

/// Fields an operator may edit on an Order.
pub const ORDER_EDITABLE_FIELDS: &[&str] = &[
    "order_status",
    "location_name",
    "location_address",
    "location_city",
    "location_country_code",
    "location_latitude",
    "location_longitude",
    "tour_id",
    "tour_name",
    "tour_number",
    "rider_name",
    "rider_id",
    "rider_phone",
    "vehicle_registration",
    "vehicle_id",
    "vehicle_model",
    "transporter_name",
    "completed_on",
    "task_source",
    "plan_id",
    "planned_tour_name",
    "sequence_in_batch",
    "partially_delivered",
    "reassigned",
    "rejected",
    "unassigned",
    "cancellation_reason",
    "tardiness",
    "sla_status",
    "amount_collected",
    "effective_tat",
    "allowed_dwell_time",
    "task_time_slot",
    "skills",
    "tags",
];

/// Fields an operator may edit on a Tour.
pub const TOUR_EDITABLE_FIELDS: &[&str] = &[
    "tour_status",
    "tour_name",
    "tour_number",
    "rider_name",
    "rider_id",
    "rider_phone",
    "vehicle_registration",
    "vehicle_id",
    "cancellation_reason",
    "tour_start_time",
    "tour_end_time",
];

/// Translation table: tour field → order field it propagates onto.
pub const TOUR_TO_ORDER_FIELDS: &[(&str, &str)] = &[
    ("rider_name", "rider_name"),
    ("rider_id", "rider_id"),
    ("rider_phone", "rider_phone"),
    ("vehicle_registration", "vehicle_registration"),
    ("vehicle_id", "vehicle_id"),
    ("tour_name", "tour_name"),
    ("tour_number", "tour_number"),
    ("tour_status", "order_status"),
    ("cancellation_reason", "cancellation_reason"),
];

#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("unknown or non-editable field '{0}'")]
    Unknown(String),

    #[error("invalid value for field '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: String) -> FieldError {
    FieldError::Invalid {
        field: field.to_string(),
        reason,
    }
}

fn set_if_changed<T: PartialEq>(slot: &mut T, new: T) -> bool {
    if *slot == new {
        false
    } else {
        *slot = new;
        true
    }
}

fn req_string(v: &Value) -> Result<String, String> {
    match v {
        Value::String(s) => Ok(s.clone()),
        other => Err(format!("expected string, got {other}")),
    }
}

fn opt_string(v: &Value) -> Result<Option<String>, String> {
    match v {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        other => Err(format!("expected string or null, got {other}")),
    }
}

fn req_bool(v: &Value) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("expected boolean, got {v}"))
}

fn opt_f64(v: &Value) -> Result<Option<f64>, String> {
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("number out of range: {n}")),
        other => Err(format!("expected number or null, got {other}")),
    }
}

fn opt_i64(v: &Value) -> Result<Option<i64>, String> {
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| format!("expected integer, got {n}")),
        other => Err(format!("expected integer or null, got {other}")),
    }
}

fn opt_i32(v: &Value) -> Result<Option<i32>, String> {
    match opt_i64(v)? {
        None => Ok(None),
        Some(i) => i32::try_from(i)
            .map(Some)
            .map_err(|_| format!("integer out of range: {i}")),
    }
}

fn opt_decimal(v: &Value) -> Result<Option<Decimal>, String> {
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .to_string()
            .parse()
            .map(Some)
            .map_err(|_| format!("amount not representable: {n}")),
        Value::String(s) => s
            .parse()
            .map(Some)
            .map_err(|_| format!("expected amount, got {s:?}")),
        other => Err(format!("expected amount or null, got {other}")),
    }
}

fn opt_datetime(v: &Value) -> Result<Option<chrono::DateTime<chrono::Utc>>, String> {
    match v {
        Value::Null => Ok(None),
        Value::String(s) => parse_upstream_timestamp(s)
            .map(Some)
            .ok_or_else(|| format!("unparseable timestamp {s:?}")),
        other => Err(format!("expected timestamp or null, got {other}")),
    }
}

fn string_list(v: &Value) -> Result<Vec<String>, String> {
    match v {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|i| {
                i.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("expected string list, found element {i}"))
            })
            .collect(),
        other => Err(format!("expected list, got {other}")),
    }
}

/// Apply one edit to an Order. Returns whether the stored value changed.
pub fn apply_order_field(order: &mut Order, field: &str, v: &Value) -> Result<bool, FieldError> {
    let changed = match field {
        "order_status" => set_if_changed(
            &mut order.order_status,
            req_string(v).map_err(|e| invalid(field, e))?,
        ),
        "location_name" => set_if_changed(
            &mut order.location_name,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "location_address" => set_if_changed(
            &mut order.location_address,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "location_city" => set_if_changed(
            &mut order.location_city,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "location_country_code" => set_if_changed(
            &mut order.location_country_code,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "location_latitude" => set_if_changed(
            &mut order.location_latitude,
            opt_f64(v).map_err(|e| invalid(field, e))?,
        ),
        "location_longitude" => set_if_changed(
            &mut order.location_longitude,
            opt_f64(v).map_err(|e| invalid(field, e))?,
        ),
        "tour_id" => set_if_changed(
            &mut order.tour_id,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "tour_name" => set_if_changed(
            &mut order.tour_name,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "tour_number" => set_if_changed(
            &mut order.tour_number,
            opt_i32(v).map_err(|e| invalid(field, e))?,
        ),
        "rider_name" => set_if_changed(
            &mut order.rider_name,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "rider_id" => set_if_changed(
            &mut order.rider_id,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "rider_phone" => set_if_changed(
            &mut order.rider_phone,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "vehicle_registration" => set_if_changed(
            &mut order.vehicle_registration,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "vehicle_id" => set_if_changed(
            &mut order.vehicle_id,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "vehicle_model" => set_if_changed(
            &mut order.vehicle_model,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "transporter_name" => set_if_changed(
            &mut order.transporter_name,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "completed_on" => set_if_changed(
            &mut order.completed_on,
            opt_datetime(v).map_err(|e| invalid(field, e))?,
        ),
        "task_source" => set_if_changed(
            &mut order.task_source,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "plan_id" => set_if_changed(
            &mut order.plan_id,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "planned_tour_name" => set_if_changed(
            &mut order.planned_tour_name,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "sequence_in_batch" => set_if_changed(
            &mut order.sequence_in_batch,
            opt_i32(v).map_err(|e| invalid(field, e))?,
        ),
        "partially_delivered" => set_if_changed(
            &mut order.partially_delivered,
            req_bool(v).map_err(|e| invalid(field, e))?,
        ),
        "reassigned" => set_if_changed(
            &mut order.reassigned,
            req_bool(v).map_err(|e| invalid(field, e))?,
        ),
        "rejected" => set_if_changed(
            &mut order.rejected,
            req_bool(v).map_err(|e| invalid(field, e))?,
        ),
        "unassigned" => set_if_changed(
            &mut order.unassigned,
            req_bool(v).map_err(|e| invalid(field, e))?,
        ),
        "cancellation_reason" => set_if_changed(
            &mut order.cancellation_reason,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "tardiness" => set_if_changed(
            &mut order.tardiness,
            opt_f64(v).map_err(|e| invalid(field, e))?,
        ),
        "sla_status" => set_if_changed(
            &mut order.sla_status,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "amount_collected" => set_if_changed(
            &mut order.amount_collected,
            opt_decimal(v).map_err(|e| invalid(field, e))?,
        ),
        "effective_tat" => set_if_changed(
            &mut order.effective_tat,
            opt_i64(v).map_err(|e| invalid(field, e))?,
        ),
        "allowed_dwell_time" => set_if_changed(
            &mut order.allowed_dwell_time,
            opt_i64(v).map_err(|e| invalid(field, e))?,
        ),
        "task_time_slot" => set_if_changed(
            &mut order.task_time_slot,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "skills" => set_if_changed(
            &mut order.skills,
            string_list(v).map_err(|e| invalid(field, e))?,
        ),
        "tags" => set_if_changed(
            &mut order.tags,
            string_list(v).map_err(|e| invalid(field, e))?,
        ),
        _ => return Err(FieldError::Unknown(field.to_string())),
    };
    Ok(changed)
}

/// Apply one edit to a Tour. Returns whether the stored value changed.
pub fn apply_tour_field(tour: &mut Tour, field: &str, v: &Value) -> Result<bool, FieldError> {
    let changed = match field {
        "tour_status" => set_if_changed(
            &mut tour.tour_status,
            req_string(v).map_err(|e| invalid(field, e))?,
        ),
        "tour_name" => set_if_changed(
            &mut tour.tour_name,
            req_string(v).map_err(|e| invalid(field, e))?,
        ),
        "tour_number" => match opt_i32(v).map_err(|e| invalid(field, e))? {
            Some(n) => set_if_changed(&mut tour.tour_number, n),
            None => return Err(invalid(field, "tour_number cannot be null".to_string())),
        },
        "rider_name" => set_if_changed(
            &mut tour.rider_name,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "rider_id" => set_if_changed(
            &mut tour.rider_id,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "rider_phone" => set_if_changed(
            &mut tour.rider_phone,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "vehicle_registration" => set_if_changed(
            &mut tour.vehicle_registration,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "vehicle_id" => set_if_changed(
            &mut tour.vehicle_id,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "cancellation_reason" => set_if_changed(
            &mut tour.cancellation_reason,
            opt_string(v).map_err(|e| invalid(field, e))?,
        ),
        "tour_start_time" => set_if_changed(
            &mut tour.tour_start_time,
            opt_datetime(v).map_err(|e| invalid(field, e))?,
        ),
        "tour_end_time" => set_if_changed(
            &mut tour.tour_end_time,
            opt_datetime(v).map_err(|e| invalid(field, e))?,
        ),
        _ => return Err(FieldError::Unknown(field.to_string())),
    };
    Ok(changed)
}

/// Current value of a propagatable tour field, as a JSON value the order
/// setter dispatch understands.
pub fn tour_field_as_value(tour: &Tour, field: &str) -> Option<Value> {
    let value = match field {
        "tour_status" => json!(tour.tour_status),
        "tour_name" => json!(tour.tour_name),
        "tour_number" => json!(tour.tour_number),
        "rider_name" => json!(tour.rider_name),
        "rider_id" => json!(tour.rider_id),
        "rider_phone" => json!(tour.rider_phone),
        "vehicle_registration" => json!(tour.vehicle_registration),
        "vehicle_id" => json!(tour.vehicle_id),
        "cancellation_reason" => json!(tour.cancellation_reason),
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn order() -> Order {
        Order::new("o-1", "client-a", NaiveDate::from_ymd_opt(2024, 9, 23).unwrap())
    }

    #[test]
    fn every_listed_order_field_is_dispatched() {
        let mut o = order();
        for field in ORDER_EDITABLE_FIELDS {
            let result = apply_order_field(&mut o, field, &Value::Null);
            assert!(
                !matches!(result, Err(FieldError::Unknown(_))),
                "field {field} missing from dispatch"
            );
        }
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut o = order();
        assert!(matches!(
            apply_order_field(&mut o, "no_such_field", &json!("x")),
            Err(FieldError::Unknown(_))
        ));
    }

    #[test]
    fn typed_mismatch_is_rejected() {
        let mut o = order();
        assert!(matches!(
            apply_order_field(&mut o, "location_latitude", &json!("north")),
            Err(FieldError::Invalid { .. })
        ));
    }

    #[test]
    fn unchanged_value_reports_false() {
        let mut o = order();
        assert!(apply_order_field(&mut o, "rider_name", &json!("Bob")).unwrap());
        assert!(!apply_order_field(&mut o, "rider_name", &json!("Bob")).unwrap());
    }

    #[test]
    fn translation_table_targets_are_order_editable() {
        for (_, order_field) in TOUR_TO_ORDER_FIELDS {
            assert!(
                ORDER_EDITABLE_FIELDS.contains(order_field),
                "{order_field} not editable on orders"
            );
        }
    }
}
