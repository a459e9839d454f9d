use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;

use crate::db::models::Order;

use super::ledger;
use super::merge;
use super::snapshot::SnapshotFields;

fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, 23).unwrap()
}

fn test_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 23, 12, 0, 0).unwrap()
}

fn base_order() -> Order {
    let mut order = Order::new("order-1", "client-a", test_date());
    order.order_status = "ONGOING".to_string();
    order.vehicle_registration = Some("ABC-1".to_string());
    order
}

fn snapshot(value: serde_json::Value) -> SnapshotFields {
    SnapshotFields::new(value)
}

/// Snapshot carrying a fresh vehicle registration and rider via tourDetail.
fn fleet_snapshot(vehicle: &str, rider: &str) -> SnapshotFields {
    snapshot(json!({
        "id": "order-1",
        "orderStatus": "COMPLETED",
        "orderMetadata": {
            "tourDetail": {
                "vehicleRegistrationNumber": vehicle,
                "riderName": rider,
            }
        }
    }))
}

mod test_ledger;
