//! Snapshot field access
//!
//! 上游订单快照是一个 JSON 对象；合并引擎需要区分四种情况：
//! 字段缺失（跳过）、显式 null（清空非保护字段）、有值（落地）、
//! 类型不符（隔离记录，不中断整体合并）。
//!
//! # Upstream shape
//!
//! ```json
//! {
//!   "id": "...",
//!   "orderStatus": "COMPLETED",
//!   "location": {
//!     "name": "...",
//!     "address": {"formattedAddress": "...", "city": "...", "countryCode": "..."},
//!     "latLng": {"lat": 30.05, "lng": 31.23}
//!   },
//!   "orderMetadata": {
//!     "homebaseCompleteOn": "2024-09-23T18:04:11Z",
//!     "tourDetail": {"tourId": "...", "riderName": "...", "vehicleRegistrationNumber": "..."},
//!     "lineItems": [{"id": "...", "name": "...", "quantity": 3, "transactionStatus": {...}}]
//!   },
//!   "riderId": "...", "slaStatus": "...", "amountCollected": 120.5, ...
//! }
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::db::models::LineItem;
use crate::utils::time::parse_upstream_timestamp;

/// Outcome of reading one field out of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<T> {
    /// Key absent: the merge leaves the local value alone.
    Missing,
    /// Key present and explicitly null.
    Null,
    Value(T),
    /// Key present but not convertible; carries the reason.
    Invalid(String),
}

/// Tour linkage data nested under `orderMetadata.tourDetail`.
#[derive(Debug, Clone, Default)]
pub struct TourDetailFields {
    pub tour_id: Option<String>,
    pub rider_name: Option<String>,
    pub vehicle_registration: Option<String>,
    pub tour_start_time: Option<DateTime<Utc>>,
    pub tour_end_time: Option<DateTime<Utc>>,
}

/// One upstream order snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotFields {
    raw: Value,
}

impl SnapshotFields {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// The untouched upstream payload (persisted as system-owned metadata).
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Upstream order id; a snapshot without one cannot be upserted.
    pub fn order_id(&self) -> Option<&str> {
        self.raw.get("id").and_then(Value::as_str)
    }

    fn at(&self, path: &[&str]) -> Option<&Value> {
        let mut node = &self.raw;
        for key in path {
            node = node.get(key)?;
        }
        Some(node)
    }

    pub fn string(&self, path: &[&str]) -> FieldValue<String> {
        match self.at(path) {
            None => FieldValue::Missing,
            Some(Value::Null) => FieldValue::Null,
            Some(Value::String(s)) => FieldValue::Value(s.clone()),
            Some(other) => FieldValue::Invalid(format!("expected string, got {other}")),
        }
    }

    pub fn boolean(&self, path: &[&str]) -> FieldValue<bool> {
        match self.at(path) {
            None => FieldValue::Missing,
            Some(Value::Null) => FieldValue::Null,
            Some(Value::Bool(b)) => FieldValue::Value(*b),
            Some(other) => FieldValue::Invalid(format!("expected bool, got {other}")),
        }
    }

    pub fn f64_num(&self, path: &[&str]) -> FieldValue<f64> {
        match self.at(path) {
            None => FieldValue::Missing,
            Some(Value::Null) => FieldValue::Null,
            Some(Value::Number(n)) => match n.as_f64() {
                Some(f) => FieldValue::Value(f),
                None => FieldValue::Invalid(format!("number out of f64 range: {n}")),
            },
            // 上游偶尔把坐标作为字符串返回
            Some(Value::String(s)) => match s.parse() {
                Ok(f) => FieldValue::Value(f),
                Err(_) => FieldValue::Invalid(format!("expected number, got string {s:?}")),
            },
            Some(other) => FieldValue::Invalid(format!("expected number, got {other}")),
        }
    }

    pub fn i64_num(&self, path: &[&str]) -> FieldValue<i64> {
        match self.at(path) {
            None => FieldValue::Missing,
            Some(Value::Null) => FieldValue::Null,
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => FieldValue::Value(i),
                None => FieldValue::Invalid(format!("expected integer, got {n}")),
            },
            Some(other) => FieldValue::Invalid(format!("expected integer, got {other}")),
        }
    }

    pub fn i32_num(&self, path: &[&str]) -> FieldValue<i32> {
        match self.i64_num(path) {
            FieldValue::Value(i) => match i32::try_from(i) {
                Ok(v) => FieldValue::Value(v),
                Err(_) => FieldValue::Invalid(format!("integer out of i32 range: {i}")),
            },
            FieldValue::Missing => FieldValue::Missing,
            FieldValue::Null => FieldValue::Null,
            FieldValue::Invalid(e) => FieldValue::Invalid(e),
        }
    }

    pub fn decimal(&self, path: &[&str]) -> FieldValue<Decimal> {
        match self.at(path) {
            None => FieldValue::Missing,
            Some(Value::Null) => FieldValue::Null,
            Some(Value::Number(n)) => match n.to_string().parse() {
                Ok(d) => FieldValue::Value(d),
                Err(_) => FieldValue::Invalid(format!("amount not representable: {n}")),
            },
            Some(Value::String(s)) => match s.parse() {
                Ok(d) => FieldValue::Value(d),
                Err(_) => FieldValue::Invalid(format!("expected amount, got string {s:?}")),
            },
            Some(other) => FieldValue::Invalid(format!("expected amount, got {other}")),
        }
    }

    pub fn timestamp(&self, path: &[&str]) -> FieldValue<DateTime<Utc>> {
        match self.at(path) {
            None => FieldValue::Missing,
            Some(Value::Null) => FieldValue::Null,
            Some(Value::String(s)) => match parse_upstream_timestamp(s) {
                Some(ts) => FieldValue::Value(ts),
                None => FieldValue::Invalid(format!("unparseable timestamp {s:?}")),
            },
            Some(other) => FieldValue::Invalid(format!("expected timestamp, got {other}")),
        }
    }

    pub fn string_list(&self, path: &[&str]) -> FieldValue<Vec<String>> {
        match self.at(path) {
            None => FieldValue::Missing,
            Some(Value::Null) => FieldValue::Null,
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_str() {
                        Some(s) => out.push(s.to_string()),
                        None => {
                            return FieldValue::Invalid(format!(
                                "expected string list, found element {item}"
                            ));
                        }
                    }
                }
                FieldValue::Value(out)
            }
            Some(other) => FieldValue::Invalid(format!("expected list, got {other}")),
        }
    }

    pub fn object(&self, path: &[&str]) -> FieldValue<Value> {
        match self.at(path) {
            None => FieldValue::Missing,
            Some(Value::Null) => FieldValue::Null,
            Some(v @ Value::Object(_)) => FieldValue::Value(v.clone()),
            Some(other) => FieldValue::Invalid(format!("expected object, got {other}")),
        }
    }

    /// Latitude out of `location.latLng`; the upstream flips between
    /// `lat`/`lng` and `latitude`/`longitude` key pairs.
    pub fn latitude(&self) -> FieldValue<f64> {
        match self.f64_num(&["location", "latLng", "lat"]) {
            FieldValue::Missing => self.f64_num(&["location", "latLng", "latitude"]),
            v => v,
        }
    }

    pub fn longitude(&self) -> FieldValue<f64> {
        match self.f64_num(&["location", "latLng", "lng"]) {
            FieldValue::Missing => self.f64_num(&["location", "latLng", "longitude"]),
            v => v,
        }
    }

    /// Tour linkage block, when the snapshot carries one.
    pub fn tour_detail(&self) -> Option<TourDetailFields> {
        let detail = self.at(&["orderMetadata", "tourDetail"])?;
        if !detail.is_object() {
            return None;
        }
        let str_of = |key: &str| {
            detail
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let ts_of = |key: &str| {
            detail
                .get(key)
                .and_then(Value::as_str)
                .and_then(parse_upstream_timestamp)
        };
        Some(TourDetailFields {
            tour_id: str_of("tourId"),
            rider_name: str_of("riderName"),
            vehicle_registration: str_of("vehicleRegistrationNumber"),
            tour_start_time: ts_of("tourStartTime"),
            tour_end_time: ts_of("tourEndTime"),
        })
    }

    /// Whether the snapshot carries a line-item list at all.
    pub fn has_line_items(&self) -> bool {
        matches!(
            self.at(&["orderMetadata", "lineItems"]),
            Some(Value::Array(_))
        )
    }

    /// Build line-item rows for `order_id` from the snapshot.
    ///
    /// Malformed entries are skipped with a warning; one bad item never
    /// drops its siblings.
    pub fn line_items(&self, order_id: &str, now: DateTime<Utc>) -> Vec<LineItem> {
        let Some(Value::Array(items)) = self.at(&["orderMetadata", "lineItems"]) else {
            return Vec::new();
        };

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let sku_id = item
                .get("id")
                .or_else(|| item.get("skuId"))
                .and_then(Value::as_str);
            let Some(sku_id) = sku_id else {
                tracing::warn!(order_id, item = %item, "Line item without sku id skipped");
                continue;
            };
            let status = item.get("transactionStatus");
            out.push(LineItem {
                order_id: order_id.to_string(),
                sku_id: sku_id.to_string(),
                name: item
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                quantity: item.get("quantity").and_then(Value::as_i64).unwrap_or(0),
                quantity_unit: item
                    .get("quantityUnit")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                transacted_quantity: status
                    .and_then(|s| s.get("transactedQuantity"))
                    .and_then(Value::as_i64),
                transaction_status: status
                    .and_then(|s| s.get("status"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                created_at: now,
            });
        }
        out
    }
}
