//! Order Model
//!
//! 一条配送订单的本地缓存行：上游快照字段 + 人工编辑保护状态。

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ModificationState;

/// Order row matching the SurrealDB `order` table.
///
/// The record key is the upstream order id; `order_id` repeats it as a
/// plain field for queries and responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub client_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub order_status: String,

    // Location (leaf fields, protected individually)
    pub location_name: Option<String>,
    pub location_address: Option<String>,
    pub location_city: Option<String>,
    pub location_country_code: Option<String>,
    pub location_latitude: Option<f64>,
    pub location_longitude: Option<f64>,

    // Tour linkage (parsed out of the upstream tour id)
    pub tour_id: Option<String>,
    pub tour_date: Option<String>,
    pub tour_plan_id: Option<String>,
    pub tour_name: Option<String>,
    pub tour_number: Option<i32>,

    // Fleet assignment
    pub rider_name: Option<String>,
    pub rider_id: Option<String>,
    pub rider_phone: Option<String>,
    pub vehicle_registration: Option<String>,
    pub vehicle_id: Option<String>,
    pub vehicle_model: Option<String>,
    pub transporter_name: Option<String>,

    pub completed_on: Option<DateTime<Utc>>,

    // Task data
    pub task_source: Option<String>,
    pub plan_id: Option<String>,
    pub planned_tour_name: Option<String>,
    pub sequence_in_batch: Option<i32>,
    #[serde(default)]
    pub partially_delivered: bool,
    #[serde(default)]
    pub reassigned: bool,
    #[serde(default)]
    pub rejected: bool,
    #[serde(default)]
    pub unassigned: bool,
    pub cancellation_reason: Option<String>,

    // Performance metrics
    pub tardiness: Option<f64>,
    pub sla_status: Option<String>,
    pub amount_collected: Option<Decimal>,
    pub effective_tat: Option<i64>,
    pub allowed_dwell_time: Option<i64>,

    // Time tracking
    pub eta_updated_on: Option<DateTime<Utc>>,
    pub tour_updated_on: Option<DateTime<Utc>>,
    pub initial_assignment_at: Option<DateTime<Utc>>,
    pub initial_assignment_by: Option<String>,

    // Additional metadata
    pub task_time_slot: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub custom_fields: Option<serde_json::Value>,

    // System-owned: always overwritten by the merge engine, never protected
    pub raw_data: Option<serde_json::Value>,

    #[serde(flatten)]
    pub modification: ModificationState,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Empty row for a business key; every field unprotected.
    pub fn new(order_id: impl Into<String>, client_id: impl Into<String>, date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            order_id: order_id.into(),
            client_id: client_id.into(),
            date,
            order_status: String::new(),
            location_name: None,
            location_address: None,
            location_city: None,
            location_country_code: None,
            location_latitude: None,
            location_longitude: None,
            tour_id: None,
            tour_date: None,
            tour_plan_id: None,
            tour_name: None,
            tour_number: None,
            rider_name: None,
            rider_id: None,
            rider_phone: None,
            vehicle_registration: None,
            vehicle_id: None,
            vehicle_model: None,
            transporter_name: None,
            completed_on: None,
            task_source: None,
            plan_id: None,
            planned_tour_name: None,
            sequence_in_batch: None,
            partially_delivered: false,
            reassigned: false,
            rejected: false,
            unassigned: false,
            cancellation_reason: None,
            tardiness: None,
            sla_status: None,
            amount_collected: None,
            effective_tat: None,
            allowed_dwell_time: None,
            eta_updated_on: None,
            tour_updated_on: None,
            initial_assignment_at: None,
            initial_assignment_by: None,
            task_time_slot: None,
            skills: Vec::new(),
            tags: Vec::new(),
            custom_fields: None,
            raw_data: None,
            modification: ModificationState::default(),
            created_at: now,
            updated_at: now,
        }
    }
}
