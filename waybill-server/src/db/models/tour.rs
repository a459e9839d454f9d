//! Tour Model
//!
//! 巡回配送行：由订单快照惰性创建，聚合统计从订单推导。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ModificationState, Order};

pub const TOUR_STATUS_WAITING: &str = "WAITING";
pub const TOUR_STATUS_ONGOING: &str = "ONGOING";
pub const TOUR_STATUS_COMPLETED: &str = "COMPLETED";
pub const TOUR_STATUS_CANCELLED: &str = "CANCELLED";

/// Components parsed out of a full upstream tour id
/// (`<timestamp>*<plan id>*tour-<n>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTourId {
    pub tour_date: String,
    pub plan_id: String,
    pub tour_name: String,
    pub tour_number: i32,
}

/// Tour row matching the SurrealDB `tour` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tour {
    pub tour_id: String,
    pub tour_date: String,
    pub tour_plan_id: String,
    pub tour_name: String,
    pub tour_number: i32,

    // Fleet metadata (shared with the orders of this tour)
    pub rider_name: Option<String>,
    pub rider_id: Option<String>,
    pub rider_phone: Option<String>,
    pub vehicle_registration: Option<String>,
    pub vehicle_id: Option<String>,
    pub tour_start_time: Option<DateTime<Utc>>,
    pub tour_end_time: Option<DateTime<Utc>>,

    // Aggregates recomputed from the tour's orders
    #[serde(default)]
    pub total_orders: i64,
    #[serde(default)]
    pub completed_orders: i64,
    #[serde(default)]
    pub cancelled_orders: i64,
    #[serde(default)]
    pub pending_orders: i64,
    #[serde(default = "default_tour_status")]
    pub tour_status: String,
    pub cancellation_reason: Option<String>,

    #[serde(default)]
    pub delivery_cities: Vec<String>,
    #[serde(default)]
    pub delivery_areas: Vec<String>,

    #[serde(flatten)]
    pub modification: ModificationState,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_tour_status() -> String {
    TOUR_STATUS_WAITING.to_string()
}

impl Tour {
    /// Build a fresh tour row from a parsed tour id.
    pub fn from_parsed(tour_id: impl Into<String>, parsed: ParsedTourId) -> Self {
        let now = Utc::now();
        Self {
            tour_id: tour_id.into(),
            tour_date: parsed.tour_date,
            tour_plan_id: parsed.plan_id,
            tour_name: parsed.tour_name,
            tour_number: parsed.tour_number,
            rider_name: None,
            rider_id: None,
            rider_phone: None,
            vehicle_registration: None,
            vehicle_id: None,
            tour_start_time: None,
            tour_end_time: None,
            total_orders: 0,
            completed_orders: 0,
            cancelled_orders: 0,
            pending_orders: 0,
            tour_status: default_tour_status(),
            cancellation_reason: None,
            delivery_cities: Vec::new(),
            delivery_areas: Vec::new(),
            modification: ModificationState::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Recompute aggregate counts, tour status and delivery summaries from
    /// the tour's orders.
    ///
    /// Status derivation: all cancelled → CANCELLED; all completed or
    /// cancelled → COMPLETED; all waiting (or no orders) → WAITING;
    /// anything mixed → ONGOING.
    pub fn recompute_statistics(&mut self, orders: &[Order]) {
        self.total_orders = orders.len() as i64;
        self.completed_orders = orders
            .iter()
            .filter(|o| o.order_status == "COMPLETED")
            .count() as i64;
        self.cancelled_orders = orders
            .iter()
            .filter(|o| o.order_status == "CANCELLED")
            .count() as i64;
        self.pending_orders = self.total_orders - self.completed_orders - self.cancelled_orders;

        let waiting = orders
            .iter()
            .filter(|o| o.order_status == "WAITING")
            .count() as i64;

        self.tour_status = if self.total_orders == 0 || waiting == self.total_orders {
            TOUR_STATUS_WAITING
        } else if self.cancelled_orders == self.total_orders {
            TOUR_STATUS_CANCELLED
        } else if self.completed_orders + self.cancelled_orders == self.total_orders {
            TOUR_STATUS_COMPLETED
        } else {
            TOUR_STATUS_ONGOING
        }
        .to_string();

        let mut cities: Vec<String> = orders
            .iter()
            .filter_map(|o| o.location_city.clone())
            .collect();
        cities.sort();
        cities.dedup();
        self.delivery_cities = cities;

        let mut areas: Vec<String> = orders
            .iter()
            .filter_map(|o| o.location_name.clone())
            .collect();
        areas.sort();
        areas.dedup();
        self.delivery_areas = areas;

        // Borrow rider/vehicle from the first order when the tour row has none
        if self.rider_name.is_none() {
            self.rider_name = orders.iter().find_map(|o| o.rider_name.clone());
        }
        if self.vehicle_registration.is_none() {
            self.vehicle_registration = orders.iter().find_map(|o| o.vehicle_registration.clone());
        }
    }

    /// Parse a full tour id like
    /// `2024-09-23-21-15-02*a80a216bd3f74818*tour-79`.
    ///
    /// Returns `None` when the id does not have the three `*`-separated
    /// parts. A `tour-` name with a non-numeric suffix parses with number 0,
    /// matching upstream ids that were renamed by dispatchers.
    pub fn parse_tour_id(tour_id: &str) -> Option<ParsedTourId> {
        let mut parts = tour_id.split('*');
        let tour_date = parts.next()?;
        let plan_id = parts.next()?;
        let tour_name = parts.next()?;
        if parts.next().is_some() || tour_date.is_empty() {
            return None;
        }

        let tour_number = tour_name
            .strip_prefix("tour-")
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);

        Some(ParsedTourId {
            tour_date: tour_date.to_string(),
            plan_id: plan_id.to_string(),
            tour_name: tour_name.to_string(),
            tour_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_tour_id() {
        let parsed =
            Tour::parse_tour_id("2024-09-23-21-15-02*a80a216bd3f74818a5eab97046270932*tour-79")
                .unwrap();
        assert_eq!(parsed.tour_date, "2024-09-23-21-15-02");
        assert_eq!(parsed.plan_id, "a80a216bd3f74818a5eab97046270932");
        assert_eq!(parsed.tour_name, "tour-79");
        assert_eq!(parsed.tour_number, 79);
    }

    #[test]
    fn non_numeric_tour_name_gets_number_zero() {
        let parsed = Tour::parse_tour_id("2024-09-23-21-15-02*plan*morning-run").unwrap();
        assert_eq!(parsed.tour_name, "morning-run");
        assert_eq!(parsed.tour_number, 0);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(Tour::parse_tour_id("").is_none());
        assert!(Tour::parse_tour_id("no-separators").is_none());
        assert!(Tour::parse_tour_id("a*b").is_none());
        assert!(Tour::parse_tour_id("a*b*c*d").is_none());
    }
}
