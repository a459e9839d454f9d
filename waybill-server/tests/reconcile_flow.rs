//! End-to-end reconciliation flow against the in-memory engine:
//! sync → operator edit → re-sync keeps the edit → force refresh rebuilds.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use waybill_server::core::{Config, ServerState};
use waybill_server::db::DbService;
use waybill_server::query::{OrderFilter, Pagination};
use waybill_server::reconcile::SnapshotFields;
use waybill_server::sync::{RefreshMode, SnapshotSource, SourceError};

const TOUR_ID: &str = "2024-09-23-21-15-02*plan77*tour-5";
const CLIENT: &str = "client-a";

struct StubSource {
    by_date: Mutex<HashMap<NaiveDate, Vec<Value>>>,
}

impl StubSource {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            by_date: Mutex::new(HashMap::new()),
        })
    }

    fn set(&self, date: NaiveDate, orders: Vec<Value>) {
        self.by_date.lock().insert(date, orders);
    }
}

#[async_trait]
impl SnapshotSource for StubSource {
    async fn fetch_snapshot(
        &self,
        _client_key: &str,
        date: NaiveDate,
        _status_filter: Option<&[String]>,
    ) -> Result<Vec<SnapshotFields>, SourceError> {
        Ok(self
            .by_date
            .lock()
            .get(&date)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(SnapshotFields::new)
            .collect())
    }
}

fn test_config() -> Config {
    Config {
        work_dir: "/tmp/waybill-test".into(),
        http_port: 0,
        environment: "test".into(),
        fleet_api_url: "http://localhost:0".into(),
        fleet_api_token: String::new(),
        fleet_client_key: CLIENT.into(),
        fleet_team_id: "101".into(),
        request_timeout_ms: 1000,
        cache_ttl_secs: 60,
        cache_capacity: 16,
    }
}

async fn setup() -> (ServerState, Arc<StubSource>) {
    let db = DbService::open_memory().await.unwrap();
    let source = StubSource::new();
    let state = ServerState::with_parts(test_config(), db.db, source.clone());
    (state, source)
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, 23).unwrap()
}

fn upstream_order(id: &str, vehicle: &str, rider: &str, status: &str) -> Value {
    json!({
        "id": id,
        "orderStatus": status,
        "location": {
            "name": "Depot 4",
            "address": {"formattedAddress": "1 Nile St", "city": "Cairo", "countryCode": "EG"},
            "latLng": {"lat": 30.05, "lng": 31.23}
        },
        "orderMetadata": {
            "tourDetail": {
                "tourId": TOUR_ID,
                "riderName": rider,
                "vehicleRegistrationNumber": vehicle
            },
            "lineItems": [
                {
                    "id": format!("sku-{id}"),
                    "name": "Crate",
                    "quantity": 2,
                    "quantityUnit": "PIECES",
                    "transactionStatus": {"transactedQuantity": 2, "status": "DELIVERED"}
                }
            ]
        }
    })
}

fn edit_payload(field: &str, value: Value) -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::new();
    map.insert(field.to_string(), value);
    map
}

#[tokio::test]
async fn smart_refresh_preserves_operator_edits() {
    let (state, source) = setup().await;
    source.set(
        day(),
        vec![
            upstream_order("o-1", "ABC-1", "Amr", "ONGOING"),
            upstream_order("o-2", "ABC-1", "Amr", "ONGOING"),
        ],
    );

    let report = state
        .sync_service()
        .refresh(RefreshMode::Smart, CLIENT, day(), None)
        .await
        .unwrap();
    assert_eq!(report.created, 2);
    assert_eq!(report.updated, 0);

    // Tour lazily created, aggregates derived from orders
    let tours = state.query_service().list_tours(Some("2024-09-23")).await.unwrap();
    assert_eq!(tours.len(), 1);
    assert_eq!(tours[0].tour_id, TOUR_ID);
    assert_eq!(tours[0].total_orders, 2);

    // Operator corrects one vehicle
    state
        .edit_service()
        .apply_order_edit("o-1", &edit_payload("vehicle_registration", json!("XYZ-9")), "alice")
        .await
        .unwrap();

    // Upstream re-sends the stale vehicle with fresh rider/status
    source.set(
        day(),
        vec![
            upstream_order("o-1", "FRESH-0", "Bob", "COMPLETED"),
            upstream_order("o-2", "FRESH-0", "Bob", "COMPLETED"),
        ],
    );
    let report = state
        .sync_service()
        .refresh(RefreshMode::Smart, CLIENT, day(), None)
        .await
        .unwrap();
    assert_eq!(report.updated, 2);

    let store = state.entity_store();
    let o1 = store.orders().find_by_id("o-1").await.unwrap().unwrap();
    assert_eq!(o1.vehicle_registration.as_deref(), Some("XYZ-9")); // protected
    assert_eq!(o1.rider_name.as_deref(), Some("Bob")); // unprotected
    assert_eq!(o1.order_status, "COMPLETED");

    let o2 = store.orders().find_by_id("o-2").await.unwrap().unwrap();
    assert_eq!(o2.vehicle_registration.as_deref(), Some("FRESH-0"));
}

#[tokio::test]
async fn identical_filters_share_one_cache_entry_until_a_write() {
    let (state, source) = setup().await;
    source.set(
        day(),
        vec![
            upstream_order("o-1", "ABC-1", "Amr", "ONGOING"),
            upstream_order("o-2", "ABC-1", "Amr", "ONGOING"),
        ],
    );
    state
        .sync_service()
        .refresh(RefreshMode::Smart, CLIENT, day(), None)
        .await
        .unwrap();

    let query = state.query_service();
    let filter = OrderFilter {
        date: Some(day()),
        ..Default::default()
    };
    let page_one = Pagination { page: 1, per_page: 1 };
    let page_two = Pagination { page: 2, per_page: 1 };

    let first = query.list_orders(&filter, page_one).await.unwrap();
    assert!(!first.cached);
    assert_eq!(first.total_count, 2);
    assert_eq!(first.orders.len(), 1);

    // Different page, same logical query: served from the same entry
    let second = query.list_orders(&filter, page_two).await.unwrap();
    assert!(second.cached);
    assert_eq!(second.orders.len(), 1);
    assert_ne!(first.orders[0].order_id, second.orders[0].order_id);

    // Any edit forces the next read to recompute
    state
        .edit_service()
        .apply_order_edit("o-1", &edit_payload("rider_name", json!("Dina")), "alice")
        .await
        .unwrap();
    let third = query.list_orders(&filter, page_one).await.unwrap();
    assert!(!third.cached);
    assert_eq!(third.orders[0].rider_name.as_deref(), Some("Dina"));
}

#[tokio::test]
async fn refresh_invalidates_the_cache() {
    let (state, source) = setup().await;
    source.set(day(), vec![upstream_order("o-1", "ABC-1", "Amr", "ONGOING")]);
    state
        .sync_service()
        .refresh(RefreshMode::Smart, CLIENT, day(), None)
        .await
        .unwrap();

    let query = state.query_service();
    let filter = OrderFilter {
        date: Some(day()),
        ..Default::default()
    };
    query.list_orders(&filter, Pagination::default()).await.unwrap();
    assert!(!state.cache.is_empty());

    state
        .sync_service()
        .refresh(RefreshMode::Smart, CLIENT, day(), None)
        .await
        .unwrap();
    assert!(state.cache.is_empty());
}

#[tokio::test]
async fn force_refresh_clears_then_rebuilds() {
    let (state, source) = setup().await;
    source.set(day(), vec![upstream_order("o-1", "ABC-1", "Amr", "ONGOING")]);
    state
        .sync_service()
        .refresh(RefreshMode::Smart, CLIENT, day(), None)
        .await
        .unwrap();

    state
        .edit_service()
        .apply_order_edit("o-1", &edit_payload("vehicle_registration", json!("XYZ-9")), "alice")
        .await
        .unwrap();

    source.set(day(), vec![upstream_order("o-1", "FRESH-0", "Amr", "ONGOING")]);
    let report = state
        .sync_service()
        .refresh(RefreshMode::Force, CLIENT, day(), None)
        .await
        .unwrap();

    assert_eq!(report.orders_cleared, 1);
    assert_eq!(report.line_items_cleared, 1);
    assert_eq!(report.created, 1);

    // Force mode rebuilds from scratch: the row (and its ledger) was dropped
    let o1 = state
        .entity_store()
        .orders()
        .find_by_id("o-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(o1.vehicle_registration.as_deref(), Some("FRESH-0"));
    assert!(!o1.modification.is_modified);
}

#[tokio::test]
async fn clear_deletes_line_items_before_orders() {
    let (state, source) = setup().await;
    source.set(
        day(),
        vec![
            upstream_order("o-1", "ABC-1", "Amr", "ONGOING"),
            upstream_order("o-2", "ABC-1", "Amr", "ONGOING"),
        ],
    );
    state
        .sync_service()
        .refresh(RefreshMode::Smart, CLIENT, day(), None)
        .await
        .unwrap();

    let store = state.entity_store();
    assert_eq!(store.orders().line_items("o-1").await.unwrap().len(), 1);

    let report = store.clear_for_key(CLIENT, day()).await.unwrap();
    assert_eq!(report.orders_deleted, 2);
    assert_eq!(report.line_items_deleted, 2);

    assert!(store.orders().find_by_id("o-1").await.unwrap().is_none());
    assert!(store.orders().line_items("o-1").await.unwrap().is_empty());
    assert!(store.orders().line_items("o-2").await.unwrap().is_empty());
}

#[tokio::test]
async fn range_refresh_is_cancellable_between_days() {
    let (state, source) = setup().await;
    let day_two = day().succ_opt().unwrap();
    source.set(day(), vec![upstream_order("o-1", "ABC-1", "Amr", "ONGOING")]);
    source.set(day_two, vec![upstream_order("o-9", "ABC-1", "Amr", "ONGOING")]);

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let reports = state
        .sync_service()
        .refresh_range(RefreshMode::Smart, CLIENT, day(), day_two, &cancelled)
        .await
        .unwrap();
    assert!(reports.is_empty());

    let reports = state
        .sync_service()
        .refresh_range(
            RefreshMode::Smart,
            CLIENT,
            day(),
            day_two,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].created, 1);
    assert_eq!(reports[1].created, 1);
}

#[tokio::test]
async fn opens_an_on_disk_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("waybill.db");
    let db = DbService::open(&path.to_string_lossy()).await.unwrap();
    drop(db);
}
