use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::{Map, Value, json};

use crate::cache::QueryCache;
use crate::db::models::{Order, Tour};
use crate::db::repository::EntityLocks;
use crate::db::{DbService, EntityStore};
use crate::query::{OrderQueryPayload, SharedQueryCache};
use crate::reconcile::SnapshotFields;
use crate::utils::AppError;

use super::EditService;

async fn setup() -> (EntityStore, SharedQueryCache, EditService) {
    let db = DbService::open_memory().await.unwrap();
    let store = EntityStore::new(db.db.clone(), EntityLocks::new());
    let cache: SharedQueryCache = Arc::new(QueryCache::new(Duration::from_secs(60), 16));
    let service = EditService::new(store.clone(), cache.clone());
    (store, cache, service)
}

fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, 23).unwrap()
}

fn order_with(id: &str, tour_id: Option<&str>, rider: &str, vehicle: &str) -> Order {
    let mut order = Order::new(id, "client-a", test_date());
    order.order_status = "ONGOING".to_string();
    order.tour_id = tour_id.map(str::to_string);
    order.rider_name = Some(rider.to_string());
    order.vehicle_registration = Some(vehicle.to_string());
    order
}

const TOUR_ID: &str = "2024-09-23-21-15-02*plan77*tour-5";

fn tour_with(rider: &str, vehicle: &str) -> Tour {
    let parsed = Tour::parse_tour_id(TOUR_ID).unwrap();
    let mut tour = Tour::from_parsed(TOUR_ID, parsed);
    tour.rider_name = Some(rider.to_string());
    tour.vehicle_registration = Some(vehicle.to_string());
    tour
}

fn edit(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn empty_payload() -> OrderQueryPayload {
    OrderQueryPayload {
        orders: Vec::new(),
        status_totals: BTreeMap::new(),
    }
}

// ========================================================================
// Order edits
// ========================================================================

#[tokio::test]
async fn edit_marks_field_and_persists() {
    let (store, _cache, service) = setup().await;
    store
        .orders()
        .save(&order_with("o-1", None, "Amr", "ABC-1"))
        .await
        .unwrap();

    let outcome = service
        .apply_order_edit("o-1", &edit(&[("vehicle_registration", json!("XYZ-9"))]), "alice")
        .await
        .unwrap();

    assert_eq!(outcome.updated_fields, vec!["vehicle_registration"]);

    let stored = store.orders().find_by_id("o-1").await.unwrap().unwrap();
    assert_eq!(stored.vehicle_registration.as_deref(), Some("XYZ-9"));
    assert!(stored.modification.is_modified);
    assert_eq!(stored.modification.modified_fields, vec!["vehicle_registration"]);
    assert_eq!(stored.modification.last_modified_by.as_deref(), Some("alice"));
}

#[tokio::test]
async fn unchanged_resubmission_is_a_noop() {
    let (store, _cache, service) = setup().await;
    store
        .orders()
        .save(&order_with("o-1", None, "Amr", "ABC-1"))
        .await
        .unwrap();

    let fields = edit(&[("vehicle_registration", json!("XYZ-9"))]);
    service.apply_order_edit("o-1", &fields, "alice").await.unwrap();
    let second = service.apply_order_edit("o-1", &fields, "alice").await.unwrap();

    assert!(second.updated_fields.is_empty());
    let stored = store.orders().find_by_id("o-1").await.unwrap().unwrap();
    assert_eq!(stored.modification.modified_fields, vec!["vehicle_registration"]);
}

#[tokio::test]
async fn unknown_field_is_rejected_without_mutation() {
    let (store, _cache, service) = setup().await;
    store
        .orders()
        .save(&order_with("o-1", None, "Amr", "ABC-1"))
        .await
        .unwrap();

    let result = service
        .apply_order_edit(
            "o-1",
            &edit(&[
                ("vehicle_registration", json!("XYZ-9")),
                ("vehicle_registratoin", json!("typo")),
            ]),
            "alice",
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    let stored = store.orders().find_by_id("o-1").await.unwrap().unwrap();
    assert_eq!(stored.vehicle_registration.as_deref(), Some("ABC-1"));
    assert!(!stored.modification.is_modified);
}

#[tokio::test]
async fn empty_edit_is_rejected() {
    let (_store, _cache, service) = setup().await;
    let result = service.apply_order_edit("o-1", &Map::new(), "alice").await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn missing_order_is_not_found() {
    let (_store, _cache, service) = setup().await;
    let result = service
        .apply_order_edit("ghost", &edit(&[("rider_name", json!("Bob"))]), "alice")
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn leaving_cancelled_clears_cancellation_reason() {
    let (store, _cache, service) = setup().await;
    let mut order = order_with("o-1", None, "Amr", "ABC-1");
    order.order_status = "CANCELLED".to_string();
    order.cancellation_reason = Some("customer absent".to_string());
    store.orders().save(&order).await.unwrap();

    let outcome = service
        .apply_order_edit("o-1", &edit(&[("order_status", json!("COMPLETED"))]), "alice")
        .await
        .unwrap();

    assert_eq!(outcome.updated_fields, vec!["order_status", "cancellation_reason"]);
    let stored = store.orders().find_by_id("o-1").await.unwrap().unwrap();
    assert_eq!(stored.cancellation_reason, None);
}

// ========================================================================
// Line items
// ========================================================================

#[tokio::test]
async fn replaced_line_items_survive_snapshot_merge() {
    let (store, _cache, service) = setup().await;
    store
        .orders()
        .save(&order_with("o-1", None, "Amr", "ABC-1"))
        .await
        .unwrap();

    let items = vec![super::LineItemInput {
        sku_id: "sku-op".to_string(),
        name: "Corrected crate".to_string(),
        quantity: 5,
        quantity_unit: Some("PIECES".to_string()),
        transacted_quantity: Some(5),
        transaction_status: Some("DELIVERED".to_string()),
    }];
    let replaced = service.replace_line_items("o-1", &items, "alice").await.unwrap();
    assert_eq!(replaced, 1);

    // Upstream re-sends its own item list; the hand-edited set must win
    let snap = SnapshotFields::new(json!({
        "id": "o-1",
        "orderMetadata": {
            "lineItems": [
                {"id": "sku-api", "name": "Stale crate", "quantity": 1}
            ]
        }
    }));
    store.upsert_batch(&[snap], "client-a", test_date()).await;

    let stored_items = store.orders().line_items("o-1").await.unwrap();
    assert_eq!(stored_items.len(), 1);
    assert_eq!(stored_items[0].sku_id, "sku-op");

    let order = store.orders().find_by_id("o-1").await.unwrap().unwrap();
    assert!(
        order
            .modification
            .modified_fields
            .contains(&"line_items".to_string())
    );
}

#[tokio::test]
async fn empty_line_item_replacement_is_rejected() {
    let (_store, _cache, service) = setup().await;
    let result = service.replace_line_items("o-1", &[], "alice").await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

// ========================================================================
// Cache invalidation
// ========================================================================

#[tokio::test]
async fn successful_edit_invalidates_cache() {
    let (store, cache, service) = setup().await;
    store
        .orders()
        .save(&order_with("o-1", None, "Amr", "ABC-1"))
        .await
        .unwrap();
    cache.put(42, empty_payload());

    service
        .apply_order_edit("o-1", &edit(&[("rider_name", json!("Bob"))]), "alice")
        .await
        .unwrap();

    assert!(cache.is_empty());
}

#[tokio::test]
async fn noop_edit_keeps_cache() {
    let (store, cache, service) = setup().await;
    store
        .orders()
        .save(&order_with("o-1", None, "Amr", "ABC-1"))
        .await
        .unwrap();
    cache.put(42, empty_payload());

    service
        .apply_order_edit("o-1", &edit(&[("rider_name", json!("Amr"))]), "alice")
        .await
        .unwrap();

    assert_eq!(cache.len(), 1);
}

// ========================================================================
// Tour edits & propagation
// ========================================================================

#[tokio::test]
async fn tour_edit_propagates_to_linked_orders() {
    let (store, _cache, service) = setup().await;
    store.tours().save(&tour_with("Amr", "ABC-1")).await.unwrap();
    store
        .orders()
        .save(&order_with("o-1", Some(TOUR_ID), "Amr", "ABC-1"))
        .await
        .unwrap();
    store
        .orders()
        .save(&order_with("o-2", Some(TOUR_ID), "Amr", "ABC-1"))
        .await
        .unwrap();

    let outcome = service
        .apply_tour_edit(
            TOUR_ID,
            &edit(&[("vehicle_registration", json!("NEW-9"))]),
            "alice",
            true,
        )
        .await
        .unwrap();

    assert_eq!(outcome.updated_fields, vec!["vehicle_registration"]);
    assert_eq!(outcome.propagated_orders, 2);

    for id in ["o-1", "o-2"] {
        let stored = store.orders().find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.vehicle_registration.as_deref(), Some("NEW-9"));
        assert_eq!(
            stored.modification.last_modified_by.as_deref(),
            Some("Tour Update: alice")
        );
        assert!(
            stored
                .modification
                .modified_fields
                .contains(&"vehicle_registration".to_string())
        );
    }
}

#[tokio::test]
async fn propagated_field_survives_later_snapshot_merge() {
    let (store, _cache, service) = setup().await;
    store.tours().save(&tour_with("Amr", "ABC-1")).await.unwrap();
    store
        .orders()
        .save(&order_with("o-1", Some(TOUR_ID), "Amr", "ABC-1"))
        .await
        .unwrap();

    service
        .apply_tour_edit(
            TOUR_ID,
            &edit(&[("vehicle_registration", json!("NEW-9"))]),
            "alice",
            true,
        )
        .await
        .unwrap();

    // Upstream re-sends the old vehicle
    let snap = SnapshotFields::new(json!({
        "id": "o-1",
        "orderStatus": "COMPLETED",
        "orderMetadata": {
            "tourDetail": {
                "tourId": TOUR_ID,
                "vehicleRegistrationNumber": "ABC-1"
            }
        }
    }));
    let report = store.upsert_batch(&[snap], "client-a", test_date()).await;
    assert_eq!(report.updated, 1);

    let stored = store.orders().find_by_id("o-1").await.unwrap().unwrap();
    assert_eq!(stored.vehicle_registration.as_deref(), Some("NEW-9"));
    assert_eq!(stored.order_status, "COMPLETED");
}

#[tokio::test]
async fn fallback_linkage_uses_rider_and_vehicle() {
    let (store, _cache, service) = setup().await;
    store.tours().save(&tour_with("Amr", "ABC-1")).await.unwrap();
    // No tour_id linkage on the order
    store
        .orders()
        .save(&order_with("o-1", None, "Amr", "ABC-1"))
        .await
        .unwrap();
    // Different rider/vehicle, must not be touched
    store
        .orders()
        .save(&order_with("o-2", None, "Dina", "CAR-7"))
        .await
        .unwrap();

    let outcome = service
        .apply_tour_edit(
            TOUR_ID,
            &edit(&[("rider_phone", json!("+20100000000"))]),
            "alice",
            true,
        )
        .await
        .unwrap();

    assert_eq!(outcome.propagated_orders, 1);
    let linked = store.orders().find_by_id("o-1").await.unwrap().unwrap();
    assert_eq!(linked.rider_phone.as_deref(), Some("+20100000000"));
    let other = store.orders().find_by_id("o-2").await.unwrap().unwrap();
    assert_eq!(other.rider_phone, None);
}

#[tokio::test]
async fn tour_status_maps_onto_order_status() {
    let (store, _cache, service) = setup().await;
    store.tours().save(&tour_with("Amr", "ABC-1")).await.unwrap();
    store
        .orders()
        .save(&order_with("o-1", Some(TOUR_ID), "Amr", "ABC-1"))
        .await
        .unwrap();

    service
        .apply_tour_edit(
            TOUR_ID,
            &edit(&[("tour_status", json!("CANCELLED"))]),
            "alice",
            true,
        )
        .await
        .unwrap();

    let stored = store.orders().find_by_id("o-1").await.unwrap().unwrap();
    assert_eq!(stored.order_status, "CANCELLED");
    assert!(
        stored
            .modification
            .modified_fields
            .contains(&"order_status".to_string())
    );
}

#[tokio::test]
async fn propagation_disabled_leaves_orders_untouched() {
    let (store, _cache, service) = setup().await;
    store.tours().save(&tour_with("Amr", "ABC-1")).await.unwrap();
    store
        .orders()
        .save(&order_with("o-1", Some(TOUR_ID), "Amr", "ABC-1"))
        .await
        .unwrap();

    let outcome = service
        .apply_tour_edit(
            TOUR_ID,
            &edit(&[("vehicle_registration", json!("NEW-9"))]),
            "alice",
            false,
        )
        .await
        .unwrap();

    assert_eq!(outcome.propagated_orders, 0);
    let stored = store.orders().find_by_id("o-1").await.unwrap().unwrap();
    assert_eq!(stored.vehicle_registration.as_deref(), Some("ABC-1"));
}

#[tokio::test]
async fn noop_tour_edit_propagates_nothing() {
    let (store, _cache, service) = setup().await;
    store.tours().save(&tour_with("Amr", "ABC-1")).await.unwrap();
    store
        .orders()
        .save(&order_with("o-1", Some(TOUR_ID), "Amr", "ABC-1"))
        .await
        .unwrap();

    let outcome = service
        .apply_tour_edit(
            TOUR_ID,
            &edit(&[("vehicle_registration", json!("ABC-1"))]),
            "alice",
            true,
        )
        .await
        .unwrap();

    assert!(outcome.updated_fields.is_empty());
    assert_eq!(outcome.propagated_orders, 0);
}
