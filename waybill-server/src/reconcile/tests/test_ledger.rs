use super::*;

#[test]
fn protection_requires_flag_and_membership() {
    let mut order = base_order();
    assert!(!ledger::is_protected(&order, "vehicle_registration"));

    // Membership without the flag is not protection
    order
        .modification
        .modified_fields
        .push("vehicle_registration".to_string());
    assert!(!ledger::is_protected(&order, "vehicle_registration"));

    order.modification.is_modified = true;
    assert!(ledger::is_protected(&order, "vehicle_registration"));
    assert!(!ledger::is_protected(&order, "rider_name"));
}

#[test]
fn mark_modified_is_idempotent() {
    let mut order = base_order();
    ledger::mark_modified(&mut order, "rider_name", "alice", test_now());
    ledger::mark_modified(&mut order, "rider_name", "bob", test_now());

    assert_eq!(order.modification.modified_fields, vec!["rider_name"]);
    assert!(order.modification.is_modified);
    // Re-marking refreshes the actor
    assert_eq!(order.modification.last_modified_by.as_deref(), Some("bob"));
}

#[test]
fn mark_modified_keeps_insertion_order() {
    let mut order = base_order();
    ledger::mark_modified(&mut order, "rider_name", "alice", test_now());
    ledger::mark_modified(&mut order, "order_status", "alice", test_now());
    ledger::mark_modified(&mut order, "rider_name", "alice", test_now());

    assert_eq!(
        order.modification.modified_fields,
        vec!["rider_name", "order_status"]
    );
}

#[test]
fn protected_fields_empty_without_flag() {
    let mut order = base_order();
    order
        .modification
        .modified_fields
        .push("rider_name".to_string());
    assert!(ledger::protected_fields(&order).is_empty());

    order.modification.is_modified = true;
    assert_eq!(ledger::protected_fields(&order), ["rider_name"]);
}
