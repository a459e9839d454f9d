//! Field Modification Ledger
//!
//! Tracks which fields of an entity were hand-edited. State lives inline on
//! the entity row (`ModificationState`), so data and protection commit
//! atomically together.

use chrono::{DateTime, Utc};

use crate::db::models::{ModificationState, Order, Tour};

/// Entities that carry an inline modification ledger.
pub trait Editable {
    /// Table label for logging.
    fn entity_label(&self) -> &'static str;
    /// Business key for logging.
    fn entity_key(&self) -> &str;
    fn modification(&self) -> &ModificationState;
    fn modification_mut(&mut self) -> &mut ModificationState;
}

impl Editable for Order {
    fn entity_label(&self) -> &'static str {
        "order"
    }

    fn entity_key(&self) -> &str {
        &self.order_id
    }

    fn modification(&self) -> &ModificationState {
        &self.modification
    }

    fn modification_mut(&mut self) -> &mut ModificationState {
        &mut self.modification
    }
}

impl Editable for Tour {
    fn entity_label(&self) -> &'static str {
        "tour"
    }

    fn entity_key(&self) -> &str {
        &self.tour_id
    }

    fn modification(&self) -> &ModificationState {
        &self.modification
    }

    fn modification_mut(&mut self) -> &mut ModificationState {
        &mut self.modification
    }
}

/// A field is protected iff it is listed in `modified_fields` AND
/// `is_modified` is set.
pub fn is_protected<E: Editable>(entity: &E, field: &str) -> bool {
    let m = entity.modification();
    m.is_modified && m.modified_fields.iter().any(|f| f == field)
}

/// Mark a field as hand-modified.
///
/// Idempotent: re-marking refreshes actor/timestamp without duplicating
/// the field in the ordered set.
pub fn mark_modified<E: Editable>(entity: &mut E, field: &str, actor: &str, now: DateTime<Utc>) {
    let label = entity.entity_label();
    let key = entity.entity_key().to_string();
    let m = entity.modification_mut();
    if !m.modified_fields.iter().any(|f| f == field) {
        m.modified_fields.push(field.to_string());
    }
    m.is_modified = true;
    m.last_modified_by = Some(actor.to_string());
    m.last_modified_at = Some(now);

    tracing::info!(entity = label, id = %key, field, actor, "Tracked field modification");
}

/// Fields currently protected from snapshot overwrites.
pub fn protected_fields<E: Editable>(entity: &E) -> &[String] {
    let m = entity.modification();
    if m.is_modified { &m.modified_fields } else { &[] }
}
