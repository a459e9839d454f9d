//! Data Models
//!
//! Serde structs matching the SurrealDB tables. Business keys (upstream
//! order/tour ids) are stored both as the record key and as a plain field,
//! so reads never need to unwrap a `RecordId`.

pub mod line_item;
pub mod modification;
pub mod order;
pub mod tour;

pub use line_item::LineItem;
pub use modification::ModificationState;
pub use order::Order;
pub use tour::{ParsedTourId, Tour};
