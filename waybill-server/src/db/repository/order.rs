//! Order Repository
//!
//! 订单行以上游订单 ID 作为 record key；行本身和它的 line items
//! 在一个事务里一起落库。

use chrono::NaiveDate;
use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{LineItem, Order};

/// Outcome of a scoped clear.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct ClearReport {
    pub orders_deleted: i64,
    pub line_items_deleted: i64,
}

#[derive(Deserialize)]
struct CountRow {
    count: i64,
}

#[derive(Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub fn db(&self) -> &Surreal<Db> {
        self.base.db()
    }

    /// Find one order by its upstream id.
    pub async fn find_by_id(&self, order_id: &str) -> RepoResult<Option<Order>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM type::thing('order', $id)")
            .bind(("id", order_id.to_string()))
            .await?;
        let orders: Vec<Order> = result.take(0)?;
        Ok(orders.into_iter().next())
    }

    pub async fn find_by_client_date(
        &self,
        client_key: &str,
        date: NaiveDate,
    ) -> RepoResult<Vec<Order>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM order WHERE client_id = $client AND date = $date ORDER BY order_id")
            .bind(("client", client_key.to_string()))
            .bind(("date", date))
            .await?;
        Ok(result.take(0)?)
    }

    /// Primary tour linkage lookup.
    pub async fn find_by_tour_id(&self, tour_id: &str) -> RepoResult<Vec<Order>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM order WHERE tour_id = $tour_id ORDER BY order_id")
            .bind(("tour_id", tour_id.to_string()))
            .await?;
        Ok(result.take(0)?)
    }

    /// Secondary tour linkage lookup: rider + vehicle match, used only when
    /// no order carries the tour id itself.
    pub async fn find_by_rider_vehicle(
        &self,
        rider_name: &str,
        vehicle_registration: &str,
    ) -> RepoResult<Vec<Order>> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT * FROM order \
                 WHERE rider_name = $rider AND vehicle_registration = $vehicle \
                 ORDER BY order_id",
            )
            .bind(("rider", rider_name.to_string()))
            .bind(("vehicle", vehicle_registration.to_string()))
            .await?;
        Ok(result.take(0)?)
    }

    pub async fn line_items(&self, order_id: &str) -> RepoResult<Vec<LineItem>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM line_item WHERE order_id = $id ORDER BY sku_id")
            .bind(("id", order_id.to_string()))
            .await?;
        Ok(result.take(0)?)
    }

    /// Persist one order row.
    pub async fn save(&self, order: &Order) -> RepoResult<()> {
        self.base
            .db()
            .query("UPSERT type::thing('order', $id) CONTENT $order")
            .bind(("id", order.order_id.clone()))
            .bind(("order", order.clone()))
            .await?
            .check()
            .map_err(|e| RepoError::Transaction(e.to_string()))?;
        Ok(())
    }

    /// Persist one order row and, when `line_items` is given, replace its
    /// line items, all inside a single transaction scoped to this entity.
    pub async fn save_with_line_items(
        &self,
        order: &Order,
        line_items: Option<&[LineItem]>,
    ) -> RepoResult<()> {
        let mut sql = String::from(
            "BEGIN TRANSACTION; \
             UPSERT type::thing('order', $id) CONTENT $order;",
        );
        if let Some(items) = line_items {
            sql.push_str(" DELETE line_item WHERE order_id = $id;");
            for i in 0..items.len() {
                sql.push_str(&format!(" CREATE line_item CONTENT $item{i};"));
            }
        }
        sql.push_str(" COMMIT TRANSACTION;");

        let mut query = self
            .base
            .db()
            .query(sql)
            .bind(("id", order.order_id.clone()))
            .bind(("order", order.clone()));
        if let Some(items) = line_items {
            for (i, item) in items.iter().enumerate() {
                query = query.bind((format!("item{i}"), item.clone()));
            }
        }

        query
            .await?
            .check()
            .map_err(|e| RepoError::Transaction(e.to_string()))?;
        Ok(())
    }

    /// Delete all orders for a client/date, line items strictly first.
    pub async fn clear_for_key(
        &self,
        client_key: &str,
        date: NaiveDate,
    ) -> RepoResult<ClearReport> {
        let mut counts = self
            .base
            .db()
            .query(
                "SELECT count() AS count FROM order \
                 WHERE client_id = $client AND date = $date GROUP ALL",
            )
            .query(
                "SELECT count() AS count FROM line_item WHERE order_id IN \
                 (SELECT VALUE order_id FROM order WHERE client_id = $client AND date = $date) \
                 GROUP ALL",
            )
            .bind(("client", client_key.to_string()))
            .bind(("date", date))
            .await?;
        let orders: Vec<CountRow> = counts.take(0)?;
        let line_items: Vec<CountRow> = counts.take(1)?;

        self.base
            .db()
            .query(
                "BEGIN TRANSACTION; \
                 LET $ids = (SELECT VALUE order_id FROM order WHERE client_id = $client AND date = $date); \
                 DELETE line_item WHERE order_id IN $ids; \
                 DELETE order WHERE client_id = $client AND date = $date; \
                 COMMIT TRANSACTION;",
            )
            .bind(("client", client_key.to_string()))
            .bind(("date", date))
            .await?
            .check()
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(ClearReport {
            orders_deleted: orders.first().map(|r| r.count).unwrap_or(0),
            line_items_deleted: line_items.first().map(|r| r.count).unwrap_or(0),
        })
    }
}
