//! Tour Repository
//!
//! Tour 行以完整上游 tour id 作为 record key，由订单快照惰性创建。

use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{Order, Tour};
use crate::reconcile::snapshot::TourDetailFields;

#[derive(Clone)]
pub struct TourRepository {
    base: BaseRepository,
}

impl TourRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_by_id(&self, tour_id: &str) -> RepoResult<Option<Tour>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM type::thing('tour', $id)")
            .bind(("id", tour_id.to_string()))
            .await?;
        let tours: Vec<Tour> = result.take(0)?;
        Ok(tours.into_iter().next())
    }

    /// List tours, optionally restricted to one calendar day
    /// (prefix match on the tour id's timestamp part), ordered for display.
    pub async fn list(&self, date: Option<&str>) -> RepoResult<Vec<Tour>> {
        let sql = match date {
            Some(_) => {
                "SELECT * FROM tour WHERE string::starts_with(tour_date, $date) \
                 ORDER BY tour_date, tour_number"
            }
            None => "SELECT * FROM tour ORDER BY tour_date, tour_number",
        };
        let mut query = self.base.db().query(sql);
        if let Some(date) = date {
            query = query.bind(("date", date.to_string()));
        }
        let mut result = query.await?;
        Ok(result.take(0)?)
    }

    pub async fn save(&self, tour: &Tour) -> RepoResult<()> {
        self.base
            .db()
            .query("UPSERT type::thing('tour', $id) CONTENT $tour")
            .bind(("id", tour.tour_id.clone()))
            .bind(("tour", tour.clone()))
            .await?
            .check()
            .map_err(|e| RepoError::Transaction(e.to_string()))?;
        Ok(())
    }

    /// Fetch the tour for `tour_id`, creating it from the parsed id (and
    /// any tour detail the snapshot carried) when missing.
    ///
    /// Returns `Ok(None)` for ids that don't parse: the order keeps its
    /// raw tour id, but no tour row is materialized for it.
    pub async fn get_or_create(
        &self,
        tour_id: &str,
        detail: Option<&TourDetailFields>,
    ) -> RepoResult<Option<Tour>> {
        if let Some(existing) = self.find_by_id(tour_id).await? {
            return Ok(Some(existing));
        }

        let Some(parsed) = Tour::parse_tour_id(tour_id) else {
            tracing::warn!(tour_id, "Unparseable tour id; no tour row created");
            return Ok(None);
        };

        let mut tour = Tour::from_parsed(tour_id, parsed);
        if let Some(detail) = detail {
            tour.rider_name = detail.rider_name.clone();
            tour.vehicle_registration = detail.vehicle_registration.clone();
            tour.tour_start_time = detail.tour_start_time;
            tour.tour_end_time = detail.tour_end_time;
        }

        self.save(&tour).await?;
        tracing::info!(tour_id, "Created tour row");
        Ok(Some(tour))
    }

    /// Commit a tour edit together with all propagated order edits as one
    /// transaction: if any statement is rejected, the tour edit rolls back
    /// with the rest.
    pub async fn commit_with_orders(&self, tour: &Tour, orders: &[Order]) -> RepoResult<()> {
        let mut sql = String::from(
            "BEGIN TRANSACTION; \
             UPSERT type::thing('tour', $tour_id) CONTENT $tour;",
        );
        for i in 0..orders.len() {
            sql.push_str(&format!(
                " UPSERT type::thing('order', $order_id{i}) CONTENT $order{i};"
            ));
        }
        sql.push_str(" COMMIT TRANSACTION;");

        let mut query = self
            .base
            .db()
            .query(sql)
            .bind(("tour_id", tour.tour_id.clone()))
            .bind(("tour", tour.clone()));
        for (i, order) in orders.iter().enumerate() {
            query = query
                .bind((format!("order_id{i}"), order.order_id.clone()))
                .bind((format!("order{i}"), order.clone()));
        }

        query
            .await?
            .check()
            .map_err(|e| RepoError::Transaction(e.to_string()))?;
        Ok(())
    }
}
