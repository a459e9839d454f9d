//! 查询服务 - 带缓存的过滤 / 分页读取
//!
//! 读路径：缓存命中直接分页返回；miss 时查库、算状态合计、回填缓存。
//! 完整结果集进缓存，分页在取出之后做。

pub mod filter;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::cache::QueryCache;
use crate::db::models::{Order, Tour};
use crate::db::repository::{OrderRepository, RepoResult, TourRepository};
use crate::utils::AppResult;

pub use filter::{OrderFilter, Pagination};

/// The cached unit: full filtered result plus its status totals.
#[derive(Debug, Clone, Serialize)]
pub struct OrderQueryPayload {
    pub orders: Vec<Order>,
    pub status_totals: BTreeMap<String, i64>,
}

/// Cache handle shared by the query, edit and sync services.
pub type SharedQueryCache = Arc<QueryCache<OrderQueryPayload>>;

/// One page of a filtered order listing.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total_count: usize,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub status_totals: BTreeMap<String, i64>,
    pub cached: bool,
}

#[derive(Clone)]
pub struct QueryService {
    orders: OrderRepository,
    tours: TourRepository,
    cache: SharedQueryCache,
}

impl QueryService {
    pub fn new(orders: OrderRepository, tours: TourRepository, cache: SharedQueryCache) -> Self {
        Self {
            orders,
            tours,
            cache,
        }
    }

    /// Filtered, cached, paginated order listing.
    pub async fn list_orders(&self, f: &OrderFilter, page: Pagination) -> AppResult<OrderPage> {
        let page = page.normalized();
        let key = f.cache_key();

        if let Some(payload) = self.cache.get(key) {
            tracing::debug!(key, "Order query served from cache");
            return Ok(paginate(&payload, page, true));
        }

        let orders = self.search(f).await?;
        let mut status_totals = BTreeMap::new();
        for order in &orders {
            if !order.order_status.is_empty() {
                *status_totals.entry(order.order_status.clone()).or_insert(0) += 1;
            }
        }

        let payload = OrderQueryPayload {
            orders,
            status_totals,
        };
        let result = paginate(&payload, page, false);
        self.cache.put(key, payload);
        Ok(result)
    }

    /// Tour listing with aggregates, sorted for display.
    pub async fn list_tours(&self, date: Option<&str>) -> AppResult<Vec<Tour>> {
        Ok(self.tours.list(date).await?)
    }

    async fn search(&self, f: &OrderFilter) -> RepoResult<Vec<Order>> {
        let mut conds: Vec<&str> = Vec::new();
        if f.date.is_some() {
            conds.push("date = $date");
        }
        if f.date_from.is_some() {
            conds.push("date >= $date_from");
        }
        if f.date_to.is_some() {
            conds.push("date <= $date_to");
        }
        if !f.statuses.is_empty() {
            conds.push("order_status IN $statuses");
        }
        if f.city.is_some() {
            conds.push("location_city = $city");
        }
        if f.rider.is_some() {
            conds.push("rider_name = $rider");
        }
        if f.vehicle.is_some() {
            conds.push("vehicle_registration = $vehicle");
        }
        if f.client.is_some() {
            conds.push("client_id = $client");
        }
        if f.search.is_some() {
            conds.push(
                "(string::contains(order_id, $search) \
                 OR string::contains(location_name ?? '', $search) \
                 OR string::contains(location_address ?? '', $search) \
                 OR string::contains(rider_name ?? '', $search))",
            );
        }

        let where_clause = if conds.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conds.join(" AND "))
        };
        let sql = format!("SELECT * FROM order{where_clause} ORDER BY date DESC, created_at DESC");

        let mut query = self.orders.db().query(sql);
        if let Some(date) = f.date {
            query = query.bind(("date", date));
        }
        if let Some(date_from) = f.date_from {
            query = query.bind(("date_from", date_from));
        }
        if let Some(date_to) = f.date_to {
            query = query.bind(("date_to", date_to));
        }
        if !f.statuses.is_empty() {
            query = query.bind(("statuses", f.statuses.clone()));
        }
        if let Some(city) = &f.city {
            query = query.bind(("city", city.clone()));
        }
        if let Some(rider) = &f.rider {
            query = query.bind(("rider", rider.clone()));
        }
        if let Some(vehicle) = &f.vehicle {
            query = query.bind(("vehicle", vehicle.clone()));
        }
        if let Some(client) = &f.client {
            query = query.bind(("client", client.clone()));
        }
        if let Some(search) = &f.search {
            query = query.bind(("search", search.clone()));
        }

        let mut result = query.await?;
        Ok(result.take(0)?)
    }
}

fn paginate(payload: &OrderQueryPayload, page: Pagination, cached: bool) -> OrderPage {
    let total_count = payload.orders.len();
    let total_pages = (total_count.div_ceil(page.per_page as usize)).max(1) as u32;
    let start = ((page.page - 1) as usize) * page.per_page as usize;
    let orders = payload
        .orders
        .iter()
        .skip(start)
        .take(page.per_page as usize)
        .cloned()
        .collect();

    OrderPage {
        orders,
        total_count,
        page: page.page,
        per_page: page.per_page,
        total_pages,
        status_totals: payload.status_totals.clone(),
        cached,
    }
}
