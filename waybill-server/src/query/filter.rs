//! Order filter criteria
//!
//! 缓存 key 只覆盖过滤条件本身，分页参数被排除在外：
//! 同一逻辑查询的第 1 页和第 7 页命中同一个缓存条目。

use std::hash::{DefaultHasher, Hash, Hasher};

use chrono::NaiveDate;
use serde::Deserialize;

/// Filter criteria for order listing. Everything here participates in the
/// cache key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub date: Option<NaiveDate>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[serde(default)]
    pub statuses: Vec<String>,
    pub city: Option<String>,
    pub rider: Option<String>,
    pub vehicle: Option<String>,
    pub client: Option<String>,
    pub search: Option<String>,
}

impl OrderFilter {
    /// Hash of the normalized criteria; pagination deliberately excluded.
    pub fn cache_key(&self) -> u64 {
        let mut statuses = self.statuses.clone();
        statuses.sort();
        statuses.dedup();

        let mut hasher = DefaultHasher::new();
        self.date.hash(&mut hasher);
        self.date_from.hash(&mut hasher);
        self.date_to.hash(&mut hasher);
        statuses.hash(&mut hasher);
        self.city.hash(&mut hasher);
        self.rider.hash(&mut hasher);
        self.vehicle.hash(&mut hasher);
        self.client.hash(&mut hasher);
        self.search.hash(&mut hasher);
        hasher.finish()
    }
}

/// Pagination, applied after cache retrieval.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    50
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl Pagination {
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, 200),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_status_order() {
        let a = OrderFilter {
            statuses: vec!["COMPLETED".into(), "CANCELLED".into()],
            ..Default::default()
        };
        let b = OrderFilter {
            statuses: vec!["CANCELLED".into(), "COMPLETED".into()],
            ..Default::default()
        };
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn key_differs_on_criteria() {
        let a = OrderFilter {
            city: Some("Cairo".into()),
            ..Default::default()
        };
        let b = OrderFilter {
            city: Some("Giza".into()),
            ..Default::default()
        };
        assert_ne!(a.cache_key(), b.cache_key());
    }
}
