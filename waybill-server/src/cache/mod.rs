//! Query Cache
//!
//! 过滤查询结果的进程内缓存：key 是过滤条件（不含分页）的哈希，
//! 同一逻辑查询的所有分页共享一个缓存条目。TTL 过期即 miss，
//! 容量按 FIFO 淘汰最老条目。任何成功的写入都调用 `invalidate_all`。
//!
//! 注入对象（挂在 ServerState 上），不是模块级全局变量，可替换可测试。

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

struct CacheEntry<T> {
    payload: Arc<T>,
    created_at: Instant,
}

/// TTL'd, capacity-bounded FIFO cache for query payloads.
pub struct QueryCache<T> {
    entries: DashMap<u64, CacheEntry<T>>,
    // Insertion order for FIFO eviction; stale keys are skipped lazily.
    order: Mutex<VecDeque<u64>>,
    ttl: Duration,
    capacity: usize,
}

impl<T> QueryCache<T> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Look up a payload; entries older than the TTL are misses.
    pub fn get(&self, key: u64) -> Option<Arc<T>> {
        let expired = match self.entries.get(&key) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => {
                return Some(entry.payload.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(&key);
        }
        None
    }

    /// Insert or refresh a payload, evicting the oldest entries beyond
    /// capacity.
    pub fn put(&self, key: u64, payload: T) {
        let entry = CacheEntry {
            payload: Arc::new(payload),
            created_at: Instant::now(),
        };
        let is_new = self.entries.insert(key, entry).is_none();

        let mut order = self.order.lock();
        if is_new {
            order.push_back(key);
        }
        while self.entries.len() > self.capacity {
            let Some(oldest) = order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }

    /// Drop everything. Called after every successful entity write.
    pub fn invalidate_all(&self) {
        self.entries.clear();
        self.order.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
