//! 服务器状态 - 持有所有共享组件的单例引用
//!
//! ServerState 使用 Arc/浅拷贝共享；服务对象本身很薄（克隆数据库句柄），
//! 按需构造。
//!
//! | 字段 | 类型 | 说明 |
//! |------|------|------|
//! | config | Config | 配置项 (不可变) |
//! | db | Surreal<Db> | 嵌入式数据库 |
//! | cache | SharedQueryCache | 查询缓存（注入对象，非全局） |
//! | locks | EntityLocks | 实体级写锁表 |
//! | source | Arc<dyn SnapshotSource> | 上游快照源 |

use std::sync::Arc;
use std::time::Duration;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::cache::QueryCache;
use crate::core::Config;
use crate::db::repository::{EntityLocks, OrderRepository, TourRepository};
use crate::db::{DbService, EntityStore};
use crate::edits::EditService;
use crate::query::{QueryService, SharedQueryCache};
use crate::sync::{FleetApiClient, SnapshotSource, SyncService};

#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: Surreal<Db>,
    pub cache: SharedQueryCache,
    pub locks: EntityLocks,
    pub source: Arc<dyn SnapshotSource>,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序：工作目录结构 → 数据库 → 缓存 / 锁表 → 上游客户端
    ///
    /// # Panics
    ///
    /// 数据库初始化失败时 panic
    pub async fn initialize(config: &Config) -> Self {
        config
            .ensure_work_dir_structure()
            .expect("Failed to create work directory structure");

        let db_path = config.database_dir().join("waybill.db");
        let db_service = DbService::open(&db_path.to_string_lossy())
            .await
            .expect("Failed to initialize database");

        let source = Arc::new(FleetApiClient::from_config(config));
        Self::with_parts(config.clone(), db_service.db, source)
    }

    /// 手动构造（测试里配合 Mem 引擎和 stub 快照源使用）
    pub fn with_parts(config: Config, db: Surreal<Db>, source: Arc<dyn SnapshotSource>) -> Self {
        let cache = Arc::new(QueryCache::new(
            Duration::from_secs(config.cache_ttl_secs),
            config.cache_capacity,
        ));
        Self {
            config,
            db,
            cache,
            locks: EntityLocks::new(),
            source,
        }
    }

    pub fn entity_store(&self) -> EntityStore {
        EntityStore::new(self.db.clone(), self.locks.clone())
    }

    pub fn query_service(&self) -> QueryService {
        QueryService::new(
            OrderRepository::new(self.db.clone()),
            TourRepository::new(self.db.clone()),
            self.cache.clone(),
        )
    }

    pub fn edit_service(&self) -> EditService {
        EditService::new(self.entity_store(), self.cache.clone())
    }

    pub fn sync_service(&self) -> SyncService {
        SyncService::new(self.source.clone(), self.entity_store(), self.cache.clone())
    }
}
