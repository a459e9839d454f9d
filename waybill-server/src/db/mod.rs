//! Database Module
//!
//! 嵌入式 SurrealDB：磁盘上使用 RocksDb 引擎，测试里使用 Mem 引擎。
//! 索引定义在启动时幂等执行。

pub mod models;
pub mod repository;
pub mod store;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem, RocksDb};

use crate::utils::AppError;

pub use store::EntityStore;

const NAMESPACE: &str = "waybill";
const DATABASE: &str = "main";

/// Database service, owns the embedded SurrealDB handle
#[derive(Clone)]
pub struct DbService {
    pub db: Surreal<Db>,
}

impl DbService {
    /// Open (or create) the on-disk database at `db_path`.
    pub async fn open(db_path: &str) -> Result<Self, AppError> {
        let db = Surreal::new::<RocksDb>(db_path)
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database: {e}")))?;
        Self::init(db).await
    }

    /// In-memory database for tests.
    pub async fn open_memory() -> Result<Self, AppError> {
        let db = Surreal::new::<Mem>(())
            .await
            .map_err(|e| AppError::Database(format!("Failed to open in-memory database: {e}")))?;
        Self::init(db).await
    }

    async fn init(db: Surreal<Db>) -> Result<Self, AppError> {
        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| AppError::Database(format!("Failed to select namespace: {e}")))?;

        // 幂等索引定义，替代迁移文件
        db.query(
            "
            DEFINE INDEX IF NOT EXISTS order_client_date ON TABLE order COLUMNS client_id, date;
            DEFINE INDEX IF NOT EXISTS order_tour ON TABLE order COLUMNS tour_id;
            DEFINE INDEX IF NOT EXISTS order_rider_vehicle ON TABLE order COLUMNS rider_name, vehicle_registration;
            DEFINE INDEX IF NOT EXISTS line_item_order ON TABLE line_item COLUMNS order_id;
            DEFINE INDEX IF NOT EXISTS tour_date_idx ON TABLE tour COLUMNS tour_date;
            ",
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to define indexes: {e}")))?;

        tracing::info!("Database ready (embedded SurrealDB, ns={NAMESPACE} db={DATABASE})");
        Ok(Self { db })
    }
}
