//! Waybill Server - 配送订单对账看板后端
//!
//! # 架构概述
//!
//! 看板周期性地从上游 fleet API 拉取订单快照，操作员可以手工修正
//! 本地缓存的单个字段。核心是对账：快照反复重拉、重合并时，
//! 台账里登记过的人工修改永远不会被悄悄覆盖。
//!
//! # 模块结构
//!
//! ```text
//! waybill-server/src/
//! ├── core/       # 配置、状态、HTTP 服务器
//! ├── utils/      # 错误、日志、时间工具
//! ├── db/         # 嵌入式 SurrealDB、模型、repository、实体仓库
//! ├── reconcile/  # 修改台账 + 受保护合并引擎
//! ├── edits/      # 编辑服务（含 Tour → Order 传播）
//! ├── sync/       # 快照源 + 同步服务
//! ├── query/      # 带缓存的过滤查询
//! ├── cache/      # 查询缓存 (TTL + FIFO)
//! └── api/        # HTTP 路由和处理器
//! ```

pub mod api;
pub mod cache;
pub mod core;
pub mod db;
pub mod edits;
pub mod query;
pub mod reconcile;
pub mod sync;
pub mod utils;

// Re-export 公共类型
pub use crate::core::{Config, Server, ServerState};
pub use cache::QueryCache;
pub use db::EntityStore;
pub use edits::EditService;
pub use query::QueryService;
pub use sync::{RefreshMode, SnapshotSource, SyncService};
pub use utils::{AppError, AppResult};

/// 设置环境 (dotenv + 日志)
pub fn setup_environment() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    utils::logger::init_logger_with_file(log_level.as_deref(), log_dir.as_deref());

    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
 _      __            __    _ ____
| | /| / /___ _ __ __/ /   (_) / /
| |/ |/ // _ `// // / _ \ / / / /
|__/|__/ \_,_/ \_, /_.__//_/_/_/
              /___/
"#
    );
}
