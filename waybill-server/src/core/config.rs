//! 服务器配置 - 所有可调项
//!
//! # 环境变量
//!
//! | 环境变量 | 默认值 | 说明 |
//! |----------|--------|------|
//! | WORK_DIR | /var/lib/waybill | 工作目录（数据库、日志） |
//! | HTTP_PORT | 3000 | HTTP 服务端口 |
//! | ENVIRONMENT | development | 运行环境 |
//! | FLEET_API_URL | https://api.fleet.example.com | 上游 fleet API 地址 |
//! | FLEET_API_TOKEN | (空) | 上游 API bearer token |
//! | FLEET_CLIENT_KEY | demo-client | 默认 client key |
//! | FLEET_TEAM_ID | 101 | 上游 team id |
//! | REQUEST_TIMEOUT_MS | 30000 | 上游请求超时(毫秒) |
//! | CACHE_TTL_SECS | 300 | 查询缓存 TTL(秒) |
//! | CACHE_CAPACITY | 128 | 查询缓存容量(条目数) |
//!
//! # 示例
//!
//! ```ignore
//! WORK_DIR=/data/waybill HTTP_PORT=8080 cargo run
//! ```

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库和日志文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,

    // === 上游 fleet API ===
    /// 上游 API 地址
    pub fleet_api_url: String,
    /// 上游 API bearer token
    pub fleet_api_token: String,
    /// 刷新时的默认 client key
    pub fleet_client_key: String,
    /// 上游 team id
    pub fleet_team_id: String,
    /// 上游请求超时 (毫秒)
    pub request_timeout_ms: u64,

    // === 查询缓存 ===
    /// 缓存条目 TTL (秒)
    pub cache_ttl_secs: u64,
    /// 缓存容量 (条目数)
    pub cache_capacity: usize,
}

impl Config {
    /// 从环境变量加载配置，未设置的使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/waybill".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            fleet_api_url: std::env::var("FLEET_API_URL")
                .unwrap_or_else(|_| "https://api.fleet.example.com".into()),
            fleet_api_token: std::env::var("FLEET_API_TOKEN").unwrap_or_default(),
            fleet_client_key: std::env::var("FLEET_CLIENT_KEY")
                .unwrap_or_else(|_| "demo-client".into()),
            fleet_team_id: std::env::var("FLEET_TEAM_ID").unwrap_or_else(|_| "101".into()),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(30000),
            cache_ttl_secs: std::env::var("CACHE_TTL_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(300),
            cache_capacity: std::env::var("CACHE_CAPACITY")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(128),
        }
    }

    /// 确保工作目录结构存在
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.database_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }

    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    pub fn logs_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
