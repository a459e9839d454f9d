//! 同步服务 - 拉取上游快照并驱动批量 upsert
//!
//! # 模块结构
//!
//! - [`source`] - [`SnapshotSource`] trait 和上游 fleet API 客户端
//! - [`service`] - force / smart 刷新、跨天批次、取消点
//!
//! 上游拉取失败是瞬态错误：直接上报，已提交的进度保持有效。

pub mod service;
pub mod source;

pub use service::{RefreshMode, RefreshReport, SyncService};
pub use source::{FleetApiClient, SnapshotSource, SourceError};
