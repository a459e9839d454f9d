//! 对账核心 - 保护人工修改不被快照覆盖
//!
//! # 模块结构
//!
//! - [`ledger`] - 字段修改台账（哪些字段被人工改过、谁改的、何时）
//! - [`snapshot`] - 上游快照字段访问（区分缺失 / null / 有值 / 类型错误）
//! - [`merge`] - 受保护合并引擎（逐字段落地快照，台账字段跳过）
//!
//! 台账只由编辑服务写入；合并引擎永远不会往 `modified_fields` 里加字段。

pub mod ledger;
pub mod merge;
pub mod snapshot;

pub use ledger::Editable;
pub use merge::MergeReport;
pub use snapshot::{FieldValue, SnapshotFields};

#[cfg(test)]
mod tests;
