//! 编辑服务 - 操作员改单与父实体传播
//!
//! # 模块结构
//!
//! - [`fields`] - 可编辑字段清单与类型化 setter 分发
//! - [`service`] - 编辑应用、台账登记、Tour → Order 传播
//!
//! 只有这里会往 `modified_fields` 写入，且只写调用方显式提交的字段。

pub mod fields;
pub mod service;

pub use service::{EditOutcome, EditService, LineItemInput, TourEditOutcome};

#[cfg(test)]
mod tests;
