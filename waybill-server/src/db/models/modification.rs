//! 字段修改状态
//!
//! 内嵌在 Order / Tour 上（serde flatten），数据和保护状态
//! 随同一行一起原子提交。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-entity record of which fields were hand-edited, by whom and when.
///
/// `modified_fields` is an ordered set: first-marked first, no duplicates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModificationState {
    #[serde(default)]
    pub is_modified: bool,
    #[serde(default)]
    pub modified_fields: Vec<String>,
    pub last_modified_by: Option<String>,
    pub last_modified_at: Option<DateTime<Utc>>,
}
