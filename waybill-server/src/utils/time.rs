//! 时间工具函数: 上游时间戳解析
//!
//! 上游 API 的时间戳是 ISO-8601 字符串，通常带 `Z` 后缀；
//! 统一在这里转换为 `DateTime<Utc>`。

use chrono::{DateTime, Utc};

/// 解析上游 ISO-8601 时间戳 (`2024-09-23T18:04:11Z` 或带偏移量)
///
/// 返回 `None` 表示无法解析，调用方自行决定跳过或报错。
pub fn parse_upstream_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_zulu_suffix() {
        let ts = parse_upstream_timestamp("2024-09-23T18:04:11Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-09-23T18:04:11+00:00");
    }

    #[test]
    fn parses_offset() {
        assert!(parse_upstream_timestamp("2024-09-23T18:04:11+02:00").is_some());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_upstream_timestamp("not-a-timestamp").is_none());
    }
}
