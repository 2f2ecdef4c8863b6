// ==========================================
// 肉鸡养殖台账系统 - 字段编解码
// ==========================================
// 日期/时间/枚举与 TEXT 列之间的转换
// 解析失败一律返回 FieldValueError，不做静默回退
// ==========================================

use crate::domain::types::{BatchStatus, CatalogKind, RemarksPriority, UnitType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_datetime(ts: NaiveDateTime) -> String {
    ts.format(DATETIME_FORMAT).to_string()
}

pub fn parse_date(field: &str, raw: &str) -> RepositoryResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| RepositoryError::field_value(field, format!("{}: {}", raw, e)))
}

pub fn parse_datetime(field: &str, raw: &str) -> RepositoryResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .map_err(|e| RepositoryError::field_value(field, format!("{}: {}", raw, e)))
}

pub fn parse_batch_status(raw: &str) -> RepositoryResult<BatchStatus> {
    BatchStatus::from_db_str(raw)
        .ok_or_else(|| RepositoryError::field_value("status", format!("未知批次状态: {}", raw)))
}

pub fn parse_catalog_kind(field: &str, raw: &str) -> RepositoryResult<CatalogKind> {
    CatalogKind::from_db_str(raw)
        .ok_or_else(|| RepositoryError::field_value(field, format!("未知物料类别: {}", raw)))
}

pub fn parse_unit_type(raw: &str) -> RepositoryResult<UnitType> {
    UnitType::from_db_str(raw)
        .ok_or_else(|| RepositoryError::field_value("unit_type", format!("未知计量单位: {}", raw)))
}

pub fn parse_remarks_priority(raw: &str) -> RepositoryResult<RemarksPriority> {
    RemarksPriority::from_db_str(raw).ok_or_else(|| {
        RepositoryError::field_value("remarks_priority", format!("未知优先级: {}", raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_roundtrip() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(parse_date("date", &format_date(d)).unwrap(), d);
    }

    #[test]
    fn test_parse_date_invalid() {
        let err = parse_date("date", "2024/02/29").unwrap_err();
        assert!(matches!(err, RepositoryError::FieldValueError { .. }));
    }

    #[test]
    fn test_parse_status_unknown() {
        assert!(parse_batch_status("archived").is_err());
        assert_eq!(parse_batch_status("closing").unwrap(), BatchStatus::Closing);
    }
}
