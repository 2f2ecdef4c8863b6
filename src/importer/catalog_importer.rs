// ==========================================
// 肉鸡养殖台账系统 - 物料目录导入器
// ==========================================
// 职责: 从 CSV / Excel 文件批量导入饲料、药品、疫苗、保健耗材
// 流程: 解析 -> 逐行映射校验 -> 单事务落库
// 红线: 任一行失败整体回滚，错误指明行号与字段
// ==========================================

use crate::domain::catalog::NewCatalogItem;
use crate::domain::types::{CatalogKind, UnitType};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{RawRow, UniversalFileParser};
use crate::repository::{CatalogRepository, RepositoryError};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

/// 必需列
const REQUIRED_COLUMNS: [&str; 5] = ["kind", "name", "unit_type", "quantity_per_unit", "price"];

/// 导入结果
#[derive(Debug, Clone, Serialize)]
pub struct CatalogImportReport {
    pub total_rows: usize,
    pub imported: usize,
    /// 各类别导入数量
    pub by_kind: BTreeMap<String, usize>,
    pub item_ids: Vec<i64>,
    pub elapsed_ms: u128,
}

// ==========================================
// 行映射
// ==========================================

fn field<'a>(row: &'a RawRow, name: &str) -> &'a str {
    row.get(name).map(|v| v.trim()).unwrap_or("")
}

fn field_error(row_no: usize, name: &str, message: impl Into<String>) -> ImportError {
    ImportError::FieldValueError {
        row: row_no,
        field: name.to_string(),
        message: message.into(),
    }
}

fn parse_number(row: &RawRow, row_no: usize, name: &str) -> ImportResult<f64> {
    let raw = field(row, name);
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| field_error(row_no, name, format!("不是有效数字: '{}'", raw)))
}

/// 剂次日龄，分号分隔，如 "7;14;21"
fn parse_dose_ages(row: &RawRow, row_no: usize) -> ImportResult<Vec<u32>> {
    let raw = field(row, "dose_ages");
    raw.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>()
                .map_err(|_| field_error(row_no, "dose_ages", format!("不是有效日龄: '{}'", part)))
        })
        .collect()
}

/// 原始行 -> 新建物料
///
/// # 参数
/// - row_no: 文件中的行号（表头为第1行）
pub fn map_row(row: &RawRow, row_no: usize) -> ImportResult<NewCatalogItem> {
    let kind_raw = field(row, "kind").to_ascii_lowercase();
    let kind = CatalogKind::from_db_str(&kind_raw)
        .ok_or_else(|| field_error(row_no, "kind", format!("未知类别: '{}'", kind_raw)))?;

    let unit_raw = field(row, "unit_type");
    let unit_type = UnitType::from_db_str(unit_raw)
        .ok_or_else(|| field_error(row_no, "unit_type", format!("未知单位: '{}'", unit_raw)))?;

    let description = Some(field(row, "description"))
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    let item = NewCatalogItem {
        kind,
        name: field(row, "name").to_string(),
        unit_type,
        quantity_per_unit: parse_number(row, row_no, "quantity_per_unit")?,
        price: parse_number(row, row_no, "price")?,
        description,
        dose_ages: parse_dose_ages(row, row_no)?,
    };
    item.validate()
        .map_err(|msg| field_error(row_no, "row", msg))?;
    Ok(item)
}

// ==========================================
// CatalogImporter
// ==========================================
pub struct CatalogImporter {
    conn: Arc<Mutex<Connection>>,
    parser: UniversalFileParser,
}

impl CatalogImporter {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            parser: UniversalFileParser,
        }
    }

    /// 从文件导入物料目录
    #[instrument(skip(self, file_path), fields(file = %file_path.as_ref().display()))]
    pub fn import_file<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<CatalogImportReport> {
        let start = std::time::Instant::now();

        let rows = self.parser.parse(file_path.as_ref())?;
        if let Some(first) = rows.first() {
            if let Some(missing) = REQUIRED_COLUMNS.iter().find(|c| !first.contains_key(**c)) {
                return Err(ImportError::MissingColumn(missing.to_string()));
            }
        }
        debug!(total_rows = rows.len(), "文件解析完成");

        // 先完成全部映射，再开事务
        let items = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| map_row(row, idx + 2))
            .collect::<ImportResult<Vec<_>>>()?;

        let mut conn = self
            .conn
            .lock()
            .map_err(|e| ImportError::LockError(e.to_string()))?;
        let tx = conn.transaction()?;

        let mut item_ids = Vec::with_capacity(items.len());
        let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for (idx, item) in items.iter().enumerate() {
            let row_no = idx + 2;
            let item_id = CatalogRepository::insert_tx(&tx, item).map_err(|e| match e {
                RepositoryError::UniqueConstraintViolation(_) => ImportError::DuplicateItem {
                    row: row_no,
                    message: format!("{} '{}' 已存在", item.kind, item.name),
                },
                other => ImportError::DatabaseError(format!("行 {}: {}", row_no, other)),
            })?;
            item_ids.push(item_id);
            *by_kind.entry(item.kind.to_db_str().to_string()).or_insert(0) += 1;
        }

        tx.commit()?;

        let report = CatalogImportReport {
            total_rows: rows.len(),
            imported: item_ids.len(),
            by_kind,
            item_ids,
            elapsed_ms: start.elapsed().as_millis(),
        };
        info!(
            imported = report.imported,
            by_kind = ?report.by_kind,
            elapsed_ms = report.elapsed_ms,
            "物料目录导入完成"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_map_row_vaccine_with_dose_ages() {
        let r = row(&[
            ("kind", "Vaccine"),
            ("name", "新城疫"),
            ("unit_type", "dose"),
            ("quantity_per_unit", "1000"),
            ("price", "35"),
            ("dose_ages", "7; 14;21"),
        ]);

        let item = map_row(&r, 2).unwrap();
        assert_eq!(item.kind, CatalogKind::Vaccine);
        assert_eq!(item.dose_ages, vec![7, 14, 21]);
        assert_eq!(item.description, None);
    }

    #[test]
    fn test_map_row_reports_row_and_field() {
        let r = row(&[
            ("kind", "feed"),
            ("name", "玉米料"),
            ("unit_type", "packet"),
            ("quantity_per_unit", "50"),
            ("price", "abc"),
        ]);

        match map_row(&r, 5) {
            Err(ImportError::FieldValueError { row, field, .. }) => {
                assert_eq!(row, 5);
                assert_eq!(field, "price");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_map_row_unknown_kind() {
        let r = row(&[("kind", "toy"), ("name", "x"), ("unit_type", "kg")]);
        assert!(matches!(
            map_row(&r, 3),
            Err(ImportError::FieldValueError { field, .. }) if field == "kind"
        ));
    }
}
