// ==========================================
// 肉鸡养殖台账系统 - 物料目录仓储
// ==========================================
// 职责: catalog_item / vaccine_dose_age 表的 CRUD
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::catalog::{CatalogItem, NewCatalogItem};
use crate::domain::types::CatalogKind;
use crate::repository::codec::{parse_catalog_kind, parse_unit_type};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct CatalogRow {
    id: i64,
    kind: String,
    name: String,
    unit_type: String,
    quantity_per_unit: f64,
    price: f64,
    description: Option<String>,
}

const CATALOG_COLUMNS: &str =
    "id, kind, name, unit_type, quantity_per_unit, price, description";

fn map_catalog_row(row: &rusqlite::Row) -> SqliteResult<CatalogRow> {
    Ok(CatalogRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        name: row.get(2)?,
        unit_type: row.get(3)?,
        quantity_per_unit: row.get(4)?,
        price: row.get(5)?,
        description: row.get(6)?,
    })
}

// ==========================================
// CatalogRepository
// ==========================================
pub struct CatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, item_id: i64) -> RepositoryResult<Option<CatalogItem>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, item_id)
    }

    pub fn list_by_kind(&self, kind: Option<CatalogKind>) -> RepositoryResult<Vec<CatalogItem>> {
        let conn = self.get_conn()?;
        Self::list_by_kind_tx(&conn, kind)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub fn insert_tx(conn: &Connection, item: &NewCatalogItem) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO catalog_item (kind, name, unit_type, quantity_per_unit, price, description)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                item.kind.to_db_str(),
                item.name.trim(),
                item.unit_type.to_db_str(),
                item.quantity_per_unit,
                item.price,
                item.description,
            ],
        )?;
        let item_id = conn.last_insert_rowid();
        Self::write_dose_ages_tx(conn, item_id, &item.dose_ages)?;
        Ok(item_id)
    }

    /// 更新物料（类别不可变更，由调用方保证）
    pub fn update_tx(conn: &Connection, item_id: i64, item: &NewCatalogItem) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE catalog_item
            SET name = ?1, unit_type = ?2, quantity_per_unit = ?3, price = ?4, description = ?5
            WHERE id = ?6
            "#,
            params![
                item.name.trim(),
                item.unit_type.to_db_str(),
                item.quantity_per_unit,
                item.price,
                item.description,
                item_id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("CatalogItem", item_id));
        }

        conn.execute(
            "DELETE FROM vaccine_dose_age WHERE vaccine_id = ?1",
            params![item_id],
        )?;
        Self::write_dose_ages_tx(conn, item_id, &item.dose_ages)
    }

    pub fn update_price_tx(conn: &Connection, item_id: i64, price: f64) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE catalog_item SET price = ?1 WHERE id = ?2",
            params![price, item_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("CatalogItem", item_id));
        }
        Ok(())
    }

    fn write_dose_ages_tx(conn: &Connection, item_id: i64, dose_ages: &[u32]) -> RepositoryResult<()> {
        let mut stmt = conn.prepare(
            "INSERT INTO vaccine_dose_age (vaccine_id, dose_number, age_days) VALUES (?1, ?2, ?3)",
        )?;
        for (idx, age) in dose_ages.iter().enumerate() {
            stmt.execute(params![item_id, idx as i64 + 1, age])?;
        }
        Ok(())
    }

    pub fn find_by_id_tx(conn: &Connection, item_id: i64) -> RepositoryResult<Option<CatalogItem>> {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM catalog_item WHERE id = ?1", CATALOG_COLUMNS),
                params![item_id],
                map_catalog_row,
            )
            .optional()?;

        match row {
            Some(row) => Ok(Some(Self::assemble(conn, row)?)),
            None => Ok(None),
        }
    }

    pub fn get_tx(conn: &Connection, item_id: i64) -> RepositoryResult<CatalogItem> {
        Self::find_by_id_tx(conn, item_id)?
            .ok_or_else(|| RepositoryError::not_found("CatalogItem", item_id))
    }

    /// 批量查询（忽略不存在的ID）
    pub fn find_many_tx(conn: &Connection, ids: &[i64]) -> RepositoryResult<HashMap<i64, CatalogItem>> {
        let mut items = HashMap::with_capacity(ids.len());
        for id in ids {
            if items.contains_key(id) {
                continue;
            }
            if let Some(item) = Self::find_by_id_tx(conn, *id)? {
                items.insert(*id, item);
            }
        }
        Ok(items)
    }

    pub fn list_by_kind_tx(
        conn: &Connection,
        kind: Option<CatalogKind>,
    ) -> RepositoryResult<Vec<CatalogItem>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM catalog_item WHERE (?1 IS NULL OR kind = ?1) ORDER BY kind, name",
            CATALOG_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![kind.map(|k| k.to_db_str())], map_catalog_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        rows.into_iter()
            .map(|row| Self::assemble(conn, row))
            .collect()
    }

    /// 统计引用该物料的台账明细、计划与模板数
    pub fn count_references_tx(conn: &Connection, item_id: i64) -> RepositoryResult<i64> {
        let count: i64 = conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM batch_update_feed WHERE feed_id = ?1)
              + (SELECT COUNT(*) FROM batch_feed_return WHERE feed_id = ?1)
              + (SELECT COUNT(*) FROM batch_update_item WHERE item_id = ?1)
              + (SELECT COUNT(*) FROM treatment_schedule WHERE item_id = ?1)
              + (SELECT COUNT(*) FROM auto_schedule WHERE item_id = ?1)
            "#,
            params![item_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn delete_tx(conn: &Connection, item_id: i64) -> RepositoryResult<()> {
        let rows = conn.execute("DELETE FROM catalog_item WHERE id = ?1", params![item_id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("CatalogItem", item_id));
        }
        Ok(())
    }

    fn assemble(conn: &Connection, row: CatalogRow) -> RepositoryResult<CatalogItem> {
        let kind = parse_catalog_kind("catalog_item.kind", &row.kind)?;
        let dose_ages = if kind == CatalogKind::Vaccine {
            let mut stmt = conn.prepare(
                "SELECT age_days FROM vaccine_dose_age WHERE vaccine_id = ?1 ORDER BY dose_number",
            )?;
            let ages = stmt
                .query_map(params![row.id], |r| r.get::<_, u32>(0))?
                .collect::<SqliteResult<Vec<_>>>()?;
            ages
        } else {
            Vec::new()
        };

        Ok(CatalogItem {
            id: row.id,
            kind,
            name: row.name,
            unit_type: parse_unit_type(&row.unit_type)?,
            quantity_per_unit: row.quantity_per_unit,
            price: row.price,
            description: row.description,
            dose_ages,
        })
    }
}
