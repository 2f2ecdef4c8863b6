// ==========================================
// 肉鸡养殖台账系统 - 出栏记录仓储
// ==========================================

use crate::domain::harvest::{Harvest, NewHarvest};
use crate::repository::codec::{format_date, parse_date};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

struct HarvestRow {
    id: i64,
    batch_id: i64,
    date: String,
    quantity: i64,
    weight: f64,
    selling_price: f64,
    total_value: f64,
}

const HARVEST_COLUMNS: &str = "id, batch_id, date, quantity, weight, selling_price, total_value";

fn map_harvest_row(row: &rusqlite::Row) -> SqliteResult<HarvestRow> {
    Ok(HarvestRow {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        date: row.get(2)?,
        quantity: row.get(3)?,
        weight: row.get(4)?,
        selling_price: row.get(5)?,
        total_value: row.get(6)?,
    })
}

impl HarvestRow {
    fn into_harvest(self) -> RepositoryResult<Harvest> {
        Ok(Harvest {
            id: self.id,
            batch_id: self.batch_id,
            date: parse_date("harvest.date", &self.date)?,
            quantity: self.quantity,
            weight: self.weight,
            selling_price: self.selling_price,
            total_value: self.total_value,
        })
    }
}

pub struct HarvestRepository {
    conn: Arc<Mutex<Connection>>,
}

impl HarvestRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn list_by_batch(&self, batch_id: i64) -> RepositoryResult<Vec<Harvest>> {
        let conn = self.get_conn()?;
        Self::list_by_batch_tx(&conn, batch_id)
    }

    pub fn total_quantity(&self, batch_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::total_quantity_tx(&conn, batch_id)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub fn insert_tx(conn: &Connection, batch_id: i64, harvest: &NewHarvest) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO harvest (batch_id, date, quantity, weight, selling_price, total_value)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                batch_id,
                format_date(harvest.date),
                harvest.quantity,
                harvest.weight,
                harvest.selling_price,
                harvest.total_value(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_tx(conn: &Connection, harvest_id: i64, harvest: &NewHarvest) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE harvest
            SET date = ?1, quantity = ?2, weight = ?3, selling_price = ?4, total_value = ?5
            WHERE id = ?6
            "#,
            params![
                format_date(harvest.date),
                harvest.quantity,
                harvest.weight,
                harvest.selling_price,
                harvest.total_value(),
                harvest_id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Harvest", harvest_id));
        }
        Ok(())
    }

    pub fn get_tx(conn: &Connection, harvest_id: i64) -> RepositoryResult<Harvest> {
        conn.query_row(
            &format!("SELECT {} FROM harvest WHERE id = ?1", HARVEST_COLUMNS),
            params![harvest_id],
            map_harvest_row,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::not_found("Harvest", harvest_id))?
        .into_harvest()
    }

    pub fn list_by_batch_tx(conn: &Connection, batch_id: i64) -> RepositoryResult<Vec<Harvest>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM harvest WHERE batch_id = ?1 ORDER BY date, id",
            HARVEST_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![batch_id], map_harvest_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        rows.into_iter().map(HarvestRow::into_harvest).collect()
    }

    pub fn total_quantity_tx(conn: &Connection, batch_id: i64) -> RepositoryResult<i64> {
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(quantity), 0) FROM harvest WHERE batch_id = ?1",
            params![batch_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    pub fn delete_tx(conn: &Connection, harvest_id: i64) -> RepositoryResult<()> {
        let rows = conn.execute("DELETE FROM harvest WHERE id = ?1", params![harvest_id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Harvest", harvest_id));
        }
        Ok(())
    }
}
