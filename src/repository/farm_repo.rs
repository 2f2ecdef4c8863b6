// ==========================================
// 肉鸡养殖台账系统 - 养殖场仓储
// ==========================================
// 职责: farm / farm_shed 表的 CRUD
// 红线: Repository 不含业务逻辑（容量校验在 engine 层）
// ==========================================

use crate::domain::farm::{Farm, NewFarm};
use crate::repository::codec::{format_datetime, parse_datetime};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct FarmRow {
    id: i64,
    name: String,
    location: Option<String>,
    capacity: i64,
    condition: Option<String>,
    created_at: String,
}

const FARM_COLUMNS: &str = "id, name, location, capacity, condition, created_at";

fn map_farm_row(row: &rusqlite::Row) -> SqliteResult<FarmRow> {
    Ok(FarmRow {
        id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
        capacity: row.get(3)?,
        condition: row.get(4)?,
        created_at: row.get(5)?,
    })
}

// ==========================================
// FarmRepository
// ==========================================
pub struct FarmRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FarmRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, farm_id: i64) -> RepositoryResult<Option<Farm>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, farm_id)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<Farm>> {
        let conn = self.get_conn()?;
        Self::list_all_tx(&conn)
    }

    // ==========================================
    // 事务内操作（调用方持有事务）
    // ==========================================

    pub fn insert_tx(
        conn: &Connection,
        farm: &NewFarm,
        created_at: NaiveDateTime,
    ) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO farm (name, location, capacity, condition, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                farm.name.trim(),
                farm.location,
                farm.capacity,
                farm.condition,
                format_datetime(created_at),
            ],
        )?;
        let farm_id = conn.last_insert_rowid();
        Self::write_sheds_tx(conn, farm_id, &farm.shed_capacities)?;
        Ok(farm_id)
    }

    pub fn update_tx(conn: &Connection, farm_id: i64, farm: &NewFarm) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE farm SET name = ?1, location = ?2, capacity = ?3, condition = ?4
            WHERE id = ?5
            "#,
            params![
                farm.name.trim(),
                farm.location,
                farm.capacity,
                farm.condition,
                farm_id
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Farm", farm_id));
        }

        conn.execute("DELETE FROM farm_shed WHERE farm_id = ?1", params![farm_id])?;
        Self::write_sheds_tx(conn, farm_id, &farm.shed_capacities)
    }

    fn write_sheds_tx(conn: &Connection, farm_id: i64, capacities: &[i64]) -> RepositoryResult<()> {
        let mut stmt = conn.prepare(
            "INSERT INTO farm_shed (farm_id, shed_index, capacity) VALUES (?1, ?2, ?3)",
        )?;
        for (idx, capacity) in capacities.iter().enumerate() {
            stmt.execute(params![farm_id, idx as i64, capacity])?;
        }
        Ok(())
    }

    pub fn find_by_id_tx(conn: &Connection, farm_id: i64) -> RepositoryResult<Option<Farm>> {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM farm WHERE id = ?1", FARM_COLUMNS),
                params![farm_id],
                map_farm_row,
            )
            .optional()?;

        match row {
            Some(row) => {
                let sheds = Self::load_sheds_tx(conn, &[row.id])?;
                Ok(Some(Self::assemble(row, &sheds)?))
            }
            None => Ok(None),
        }
    }

    /// 查询养殖场，不存在时返回 NotFound
    pub fn get_tx(conn: &Connection, farm_id: i64) -> RepositoryResult<Farm> {
        Self::find_by_id_tx(conn, farm_id)?.ok_or_else(|| RepositoryError::not_found("Farm", farm_id))
    }

    pub fn list_all_tx(conn: &Connection) -> RepositoryResult<Vec<Farm>> {
        let mut stmt = conn.prepare(&format!("SELECT {} FROM farm ORDER BY id", FARM_COLUMNS))?;
        let rows = stmt
            .query_map([], map_farm_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let sheds = Self::load_sheds_tx(conn, &ids)?;

        rows.into_iter()
            .map(|row| Self::assemble(row, &sheds))
            .collect()
    }

    pub fn delete_tx(conn: &Connection, farm_id: i64) -> RepositoryResult<()> {
        let rows = conn.execute("DELETE FROM farm WHERE id = ?1", params![farm_id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Farm", farm_id));
        }
        Ok(())
    }

    fn load_sheds_tx(conn: &Connection, farm_ids: &[i64]) -> RepositoryResult<HashMap<i64, Vec<i64>>> {
        let mut stmt = conn.prepare(
            "SELECT capacity FROM farm_shed WHERE farm_id = ?1 ORDER BY shed_index",
        )?;
        let mut sheds = HashMap::with_capacity(farm_ids.len());
        for farm_id in farm_ids {
            let capacities = stmt
                .query_map(params![farm_id], |row| row.get::<_, i64>(0))?
                .collect::<SqliteResult<Vec<_>>>()?;
            sheds.insert(*farm_id, capacities);
        }
        Ok(sheds)
    }

    fn assemble(row: FarmRow, sheds: &HashMap<i64, Vec<i64>>) -> RepositoryResult<Farm> {
        Ok(Farm {
            id: row.id,
            name: row.name,
            location: row.location,
            capacity: row.capacity,
            shed_capacities: sheds.get(&row.id).cloned().unwrap_or_default(),
            condition: row.condition,
            created_at: parse_datetime("farm.created_at", &row.created_at)?,
        })
    }
}
