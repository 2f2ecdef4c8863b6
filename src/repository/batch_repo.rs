// ==========================================
// 肉鸡养殖台账系统 - 批次仓储
// ==========================================
// 职责: batch / batch_shed 表的 CRUD
// 并发: 计数器与状态写入带 revision 乐观锁检查
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::batch::{Batch, BatchCounters, NewBatch};
use crate::domain::types::BatchStatus;
use crate::repository::codec::{format_datetime, parse_batch_status, parse_datetime};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

struct BatchRow {
    id: i64,
    farm_id: i64,
    farm_batch_number: i64,
    manager_id: Option<i64>,
    total_birds: i64,
    extra_chicks: i64,
    available_birds: i64,
    total_mortality: i64,
    feed_stock: f64,
    feed_usage: f64,
    cost_per_chicken: f64,
    status: String,
    created_at: String,
    revision: i64,
}

const BATCH_COLUMNS: &str = r#"
    id, farm_id, farm_batch_number, manager_id,
    total_birds, extra_chicks, available_birds, total_mortality,
    feed_stock, feed_usage, cost_per_chicken, status, created_at, revision
"#;

fn map_batch_row(row: &rusqlite::Row) -> SqliteResult<BatchRow> {
    Ok(BatchRow {
        id: row.get(0)?,
        farm_id: row.get(1)?,
        farm_batch_number: row.get(2)?,
        manager_id: row.get(3)?,
        total_birds: row.get(4)?,
        extra_chicks: row.get(5)?,
        available_birds: row.get(6)?,
        total_mortality: row.get(7)?,
        feed_stock: row.get(8)?,
        feed_usage: row.get(9)?,
        cost_per_chicken: row.get(10)?,
        status: row.get(11)?,
        created_at: row.get(12)?,
        revision: row.get(13)?,
    })
}

/// 批次基础信息修改（已由 API 层合并为完整值）
#[derive(Debug, Clone, PartialEq)]
pub struct BatchDetails {
    pub manager_id: Option<i64>,
    pub cost_per_chicken: f64,
    pub extra_chicks: i64,
    pub created_at: NaiveDateTime,
}

// ==========================================
// BatchRepository
// ==========================================
pub struct BatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BatchRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, batch_id: i64) -> RepositoryResult<Option<Batch>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, batch_id)
    }

    pub fn list_by_farm(&self, farm_id: Option<i64>) -> RepositoryResult<Vec<Batch>> {
        let conn = self.get_conn()?;
        Self::list_by_farm_tx(&conn, farm_id)
    }

    pub fn list_by_manager(&self, manager_id: i64) -> RepositoryResult<Vec<Batch>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM batch WHERE manager_id = ?1 ORDER BY created_at DESC, id DESC",
            BATCH_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![manager_id], map_batch_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        rows.into_iter().map(|row| Self::assemble(&conn, row)).collect()
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    /// 场内下一个批次序号（从 1 开始）
    pub fn next_farm_batch_number_tx(conn: &Connection, farm_id: i64) -> RepositoryResult<i64> {
        let max: Option<i64> = conn.query_row(
            "SELECT MAX(farm_batch_number) FROM batch WHERE farm_id = ?1",
            params![farm_id],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0) + 1)
    }

    pub fn insert_tx(
        conn: &Connection,
        batch: &NewBatch,
        farm_batch_number: i64,
        counters: &BatchCounters,
        status: BatchStatus,
    ) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO batch (
                farm_id, farm_batch_number, manager_id,
                total_birds, extra_chicks, available_birds, total_mortality,
                feed_stock, feed_usage, cost_per_chicken, status, created_at, revision
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0)
            "#,
            params![
                batch.farm_id,
                farm_batch_number,
                batch.manager_id,
                batch.total_birds(),
                batch.extra_chicks,
                counters.available_birds,
                counters.total_mortality,
                counters.feed_stock,
                counters.feed_usage,
                batch.cost_per_chicken,
                status.to_db_str(),
                format_datetime(batch.created_at),
            ],
        )?;
        let batch_id = conn.last_insert_rowid();

        let mut stmt = conn.prepare(
            "INSERT INTO batch_shed (batch_id, shed_index, birds) VALUES (?1, ?2, ?3)",
        )?;
        for (idx, birds) in batch.shed_birds.iter().enumerate() {
            stmt.execute(params![batch_id, idx as i64, birds])?;
        }

        Ok(batch_id)
    }

    pub fn find_by_id_tx(conn: &Connection, batch_id: i64) -> RepositoryResult<Option<Batch>> {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM batch WHERE id = ?1", BATCH_COLUMNS),
                params![batch_id],
                map_batch_row,
            )
            .optional()?;

        match row {
            Some(row) => Ok(Some(Self::assemble(conn, row)?)),
            None => Ok(None),
        }
    }

    pub fn get_tx(conn: &Connection, batch_id: i64) -> RepositoryResult<Batch> {
        Self::find_by_id_tx(conn, batch_id)?.ok_or_else(|| RepositoryError::not_found("Batch", batch_id))
    }

    pub fn list_by_farm_tx(conn: &Connection, farm_id: Option<i64>) -> RepositoryResult<Vec<Batch>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM batch WHERE (?1 IS NULL OR farm_id = ?1) ORDER BY farm_id, farm_batch_number",
            BATCH_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![farm_id], map_batch_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        rows.into_iter().map(|row| Self::assemble(conn, row)).collect()
    }

    pub fn count_by_farm_tx(conn: &Connection, farm_id: i64) -> RepositoryResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM batch WHERE farm_id = ?1",
            params![farm_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 场内在养批次（ongoing/closing）的分舍入栏数
    ///
    /// # 参数
    /// - exclude_batch_id: 需要排除的批次（修改自身时）
    pub fn active_allocations_tx(
        conn: &Connection,
        farm_id: i64,
        exclude_batch_id: Option<i64>,
    ) -> RepositoryResult<Vec<Vec<i64>>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id FROM batch
            WHERE farm_id = ?1 AND status IN ('ongoing', 'closing')
              AND (?2 IS NULL OR id <> ?2)
            ORDER BY id
            "#,
        )?;
        let ids = stmt
            .query_map(params![farm_id, exclude_batch_id], |row| row.get::<_, i64>(0))?
            .collect::<SqliteResult<Vec<_>>>()?;

        ids.iter()
            .map(|id| Self::load_shed_birds_tx(conn, *id))
            .collect()
    }

    /// 写入计数器与状态（乐观锁）
    ///
    /// # 返回
    /// 新的 revision
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision 不匹配
    /// - `RepositoryError::NotFound`: 批次不存在
    pub fn update_state_tx(
        conn: &Connection,
        batch_id: i64,
        expected_revision: i64,
        counters: &BatchCounters,
        status: BatchStatus,
    ) -> RepositoryResult<i64> {
        let rows = conn.execute(
            r#"
            UPDATE batch
            SET available_birds = ?1, total_mortality = ?2, feed_stock = ?3, feed_usage = ?4,
                status = ?5, revision = revision + 1
            WHERE id = ?6 AND revision = ?7
            "#,
            params![
                counters.available_birds,
                counters.total_mortality,
                counters.feed_stock,
                counters.feed_usage,
                status.to_db_str(),
                batch_id,
                expected_revision,
            ],
        )?;

        if rows == 0 {
            return Err(Self::revision_mismatch_tx(conn, batch_id, expected_revision));
        }
        Ok(expected_revision + 1)
    }

    /// 修改批次基础信息（乐观锁）
    pub fn update_details_tx(
        conn: &Connection,
        batch_id: i64,
        expected_revision: i64,
        details: &BatchDetails,
    ) -> RepositoryResult<i64> {
        let rows = conn.execute(
            r#"
            UPDATE batch
            SET manager_id = ?1, cost_per_chicken = ?2, extra_chicks = ?3, created_at = ?4,
                revision = revision + 1
            WHERE id = ?5 AND revision = ?6
            "#,
            params![
                details.manager_id,
                details.cost_per_chicken,
                details.extra_chicks,
                format_datetime(details.created_at),
                batch_id,
                expected_revision,
            ],
        )?;

        if rows == 0 {
            return Err(Self::revision_mismatch_tx(conn, batch_id, expected_revision));
        }
        Ok(expected_revision + 1)
    }

    fn revision_mismatch_tx(conn: &Connection, batch_id: i64, expected: i64) -> RepositoryError {
        let actual: Result<Option<i64>, _> = conn
            .query_row(
                "SELECT revision FROM batch WHERE id = ?1",
                params![batch_id],
                |row| row.get(0),
            )
            .optional();

        match actual {
            Ok(Some(actual)) => RepositoryError::OptimisticLockFailure {
                batch_id,
                expected,
                actual,
            },
            Ok(None) => RepositoryError::not_found("Batch", batch_id),
            Err(e) => e.into(),
        }
    }

    pub fn delete_tx(conn: &Connection, batch_id: i64) -> RepositoryResult<()> {
        let rows = conn.execute("DELETE FROM batch WHERE id = ?1", params![batch_id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Batch", batch_id));
        }
        Ok(())
    }

    fn load_shed_birds_tx(conn: &Connection, batch_id: i64) -> RepositoryResult<Vec<i64>> {
        let mut stmt = conn.prepare(
            "SELECT birds FROM batch_shed WHERE batch_id = ?1 ORDER BY shed_index",
        )?;
        let birds = stmt
            .query_map(params![batch_id], |row| row.get::<_, i64>(0))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(birds)
    }

    fn assemble(conn: &Connection, row: BatchRow) -> RepositoryResult<Batch> {
        Ok(Batch {
            id: row.id,
            farm_id: row.farm_id,
            farm_batch_number: row.farm_batch_number,
            manager_id: row.manager_id,
            total_birds: row.total_birds,
            extra_chicks: row.extra_chicks,
            shed_birds: Self::load_shed_birds_tx(conn, row.id)?,
            counters: BatchCounters {
                available_birds: row.available_birds,
                total_mortality: row.total_mortality,
                feed_stock: row.feed_stock,
                feed_usage: row.feed_usage,
            },
            cost_per_chicken: row.cost_per_chicken,
            status: parse_batch_status(&row.status)?,
            created_at: parse_datetime("batch.created_at", &row.created_at)?,
            revision: row.revision,
        })
    }
}
