// ==========================================
// 肉鸡养殖台账系统 - 治疗计划仓储
// ==========================================
// 职责:
//   - treatment_schedule / schedule_batch（计划与批次多对多）
//   - auto_schedule / auto_schedule_offset（自动计划模板）
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::schedule::{AutoSchedule, ScheduleTarget, TreatmentSchedule};
use crate::domain::types::CatalogKind;
use crate::repository::codec::{format_date, parse_catalog_kind, parse_date};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

struct ScheduleRow {
    id: i64,
    kind: String,
    item_id: i64,
    dose_number: Option<u32>,
    scheduled_date: String,
    completed: bool,
    notes: Option<String>,
}

const SCHEDULE_COLUMNS: &str =
    "s.id, s.kind, s.item_id, s.dose_number, s.scheduled_date, s.completed, s.notes";

fn map_schedule_row(row: &rusqlite::Row) -> SqliteResult<ScheduleRow> {
    Ok(ScheduleRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        item_id: row.get(2)?,
        dose_number: row.get(3)?,
        scheduled_date: row.get(4)?,
        completed: row.get(5)?,
        notes: row.get(6)?,
    })
}

// ==========================================
// ScheduleRepository
// ==========================================
pub struct ScheduleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScheduleRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, schedule_id: i64) -> RepositoryResult<Option<TreatmentSchedule>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, schedule_id)
    }

    pub fn list_for_batch(&self, batch_id: i64) -> RepositoryResult<Vec<TreatmentSchedule>> {
        let conn = self.get_conn()?;
        Self::list_for_batch_tx(&conn, batch_id)
    }

    pub fn due_on(&self, batch_id: i64, date: NaiveDate) -> RepositoryResult<Vec<TreatmentSchedule>> {
        let conn = self.get_conn()?;
        Self::due_on_tx(&conn, batch_id, date)
    }

    pub fn list_auto_schedules(&self) -> RepositoryResult<Vec<AutoSchedule>> {
        let conn = self.get_conn()?;
        Self::list_auto_tx(&conn)
    }

    // ==========================================
    // 计划
    // ==========================================

    pub fn insert_tx(
        conn: &Connection,
        target: &ScheduleTarget,
        scheduled_date: NaiveDate,
        notes: Option<&str>,
    ) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO treatment_schedule (kind, item_id, dose_number, scheduled_date, completed, notes)
            VALUES (?1, ?2, ?3, ?4, 0, ?5)
            "#,
            params![
                target.kind().to_db_str(),
                target.item_id(),
                target.dose_number(),
                format_date(scheduled_date),
                notes,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 关联批次（已关联时忽略）
    pub fn link_batch_tx(conn: &Connection, schedule_id: i64, batch_id: i64) -> RepositoryResult<()> {
        conn.execute(
            "INSERT OR IGNORE INTO schedule_batch (schedule_id, batch_id) VALUES (?1, ?2)",
            params![schedule_id, batch_id],
        )?;
        Ok(())
    }

    pub fn count_links_tx(conn: &Connection, schedule_id: i64) -> RepositoryResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM schedule_batch WHERE schedule_id = ?1",
            params![schedule_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 设置完成标记
    ///
    /// # 返回
    /// 标记是否发生变化
    pub fn set_completed_tx(conn: &Connection, schedule_id: i64, completed: bool) -> RepositoryResult<bool> {
        let current: Option<bool> = conn
            .query_row(
                "SELECT completed FROM treatment_schedule WHERE id = ?1",
                params![schedule_id],
                |row| row.get(0),
            )
            .optional()?;

        match current {
            None => Err(RepositoryError::not_found("TreatmentSchedule", schedule_id)),
            Some(flag) if flag == completed => Ok(false),
            Some(_) => {
                conn.execute(
                    "UPDATE treatment_schedule SET completed = ?1 WHERE id = ?2",
                    params![completed, schedule_id],
                )?;
                Ok(true)
            }
        }
    }

    pub fn update_date_tx(conn: &Connection, schedule_id: i64, date: NaiveDate) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE treatment_schedule SET scheduled_date = ?1 WHERE id = ?2",
            params![format_date(date), schedule_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("TreatmentSchedule", schedule_id));
        }
        Ok(())
    }

    pub fn delete_tx(conn: &Connection, schedule_id: i64) -> RepositoryResult<()> {
        let rows = conn.execute(
            "DELETE FROM treatment_schedule WHERE id = ?1",
            params![schedule_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("TreatmentSchedule", schedule_id));
        }
        Ok(())
    }

    pub fn find_by_id_tx(conn: &Connection, schedule_id: i64) -> RepositoryResult<Option<TreatmentSchedule>> {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM treatment_schedule s WHERE s.id = ?1", SCHEDULE_COLUMNS),
                params![schedule_id],
                map_schedule_row,
            )
            .optional()?;

        match row {
            Some(row) => Ok(Some(Self::assemble(conn, row)?)),
            None => Ok(None),
        }
    }

    pub fn get_tx(conn: &Connection, schedule_id: i64) -> RepositoryResult<TreatmentSchedule> {
        Self::find_by_id_tx(conn, schedule_id)?
            .ok_or_else(|| RepositoryError::not_found("TreatmentSchedule", schedule_id))
    }

    /// 批次关联的全部计划ID
    pub fn ids_for_batch_tx(conn: &Connection, batch_id: i64) -> RepositoryResult<Vec<i64>> {
        let mut stmt = conn.prepare(
            "SELECT schedule_id FROM schedule_batch WHERE batch_id = ?1 ORDER BY schedule_id",
        )?;
        let ids = stmt
            .query_map(params![batch_id], |row| row.get::<_, i64>(0))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(ids)
    }

    pub fn list_for_batch_tx(conn: &Connection, batch_id: i64) -> RepositoryResult<Vec<TreatmentSchedule>> {
        Self::query_for_batch_tx(conn, batch_id, None)
    }

    /// 截至指定日期仍未完成的计划
    pub fn due_on_tx(
        conn: &Connection,
        batch_id: i64,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<TreatmentSchedule>> {
        Self::query_for_batch_tx(conn, batch_id, Some(date))
    }

    fn query_for_batch_tx(
        conn: &Connection,
        batch_id: i64,
        due_on: Option<NaiveDate>,
    ) -> RepositoryResult<Vec<TreatmentSchedule>> {
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {}
            FROM treatment_schedule s
            JOIN schedule_batch sb ON sb.schedule_id = s.id
            WHERE sb.batch_id = ?1
              AND (?2 IS NULL OR (s.completed = 0 AND s.scheduled_date <= ?2))
            ORDER BY s.scheduled_date, s.id
            "#,
            SCHEDULE_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![batch_id, due_on.map(format_date)], map_schedule_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        rows.into_iter().map(|row| Self::assemble(conn, row)).collect()
    }

    fn assemble(conn: &Connection, row: ScheduleRow) -> RepositoryResult<TreatmentSchedule> {
        let kind = parse_catalog_kind("treatment_schedule.kind", &row.kind)?;
        let target = ScheduleTarget::from_parts(kind, row.item_id, row.dose_number)
            .ok_or_else(|| RepositoryError::field_value("treatment_schedule.kind", "饲料不能作为计划对象"))?;

        let mut stmt = conn.prepare(
            "SELECT batch_id FROM schedule_batch WHERE schedule_id = ?1 ORDER BY batch_id",
        )?;
        let batch_ids = stmt
            .query_map(params![row.id], |r| r.get::<_, i64>(0))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(TreatmentSchedule {
            id: row.id,
            target,
            scheduled_date: parse_date("treatment_schedule.scheduled_date", &row.scheduled_date)?,
            completed: row.completed,
            notes: row.notes,
            batch_ids,
        })
    }

    // ==========================================
    // 自动计划模板
    // ==========================================

    /// 保存模板（同一物料只保留一份，偏移整体替换）
    pub fn save_auto_tx(
        conn: &Connection,
        kind: CatalogKind,
        item_id: i64,
        offsets: &[u32],
    ) -> RepositoryResult<i64> {
        conn.execute(
            "INSERT OR IGNORE INTO auto_schedule (kind, item_id) VALUES (?1, ?2)",
            params![kind.to_db_str(), item_id],
        )?;
        let auto_id: i64 = conn.query_row(
            "SELECT id FROM auto_schedule WHERE kind = ?1 AND item_id = ?2",
            params![kind.to_db_str(), item_id],
            |row| row.get(0),
        )?;

        conn.execute(
            "DELETE FROM auto_schedule_offset WHERE auto_schedule_id = ?1",
            params![auto_id],
        )?;
        let mut stmt = conn.prepare(
            "INSERT INTO auto_schedule_offset (auto_schedule_id, position, offset_days) VALUES (?1, ?2, ?3)",
        )?;
        for (position, offset) in offsets.iter().enumerate() {
            stmt.execute(params![auto_id, position as i64, offset])?;
        }

        Ok(auto_id)
    }

    pub fn list_auto_tx(conn: &Connection) -> RepositoryResult<Vec<AutoSchedule>> {
        let mut stmt = conn.prepare("SELECT id, kind, item_id FROM auto_schedule ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut offset_stmt = conn.prepare(
            "SELECT offset_days FROM auto_schedule_offset WHERE auto_schedule_id = ?1 ORDER BY position",
        )?;

        let mut templates = Vec::with_capacity(rows.len());
        for (id, kind, item_id) in rows {
            let offsets = offset_stmt
                .query_map(params![id], |row| row.get::<_, u32>(0))?
                .collect::<SqliteResult<Vec<_>>>()?;
            templates.push(AutoSchedule {
                id,
                kind: parse_catalog_kind("auto_schedule.kind", &kind)?,
                item_id,
                offsets,
            });
        }
        Ok(templates)
    }

    pub fn delete_auto_tx(conn: &Connection, auto_id: i64) -> RepositoryResult<()> {
        let rows = conn.execute("DELETE FROM auto_schedule WHERE id = ?1", params![auto_id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("AutoSchedule", auto_id));
        }
        Ok(())
    }
}
