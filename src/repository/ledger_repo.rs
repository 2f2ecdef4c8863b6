// ==========================================
// 肉鸡养殖台账系统 - 日报台账仓储
// ==========================================
// 职责: batch_update 及其明细表
//   - batch_update_feed   投料
//   - batch_feed_return   退料
//   - batch_update_item   药品/疫苗/保健耗材消耗
//   - miscellaneous_item  杂项
// 红线: Repository 不含业务逻辑（计数器差值在 engine 层计算）
// ==========================================

use crate::domain::catalog::ItemRef;
use crate::domain::ledger::{
    BatchUpdate, BatchUpdateDetail, ConsumedItemLine, FeedAllocationLine, FeedReturnLine,
    MiscItemLine, UpdateInput, UpdateLines,
};
use crate::repository::codec::{
    format_date, format_datetime, parse_catalog_kind, parse_date, parse_datetime,
    parse_remarks_priority, parse_unit_type,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

struct UpdateRow {
    id: i64,
    batch_id: i64,
    date: String,
    mortality_count: i64,
    feed_used: f64,
    avg_weight: f64,
    male_weight: Option<f64>,
    female_weight: Option<f64>,
    remarks: Option<String>,
    remarks_priority: String,
    created_at: String,
}

const UPDATE_COLUMNS: &str = r#"
    id, batch_id, date, mortality_count, feed_used, avg_weight,
    male_weight, female_weight, remarks, remarks_priority, created_at
"#;

fn map_update_row(row: &rusqlite::Row) -> SqliteResult<UpdateRow> {
    Ok(UpdateRow {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        date: row.get(2)?,
        mortality_count: row.get(3)?,
        feed_used: row.get(4)?,
        avg_weight: row.get(5)?,
        male_weight: row.get(6)?,
        female_weight: row.get(7)?,
        remarks: row.get(8)?,
        remarks_priority: row.get(9)?,
        created_at: row.get(10)?,
    })
}

impl UpdateRow {
    fn into_update(self) -> RepositoryResult<BatchUpdate> {
        Ok(BatchUpdate {
            id: self.id,
            batch_id: self.batch_id,
            date: parse_date("batch_update.date", &self.date)?,
            mortality_count: self.mortality_count,
            feed_used: self.feed_used,
            avg_weight: self.avg_weight,
            male_weight: self.male_weight,
            female_weight: self.female_weight,
            remarks: self.remarks,
            remarks_priority: parse_remarks_priority(&self.remarks_priority)?,
            created_at: parse_datetime("batch_update.created_at", &self.created_at)?,
        })
    }
}

struct ItemRow {
    item_type: String,
    item_id: i64,
    quantity: f64,
    quantity_per_unit_at_time: f64,
    unit_type: String,
    price_at_time: f64,
    total_cost: f64,
    schedule_id: Option<i64>,
    dose_number: Option<u32>,
}

// ==========================================
// LedgerRepository
// ==========================================
pub struct LedgerRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LedgerRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn get_detail(&self, update_id: i64) -> RepositoryResult<BatchUpdateDetail> {
        let conn = self.get_conn()?;
        Self::get_detail_tx(&conn, update_id)
    }

    pub fn list_by_batch(&self, batch_id: i64) -> RepositoryResult<Vec<BatchUpdateDetail>> {
        let conn = self.get_conn()?;
        Self::list_by_batch_tx(&conn, batch_id)
    }

    // ==========================================
    // 主记录
    // ==========================================

    pub fn find_id_by_date_tx(
        conn: &Connection,
        batch_id: i64,
        date: NaiveDate,
    ) -> RepositoryResult<Option<i64>> {
        let id = conn
            .query_row(
                "SELECT id FROM batch_update WHERE batch_id = ?1 AND date = ?2",
                params![batch_id, format_date(date)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn insert_tx(
        conn: &Connection,
        batch_id: i64,
        input: &UpdateInput,
        created_at: NaiveDateTime,
    ) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO batch_update (
                batch_id, date, mortality_count, feed_used, avg_weight,
                male_weight, female_weight, remarks, remarks_priority, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                batch_id,
                format_date(input.date),
                input.mortality_count,
                input.feed_used,
                input.avg_weight,
                input.male_weight,
                input.female_weight,
                input.remarks,
                input.remarks_priority.to_db_str(),
                format_datetime(created_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_header_tx(conn: &Connection, update_id: i64, input: &UpdateInput) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE batch_update
            SET date = ?1, mortality_count = ?2, feed_used = ?3, avg_weight = ?4,
                male_weight = ?5, female_weight = ?6, remarks = ?7, remarks_priority = ?8
            WHERE id = ?9
            "#,
            params![
                format_date(input.date),
                input.mortality_count,
                input.feed_used,
                input.avg_weight,
                input.male_weight,
                input.female_weight,
                input.remarks,
                input.remarks_priority.to_db_str(),
                update_id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("BatchUpdate", update_id));
        }
        Ok(())
    }

    pub fn get_tx(conn: &Connection, update_id: i64) -> RepositoryResult<BatchUpdate> {
        conn.query_row(
            &format!("SELECT {} FROM batch_update WHERE id = ?1", UPDATE_COLUMNS),
            params![update_id],
            map_update_row,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::not_found("BatchUpdate", update_id))?
        .into_update()
    }

    pub fn get_detail_tx(conn: &Connection, update_id: i64) -> RepositoryResult<BatchUpdateDetail> {
        let update = Self::get_tx(conn, update_id)?;
        let lines = Self::load_lines_tx(conn, update_id)?;
        Ok(BatchUpdateDetail { update, lines })
    }

    /// 批次全部日报（按日期升序）
    pub fn list_by_batch_tx(conn: &Connection, batch_id: i64) -> RepositoryResult<Vec<BatchUpdateDetail>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM batch_update WHERE batch_id = ?1 ORDER BY date, id",
            UPDATE_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![batch_id], map_update_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        rows.into_iter()
            .map(|row| {
                let update = row.into_update()?;
                let lines = Self::load_lines_tx(conn, update.id)?;
                Ok(BatchUpdateDetail { update, lines })
            })
            .collect()
    }

    /// 最近一次日报的平均体重
    pub fn latest_avg_weight_tx(conn: &Connection, batch_id: i64) -> RepositoryResult<Option<f64>> {
        let weight = conn
            .query_row(
                "SELECT avg_weight FROM batch_update WHERE batch_id = ?1 ORDER BY date DESC, id DESC LIMIT 1",
                params![batch_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(weight)
    }

    pub fn delete_tx(conn: &Connection, update_id: i64) -> RepositoryResult<()> {
        let rows = conn.execute("DELETE FROM batch_update WHERE id = ?1", params![update_id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("BatchUpdate", update_id));
        }
        Ok(())
    }

    // ==========================================
    // 明细
    // ==========================================

    pub fn insert_lines_tx(conn: &Connection, update_id: i64, lines: &UpdateLines) -> RepositoryResult<()> {
        let mut feed_stmt = conn.prepare(
            r#"
            INSERT INTO batch_update_feed (
                batch_update_id, feed_id, quantity, quantity_per_unit_at_time, price_at_time, total_cost
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )?;
        for feed in &lines.feeds {
            feed_stmt.execute(params![
                update_id,
                feed.feed_id,
                feed.quantity,
                feed.quantity_per_unit_at_time,
                feed.price_at_time,
                feed.total_cost,
            ])?;
        }

        let mut return_stmt = conn.prepare(
            r#"
            INSERT INTO batch_feed_return (
                batch_update_id, feed_id, quantity, quantity_per_unit_at_time, price_at_time
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )?;
        for ret in &lines.feed_returns {
            return_stmt.execute(params![
                update_id,
                ret.feed_id,
                ret.quantity,
                ret.quantity_per_unit_at_time,
                ret.price_at_time,
            ])?;
        }

        let mut item_stmt = conn.prepare(
            r#"
            INSERT INTO batch_update_item (
                batch_update_id, item_type, item_id, quantity, quantity_per_unit_at_time,
                unit_type, price_at_time, total_cost, schedule_id, dose_number
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )?;
        for item in &lines.items {
            item_stmt.execute(params![
                update_id,
                item.item.kind().to_db_str(),
                item.item.id(),
                item.quantity,
                item.quantity_per_unit_at_time,
                item.unit_type.to_db_str(),
                item.price_at_time,
                item.total_cost,
                item.schedule_id,
                item.item.dose_number(),
            ])?;
        }

        let mut misc_stmt = conn.prepare(
            r#"
            INSERT INTO miscellaneous_item (batch_update_id, name, quantity, unit_price, total_cost)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )?;
        for misc in &lines.misc_items {
            misc_stmt.execute(params![
                update_id,
                misc.name,
                misc.quantity,
                misc.unit_price,
                misc.total_cost,
            ])?;
        }

        Ok(())
    }

    pub fn delete_lines_tx(conn: &Connection, update_id: i64) -> RepositoryResult<()> {
        for table in [
            "batch_update_feed",
            "batch_feed_return",
            "batch_update_item",
            "miscellaneous_item",
        ] {
            conn.execute(
                &format!("DELETE FROM {} WHERE batch_update_id = ?1", table),
                params![update_id],
            )?;
        }
        Ok(())
    }

    pub fn load_lines_tx(conn: &Connection, update_id: i64) -> RepositoryResult<UpdateLines> {
        let mut feed_stmt = conn.prepare(
            r#"
            SELECT feed_id, quantity, quantity_per_unit_at_time, price_at_time, total_cost
            FROM batch_update_feed WHERE batch_update_id = ?1 ORDER BY id
            "#,
        )?;
        let feeds = feed_stmt
            .query_map(params![update_id], |row| {
                Ok(FeedAllocationLine {
                    feed_id: row.get(0)?,
                    quantity: row.get(1)?,
                    quantity_per_unit_at_time: row.get(2)?,
                    price_at_time: row.get(3)?,
                    total_cost: row.get(4)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut return_stmt = conn.prepare(
            r#"
            SELECT feed_id, quantity, quantity_per_unit_at_time, price_at_time
            FROM batch_feed_return WHERE batch_update_id = ?1 ORDER BY id
            "#,
        )?;
        let feed_returns = return_stmt
            .query_map(params![update_id], |row| {
                Ok(FeedReturnLine {
                    feed_id: row.get(0)?,
                    quantity: row.get(1)?,
                    quantity_per_unit_at_time: row.get(2)?,
                    price_at_time: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut item_stmt = conn.prepare(
            r#"
            SELECT item_type, item_id, quantity, quantity_per_unit_at_time, unit_type,
                   price_at_time, total_cost, schedule_id, dose_number
            FROM batch_update_item WHERE batch_update_id = ?1 ORDER BY id
            "#,
        )?;
        let item_rows = item_stmt
            .query_map(params![update_id], |row| {
                Ok(ItemRow {
                    item_type: row.get(0)?,
                    item_id: row.get(1)?,
                    quantity: row.get(2)?,
                    quantity_per_unit_at_time: row.get(3)?,
                    unit_type: row.get(4)?,
                    price_at_time: row.get(5)?,
                    total_cost: row.get(6)?,
                    schedule_id: row.get(7)?,
                    dose_number: row.get(8)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let items = item_rows
            .into_iter()
            .map(|row| {
                let kind = parse_catalog_kind("batch_update_item.item_type", &row.item_type)?;
                let item = ItemRef::from_parts(kind, row.item_id, row.dose_number).ok_or_else(|| {
                    RepositoryError::field_value("batch_update_item.item_type", "饲料不能作为消耗明细")
                })?;
                Ok(ConsumedItemLine {
                    item,
                    quantity: row.quantity,
                    quantity_per_unit_at_time: row.quantity_per_unit_at_time,
                    unit_type: parse_unit_type(&row.unit_type)?,
                    price_at_time: row.price_at_time,
                    total_cost: row.total_cost,
                    schedule_id: row.schedule_id,
                })
            })
            .collect::<RepositoryResult<Vec<_>>>()?;

        let mut misc_stmt = conn.prepare(
            r#"
            SELECT name, quantity, unit_price, total_cost
            FROM miscellaneous_item WHERE batch_update_id = ?1 ORDER BY id
            "#,
        )?;
        let misc_items = misc_stmt
            .query_map(params![update_id], |row| {
                Ok(MiscItemLine {
                    name: row.get(0)?,
                    quantity: row.get(1)?,
                    unit_price: row.get(2)?,
                    total_cost: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(UpdateLines {
            feeds,
            feed_returns,
            items,
            misc_items,
        })
    }

    /// 批次已入账的投料明细（可排除正在修改的日报）
    pub fn list_allocations_by_batch_tx(
        conn: &Connection,
        batch_id: i64,
        exclude_update_id: Option<i64>,
    ) -> RepositoryResult<Vec<FeedAllocationLine>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT f.feed_id, f.quantity, f.quantity_per_unit_at_time, f.price_at_time, f.total_cost
            FROM batch_update_feed f
            JOIN batch_update u ON u.id = f.batch_update_id
            WHERE u.batch_id = ?1 AND (?2 IS NULL OR u.id <> ?2)
            ORDER BY u.date, u.id, f.id
            "#,
        )?;
        let lines = stmt
            .query_map(params![batch_id, exclude_update_id], |row| {
                Ok(FeedAllocationLine {
                    feed_id: row.get(0)?,
                    quantity: row.get(1)?,
                    quantity_per_unit_at_time: row.get(2)?,
                    price_at_time: row.get(3)?,
                    total_cost: row.get(4)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(lines)
    }

    /// 仍引用该计划的消耗明细数
    pub fn count_schedule_references_tx(conn: &Connection, schedule_id: i64) -> RepositoryResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM batch_update_item WHERE schedule_id = ?1",
            params![schedule_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
