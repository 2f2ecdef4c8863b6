// ==========================================
// 肉鸡养殖台账系统 - 财务汇总仓储
// ==========================================
// 职责: financial_summary（与已结批批次一对一）、fcr_rate 分档
// ==========================================

use crate::domain::financial::{FcrRate, FinancialFigures, FinancialSummary, NewFcrRate};
use crate::repository::codec::{format_datetime, parse_datetime};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct FinancialRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FinancialRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_summary(&self, batch_id: i64) -> RepositoryResult<Option<FinancialSummary>> {
        let conn = self.get_conn()?;
        Self::find_summary_tx(&conn, batch_id)
    }

    pub fn list_fcr_rates(&self) -> RepositoryResult<Vec<FcrRate>> {
        let conn = self.get_conn()?;
        Self::list_fcr_rates_tx(&conn)
    }

    // ==========================================
    // 财务汇总
    // ==========================================

    /// 写入或覆盖汇总
    pub fn upsert_summary_tx(conn: &Connection, summary: &FinancialSummary) -> RepositoryResult<()> {
        let f = &summary.figures;
        conn.execute(
            r#"
            INSERT INTO financial_summary (
                batch_id, feed_cost, medicine_cost, vaccine_cost, health_material_cost,
                misc_cost, bird_cost, total_cost, total_revenue, total_profit,
                feed_consumed_kg, total_weight_sold, birds_sold,
                fcr_value, fcr_rate, fcr_price, computed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            ON CONFLICT(batch_id) DO UPDATE SET
                feed_cost = excluded.feed_cost,
                medicine_cost = excluded.medicine_cost,
                vaccine_cost = excluded.vaccine_cost,
                health_material_cost = excluded.health_material_cost,
                misc_cost = excluded.misc_cost,
                bird_cost = excluded.bird_cost,
                total_cost = excluded.total_cost,
                total_revenue = excluded.total_revenue,
                total_profit = excluded.total_profit,
                feed_consumed_kg = excluded.feed_consumed_kg,
                total_weight_sold = excluded.total_weight_sold,
                birds_sold = excluded.birds_sold,
                fcr_value = excluded.fcr_value,
                fcr_rate = excluded.fcr_rate,
                fcr_price = excluded.fcr_price,
                computed_at = excluded.computed_at
            "#,
            params![
                summary.batch_id,
                f.feed_cost,
                f.medicine_cost,
                f.vaccine_cost,
                f.health_material_cost,
                f.misc_cost,
                f.bird_cost,
                f.total_cost,
                f.total_revenue,
                f.total_profit,
                f.feed_consumed_kg,
                f.total_weight_sold,
                f.birds_sold,
                f.fcr_value,
                f.fcr_rate,
                f.fcr_price,
                format_datetime(summary.computed_at),
            ],
        )?;
        Ok(())
    }

    /// 删除汇总
    ///
    /// # 返回
    /// 是否确有记录被删除
    pub fn delete_summary_tx(conn: &Connection, batch_id: i64) -> RepositoryResult<bool> {
        let rows = conn.execute(
            "DELETE FROM financial_summary WHERE batch_id = ?1",
            params![batch_id],
        )?;
        Ok(rows > 0)
    }

    pub fn find_summary_tx(conn: &Connection, batch_id: i64) -> RepositoryResult<Option<FinancialSummary>> {
        let row = conn
            .query_row(
                r#"
                SELECT feed_cost, medicine_cost, vaccine_cost, health_material_cost,
                       misc_cost, bird_cost, total_cost, total_revenue, total_profit,
                       feed_consumed_kg, total_weight_sold, birds_sold,
                       fcr_value, fcr_rate, fcr_price, computed_at
                FROM financial_summary WHERE batch_id = ?1
                "#,
                params![batch_id],
                |row| {
                    let figures = FinancialFigures {
                        feed_cost: row.get(0)?,
                        medicine_cost: row.get(1)?,
                        vaccine_cost: row.get(2)?,
                        health_material_cost: row.get(3)?,
                        misc_cost: row.get(4)?,
                        bird_cost: row.get(5)?,
                        total_cost: row.get(6)?,
                        total_revenue: row.get(7)?,
                        total_profit: row.get(8)?,
                        feed_consumed_kg: row.get(9)?,
                        total_weight_sold: row.get(10)?,
                        birds_sold: row.get(11)?,
                        fcr_value: row.get(12)?,
                        fcr_rate: row.get(13)?,
                        fcr_price: row.get(14)?,
                    };
                    Ok((figures, row.get::<_, String>(15)?))
                },
            )
            .optional()?;

        match row {
            Some((figures, computed_at)) => Ok(Some(FinancialSummary {
                batch_id,
                figures,
                computed_at: parse_datetime("financial_summary.computed_at", &computed_at)?,
            })),
            None => Ok(None),
        }
    }

    // ==========================================
    // 料肉比分档
    // ==========================================

    /// 整体替换分档（校验由调用方完成）
    pub fn replace_fcr_rates_tx(conn: &Connection, bands: &[NewFcrRate]) -> RepositoryResult<usize> {
        conn.execute("DELETE FROM fcr_rate", [])?;
        let mut stmt = conn.prepare(
            "INSERT INTO fcr_rate (lower_limit, upper_limit, rate) VALUES (?1, ?2, ?3)",
        )?;
        for band in bands {
            stmt.execute(params![band.lower_limit, band.upper_limit, band.rate])?;
        }
        Ok(bands.len())
    }

    /// 全部分档（按下限升序）
    pub fn list_fcr_rates_tx(conn: &Connection) -> RepositoryResult<Vec<FcrRate>> {
        let mut stmt = conn.prepare(
            "SELECT id, lower_limit, upper_limit, rate FROM fcr_rate ORDER BY lower_limit, id",
        )?;
        let rates = stmt
            .query_map([], |row| {
                Ok(FcrRate {
                    id: row.get(0)?,
                    lower_limit: row.get(1)?,
                    upper_limit: row.get(2)?,
                    rate: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rates)
    }
}
