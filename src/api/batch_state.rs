// ==========================================
// 肉鸡养殖台账系统 - 批次状态写入与对账
// ==========================================
// 职责: 所有改变批次计数器的操作共用的收尾步骤
//   1) 带 revision 写入新计数器
//   2) 状态对账（自动结批 / 退回出栏中 / 重算汇总）
//   3) 按对账结果写入或删除财务汇总
// 红线: 必须在调用方的同一事务内执行，且在明细写入之后
// ==========================================

use crate::api::error::ApiResult;
use crate::config::LedgerSettings;
use crate::domain::batch::{Batch, BatchCounters};
use crate::domain::financial::{FinancialFigures, FinancialSummary};
use crate::engine::financial::{BatchHistory, FinancialCalculator};
use crate::engine::lifecycle::{BatchLifecycleEngine, StatusChange};
use crate::repository::{BatchRepository, FinancialRepository, HarvestRepository, LedgerRepository};
use chrono::{NaiveDateTime, Timelike};
use rusqlite::Connection;
use tracing::{debug, info};

/// 当前本地时间（秒级）
pub(crate) fn now() -> NaiveDateTime {
    let ts = chrono::Local::now().naive_local();
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// 由数据库中的完整历史计算财务数据（不写入）
pub(crate) fn compute_figures_tx(
    conn: &Connection,
    batch: &Batch,
    settings: &LedgerSettings,
) -> ApiResult<FinancialFigures> {
    let history = BatchHistory {
        batch: batch.clone(),
        updates: LedgerRepository::list_by_batch_tx(conn, batch.id)?,
        harvests: HarvestRepository::list_by_batch_tx(conn, batch.id)?,
    };
    let rates = FinancialRepository::list_fcr_rates_tx(conn)?;

    Ok(FinancialCalculator::new(settings.feed_residual_valuation).calculate(&history, &rates))
}

/// 计算并写入财务汇总
pub(crate) fn store_summary_tx(
    conn: &Connection,
    batch: &Batch,
    settings: &LedgerSettings,
) -> ApiResult<FinancialSummary> {
    let figures = compute_figures_tx(conn, batch, settings)?;
    let summary = FinancialSummary {
        batch_id: batch.id,
        figures,
        computed_at: now(),
    };
    FinancialRepository::upsert_summary_tx(conn, &summary)?;

    info!(
        batch_id = batch.id,
        total_profit = figures.total_profit,
        fcr_value = figures.fcr_value,
        "财务汇总已写入"
    );
    Ok(summary)
}

/// 按状态变化维护财务汇总
pub(crate) fn apply_status_change_tx(
    conn: &Connection,
    batch: &Batch,
    change: StatusChange,
    settings: &LedgerSettings,
) -> ApiResult<()> {
    match change {
        StatusChange::Close => {
            info!(batch_id = batch.id, "批次已结批");
            store_summary_tx(conn, batch, settings)?;
        }
        StatusChange::Recompute => {
            store_summary_tx(conn, batch, settings)?;
        }
        StatusChange::Reopen => {
            FinancialRepository::delete_summary_tx(conn, batch.id)?;
            info!(
                batch_id = batch.id,
                available_birds = batch.counters.available_birds,
                "存栏恢复，批次退回出栏中，财务汇总已删除"
            );
        }
        StatusChange::Unchanged => {}
    }
    Ok(())
}

/// 写入新计数器并执行状态对账
///
/// # 返回
/// 写入后的批次（新状态、新 revision）
pub(crate) fn commit_counters_tx(
    conn: &Connection,
    batch: &Batch,
    counters: BatchCounters,
    settings: &LedgerSettings,
) -> ApiResult<Batch> {
    let change = BatchLifecycleEngine::new().reconcile(batch.status, counters.available_birds);
    let status = change.target_status(batch.status);

    let revision = BatchRepository::update_state_tx(conn, batch.id, batch.revision, &counters, status)?;

    debug!(
        batch_id = batch.id,
        available_birds = counters.available_birds,
        total_mortality = counters.total_mortality,
        feed_stock = counters.feed_stock,
        feed_usage = counters.feed_usage,
        status = %status,
        change = ?change,
        "批次计数器已写入"
    );

    let updated = Batch {
        counters,
        status,
        revision,
        ..batch.clone()
    };
    apply_status_change_tx(conn, &updated, change, settings)?;
    Ok(updated)
}
