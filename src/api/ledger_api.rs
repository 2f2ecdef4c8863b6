// ==========================================
// 肉鸡养殖台账系统 - 日报台账 API
// ==========================================
// 职责: 日报录入/修改/删除，维护批次计数器与计划完成状态
// 红线: 修改只施加差值，删除精确抵消录入影响
// 红线: 明细写入、计数器写入、计划标记、状态对账同一事务
// ==========================================

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{info, instrument, warn};

use crate::api::batch_state::{commit_counters_tx, now};
use crate::api::error::{ApiError, ApiResult};
use crate::api::schedule_api::{complete_tx, reset_unreferenced_tx};
use crate::config::{ConfigManager, LedgerSettings};
use crate::domain::batch::{Batch, BatchCounters};
use crate::domain::catalog::ItemRef;
use crate::domain::ledger::{BatchUpdateDetail, UpdateInput, UpdateLines};
use crate::domain::schedule::ScheduleTarget;
use crate::engine::ledger::{LedgerEffect, LedgerEngine};
use crate::repository::{BatchRepository, CatalogRepository, LedgerRepository, ScheduleRepository};

/// 计划对象与消耗物料一致（疫苗还需剂次一致）
fn schedule_matches(target: &ScheduleTarget, item: &ItemRef) -> bool {
    target.kind() == item.kind()
        && target.item_id() == item.id()
        && target.dose_number() == item.dose_number()
}

/// 校验明细关联的计划存在且对象一致
fn check_schedule_links_tx(conn: &Connection, lines: &UpdateLines) -> ApiResult<()> {
    for line in &lines.items {
        let Some(schedule_id) = line.schedule_id else {
            continue;
        };
        let schedule = ScheduleRepository::find_by_id_tx(conn, schedule_id)?.ok_or_else(|| {
            ApiError::NotFound(format!("TreatmentSchedule(id={})不存在", schedule_id))
        })?;
        if !schedule_matches(&schedule.target, &line.item) {
            return Err(ApiError::InvalidInput(format!(
                "计划{}的对象与消耗物料{}(id={})不一致",
                schedule_id,
                line.item.kind(),
                line.item.id()
            )));
        }
    }
    Ok(())
}

/// 日报涉及的目录物料ID
fn referenced_item_ids(input: &UpdateInput) -> Vec<i64> {
    let mut ids: Vec<i64> = input
        .feeds
        .iter()
        .map(|f| f.feed_id)
        .chain(input.feed_returns.iter().map(|r| r.feed_id))
        .chain(input.items.iter().map(|i| i.item.id()))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// 施加影响并按配置处理负库存
fn apply_effect(
    batch: &Batch,
    effect: &LedgerEffect,
    settings: &LedgerSettings,
) -> ApiResult<BatchCounters> {
    let outcome = LedgerEngine::new().apply(&batch.counters, effect)?;
    if outcome.negative_feed_stock {
        if !settings.allow_negative_feed_stock {
            return Err(ApiError::InconsistentState(format!(
                "批次{}饲料库存将为负: {}",
                batch.id, outcome.counters.feed_stock
            )));
        }
        warn!(
            batch_id = batch.id,
            feed_stock = outcome.counters.feed_stock,
            "饲料库存为负，请核对投料与耗料"
        );
    }
    Ok(outcome.counters)
}

fn check_update_date(batch: &Batch, input: &UpdateInput) -> ApiResult<()> {
    if input.date < batch.start_date() {
        return Err(ApiError::InvalidInput(format!(
            "日报日期{}早于入栏日期{}",
            input.date,
            batch.start_date()
        )));
    }
    Ok(())
}

// ==========================================
// LedgerApi - 日报台账 API
// ==========================================
pub struct LedgerApi {
    conn: Arc<Mutex<Connection>>,
    ledger_repo: Arc<LedgerRepository>,
}

impl LedgerApi {
    pub fn new(conn: Arc<Mutex<Connection>>, ledger_repo: Arc<LedgerRepository>) -> Self {
        Self { conn, ledger_repo }
    }

    fn lock(&self) -> ApiResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ApiError::DatabaseError(format!("数据库锁获取失败: {}", e)))
    }

    /// 录入日报
    ///
    /// # 流程
    /// 1. 校验日期（不早于入栏、同日唯一）
    /// 2. 按目录生成带快照的明细
    /// 3. 施加死淘/耗料/投料/退料影响
    /// 4. 写入日报与明细，标记关联计划完成
    /// 5. 写入计数器并对账（存栏归零自动结批）
    #[instrument(skip(self, input), fields(date = %input.date, mortality = input.mortality_count))]
    pub fn apply_update(&self, batch_id: i64, input: UpdateInput) -> ApiResult<i64> {
        input.validate().map_err(ApiError::InvalidInput)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let settings = ConfigManager::load_settings_tx(&tx)?;
        let batch = BatchRepository::get_tx(&tx, batch_id)?;
        check_update_date(&batch, &input)?;

        if LedgerRepository::find_id_by_date_tx(&tx, batch_id, input.date)?.is_some() {
            return Err(ApiError::DuplicateUpdate {
                batch_id,
                date: input.date.to_string(),
            });
        }

        let catalog = CatalogRepository::find_many_tx(&tx, &referenced_item_ids(&input))?;
        let prior = LedgerRepository::list_allocations_by_batch_tx(&tx, batch_id, None)?;
        let lines = LedgerEngine::new().build_lines(&input, &catalog, None, &prior)?;
        check_schedule_links_tx(&tx, &lines)?;

        let counters = apply_effect(&batch, &LedgerEffect::from_input(&input), &settings)?;

        let update_id = LedgerRepository::insert_tx(&tx, batch_id, &input, now())?;
        LedgerRepository::insert_lines_tx(&tx, update_id, &lines)?;

        let mut completed = 0;
        for schedule_id in lines.schedule_ids() {
            if complete_tx(&tx, schedule_id, Some(batch_id))? {
                completed += 1;
            }
        }

        let updated = commit_counters_tx(&tx, &batch, counters, &settings)?;

        tx.commit()?;

        info!(
            batch_id,
            update_id,
            completed,
            available_birds = updated.counters.available_birds,
            feed_stock = updated.counters.feed_stock,
            "日报已录入"
        );
        Ok(update_id)
    }

    /// 修改日报
    ///
    /// 只施加 新 - 旧 的差值；保留的物料沿用旧快照价格；
    /// 不再被引用的计划恢复为未完成
    #[instrument(skip(self, input), fields(date = %input.date))]
    pub fn edit_update(&self, update_id: i64, input: UpdateInput) -> ApiResult<()> {
        input.validate().map_err(ApiError::InvalidInput)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let settings = ConfigManager::load_settings_tx(&tx)?;
        let old = LedgerRepository::get_detail_tx(&tx, update_id)?;
        let batch = BatchRepository::get_tx(&tx, old.update.batch_id)?;
        check_update_date(&batch, &input)?;

        if input.date != old.update.date {
            if let Some(other) = LedgerRepository::find_id_by_date_tx(&tx, batch.id, input.date)? {
                if other != update_id {
                    return Err(ApiError::DuplicateUpdate {
                        batch_id: batch.id,
                        date: input.date.to_string(),
                    });
                }
            }
        }

        let catalog = CatalogRepository::find_many_tx(&tx, &referenced_item_ids(&input))?;
        let prior = LedgerRepository::list_allocations_by_batch_tx(&tx, batch.id, Some(update_id))?;
        let lines = LedgerEngine::new().build_lines(&input, &catalog, Some(&old.lines), &prior)?;
        check_schedule_links_tx(&tx, &lines)?;

        let delta = LedgerEffect::from_input(&input)
            .minus(&LedgerEffect::from_record(&old.update, &old.lines));
        let counters = apply_effect(&batch, &delta, &settings)?;

        LedgerRepository::update_header_tx(&tx, update_id, &input)?;
        LedgerRepository::delete_lines_tx(&tx, update_id)?;
        LedgerRepository::insert_lines_tx(&tx, update_id, &lines)?;

        let new_ids = lines.schedule_ids();
        let dropped: Vec<i64> = old
            .lines
            .schedule_ids()
            .into_iter()
            .filter(|id| !new_ids.contains(id))
            .collect();
        let reset = reset_unreferenced_tx(&tx, &dropped)?;
        for schedule_id in &new_ids {
            complete_tx(&tx, *schedule_id, Some(batch.id))?;
        }

        commit_counters_tx(&tx, &batch, counters, &settings)?;

        tx.commit()?;

        info!(
            update_id,
            batch_id = batch.id,
            mortality_delta = delta.mortality,
            feed_used_delta = delta.feed_used,
            reset,
            "日报已修改"
        );
        Ok(())
    }

    /// 删除日报（精确抵消录入影响）
    #[instrument(skip(self))]
    pub fn delete_update(&self, update_id: i64) -> ApiResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let settings = ConfigManager::load_settings_tx(&tx)?;
        let old = LedgerRepository::get_detail_tx(&tx, update_id)?;
        let batch = BatchRepository::get_tx(&tx, old.update.batch_id)?;

        let reversal = LedgerEffect::from_record(&old.update, &old.lines).negated();
        let counters = apply_effect(&batch, &reversal, &settings)?;

        LedgerRepository::delete_tx(&tx, update_id)?;
        let reset = reset_unreferenced_tx(&tx, &old.lines.schedule_ids())?;

        let updated = commit_counters_tx(&tx, &batch, counters, &settings)?;

        tx.commit()?;

        info!(
            update_id,
            batch_id = batch.id,
            reset,
            status = %updated.status,
            "日报已删除"
        );
        Ok(())
    }

    pub fn get_update(&self, update_id: i64) -> ApiResult<BatchUpdateDetail> {
        Ok(self.ledger_repo.get_detail(update_id)?)
    }

    /// 批次全部日报（按日期升序）
    pub fn list_updates(&self, batch_id: i64) -> ApiResult<Vec<BatchUpdateDetail>> {
        Ok(self.ledger_repo.list_by_batch(batch_id)?)
    }
}
