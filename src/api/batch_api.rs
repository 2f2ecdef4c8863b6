// ==========================================
// 肉鸡养殖台账系统 - 批次生命周期 API
// ==========================================
// 职责:
// 1. 入栏（容量校验 + 自动计划生成）
// 2. 状态迁移 ONGOING -> CLOSING -> CLOSED，CLOSED -> CLOSING
// 3. 出栏录入/修改/删除（驱动存栏与自动结批）
// 4. 批次信息修改（入栏日期变化平移计划）与级联删除
// 红线: 每个写操作一个事务，失败整体回滚
// ==========================================

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::{info, instrument, warn};

use crate::api::batch_state::{apply_status_change_tx, commit_counters_tx, store_summary_tx};
use crate::api::error::{ApiError, ApiResult};
use crate::api::schedule_api::{reset_unreferenced_tx, seed_for_batch_tx, shift_for_date_change_tx};
use crate::config::ConfigManager;
use crate::domain::batch::{Batch, BatchCounters, BatchEdit, BatchOverview, NewBatch};
use crate::domain::farm::FarmUsage;
use crate::domain::harvest::{Harvest, NewHarvest};
use crate::domain::types::BatchStatus;
use crate::engine::lifecycle::{BatchLifecycleEngine, StatusChange};
use crate::repository::{
    BatchDetails, BatchRepository, FarmRepository, HarvestRepository, LedgerRepository,
    ScheduleRepository,
};

fn validate_new_batch(batch: &NewBatch) -> ApiResult<()> {
    if batch.shed_birds.is_empty() {
        return Err(ApiError::InvalidInput("分舍入栏数不能为空".to_string()));
    }
    if batch.total_birds() <= 0 {
        return Err(ApiError::InvalidInput("入栏总数必须大于0".to_string()));
    }
    validate_extra_chicks(batch.extra_chicks, batch.total_birds())?;
    validate_cost(batch.cost_per_chicken)
}

fn validate_extra_chicks(extra_chicks: i64, total_birds: i64) -> ApiResult<()> {
    if extra_chicks < 0 || extra_chicks > total_birds {
        return Err(ApiError::InvalidInput(format!(
            "赠雏数必须在0到入栏总数{}之间: {}",
            total_birds, extra_chicks
        )));
    }
    Ok(())
}

fn validate_cost(cost_per_chicken: f64) -> ApiResult<()> {
    if !cost_per_chicken.is_finite() || cost_per_chicken < 0.0 {
        return Err(ApiError::InvalidInput(format!(
            "鸡苗单价不能为负: {}",
            cost_per_chicken
        )));
    }
    Ok(())
}

// ==========================================
// BatchApi - 批次生命周期 API
// ==========================================
pub struct BatchApi {
    conn: Arc<Mutex<Connection>>,
    batch_repo: Arc<BatchRepository>,
    harvest_repo: Arc<HarvestRepository>,
}

impl BatchApi {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        batch_repo: Arc<BatchRepository>,
        harvest_repo: Arc<HarvestRepository>,
    ) -> Self {
        Self {
            conn,
            batch_repo,
            harvest_repo,
        }
    }

    fn lock(&self) -> ApiResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ApiError::DatabaseError(format!("数据库锁获取失败: {}", e)))
    }

    // ==========================================
    // 入栏
    // ==========================================

    /// 创建批次
    ///
    /// # 流程
    /// 1. 校验分舍形状与全场/单舍剩余容量
    /// 2. 分配场内批次序号
    /// 3. 写入批次（存栏 = 入栏总数）
    /// 4. 按自动计划模板生成计划
    #[instrument(skip(self, batch), fields(farm_id = batch.farm_id, total_birds = batch.total_birds()))]
    pub fn create_batch(&self, batch: NewBatch) -> ApiResult<i64> {
        validate_new_batch(&batch)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let farm = FarmRepository::get_tx(&tx, batch.farm_id)?;
        let allocations = BatchRepository::active_allocations_tx(&tx, farm.id, None)?;
        let usage = FarmUsage::from_allocations(&farm, &allocations);
        BatchLifecycleEngine::new().check_allocation(&farm, &usage, &batch.shed_birds)?;

        let number = BatchRepository::next_farm_batch_number_tx(&tx, farm.id)?;
        let counters = BatchCounters::initial(batch.total_birds());
        let batch_id = BatchRepository::insert_tx(&tx, &batch, number, &counters, BatchStatus::Ongoing)?;

        let schedules = seed_for_batch_tx(&tx, batch_id, batch.created_at.date())?;

        tx.commit()?;

        info!(
            batch_id,
            farm_batch_number = number,
            schedules = schedules.len(),
            "批次已入栏"
        );
        Ok(batch_id)
    }

    // ==========================================
    // 状态迁移
    // ==========================================

    /// 人工状态迁移
    ///
    /// # 规则
    /// - 只允许 ONGOING->CLOSING、CLOSING->CLOSED、CLOSED->CLOSING
    /// - 进入 CLOSED 要求存栏为 0，并生成财务汇总
    /// - 离开 CLOSED 删除财务汇总
    /// - ONGOING->CLOSING 时存栏已为 0，直接结批
    #[instrument(skip(self))]
    pub fn transition(&self, batch_id: i64, new_status: BatchStatus) -> ApiResult<Batch> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let settings = ConfigManager::load_settings_tx(&tx)?;
        let batch = BatchRepository::get_tx(&tx, batch_id)?;
        let engine = BatchLifecycleEngine::new();

        if !engine.is_legal_transition(batch.status, new_status) {
            return Err(ApiError::InvalidTransition {
                from: batch.status,
                to: new_status,
            });
        }

        let available = batch.counters.available_birds;
        let (status, change) = match new_status {
            BatchStatus::Closed if available > 0 => {
                return Err(ApiError::InconsistentState(format!(
                    "批次{}仍有存栏{}羽，不能结批",
                    batch_id, available
                )));
            }
            BatchStatus::Closed => (BatchStatus::Closed, StatusChange::Close),
            BatchStatus::Closing if batch.status == BatchStatus::Closed => {
                (BatchStatus::Closing, StatusChange::Reopen)
            }
            BatchStatus::Closing => match engine.reconcile(BatchStatus::Closing, available) {
                StatusChange::Close => (BatchStatus::Closed, StatusChange::Close),
                _ => (BatchStatus::Closing, StatusChange::Unchanged),
            },
            BatchStatus::Ongoing => (BatchStatus::Ongoing, StatusChange::Unchanged),
        };

        let revision =
            BatchRepository::update_state_tx(&tx, batch.id, batch.revision, &batch.counters, status)?;
        let updated = Batch {
            status,
            revision,
            ..batch.clone()
        };
        apply_status_change_tx(&tx, &updated, change, &settings)?;

        tx.commit()?;

        info!(batch_id, from = %batch.status, to = %status, "批次状态已迁移");
        Ok(updated)
    }

    // ==========================================
    // 出栏
    // ==========================================

    /// 录入出栏
    #[instrument(skip(self, harvest), fields(quantity = harvest.quantity))]
    pub fn record_harvest(&self, batch_id: i64, harvest: NewHarvest) -> ApiResult<i64> {
        harvest.validate().map_err(ApiError::InvalidInput)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let settings = ConfigManager::load_settings_tx(&tx)?;
        let batch = BatchRepository::get_tx(&tx, batch_id)?;
        Self::check_harvest_date(&batch, harvest.date)?;

        let available = batch.counters.available_birds;
        if harvest.quantity > available {
            return Err(ApiError::InsufficientBirds {
                requested: harvest.quantity,
                available,
            });
        }

        let harvest_id = HarvestRepository::insert_tx(&tx, batch_id, &harvest)?;
        let counters = BatchCounters {
            available_birds: available - harvest.quantity,
            ..batch.counters
        };
        let updated = commit_counters_tx(&tx, &batch, counters, &settings)?;

        tx.commit()?;

        info!(
            batch_id,
            harvest_id,
            available_birds = updated.counters.available_birds,
            status = %updated.status,
            "出栏已录入"
        );
        Ok(harvest_id)
    }

    /// 修改出栏（按数量差值调整存栏）
    #[instrument(skip(self, harvest))]
    pub fn edit_harvest(&self, harvest_id: i64, harvest: NewHarvest) -> ApiResult<()> {
        harvest.validate().map_err(ApiError::InvalidInput)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let settings = ConfigManager::load_settings_tx(&tx)?;
        let old = HarvestRepository::get_tx(&tx, harvest_id)?;
        let batch = BatchRepository::get_tx(&tx, old.batch_id)?;
        Self::check_harvest_date(&batch, harvest.date)?;

        let delta = harvest.quantity - old.quantity;
        let available = batch.counters.available_birds;
        if delta > available {
            return Err(ApiError::InsufficientBirds {
                requested: delta,
                available,
            });
        }

        HarvestRepository::update_tx(&tx, harvest_id, &harvest)?;
        let counters = BatchCounters {
            available_birds: available - delta,
            ..batch.counters
        };
        commit_counters_tx(&tx, &batch, counters, &settings)?;

        tx.commit()?;

        info!(harvest_id, batch_id = batch.id, delta, "出栏已修改");
        Ok(())
    }

    /// 删除出栏（存栏恢复，已结批批次退回出栏中）
    #[instrument(skip(self))]
    pub fn delete_harvest(&self, harvest_id: i64) -> ApiResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let settings = ConfigManager::load_settings_tx(&tx)?;
        let old = HarvestRepository::get_tx(&tx, harvest_id)?;
        let batch = BatchRepository::get_tx(&tx, old.batch_id)?;

        HarvestRepository::delete_tx(&tx, harvest_id)?;
        let counters = BatchCounters {
            available_birds: batch.counters.available_birds + old.quantity,
            ..batch.counters
        };
        let updated = commit_counters_tx(&tx, &batch, counters, &settings)?;

        tx.commit()?;

        info!(
            harvest_id,
            batch_id = batch.id,
            restored = old.quantity,
            status = %updated.status,
            "出栏已删除"
        );
        Ok(())
    }

    fn check_harvest_date(batch: &Batch, date: NaiveDate) -> ApiResult<()> {
        if date < batch.start_date() {
            return Err(ApiError::InvalidInput(format!(
                "出栏日期{}早于入栏日期{}",
                date,
                batch.start_date()
            )));
        }
        Ok(())
    }

    // ==========================================
    // 批次信息修改与删除
    // ==========================================

    /// 修改批次信息
    ///
    /// 入栏日期变化时，关联计划按同样天数平移；已结批批次重算汇总
    #[instrument(skip(self, edit))]
    pub fn edit_batch(&self, batch_id: i64, edit: BatchEdit) -> ApiResult<Batch> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let settings = ConfigManager::load_settings_tx(&tx)?;
        let batch = BatchRepository::get_tx(&tx, batch_id)?;

        let details = BatchDetails {
            manager_id: edit.manager_id.unwrap_or(batch.manager_id),
            cost_per_chicken: edit.cost_per_chicken.unwrap_or(batch.cost_per_chicken),
            extra_chicks: edit.extra_chicks.unwrap_or(batch.extra_chicks),
            created_at: edit.created_at.unwrap_or(batch.created_at),
        };
        validate_extra_chicks(details.extra_chicks, batch.total_birds)?;
        validate_cost(details.cost_per_chicken)?;

        let new_start = details.created_at.date();
        let delta_days = (new_start - batch.start_date()).num_days();
        if delta_days > 0 {
            let earliest_update = LedgerRepository::list_by_batch_tx(&tx, batch_id)?
                .first()
                .map(|d| d.update.date);
            let earliest_harvest = HarvestRepository::list_by_batch_tx(&tx, batch_id)?
                .iter()
                .map(|h| h.date)
                .min();
            if let Some(earliest) = earliest_update.into_iter().chain(earliest_harvest).min() {
                if earliest < new_start {
                    return Err(ApiError::InvalidInput(format!(
                        "批次已有{}的记录，入栏日期不能晚于该日期",
                        earliest
                    )));
                }
            }
        }

        let revision = BatchRepository::update_details_tx(&tx, batch_id, batch.revision, &details)?;
        let shifted = shift_for_date_change_tx(&tx, batch_id, delta_days)?;

        let updated = Batch {
            manager_id: details.manager_id,
            cost_per_chicken: details.cost_per_chicken,
            extra_chicks: details.extra_chicks,
            created_at: details.created_at,
            revision,
            ..batch
        };
        if updated.status == BatchStatus::Closed {
            store_summary_tx(&tx, &updated, &settings)?;
        }

        tx.commit()?;

        info!(batch_id, delta_days, shifted, "批次信息已修改");
        Ok(updated)
    }

    /// 级联删除批次
    ///
    /// 日报、出栏、财务汇总随批次删除；共享计划解除关联，
    /// 不再关联任何批次的计划一并删除
    #[instrument(skip(self))]
    pub fn delete_batch(&self, batch_id: i64) -> ApiResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        BatchRepository::get_tx(&tx, batch_id)?;
        let linked = ScheduleRepository::ids_for_batch_tx(&tx, batch_id)?;
        let referenced: Vec<i64> = LedgerRepository::list_by_batch_tx(&tx, batch_id)?
            .iter()
            .flat_map(|d| d.lines.schedule_ids())
            .collect();

        BatchRepository::delete_tx(&tx, batch_id)?;

        let mut orphaned = 0;
        for schedule_id in &linked {
            if ScheduleRepository::count_links_tx(&tx, *schedule_id)? == 0 {
                ScheduleRepository::delete_tx(&tx, *schedule_id)?;
                orphaned += 1;
            }
        }
        let reset = reset_unreferenced_tx(&tx, &referenced)?;

        tx.commit()?;

        if reset > 0 {
            warn!(batch_id, reset, "共享计划因批次删除恢复为未完成");
        }
        info!(batch_id, orphaned, "批次已删除");
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get_batch(&self, batch_id: i64) -> ApiResult<Batch> {
        self.batch_repo
            .find_by_id(batch_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Batch(id={})不存在", batch_id)))
    }

    /// 列出批次（None 表示全部养殖场）
    pub fn list_batches(&self, farm_id: Option<i64>) -> ApiResult<Vec<Batch>> {
        Ok(self.batch_repo.list_by_farm(farm_id)?)
    }

    pub fn list_batches_by_manager(&self, manager_id: i64) -> ApiResult<Vec<Batch>> {
        Ok(self.batch_repo.list_by_manager(manager_id)?)
    }

    pub fn list_harvests(&self, batch_id: i64) -> ApiResult<Vec<Harvest>> {
        Ok(self.harvest_repo.list_by_batch(batch_id)?)
    }

    /// 批次概览
    ///
    /// # 参数
    /// - as_of: 计算日龄的日期
    pub fn batch_overview(&self, batch_id: i64, as_of: NaiveDate) -> ApiResult<BatchOverview> {
        let conn = self.lock()?;

        let batch = BatchRepository::get_tx(&conn, batch_id)?;
        let birds_harvested = HarvestRepository::total_quantity_tx(&conn, batch_id)?;
        let latest_avg_weight = LedgerRepository::latest_avg_weight_tx(&conn, batch_id)?;
        let pending_schedules = ScheduleRepository::list_for_batch_tx(&conn, batch_id)?
            .iter()
            .filter(|s| !s.completed)
            .count();

        let c = &batch.counters;
        let mortality_rate_pct = if batch.total_birds > 0 {
            c.total_mortality as f64 / batch.total_birds as f64 * 100.0
        } else {
            0.0
        };
        let feed_per_live_bird = if c.available_birds > 0 {
            c.feed_usage / c.available_birds as f64
        } else {
            0.0
        };

        Ok(BatchOverview {
            batch_id,
            status: batch.status,
            age_days: batch.age_on(as_of),
            total_birds: batch.total_birds,
            available_birds: c.available_birds,
            total_mortality: c.total_mortality,
            mortality_rate_pct,
            birds_harvested,
            feed_stock: c.feed_stock,
            feed_usage: c.feed_usage,
            feed_per_live_bird,
            latest_avg_weight,
            pending_schedules,
        })
    }
}
