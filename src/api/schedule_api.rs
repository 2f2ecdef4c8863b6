// ==========================================
// 肉鸡养殖台账系统 - 治疗计划 API
// ==========================================
// 职责:
// 1. 按自动计划模板为批次生成计划
// 2. 入栏日期变化时平移计划
// 3. 完成标记（幂等）
// 4. 共享计划与模板维护
// ==========================================

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::{info, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::schedule::{Actor, AutoSchedule, ScheduleTarget, TreatmentSchedule};
use crate::domain::types::CatalogKind;
use crate::engine::schedule_planner::SchedulePlanner;
use crate::repository::{BatchRepository, CatalogRepository, LedgerRepository, ScheduleRepository};

// ==========================================
// 事务内操作（供批次/台账 API 复用）
// ==========================================

/// 按全部自动计划模板为批次生成计划并关联
///
/// 批次已关联的同目标同日期计划不再重复生成
pub(crate) fn seed_for_batch_tx(
    conn: &Connection,
    batch_id: i64,
    start_date: NaiveDate,
) -> ApiResult<Vec<i64>> {
    let templates = ScheduleRepository::list_auto_tx(conn)?;
    if templates.is_empty() {
        return Ok(Vec::new());
    }

    let item_ids: Vec<i64> = templates.iter().map(|t| t.item_id).collect();
    let catalog = CatalogRepository::find_many_tx(conn, &item_ids)?;
    let planned = SchedulePlanner::new().plan_for_batch(start_date, &templates, &catalog);

    let existing = ScheduleRepository::list_for_batch_tx(conn, batch_id)?;
    let mut ids = Vec::with_capacity(planned.len());
    for plan in &planned {
        let seeded = existing
            .iter()
            .any(|s| s.target == plan.target && s.scheduled_date == plan.scheduled_date);
        if seeded {
            continue;
        }
        let schedule_id =
            ScheduleRepository::insert_tx(conn, &plan.target, plan.scheduled_date, plan.notes.as_deref())?;
        ScheduleRepository::link_batch_tx(conn, schedule_id, batch_id)?;
        ids.push(schedule_id);
    }

    info!(batch_id, count = ids.len(), "自动计划已生成");
    Ok(ids)
}

/// 仅属于本批次的计划整体平移
pub(crate) fn shift_for_date_change_tx(
    conn: &Connection,
    batch_id: i64,
    delta_days: i64,
) -> ApiResult<usize> {
    if delta_days == 0 {
        return Ok(0);
    }

    let planner = SchedulePlanner::new();
    let schedules = ScheduleRepository::list_for_batch_tx(conn, batch_id)?;
    let mut count = 0;
    for schedule in &schedules {
        // 共享计划的日期由其他批次共同决定，保持不动
        if schedule.batch_ids != [batch_id] {
            continue;
        }
        let shifted = planner.shift(schedule.scheduled_date, delta_days);
        ScheduleRepository::update_date_tx(conn, schedule.id, shifted)?;
        count += 1;
    }

    info!(batch_id, delta_days, count, "计划日期已平移");
    Ok(count)
}

/// 标记计划完成，并把消耗所在批次关联到计划
///
/// # 返回
/// 标记是否发生变化
pub(crate) fn complete_tx(
    conn: &Connection,
    schedule_id: i64,
    batch_id: Option<i64>,
) -> ApiResult<bool> {
    let changed = ScheduleRepository::set_completed_tx(conn, schedule_id, true)?;
    if let Some(batch_id) = batch_id {
        ScheduleRepository::link_batch_tx(conn, schedule_id, batch_id)?;
    }
    Ok(changed)
}

/// 没有任何台账明细再引用的计划恢复为未完成
pub(crate) fn reset_unreferenced_tx(conn: &Connection, schedule_ids: &[i64]) -> ApiResult<usize> {
    let mut reset = 0;
    for schedule_id in schedule_ids {
        if ScheduleRepository::find_by_id_tx(conn, *schedule_id)?.is_none() {
            continue;
        }
        if LedgerRepository::count_schedule_references_tx(conn, *schedule_id)? == 0
            && ScheduleRepository::set_completed_tx(conn, *schedule_id, false)?
        {
            reset += 1;
        }
    }
    Ok(reset)
}

// ==========================================
// ScheduleApi - 治疗计划 API
// ==========================================
pub struct ScheduleApi {
    conn: Arc<Mutex<Connection>>,
    schedule_repo: Arc<ScheduleRepository>,
}

impl ScheduleApi {
    pub fn new(conn: Arc<Mutex<Connection>>, schedule_repo: Arc<ScheduleRepository>) -> Self {
        Self {
            conn,
            schedule_repo,
        }
    }

    fn lock(&self) -> ApiResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ApiError::DatabaseError(format!("数据库锁获取失败: {}", e)))
    }

    /// 按自动计划模板为批次补充生成计划
    ///
    /// 批次创建时已自动执行，此处用于模板调整后的补充生成
    pub fn seed_for_batch(&self, batch_id: i64) -> ApiResult<Vec<i64>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let batch = BatchRepository::get_tx(&tx, batch_id)?;
        let ids = seed_for_batch_tx(&tx, batch.id, batch.start_date())?;

        tx.commit()?;
        Ok(ids)
    }

    /// 批次独有计划整体平移
    pub fn shift_for_date_change(&self, batch_id: i64, delta_days: i64) -> ApiResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        BatchRepository::get_tx(&tx, batch_id)?;
        let count = shift_for_date_change_tx(&tx, batch_id, delta_days)?;

        tx.commit()?;
        Ok(count)
    }

    /// 标记计划完成（幂等）
    #[instrument(skip(self, actor), fields(user_id = actor.user_id, role = %actor.role))]
    pub fn complete(&self, schedule_id: i64, actor: &Actor) -> ApiResult<TreatmentSchedule> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let changed = complete_tx(&tx, schedule_id, None)?;
        let schedule = ScheduleRepository::get_tx(&tx, schedule_id)?;

        tx.commit()?;

        if changed {
            info!(schedule_id, user_id = actor.user_id, "计划已标记完成");
        }
        Ok(schedule)
    }

    /// 创建共享计划
    ///
    /// # 参数
    /// - target: 计划对象（药品/疫苗剂次/保健耗材）
    /// - scheduled_date: 计划日期
    /// - batch_ids: 关联批次（至少一个）
    /// - notes: 备注
    pub fn create_schedule(
        &self,
        target: ScheduleTarget,
        scheduled_date: NaiveDate,
        batch_ids: &[i64],
        notes: Option<&str>,
    ) -> ApiResult<i64> {
        if batch_ids.is_empty() {
            return Err(ApiError::InvalidInput("计划至少关联一个批次".to_string()));
        }
        if target.dose_number() == Some(0) {
            return Err(ApiError::InvalidInput("疫苗剂次从1开始".to_string()));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let item = CatalogRepository::get_tx(&tx, target.item_id())?;
        if item.kind != target.kind() {
            return Err(ApiError::NotFound(format!(
                "{}(id={})不存在",
                target.kind(),
                target.item_id()
            )));
        }

        let schedule_id = ScheduleRepository::insert_tx(&tx, &target, scheduled_date, notes)?;
        let unique: HashSet<i64> = batch_ids.iter().copied().collect();
        for batch_id in unique {
            BatchRepository::get_tx(&tx, batch_id)?;
            ScheduleRepository::link_batch_tx(&tx, schedule_id, batch_id)?;
        }

        tx.commit()?;

        info!(schedule_id, item_id = item.id, date = %scheduled_date, "共享计划已创建");
        Ok(schedule_id)
    }

    /// 删除计划（引用它的台账明细解除关联）
    pub fn delete_schedule(&self, schedule_id: i64) -> ApiResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        ScheduleRepository::delete_tx(&tx, schedule_id)?;
        tx.commit()?;

        info!(schedule_id, "计划已删除");
        Ok(())
    }

    pub fn get_schedule(&self, schedule_id: i64) -> ApiResult<TreatmentSchedule> {
        self.schedule_repo
            .find_by_id(schedule_id)?
            .ok_or_else(|| ApiError::NotFound(format!("TreatmentSchedule(id={})不存在", schedule_id)))
    }

    pub fn list_for_batch(&self, batch_id: i64) -> ApiResult<Vec<TreatmentSchedule>> {
        Ok(self.schedule_repo.list_for_batch(batch_id)?)
    }

    /// 截至指定日期仍未完成的计划
    pub fn due_on(&self, batch_id: i64, date: NaiveDate) -> ApiResult<Vec<TreatmentSchedule>> {
        Ok(self.schedule_repo.due_on(batch_id, date)?)
    }

    // ==========================================
    // 自动计划模板
    // ==========================================

    /// 保存自动计划模板（同一物料覆盖旧偏移）
    pub fn save_auto_schedule(&self, kind: CatalogKind, item_id: i64, offsets: &[u32]) -> ApiResult<i64> {
        if !kind.is_treatment() {
            return Err(ApiError::InvalidInput("饲料不能配置自动计划".to_string()));
        }
        if offsets.is_empty() {
            return Err(ApiError::InvalidInput("日龄偏移不能为空".to_string()));
        }
        if offsets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ApiError::InvalidInput("日龄偏移必须严格递增".to_string()));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let item = CatalogRepository::get_tx(&tx, item_id)?;
        if item.kind != kind {
            return Err(ApiError::NotFound(format!("{}(id={})不存在", kind, item_id)));
        }
        let auto_id = ScheduleRepository::save_auto_tx(&tx, kind, item_id, offsets)?;

        tx.commit()?;

        info!(auto_id, item_id, offsets = ?offsets, "自动计划模板已保存");
        Ok(auto_id)
    }

    pub fn list_auto_schedules(&self) -> ApiResult<Vec<AutoSchedule>> {
        Ok(self.schedule_repo.list_auto_schedules()?)
    }

    pub fn delete_auto_schedule(&self, auto_id: i64) -> ApiResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        ScheduleRepository::delete_auto_tx(&tx, auto_id)?;
        tx.commit()?;
        Ok(())
    }
}
