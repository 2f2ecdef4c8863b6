// ==========================================
// 肉鸡养殖台账系统 - 养殖场 API
// ==========================================
// 职责: 养殖场维护与容量占用查询
// 约定: 占用按在养批次实时汇总，不缓存
// ==========================================

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::info;

use crate::api::batch_state::now;
use crate::api::error::{ApiError, ApiResult};
use crate::domain::farm::{CapacityConstraint, Farm, FarmUsage, NewFarm};
use crate::repository::{BatchRepository, FarmRepository};

fn validate_farm(farm: &NewFarm) -> ApiResult<()> {
    if farm.name.trim().is_empty() {
        return Err(ApiError::InvalidInput("养殖场名称不能为空".to_string()));
    }
    if farm.capacity <= 0 {
        return Err(ApiError::InvalidInput(format!("养殖场容量必须大于0: {}", farm.capacity)));
    }
    if farm.shed_capacities.is_empty() {
        return Err(ApiError::InvalidInput("养殖场至少需要一个鸡舍".to_string()));
    }
    if let Some((idx, cap)) = farm
        .shed_capacities
        .iter()
        .enumerate()
        .find(|(_, cap)| **cap <= 0)
    {
        return Err(ApiError::InvalidInput(format!(
            "第{}舍容量必须大于0: {}",
            idx + 1,
            cap
        )));
    }
    Ok(())
}

pub struct FarmApi {
    conn: Arc<Mutex<Connection>>,
    farm_repo: Arc<FarmRepository>,
}

impl FarmApi {
    pub fn new(conn: Arc<Mutex<Connection>>, farm_repo: Arc<FarmRepository>) -> Self {
        Self { conn, farm_repo }
    }

    fn lock(&self) -> ApiResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ApiError::DatabaseError(format!("数据库锁获取失败: {}", e)))
    }

    /// 新建养殖场
    pub fn create_farm(&self, farm: NewFarm) -> ApiResult<i64> {
        validate_farm(&farm)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let farm_id = FarmRepository::insert_tx(&tx, &farm, now())?;
        tx.commit()?;

        info!(
            farm_id,
            capacity = farm.capacity,
            sheds = farm.shed_capacities.len(),
            "养殖场已创建"
        );
        Ok(farm_id)
    }

    /// 修改养殖场
    ///
    /// # 约束
    /// - 有在养批次时鸡舍数量不可变
    /// - 容量不可低于当前占用
    pub fn update_farm(&self, farm_id: i64, farm: NewFarm) -> ApiResult<()> {
        validate_farm(&farm)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let existing = FarmRepository::get_tx(&tx, farm_id)?;
        let allocations = BatchRepository::active_allocations_tx(&tx, farm_id, None)?;

        if !allocations.is_empty() && existing.num_sheds() != farm.shed_capacities.len() {
            return Err(ApiError::InconsistentState(format!(
                "养殖场{}有在养批次，鸡舍数量不能从{}改为{}",
                farm_id,
                existing.num_sheds(),
                farm.shed_capacities.len()
            )));
        }

        let proposed = Farm {
            id: farm_id,
            name: farm.name.clone(),
            location: farm.location.clone(),
            capacity: farm.capacity,
            shed_capacities: farm.shed_capacities.clone(),
            condition: farm.condition.clone(),
            created_at: existing.created_at,
        };
        let usage = FarmUsage::from_allocations(&proposed, &allocations);
        if usage.remaining() < 0 {
            return Err(ApiError::CapacityExceeded(format!(
                "养殖场{}当前占用{}，容量不能改为{}",
                farm_id, usage.used, farm.capacity
            )));
        }
        if let Some(shed) = usage.sheds.iter().find(|s| s.remaining() < 0) {
            return Err(ApiError::CapacityExceeded(format!(
                "第{}舍当前占用{}，容量不能改为{}",
                shed.shed_index + 1,
                shed.used,
                shed.capacity
            )));
        }

        FarmRepository::update_tx(&tx, farm_id, &farm)?;
        tx.commit()?;

        info!(farm_id, capacity = farm.capacity, "养殖场已修改");
        Ok(())
    }

    pub fn get_farm(&self, farm_id: i64) -> ApiResult<Farm> {
        self.farm_repo
            .find_by_id(farm_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Farm(id={})不存在", farm_id)))
    }

    pub fn list_farms(&self) -> ApiResult<Vec<Farm>> {
        Ok(self.farm_repo.list_all()?)
    }

    /// 养殖场当前容量占用（按在养批次实时汇总）
    pub fn farm_usage(&self, farm_id: i64) -> ApiResult<FarmUsage> {
        let conn = self.lock()?;
        let farm = FarmRepository::get_tx(&conn, farm_id)?;
        let allocations = BatchRepository::active_allocations_tx(&conn, farm_id, None)?;
        Ok(FarmUsage::from_allocations(&farm, &allocations))
    }

    /// 删除养殖场（仍有批次引用时拒绝）
    pub fn delete_farm(&self, farm_id: i64) -> ApiResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        FarmRepository::get_tx(&tx, farm_id)?;
        let batches = BatchRepository::count_by_farm_tx(&tx, farm_id)?;
        if batches > 0 {
            return Err(ApiError::InconsistentState(format!(
                "养殖场{}仍有{}个批次，不能删除",
                farm_id, batches
            )));
        }
        FarmRepository::delete_tx(&tx, farm_id)?;
        tx.commit()?;

        info!(farm_id, "养殖场已删除");
        Ok(())
    }
}
