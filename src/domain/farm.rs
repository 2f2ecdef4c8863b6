// ==========================================
// 肉鸡养殖台账系统 - 养殖场领域模型
// ==========================================
// 红线: 在养批次的分舍存栏之和不得超过鸡舍容量
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Farm - 养殖场
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Farm {
    pub id: i64,
    pub name: String,
    pub location: Option<String>,
    pub capacity: i64,               // 全场总容量（羽）
    pub shed_capacities: Vec<i64>,   // 各鸡舍容量，按舍号顺序
    pub condition: Option<String>,   // 场况描述
    pub created_at: NaiveDateTime,
}

impl Farm {
    /// 鸡舍数量
    pub fn num_sheds(&self) -> usize {
        self.shed_capacities.len()
    }
}

/// 新建/修改养殖场入参
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFarm {
    pub name: String,
    pub location: Option<String>,
    pub capacity: i64,
    pub shed_capacities: Vec<i64>,
    pub condition: Option<String>,
}

// ==========================================
// FarmUsage - 容量占用（实时计算，不缓存）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmUsage {
    pub farm_id: i64,
    pub capacity: i64,
    pub used: i64,
    pub sheds: Vec<ShedUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShedUsage {
    pub shed_index: usize,
    pub capacity: i64,
    pub used: i64,
}

// ==========================================
// Trait: CapacityConstraint
// ==========================================
pub trait CapacityConstraint {
    /// 剩余容量
    fn remaining(&self) -> i64;

    /// 是否可再放入 birds 羽
    fn can_allocate(&self, birds: i64) -> bool {
        birds <= self.remaining()
    }
}

impl CapacityConstraint for FarmUsage {
    fn remaining(&self) -> i64 {
        self.capacity - self.used
    }
}

impl CapacityConstraint for ShedUsage {
    fn remaining(&self) -> i64 {
        self.capacity - self.used
    }
}

impl FarmUsage {
    /// 由容量配置与在养批次的分舍存栏汇总
    ///
    /// # 参数
    /// - farm: 养殖场
    /// - active_allocations: 在养批次的分舍存栏（每个批次一条 Vec）
    pub fn from_allocations(farm: &Farm, active_allocations: &[Vec<i64>]) -> Self {
        let mut sheds: Vec<ShedUsage> = farm
            .shed_capacities
            .iter()
            .enumerate()
            .map(|(shed_index, capacity)| ShedUsage {
                shed_index,
                capacity: *capacity,
                used: 0,
            })
            .collect();

        let mut used = 0;
        for allocation in active_allocations {
            for (shed, birds) in sheds.iter_mut().zip(allocation.iter()) {
                shed.used += birds;
            }
            used += allocation.iter().sum::<i64>();
        }

        Self {
            farm_id: farm.id,
            capacity: farm.capacity,
            used,
            sheds,
        }
    }
}
