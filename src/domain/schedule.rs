// ==========================================
// 肉鸡养殖台账系统 - 治疗计划领域模型
// ==========================================
// 计划可被多个批次共享（多对多），不归属于任何单一批次
// 自动计划模板按日龄偏移生成具体日期的计划
// ==========================================

use crate::domain::types::CatalogKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// ScheduleTarget - 计划对象
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleTarget {
    Medicine { medicine_id: i64 },
    Vaccine { vaccine_id: i64, dose_number: u32 },
    HealthMaterial { health_material_id: i64 },
}

impl ScheduleTarget {
    pub fn kind(&self) -> CatalogKind {
        match self {
            ScheduleTarget::Medicine { .. } => CatalogKind::Medicine,
            ScheduleTarget::Vaccine { .. } => CatalogKind::Vaccine,
            ScheduleTarget::HealthMaterial { .. } => CatalogKind::HealthMaterial,
        }
    }

    pub fn item_id(&self) -> i64 {
        match self {
            ScheduleTarget::Medicine { medicine_id } => *medicine_id,
            ScheduleTarget::Vaccine { vaccine_id, .. } => *vaccine_id,
            ScheduleTarget::HealthMaterial { health_material_id } => *health_material_id,
        }
    }

    pub fn dose_number(&self) -> Option<u32> {
        match self {
            ScheduleTarget::Vaccine { dose_number, .. } => Some(*dose_number),
            _ => None,
        }
    }

    /// 由数据库字段还原（饲料不能作为计划对象）
    pub fn from_parts(kind: CatalogKind, item_id: i64, dose_number: Option<u32>) -> Option<Self> {
        match kind {
            CatalogKind::Medicine => Some(ScheduleTarget::Medicine { medicine_id: item_id }),
            CatalogKind::Vaccine => Some(ScheduleTarget::Vaccine {
                vaccine_id: item_id,
                dose_number: dose_number.unwrap_or(1),
            }),
            CatalogKind::HealthMaterial => Some(ScheduleTarget::HealthMaterial {
                health_material_id: item_id,
            }),
            CatalogKind::Feed => None,
        }
    }
}

// ==========================================
// TreatmentSchedule - 治疗计划
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentSchedule {
    pub id: i64,
    pub target: ScheduleTarget,
    pub scheduled_date: NaiveDate,
    pub completed: bool,
    pub notes: Option<String>,
    pub batch_ids: Vec<i64>,
}

/// 待写入的计划（尚未分配ID）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedSchedule {
    pub target: ScheduleTarget,
    pub scheduled_date: NaiveDate,
    pub notes: Option<String>,
}

// ==========================================
// AutoSchedule - 自动计划模板
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoSchedule {
    pub id: i64,
    pub kind: CatalogKind,
    pub item_id: i64,
    pub offsets: Vec<u32>, // 日龄偏移（天），有序
}

// ==========================================
// Actor - 操作人上下文
// ==========================================
// 权限校验由调用方完成，核心只记录操作人
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub role: String,
}

impl Actor {
    pub fn new(user_id: i64, role: impl Into<String>) -> Self {
        Self {
            user_id,
            role: role.into(),
        }
    }
}
