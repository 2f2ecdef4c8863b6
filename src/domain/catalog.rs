// ==========================================
// 肉鸡养殖台账系统 - 物料目录领域模型
// ==========================================
// 范围: 饲料 / 药品 / 疫苗 / 保健耗材
// 约束: 目录价格只影响之后的日报，历史明细保存当时快照
// ==========================================

use crate::domain::types::{CatalogKind, UnitType};
use serde::{Deserialize, Serialize};

// ==========================================
// CatalogItem - 目录物料
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i64,
    pub kind: CatalogKind,
    pub name: String,
    pub unit_type: UnitType,
    pub quantity_per_unit: f64, // 每单位含量（饲料为每包公斤数）
    pub price: f64,             // 每单位价格
    pub description: Option<String>,
    pub dose_ages: Vec<u32>,    // 疫苗各剂次日龄，其他类别为空
}

impl CatalogItem {
    /// 按日龄匹配疫苗剂次（未命中时回退到第 1 剂）
    pub fn dose_number_for_age(&self, age_days: u32) -> u32 {
        self.dose_ages
            .iter()
            .position(|age| *age == age_days)
            .map(|idx| idx as u32 + 1)
            .unwrap_or(1)
    }
}

/// 新建/修改目录物料入参
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCatalogItem {
    pub kind: CatalogKind,
    pub name: String,
    pub unit_type: UnitType,
    pub quantity_per_unit: f64,
    pub price: f64,
    pub description: Option<String>,
    #[serde(default)]
    pub dose_ages: Vec<u32>,
}

impl NewCatalogItem {
    /// 校验入参，返回首个违规原因
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("物料名称不能为空".to_string());
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(format!("价格必须为非负数: {}", self.price));
        }
        if !self.quantity_per_unit.is_finite() || self.quantity_per_unit <= 0.0 {
            return Err(format!("每单位含量必须大于0: {}", self.quantity_per_unit));
        }
        if self.kind != CatalogKind::Vaccine && !self.dose_ages.is_empty() {
            return Err("只有疫苗可以配置剂次日龄".to_string());
        }
        if self.dose_ages.windows(2).any(|w| w[0] >= w[1]) {
            return Err("剂次日龄必须严格递增".to_string());
        }
        Ok(())
    }
}

// ==========================================
// ItemRef - 消耗物料引用（带标签的联合体）
// ==========================================
// 药品 / 疫苗(含剂次) / 保健耗材 各自解析到对应目录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemRef {
    Medicine { id: i64 },
    Vaccine { id: i64, dose_number: u32 },
    HealthMaterial { id: i64 },
}

impl ItemRef {
    pub fn id(&self) -> i64 {
        match self {
            ItemRef::Medicine { id } => *id,
            ItemRef::Vaccine { id, .. } => *id,
            ItemRef::HealthMaterial { id } => *id,
        }
    }

    pub fn kind(&self) -> CatalogKind {
        match self {
            ItemRef::Medicine { .. } => CatalogKind::Medicine,
            ItemRef::Vaccine { .. } => CatalogKind::Vaccine,
            ItemRef::HealthMaterial { .. } => CatalogKind::HealthMaterial,
        }
    }

    pub fn dose_number(&self) -> Option<u32> {
        match self {
            ItemRef::Vaccine { dose_number, .. } => Some(*dose_number),
            _ => None,
        }
    }

    /// 由数据库字段还原
    pub fn from_parts(kind: CatalogKind, id: i64, dose_number: Option<u32>) -> Option<Self> {
        match kind {
            CatalogKind::Medicine => Some(ItemRef::Medicine { id }),
            CatalogKind::Vaccine => Some(ItemRef::Vaccine {
                id,
                dose_number: dose_number.unwrap_or(1),
            }),
            CatalogKind::HealthMaterial => Some(ItemRef::HealthMaterial { id }),
            CatalogKind::Feed => None,
        }
    }
}
