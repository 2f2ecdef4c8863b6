// ==========================================
// 肉鸡养殖台账系统 - 领域类型定义
// ==========================================
// 职责: 批次状态、目录类别、计量单位等枚举
// 约定: 数据库存储统一使用 to_db_str / from_db_str
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 批次状态 (Batch Status)
// ==========================================
// 合法迁移: ONGOING -> CLOSING -> CLOSED, CLOSED -> CLOSING (出栏撤销)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Ongoing, // 饲养中
    Closing, // 出栏中
    Closed,  // 已结批
}

impl BatchStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            BatchStatus::Ongoing => "ongoing",
            BatchStatus::Closing => "closing",
            BatchStatus::Closed => "closed",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "ongoing" => Some(BatchStatus::Ongoing),
            "closing" => Some(BatchStatus::Closing),
            "closed" => Some(BatchStatus::Closed),
            _ => None,
        }
    }

    /// 是否占用鸡舍容量（未结批的批次都算在用）
    pub fn is_active(&self) -> bool {
        !matches!(self, BatchStatus::Closed)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 目录类别 (Catalog Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Feed,           // 饲料
    Medicine,       // 药品
    Vaccine,        // 疫苗
    HealthMaterial, // 保健耗材
}

impl CatalogKind {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            CatalogKind::Feed => "feed",
            CatalogKind::Medicine => "medicine",
            CatalogKind::Vaccine => "vaccine",
            CatalogKind::HealthMaterial => "health_material",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "feed" => Some(CatalogKind::Feed),
            "medicine" => Some(CatalogKind::Medicine),
            "vaccine" => Some(CatalogKind::Vaccine),
            "health_material" => Some(CatalogKind::HealthMaterial),
            _ => None,
        }
    }

    /// 可作为治疗计划/消耗明细的类别（饲料走单独的投料明细）
    pub fn is_treatment(&self) -> bool {
        !matches!(self, CatalogKind::Feed)
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 计量单位 (Unit Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    Kilogram,
    Gram,
    Liter,
    Milliliter,
    Piece,
    Dose,
    Packet,
}

impl UnitType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            UnitType::Kilogram => "kg",
            UnitType::Gram => "g",
            UnitType::Liter => "l",
            UnitType::Milliliter => "ml",
            UnitType::Piece => "piece",
            UnitType::Dose => "dose",
            UnitType::Packet => "packet",
        }
    }

    /// 解析单位（兼容大小写与常见别名）
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kg" | "kilogram" => Some(UnitType::Kilogram),
            "g" | "gram" => Some(UnitType::Gram),
            "l" | "liter" | "litre" => Some(UnitType::Liter),
            "ml" | "milliliter" | "millilitre" => Some(UnitType::Milliliter),
            "piece" | "pcs" => Some(UnitType::Piece),
            "dose" | "doses" => Some(UnitType::Dose),
            "packet" | "bag" => Some(UnitType::Packet),
            _ => None,
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 日报备注优先级 (Remarks Priority)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemarksPriority {
    #[default]
    Low,
    Medium,
    High,
}

impl RemarksPriority {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            RemarksPriority::Low => "low",
            RemarksPriority::Medium => "medium",
            RemarksPriority::High => "high",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(RemarksPriority::Low),
            "medium" => Some(RemarksPriority::Medium),
            "high" => Some(RemarksPriority::High),
            _ => None,
        }
    }
}
