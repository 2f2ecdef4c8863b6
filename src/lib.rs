// ==========================================
// 肉鸡养殖台账系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 批次台账对账引擎（存栏、饲料库存、计划、结批财务）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 物料目录文件
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{BatchStatus, CatalogKind, RemarksPriority, UnitType};

// 领域实体
pub use domain::{
    Batch, BatchCounters, BatchUpdate, CatalogItem, Farm, FarmUsage, FinancialSummary, Harvest,
    ItemRef, TreatmentSchedule, UpdateInput,
};

// 引擎
pub use engine::{BatchLifecycleEngine, FinancialCalculator, LedgerEngine, SchedulePlanner};

// API
pub use api::{ApiError, ApiResult, BatchApi, CatalogApi, FarmApi, FinancialApi, LedgerApi, ScheduleApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "肉鸡养殖台账系统";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(DB_VERSION, "v0.1");
    }
}
