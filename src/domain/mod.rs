// ==========================================
// 肉鸡养殖台账系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod batch;
pub mod catalog;
pub mod farm;
pub mod financial;
pub mod harvest;
pub mod ledger;
pub mod schedule;
pub mod types;

// 重导出核心类型
pub use batch::{Batch, BatchCounters, BatchEdit, BatchOverview, NewBatch};
pub use catalog::{CatalogItem, ItemRef, NewCatalogItem};
pub use farm::{CapacityConstraint, Farm, FarmUsage, NewFarm, ShedUsage};
pub use financial::{FcrRate, FinancialFigures, FinancialSummary, NewFcrRate};
pub use harvest::{Harvest, NewHarvest};
pub use ledger::{
    BatchUpdate, BatchUpdateDetail, ConsumedItemInput, ConsumedItemLine, FeedAllocationInput,
    FeedAllocationLine, FeedReturnInput, FeedReturnLine, MiscItemInput, MiscItemLine,
    UpdateInput, UpdateLines,
};
pub use schedule::{Actor, AutoSchedule, PlannedSchedule, ScheduleTarget, TreatmentSchedule};
pub use types::{BatchStatus, CatalogKind, RemarksPriority, UnitType};
