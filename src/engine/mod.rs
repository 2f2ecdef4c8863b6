// ==========================================
// 肉鸡养殖台账系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: Engine 不拼 SQL, 只做纯计算
// ==========================================

pub mod financial;
pub mod ledger;
pub mod lifecycle;
pub mod schedule_planner;

// 重导出核心引擎
pub use financial::{lookup_fcr_rate, BatchHistory, FeedResidualValuation, FinancialCalculator};
pub use ledger::{LedgerEffect, LedgerEngine, LedgerOutcome, LedgerViolation, SnapshotError};
pub use lifecycle::{BatchLifecycleEngine, CapacityViolation, StatusChange};
pub use schedule_planner::SchedulePlanner;
