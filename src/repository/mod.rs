// ==========================================
// 肉鸡养殖台账系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约定: `*_tx` 关联函数接收调用方持有的连接/事务，
//       由 API 层决定事务边界
// ==========================================

pub mod batch_repo;
pub mod catalog_repo;
pub mod codec;
pub mod error;
pub mod farm_repo;
pub mod financial_repo;
pub mod harvest_repo;
pub mod ledger_repo;
pub mod schedule_repo;

// 重导出核心仓储
pub use batch_repo::{BatchDetails, BatchRepository};
pub use catalog_repo::CatalogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use farm_repo::FarmRepository;
pub use financial_repo::FinancialRepository;
pub use harvest_repo::HarvestRepository;
pub use ledger_repo::LedgerRepository;
pub use schedule_repo::ScheduleRepository;
