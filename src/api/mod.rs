// ==========================================
// 肉鸡养殖台账系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口，每个写操作一个事务
// ==========================================

pub mod batch_api;
pub(crate) mod batch_state;
pub mod catalog_api;
pub mod error;
pub mod farm_api;
pub mod financial_api;
pub mod ledger_api;
pub mod schedule_api;

// 重导出核心类型
pub use batch_api::BatchApi;
pub use catalog_api::CatalogApi;
pub use error::{ApiError, ApiResult};
pub use farm_api::FarmApi;
pub use financial_api::FinancialApi;
pub use ledger_api::LedgerApi;
pub use schedule_api::ScheduleApi;
