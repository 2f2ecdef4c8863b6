// ==========================================
// 肉鸡养殖台账系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository/Engine错误为可解释的业务错误
// 约定: 每个错误都带显式原因，调用方可据此提示操作人
// ==========================================

use crate::domain::types::BatchStatus;
use crate::engine::ledger::{LedgerViolation, SnapshotError};
use crate::engine::lifecycle::CapacityViolation;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 台账业务错误
    // ==========================================
    /// 入栏超出养殖场或鸡舍剩余容量
    #[error("容量不足: {0}")]
    CapacityExceeded(String),

    /// 同一批次同一日期已有日报
    #[error("日报重复: batch_id={batch_id}, date={date}")]
    DuplicateUpdate { batch_id: i64, date: String },

    /// 非法的批次状态迁移
    #[error("无效的状态转换: from={from} to={to}")]
    InvalidTransition { from: BatchStatus, to: BatchStatus },

    /// 死淘/出栏数超过当前存栏
    #[error("存栏不足: requested={requested}, available={available}")]
    InsufficientBirds { requested: i64, available: i64 },

    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 数据状态不一致（分舍形状不符、被引用的记录不可删除等）
    #[error("数据状态不一致: {0}")]
    InconsistentState(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("并发修改冲突: {0}")]
    ConcurrentModification(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure {
                batch_id,
                expected,
                actual,
            } => ApiError::ConcurrentModification(format!(
                "批次{}已被其他操作修改（期望revision={}，实际revision={}）",
                batch_id, expected, actual
            )),
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::InconsistentState(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InconsistentState(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::DatabaseError(format!("字段值错误 (field={}): {}", field, message))
            }
            RepositoryError::Other(e) => ApiError::Other(e),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::from(err).into()
    }
}

// ==========================================
// 从 Engine 违规转换
// ==========================================
impl From<CapacityViolation> for ApiError {
    fn from(v: CapacityViolation) -> Self {
        match v {
            CapacityViolation::ShapeMismatch { expected, actual } => ApiError::InconsistentState(
                format!("分舍数量不符: 养殖场有{}个鸡舍，提交了{}个", expected, actual),
            ),
            CapacityViolation::NegativeAllocation { shed_index, birds } => {
                ApiError::InvalidInput(format!("第{}舍入栏数不能为负: {}", shed_index + 1, birds))
            }
            CapacityViolation::FarmExceeded {
                farm_id,
                requested,
                remaining,
            } => ApiError::CapacityExceeded(format!(
                "养殖场{}剩余容量{}，申请{}",
                farm_id, remaining, requested
            )),
            CapacityViolation::ShedExceeded {
                shed_index,
                requested,
                remaining,
            } => ApiError::CapacityExceeded(format!(
                "第{}舍剩余容量{}，申请{}",
                shed_index + 1,
                remaining,
                requested
            )),
        }
    }
}

impl From<LedgerViolation> for ApiError {
    fn from(v: LedgerViolation) -> Self {
        match v {
            LedgerViolation::InsufficientBirds {
                requested,
                available,
            } => ApiError::InsufficientBirds {
                requested,
                available,
            },
            LedgerViolation::NegativeMortality {
                total_mortality,
                change,
            } => ApiError::InconsistentState(format!(
                "累计死淘{}无法抵消变化量{}",
                total_mortality, change
            )),
        }
    }
}

impl From<SnapshotError> for ApiError {
    fn from(e: SnapshotError) -> Self {
        match e {
            SnapshotError::UnknownItem { kind, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", kind, id))
            }
            SnapshotError::ReturnWithoutAllocation { feed_id } => {
                ApiError::InvalidInput(format!("饲料(id={})未向本批次投料，不能退料", feed_id))
            }
        }
    }
}

/// API层结果类型
pub type ApiResult<T> = Result<T, ApiError>;
