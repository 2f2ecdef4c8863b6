// ==========================================
// 肉鸡养殖台账系统 - 批次生命周期引擎
// ==========================================
// 职责: 入栏容量校验、批次状态机、结批判定
// 红线: 状态只允许 ONGOING->CLOSING->CLOSED 与 CLOSED->CLOSING
// 红线: 剩余容量 = 容量 - 在养批次占用（实时计算）
// ==========================================

use crate::domain::farm::{CapacityConstraint, Farm, FarmUsage};
use crate::domain::types::BatchStatus;

// ==========================================
// 容量校验结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum CapacityViolation {
    /// 分舍数组长度与鸡舍数不一致
    ShapeMismatch { expected: usize, actual: usize },
    /// 分舍存栏为负
    NegativeAllocation { shed_index: usize, birds: i64 },
    /// 全场剩余容量不足
    FarmExceeded { farm_id: i64, requested: i64, remaining: i64 },
    /// 单舍剩余容量不足
    ShedExceeded { shed_index: usize, requested: i64, remaining: i64 },
}

// ==========================================
// 状态对账结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// 不变
    Unchanged,
    /// 出栏完毕，CLOSING -> CLOSED，生成财务汇总
    Close,
    /// 存栏恢复，CLOSED -> CLOSING，删除财务汇总
    Reopen,
    /// 保持 CLOSED，但账目变化，需要重算汇总
    Recompute,
}

impl StatusChange {
    pub fn target_status(&self, current: BatchStatus) -> BatchStatus {
        match self {
            StatusChange::Close => BatchStatus::Closed,
            StatusChange::Reopen => BatchStatus::Closing,
            StatusChange::Unchanged | StatusChange::Recompute => current,
        }
    }
}

// ==========================================
// BatchLifecycleEngine
// ==========================================
pub struct BatchLifecycleEngine {
    // 无状态引擎
}

impl BatchLifecycleEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// 校验入栏分配
    ///
    /// # 参数
    /// - farm: 养殖场
    /// - usage: 当前在养占用（不含本批次）
    /// - shed_birds: 申请的分舍存栏
    ///
    /// # 返回
    /// - Ok(()): 可入栏
    /// - Err(CapacityViolation): 首个违规项
    pub fn check_allocation(
        &self,
        farm: &Farm,
        usage: &FarmUsage,
        shed_birds: &[i64],
    ) -> Result<(), CapacityViolation> {
        if shed_birds.len() != farm.num_sheds() {
            return Err(CapacityViolation::ShapeMismatch {
                expected: farm.num_sheds(),
                actual: shed_birds.len(),
            });
        }

        if let Some((shed_index, birds)) = shed_birds
            .iter()
            .enumerate()
            .find(|(_, birds)| **birds < 0)
        {
            return Err(CapacityViolation::NegativeAllocation {
                shed_index,
                birds: *birds,
            });
        }

        let requested: i64 = shed_birds.iter().sum();
        if !usage.can_allocate(requested) {
            return Err(CapacityViolation::FarmExceeded {
                farm_id: farm.id,
                requested,
                remaining: usage.remaining(),
            });
        }

        for (shed, birds) in usage.sheds.iter().zip(shed_birds.iter()) {
            if !shed.can_allocate(*birds) {
                return Err(CapacityViolation::ShedExceeded {
                    shed_index: shed.shed_index,
                    requested: *birds,
                    remaining: shed.remaining(),
                });
            }
        }

        Ok(())
    }

    /// 人工状态迁移是否合法
    pub fn is_legal_transition(&self, from: BatchStatus, to: BatchStatus) -> bool {
        matches!(
            (from, to),
            (BatchStatus::Ongoing, BatchStatus::Closing)
                | (BatchStatus::Closing, BatchStatus::Closed)
                | (BatchStatus::Closed, BatchStatus::Closing)
        )
    }

    /// 计数器变化后的状态对账
    ///
    /// 规则:
    /// 1) CLOSING 且存栏为 0 -> 自动结批
    /// 2) CLOSED 且存栏恢复 -> 退回 CLOSING
    /// 3) CLOSED 且仍为 0 -> 重算汇总
    pub fn reconcile(&self, status: BatchStatus, available_birds: i64) -> StatusChange {
        match status {
            BatchStatus::Closing if available_birds == 0 => StatusChange::Close,
            BatchStatus::Closed if available_birds > 0 => StatusChange::Reopen,
            BatchStatus::Closed => StatusChange::Recompute,
            _ => StatusChange::Unchanged,
        }
    }
}

impl Default for BatchLifecycleEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn farm(capacity: i64, sheds: Vec<i64>) -> Farm {
        Farm {
            id: 9,
            name: "测试场".to_string(),
            location: None,
            capacity,
            shed_capacities: sheds,
            condition: None,
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_check_allocation_满场后拒绝() {
        let engine = BatchLifecycleEngine::new();
        let f = farm(100, vec![100]);
        let usage = FarmUsage::from_allocations(&f, &[vec![100]]);

        let result = engine.check_allocation(&f, &usage, &[1]);
        assert_eq!(
            result,
            Err(CapacityViolation::FarmExceeded {
                farm_id: 9,
                requested: 1,
                remaining: 0
            })
        );
    }

    #[test]
    fn test_check_allocation_单舍超限() {
        let engine = BatchLifecycleEngine::new();
        let f = farm(1000, vec![100, 100]);
        let usage = FarmUsage::from_allocations(&f, &[vec![80, 0]]);

        let result = engine.check_allocation(&f, &usage, &[30, 10]);
        assert_eq!(
            result,
            Err(CapacityViolation::ShedExceeded {
                shed_index: 0,
                requested: 30,
                remaining: 20
            })
        );
    }

    #[test]
    fn test_check_allocation_长度不一致() {
        let engine = BatchLifecycleEngine::new();
        let f = farm(200, vec![100, 100]);
        let usage = FarmUsage::from_allocations(&f, &[]);

        assert_eq!(
            engine.check_allocation(&f, &usage, &[50]),
            Err(CapacityViolation::ShapeMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_legal_transitions() {
        let engine = BatchLifecycleEngine::new();
        assert!(engine.is_legal_transition(BatchStatus::Ongoing, BatchStatus::Closing));
        assert!(engine.is_legal_transition(BatchStatus::Closing, BatchStatus::Closed));
        assert!(engine.is_legal_transition(BatchStatus::Closed, BatchStatus::Closing));
        assert!(!engine.is_legal_transition(BatchStatus::Ongoing, BatchStatus::Closed));
        assert!(!engine.is_legal_transition(BatchStatus::Closing, BatchStatus::Ongoing));
        assert!(!engine.is_legal_transition(BatchStatus::Closed, BatchStatus::Closed));
    }

    #[test]
    fn test_reconcile() {
        let engine = BatchLifecycleEngine::new();
        assert_eq!(engine.reconcile(BatchStatus::Closing, 0), StatusChange::Close);
        assert_eq!(engine.reconcile(BatchStatus::Closing, 5), StatusChange::Unchanged);
        assert_eq!(engine.reconcile(BatchStatus::Ongoing, 0), StatusChange::Unchanged);
        assert_eq!(engine.reconcile(BatchStatus::Closed, 3), StatusChange::Reopen);
        assert_eq!(engine.reconcile(BatchStatus::Closed, 0), StatusChange::Recompute);
    }
}
