// ==========================================
// 肉鸡养殖台账系统 - 日报台账引擎
// ==========================================
// 职责: 计算日报对批次计数器的影响，生成带快照的明细行
// 红线: 修改日报只施加差值 (新 - 旧)，不从头重算，避免重复计数
// 红线: 删除日报必须精确抵消录入时的全部影响
// ==========================================

use crate::domain::batch::BatchCounters;
use crate::domain::catalog::CatalogItem;
use crate::domain::ledger::{
    BatchUpdate, ConsumedItemLine, FeedAllocationLine, FeedReturnLine, MiscItemLine, UpdateInput,
    UpdateLines,
};
use crate::domain::types::CatalogKind;
use std::collections::HashMap;
use tracing::debug;

/// 计数器精度（百万分之一），保证 施加 -> 撤销 后数值精确还原
const QTY_SCALE: f64 = 1_000_000.0;

pub(crate) fn round_qty(value: f64) -> f64 {
    (value * QTY_SCALE).round() / QTY_SCALE
}

// ==========================================
// LedgerEffect - 一条日报对批次的影响
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LedgerEffect {
    pub mortality: i64,
    pub feed_used: f64,
    pub allocated: f64,
    pub returned: f64,
}

impl LedgerEffect {
    /// 由录入参数计算（各分量落在计数器精度上）
    pub fn from_input(input: &UpdateInput) -> Self {
        Self {
            mortality: input.mortality_count,
            feed_used: round_qty(input.feed_used),
            allocated: round_qty(input.total_allocated()),
            returned: round_qty(input.total_returned()),
        }
    }

    /// 由已入账记录计算
    pub fn from_record(update: &BatchUpdate, lines: &UpdateLines) -> Self {
        Self {
            mortality: update.mortality_count,
            feed_used: round_qty(update.feed_used),
            allocated: round_qty(lines.feeds.iter().map(|f| f.quantity).sum()),
            returned: round_qty(lines.feed_returns.iter().map(|r| r.quantity).sum()),
        }
    }

    /// 差值 self - other
    pub fn minus(&self, other: &LedgerEffect) -> LedgerEffect {
        LedgerEffect {
            mortality: self.mortality - other.mortality,
            feed_used: round_qty(self.feed_used - other.feed_used),
            allocated: round_qty(self.allocated - other.allocated),
            returned: round_qty(self.returned - other.returned),
        }
    }

    /// 反向影响（用于删除）
    pub fn negated(&self) -> LedgerEffect {
        LedgerEffect::default().minus(self)
    }

    pub fn is_zero(&self) -> bool {
        self.mortality == 0
            && self.feed_used == 0.0
            && self.allocated == 0.0
            && self.returned == 0.0
    }

    /// 库存净变化: 投料 - 耗料 - 退料
    pub fn stock_change(&self) -> f64 {
        self.allocated - self.feed_used - self.returned
    }
}

// ==========================================
// 计数器施加结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerOutcome {
    pub counters: BatchCounters,
    /// 饲料库存为负（数据质量信号，不阻断）
    pub negative_feed_stock: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerViolation {
    /// 死淘增量超过当前存栏
    InsufficientBirds { requested: i64, available: i64 },
    /// 死淘累计将为负（撤销量超过累计）
    NegativeMortality { total_mortality: i64, change: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotError {
    /// 目录中不存在或类别不符
    UnknownItem { kind: CatalogKind, id: i64 },
    /// 退回本批次从未投过的饲料
    ReturnWithoutAllocation { feed_id: i64 },
}

// ==========================================
// 退料估值依据
// ==========================================
/// 某饲料在本批次的投料快照（按投料量加权）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocationSnapshot {
    pub quantity_per_unit: f64,
    pub price: f64,
}

/// 按饲料汇总投料快照
pub fn allocation_basis<'a>(
    allocations: impl IntoIterator<Item = &'a FeedAllocationLine>,
) -> HashMap<i64, AllocationSnapshot> {
    let mut totals: HashMap<i64, (f64, f64, f64)> = HashMap::new();
    for line in allocations {
        let entry = totals.entry(line.feed_id).or_insert((0.0, 0.0, 0.0));
        entry.0 += line.quantity;
        entry.1 += line.total_cost;
        entry.2 += line.quantity * line.quantity_per_unit_at_time;
    }
    totals
        .into_iter()
        .filter(|(_, (qty, _, _))| *qty > 0.0)
        .map(|(feed_id, (qty, cost, kg))| {
            (
                feed_id,
                AllocationSnapshot {
                    quantity_per_unit: kg / qty,
                    price: cost / qty,
                },
            )
        })
        .collect()
}

// ==========================================
// LedgerEngine
// ==========================================
pub struct LedgerEngine {
    // 无状态引擎
}

impl LedgerEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// 将影响施加到计数器
    ///
    /// 1) available -= mortality; total_mortality += mortality
    /// 2) feed_usage += feed_used
    /// 3) feed_stock += allocated - feed_used - returned
    pub fn apply(
        &self,
        counters: &BatchCounters,
        effect: &LedgerEffect,
    ) -> Result<LedgerOutcome, LedgerViolation> {
        if effect.mortality > counters.available_birds {
            return Err(LedgerViolation::InsufficientBirds {
                requested: effect.mortality,
                available: counters.available_birds,
            });
        }
        if counters.total_mortality + effect.mortality < 0 {
            return Err(LedgerViolation::NegativeMortality {
                total_mortality: counters.total_mortality,
                change: effect.mortality,
            });
        }

        let next = BatchCounters {
            available_birds: counters.available_birds - effect.mortality,
            total_mortality: counters.total_mortality + effect.mortality,
            feed_usage: round_qty(counters.feed_usage + effect.feed_used),
            feed_stock: round_qty(counters.feed_stock + effect.stock_change()),
        };

        debug!(
            mortality = effect.mortality,
            feed_used = effect.feed_used,
            allocated = effect.allocated,
            returned = effect.returned,
            feed_stock = next.feed_stock,
            "台账影响已施加"
        );

        Ok(LedgerOutcome {
            counters: next,
            negative_feed_stock: next.feed_stock < 0.0,
        })
    }

    /// 生成带快照的明细行
    ///
    /// # 参数
    /// - input: 日报录入参数
    /// - catalog: 涉及的目录物料（按ID索引）
    /// - previous: 修改日报时的旧明细；同一物料沿用旧快照价格，目录调价不追溯
    /// - prior_allocations: 本批次其他日报的投料明细；退料按本批次投料快照估值，不取目录现价
    pub fn build_lines(
        &self,
        input: &UpdateInput,
        catalog: &HashMap<i64, CatalogItem>,
        previous: Option<&UpdateLines>,
        prior_allocations: &[FeedAllocationLine],
    ) -> Result<UpdateLines, SnapshotError> {
        let lookup = |kind: CatalogKind, id: i64| -> Result<&CatalogItem, SnapshotError> {
            catalog
                .get(&id)
                .filter(|item| item.kind == kind)
                .ok_or(SnapshotError::UnknownItem { kind, id })
        };

        let mut lines = UpdateLines::default();

        for feed in &input.feeds {
            let (qpu, price) = match previous
                .and_then(|p| p.feeds.iter().find(|old| old.feed_id == feed.feed_id))
            {
                Some(old) => (old.quantity_per_unit_at_time, old.price_at_time),
                None => {
                    let item = lookup(CatalogKind::Feed, feed.feed_id)?;
                    (item.quantity_per_unit, item.price)
                }
            };
            lines.feeds.push(FeedAllocationLine {
                feed_id: feed.feed_id,
                quantity: feed.quantity,
                quantity_per_unit_at_time: qpu,
                price_at_time: price,
                total_cost: feed.quantity * price,
            });
        }

        let basis = allocation_basis(prior_allocations.iter().chain(lines.feeds.iter()));
        for ret in &input.feed_returns {
            let snapshot = basis
                .get(&ret.feed_id)
                .ok_or(SnapshotError::ReturnWithoutAllocation { feed_id: ret.feed_id })?;
            let (qpu, price) = match previous
                .and_then(|p| p.feed_returns.iter().find(|old| old.feed_id == ret.feed_id))
            {
                Some(old) => (old.quantity_per_unit_at_time, old.price_at_time),
                None => (snapshot.quantity_per_unit, snapshot.price),
            };
            lines.feed_returns.push(FeedReturnLine {
                feed_id: ret.feed_id,
                quantity: ret.quantity,
                quantity_per_unit_at_time: qpu,
                price_at_time: price,
            });
        }

        for consumed in &input.items {
            let kind = consumed.item.kind();
            let id = consumed.item.id();
            let (qpu, unit_type, price) = match previous.and_then(|p| {
                p.items
                    .iter()
                    .find(|old| old.item.kind() == kind && old.item.id() == id)
            }) {
                Some(old) => (old.quantity_per_unit_at_time, old.unit_type, old.price_at_time),
                None => {
                    let item = lookup(kind, id)?;
                    (item.quantity_per_unit, item.unit_type, item.price)
                }
            };
            lines.items.push(ConsumedItemLine {
                item: consumed.item,
                quantity: consumed.quantity,
                quantity_per_unit_at_time: qpu,
                unit_type,
                price_at_time: price,
                total_cost: consumed.quantity * price,
                schedule_id: consumed.schedule_id,
            });
        }

        for misc in &input.misc_items {
            lines.misc_items.push(MiscItemLine {
                name: misc.name.trim().to_string(),
                quantity: misc.quantity,
                unit_price: misc.unit_price,
                total_cost: misc.quantity * misc.unit_price,
            });
        }

        Ok(lines)
    }
}

impl Default for LedgerEngine {
    fn default() -> Self {
        Self::new()
    }
}
