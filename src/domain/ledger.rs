// ==========================================
// 肉鸡养殖台账系统 - 日报台账领域模型
// ==========================================
// 每个批次每天一条日报；日报下挂投料、退料、消耗、杂项明细
// 明细保存录入当时的单价与含量快照，目录调价不追溯
// ==========================================

use crate::domain::catalog::ItemRef;
use crate::domain::types::{RemarksPriority, UnitType};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// 日报录入参数
// ==========================================

/// 日报录入/修改入参
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateInput {
    pub date: NaiveDate,
    pub mortality_count: i64,
    pub feed_used: f64,
    pub avg_weight: f64,
    pub male_weight: Option<f64>,
    pub female_weight: Option<f64>,
    pub remarks: Option<String>,
    #[serde(default)]
    pub remarks_priority: RemarksPriority,
    #[serde(default)]
    pub feeds: Vec<FeedAllocationInput>,
    #[serde(default)]
    pub feed_returns: Vec<FeedReturnInput>,
    #[serde(default)]
    pub items: Vec<ConsumedItemInput>,
    #[serde(default)]
    pub misc_items: Vec<MiscItemInput>,
}

/// 投料（入库到批次）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedAllocationInput {
    pub feed_id: i64,
    pub quantity: f64,
}

/// 退料（从批次库存退回）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedReturnInput {
    pub feed_id: i64,
    pub quantity: f64,
}

/// 药品/疫苗/保健耗材消耗，可关联计划
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsumedItemInput {
    pub item: ItemRef,
    pub quantity: f64,
    pub schedule_id: Option<i64>,
}

/// 目录外杂项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiscItemInput {
    pub name: String,
    pub quantity: f64,
    pub unit_price: f64,
}

impl UpdateInput {
    /// 校验入参，返回首个违规原因
    pub fn validate(&self) -> Result<(), String> {
        if self.mortality_count < 0 {
            return Err(format!("死淘数不能为负: {}", self.mortality_count));
        }
        for (field, value) in [("feed_used", self.feed_used), ("avg_weight", self.avg_weight)] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} 不能为负: {}", field, value));
            }
        }
        for (field, value) in [("male_weight", self.male_weight), ("female_weight", self.female_weight)] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(format!("{} 不能为负: {}", field, v));
                }
            }
        }

        let mut seen_feeds = Vec::with_capacity(self.feeds.len());
        for feed in &self.feeds {
            if !feed.quantity.is_finite() || feed.quantity <= 0.0 {
                return Err(format!("投料数量必须大于0: feed_id={}", feed.feed_id));
            }
            if seen_feeds.contains(&feed.feed_id) {
                return Err(format!("同一饲料不能重复投料: feed_id={}", feed.feed_id));
            }
            seen_feeds.push(feed.feed_id);
        }
        for ret in &self.feed_returns {
            if !ret.quantity.is_finite() || ret.quantity <= 0.0 {
                return Err(format!("退料数量必须大于0: feed_id={}", ret.feed_id));
            }
        }
        for item in &self.items {
            if !item.quantity.is_finite() || item.quantity <= 0.0 {
                return Err(format!("消耗数量必须大于0: item_id={}", item.item.id()));
            }
        }
        for misc in &self.misc_items {
            if misc.name.trim().is_empty() {
                return Err("杂项名称不能为空".to_string());
            }
            if !misc.quantity.is_finite() || misc.quantity < 0.0 {
                return Err(format!("杂项数量不能为负: {}", misc.name));
            }
            if !misc.unit_price.is_finite() || misc.unit_price < 0.0 {
                return Err(format!("杂项单价不能为负: {}", misc.name));
            }
        }
        Ok(())
    }

    /// 投料总量
    pub fn total_allocated(&self) -> f64 {
        self.feeds.iter().map(|f| f.quantity).sum()
    }

    /// 退料总量
    pub fn total_returned(&self) -> f64 {
        self.feed_returns.iter().map(|r| r.quantity).sum()
    }
}

// ==========================================
// 已入账记录
// ==========================================

/// 日报主记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchUpdate {
    pub id: i64,
    pub batch_id: i64,
    pub date: NaiveDate,
    pub mortality_count: i64,
    pub feed_used: f64,
    pub avg_weight: f64,
    pub male_weight: Option<f64>,
    pub female_weight: Option<f64>,
    pub remarks: Option<String>,
    pub remarks_priority: RemarksPriority,
    pub created_at: NaiveDateTime,
}

/// 投料明细（含快照）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedAllocationLine {
    pub feed_id: i64,
    pub quantity: f64,
    pub quantity_per_unit_at_time: f64,
    pub price_at_time: f64,
    pub total_cost: f64,
}

/// 退料明细（含快照）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedReturnLine {
    pub feed_id: i64,
    pub quantity: f64,
    pub quantity_per_unit_at_time: f64,
    pub price_at_time: f64,
}

/// 消耗明细（含快照）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumedItemLine {
    pub item: ItemRef,
    pub quantity: f64,
    pub quantity_per_unit_at_time: f64,
    pub unit_type: UnitType,
    pub price_at_time: f64,
    pub total_cost: f64,
    pub schedule_id: Option<i64>,
}

/// 杂项明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiscItemLine {
    pub name: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_cost: f64,
}

/// 日报明细全集
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateLines {
    pub feeds: Vec<FeedAllocationLine>,
    pub feed_returns: Vec<FeedReturnLine>,
    pub items: Vec<ConsumedItemLine>,
    pub misc_items: Vec<MiscItemLine>,
}

impl UpdateLines {
    /// 本日报关联的计划ID（去重）
    pub fn schedule_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.items.iter().filter_map(|i| i.schedule_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// 日报详情（主记录 + 明细）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchUpdateDetail {
    pub update: BatchUpdate,
    pub lines: UpdateLines,
}
