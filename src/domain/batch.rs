// ==========================================
// 肉鸡养殖台账系统 - 批次领域模型
// ==========================================
// 红线: available_birds = total_birds - total_mortality - Σ出栏数（增量维护）
// 红线: available_birds >= 0
// ==========================================

use crate::domain::types::BatchStatus;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Batch - 养殖批次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: i64,
    pub farm_id: i64,
    pub farm_batch_number: i64,      // 场内批次序号，从 1 开始
    pub manager_id: Option<i64>,

    // ===== 存栏 =====
    pub total_birds: i64,
    pub extra_chicks: i64,           // 赠雏，不计入鸡苗成本
    pub shed_birds: Vec<i64>,        // 分舍入栏数，按舍号顺序

    // ===== 可变计数器 =====
    pub counters: BatchCounters,

    pub cost_per_chicken: f64,
    pub status: BatchStatus,
    pub created_at: NaiveDateTime,   // 可回填，决定计划日期
    pub revision: i64,               // 乐观锁版本号
}

impl Batch {
    /// 入栏日期
    pub fn start_date(&self) -> NaiveDate {
        self.created_at.date()
    }

    /// 指定日期的日龄
    pub fn age_on(&self, date: NaiveDate) -> i64 {
        (date - self.start_date()).num_days()
    }
}

// ==========================================
// BatchCounters - 日报/出栏维护的计数器
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchCounters {
    pub available_birds: i64,
    pub total_mortality: i64,
    pub feed_stock: f64,  // 库存（库存单位：包）
    pub feed_usage: f64,  // 累计耗料（包）
}

impl BatchCounters {
    /// 新批次初始计数
    pub fn initial(total_birds: i64) -> Self {
        Self {
            available_birds: total_birds,
            total_mortality: 0,
            feed_stock: 0.0,
            feed_usage: 0.0,
        }
    }
}

/// 新建批次入参
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBatch {
    pub farm_id: i64,
    pub shed_birds: Vec<i64>,
    pub extra_chicks: i64,
    pub manager_id: Option<i64>,
    pub cost_per_chicken: f64,
    pub created_at: NaiveDateTime,
}

impl NewBatch {
    pub fn total_birds(&self) -> i64 {
        self.shed_birds.iter().sum()
    }
}

/// 批次基本信息修改（不涉及存栏分配）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchEdit {
    pub manager_id: Option<Option<i64>>,
    pub cost_per_chicken: Option<f64>,
    pub extra_chicks: Option<i64>,
    pub created_at: Option<NaiveDateTime>,
}

// ==========================================
// BatchOverview - 批次概览（只读模型）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOverview {
    pub batch_id: i64,
    pub status: BatchStatus,
    pub age_days: i64,
    pub total_birds: i64,
    pub available_birds: i64,
    pub total_mortality: i64,
    pub mortality_rate_pct: f64,
    pub birds_harvested: i64,
    pub feed_stock: f64,
    pub feed_usage: f64,
    pub feed_per_live_bird: f64,
    pub latest_avg_weight: Option<f64>,
    pub pending_schedules: usize,
}
