// ==========================================
// 肉鸡养殖台账系统 - 出栏领域模型
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Harvest - 出栏记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Harvest {
    pub id: i64,
    pub batch_id: i64,
    pub date: NaiveDate,
    pub quantity: i64,      // 出栏羽数
    pub weight: f64,        // 总重（公斤）
    pub selling_price: f64, // 每公斤售价
    pub total_value: f64,   // weight × selling_price
}

/// 新建/修改出栏入参
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHarvest {
    pub date: NaiveDate,
    pub quantity: i64,
    pub weight: f64,
    pub selling_price: f64,
}

impl NewHarvest {
    pub fn total_value(&self) -> f64 {
        self.weight * self.selling_price
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.quantity <= 0 {
            return Err(format!("出栏数必须大于0: {}", self.quantity));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(format!("出栏重量不能为负: {}", self.weight));
        }
        if !self.selling_price.is_finite() || self.selling_price < 0.0 {
            return Err(format!("售价不能为负: {}", self.selling_price));
        }
        Ok(())
    }
}
