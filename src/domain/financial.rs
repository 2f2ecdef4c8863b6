// ==========================================
// 肉鸡养殖台账系统 - 财务汇总领域模型
// ==========================================
// 结批时由批次全部日报与出栏记录汇总计算
// 料肉比 (FCR) 分档决定每公斤结算单价
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// FinancialFigures - 计算结果（纯数值，可比较）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FinancialFigures {
    // ===== 成本 =====
    pub feed_cost: f64,
    pub medicine_cost: f64,
    pub vaccine_cost: f64,
    pub health_material_cost: f64,
    pub misc_cost: f64,
    pub bird_cost: f64,
    pub total_cost: f64,

    // ===== 收入与利润 =====
    pub total_revenue: f64,
    pub total_profit: f64,

    // ===== 料肉比 =====
    pub feed_consumed_kg: f64,
    pub total_weight_sold: f64,
    pub birds_sold: i64,
    pub fcr_value: f64,
    pub fcr_rate: f64,
    pub fcr_price: f64,
}

// ==========================================
// FinancialSummary - 批次财务汇总（与已结批批次一对一）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub batch_id: i64,
    pub figures: FinancialFigures,
    pub computed_at: NaiveDateTime,
}

// ==========================================
// FcrRate - 料肉比分档
// ==========================================
// 区间: lower_limit <= fcr < upper_limit（upper_limit 为空表示无上限）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FcrRate {
    pub id: i64,
    pub lower_limit: f64,
    pub upper_limit: Option<f64>,
    pub rate: f64,
}

impl FcrRate {
    pub fn contains(&self, fcr: f64) -> bool {
        fcr >= self.lower_limit && self.upper_limit.map_or(true, |upper| fcr < upper)
    }
}

/// 新建分档入参
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewFcrRate {
    pub lower_limit: f64,
    pub upper_limit: Option<f64>,
    pub rate: f64,
}

/// 校验整套分档：按下限升序、不重叠、仅最后一档可无上限
pub fn validate_fcr_bands(bands: &[NewFcrRate]) -> Result<(), String> {
    for (idx, band) in bands.iter().enumerate() {
        if !band.lower_limit.is_finite() || band.lower_limit < 0.0 {
            return Err(format!("第{}档下限无效: {}", idx + 1, band.lower_limit));
        }
        if !band.rate.is_finite() {
            return Err(format!("第{}档费率无效", idx + 1));
        }
        match band.upper_limit {
            Some(upper) if upper <= band.lower_limit => {
                return Err(format!(
                    "第{}档上限必须大于下限: [{}, {})",
                    idx + 1,
                    band.lower_limit,
                    upper
                ));
            }
            None if idx + 1 != bands.len() => {
                return Err(format!("只有最后一档可以不设上限: 第{}档", idx + 1));
            }
            _ => {}
        }
        if let Some(prev) = idx.checked_sub(1).and_then(|p| bands.get(p)) {
            let prev_upper = prev.upper_limit.unwrap_or(f64::INFINITY);
            if band.lower_limit < prev_upper {
                return Err(format!("第{}档与上一档重叠", idx + 1));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(lower: f64, upper: Option<f64>, rate: f64) -> NewFcrRate {
        NewFcrRate {
            lower_limit: lower,
            upper_limit: upper,
            rate,
        }
    }

    #[test]
    fn test_contains_half_open() {
        let r = FcrRate {
            id: 1,
            lower_limit: 0.0,
            upper_limit: Some(2.0),
            rate: 10.0,
        };
        assert!(r.contains(0.0));
        assert!(r.contains(1.99));
        assert!(!r.contains(2.0));
    }

    #[test]
    fn test_validate_bands_ok() {
        let bands = vec![band(0.0, Some(2.0), 10.0), band(2.0, None, 5.0)];
        assert!(validate_fcr_bands(&bands).is_ok());
    }

    #[test]
    fn test_validate_bands_overlap() {
        let bands = vec![band(0.0, Some(2.0), 10.0), band(1.5, None, 5.0)];
        assert!(validate_fcr_bands(&bands).is_err());
    }

    #[test]
    fn test_validate_bands_unbounded_not_last() {
        let bands = vec![band(0.0, None, 10.0), band(2.0, Some(3.0), 5.0)];
        assert!(validate_fcr_bands(&bands).is_err());
    }
}
