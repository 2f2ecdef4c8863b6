// ==========================================
// 肉鸡养殖台账系统 - 财务汇总计算引擎
// ==========================================
// 职责: 由批次完整历史（日报 + 出栏）计算成本、收入、利润与料肉比
// 红线: 纯函数，同一历史重复计算结果完全一致
// ==========================================
// 饲料成本 = Σ投料金额 - Σ退料金额 - 剩余库存估值
// 料肉比   = 实耗饲料(kg) / 出栏总重(kg)
// 利润     = 收入 - (各项成本 + 鸡苗成本 + 料肉比结算额)
// ==========================================

use crate::domain::batch::Batch;
use crate::domain::financial::{FcrRate, FinancialFigures};
use crate::domain::harvest::Harvest;
use crate::domain::ledger::BatchUpdateDetail;
use crate::domain::types::CatalogKind;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

// ==========================================
// 剩余库存估值口径
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedResidualValuation {
    /// 按全部投料的加权平均单价/单重估值（多品牌同时在库时不偏向任何一种）
    #[default]
    WeightedAverage,
    /// 按最近一次投料的单价/单重估值
    LatestPrice,
    /// 不扣减剩余库存
    None,
}

impl FeedResidualValuation {
    pub fn to_config_str(&self) -> &'static str {
        match self {
            FeedResidualValuation::WeightedAverage => "weighted_average",
            FeedResidualValuation::LatestPrice => "latest_price",
            FeedResidualValuation::None => "none",
        }
    }

    pub fn from_config_str(s: &str) -> Option<Self> {
        match s.trim() {
            "weighted_average" => Some(FeedResidualValuation::WeightedAverage),
            "latest_price" => Some(FeedResidualValuation::LatestPrice),
            "none" => Some(FeedResidualValuation::None),
            _ => None,
        }
    }
}

// ==========================================
// BatchHistory - 计算输入
// ==========================================
#[derive(Debug, Clone)]
pub struct BatchHistory {
    pub batch: Batch,
    /// 按日期升序
    pub updates: Vec<BatchUpdateDetail>,
    pub harvests: Vec<Harvest>,
}

/// 剩余库存估值
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct ResidualStock {
    value: f64,
    kg: f64,
}

// ==========================================
// FinancialCalculator
// ==========================================
pub struct FinancialCalculator {
    valuation: FeedResidualValuation,
}

impl FinancialCalculator {
    pub fn new(valuation: FeedResidualValuation) -> Self {
        Self { valuation }
    }

    /// 计算财务汇总
    ///
    /// # 参数
    /// - history: 批次完整历史
    /// - rates: 料肉比分档（任意顺序）
    #[instrument(skip(self, history, rates), fields(batch_id = history.batch.id, valuation = ?self.valuation))]
    pub fn calculate(&self, history: &BatchHistory, rates: &[FcrRate]) -> FinancialFigures {
        let batch = &history.batch;

        // ===== 饲料 =====
        let mut allocated_cost = 0.0;
        let mut allocated_kg = 0.0;
        let mut returned_cost = 0.0;
        let mut returned_kg = 0.0;
        for detail in &history.updates {
            for feed in &detail.lines.feeds {
                allocated_cost += feed.total_cost;
                allocated_kg += feed.quantity * feed.quantity_per_unit_at_time;
            }
            for ret in &detail.lines.feed_returns {
                returned_cost += ret.quantity * ret.price_at_time;
                returned_kg += ret.quantity * ret.quantity_per_unit_at_time;
            }
        }

        let residual = self.residual_stock(history);
        let feed_cost = allocated_cost - returned_cost - residual.value;
        let feed_consumed_kg = allocated_kg - returned_kg - residual.kg;

        // ===== 药品/疫苗/保健耗材/杂项 =====
        let mut medicine_cost = 0.0;
        let mut vaccine_cost = 0.0;
        let mut health_material_cost = 0.0;
        let mut misc_cost = 0.0;
        for detail in &history.updates {
            for item in &detail.lines.items {
                match item.item.kind() {
                    CatalogKind::Medicine => medicine_cost += item.total_cost,
                    CatalogKind::Vaccine => vaccine_cost += item.total_cost,
                    CatalogKind::HealthMaterial => health_material_cost += item.total_cost,
                    CatalogKind::Feed => {}
                }
            }
            misc_cost += detail
                .lines
                .misc_items
                .iter()
                .map(|m| m.total_cost)
                .sum::<f64>();
        }

        let bird_cost = (batch.total_birds - batch.extra_chicks) as f64 * batch.cost_per_chicken;

        // ===== 出栏 =====
        let total_revenue: f64 = history.harvests.iter().map(|h| h.total_value).sum();
        let total_weight_sold: f64 = history.harvests.iter().map(|h| h.weight).sum();
        let birds_sold: i64 = history.harvests.iter().map(|h| h.quantity).sum();

        // ===== 料肉比 =====
        let fcr_value = if total_weight_sold > 0.0 {
            feed_consumed_kg / total_weight_sold
        } else {
            0.0
        };
        // 未出栏时不查分档
        let fcr_rate = if total_weight_sold > 0.0 {
            match lookup_fcr_rate(rates, fcr_value) {
                Some(band) => band.rate,
                None => {
                    warn!(batch_id = batch.id, fcr_value, "料肉比未命中任何分档，按0计价");
                    0.0
                }
            }
        } else {
            0.0
        };
        let fcr_price = total_weight_sold * fcr_rate;

        let total_cost =
            feed_cost + medicine_cost + vaccine_cost + health_material_cost + misc_cost + bird_cost;
        let total_profit = total_revenue - (total_cost + fcr_price);

        FinancialFigures {
            feed_cost,
            medicine_cost,
            vaccine_cost,
            health_material_cost,
            misc_cost,
            bird_cost,
            total_cost,
            total_revenue,
            total_profit,
            feed_consumed_kg,
            total_weight_sold,
            birds_sold,
            fcr_value,
            fcr_rate,
            fcr_price,
        }
    }

    /// 剩余库存估值（负库存按 0 处理）
    fn residual_stock(&self, history: &BatchHistory) -> ResidualStock {
        let stock = history.batch.counters.feed_stock.max(0.0);
        if stock == 0.0 {
            return ResidualStock::default();
        }

        let feeds = history.updates.iter().flat_map(|d| d.lines.feeds.iter());

        match self.valuation {
            FeedResidualValuation::None => ResidualStock::default(),
            FeedResidualValuation::LatestPrice => match feeds.last() {
                Some(latest) => ResidualStock {
                    value: stock * latest.price_at_time,
                    kg: stock * latest.quantity_per_unit_at_time,
                },
                None => ResidualStock::default(),
            },
            FeedResidualValuation::WeightedAverage => {
                let (qty, cost, kg) = feeds.fold((0.0, 0.0, 0.0), |(q, c, k), f| {
                    (
                        q + f.quantity,
                        c + f.total_cost,
                        k + f.quantity * f.quantity_per_unit_at_time,
                    )
                });
                if qty <= 0.0 {
                    return ResidualStock::default();
                }
                ResidualStock {
                    value: stock * cost / qty,
                    kg: stock * kg / qty,
                }
            }
        }
    }
}

/// 料肉比分档查找
///
/// 按下限升序扫描，取第一个满足 lower <= fcr < upper（或无上限）的分档
pub fn lookup_fcr_rate(rates: &[FcrRate], fcr: f64) -> Option<&FcrRate> {
    let mut ordered: Vec<&FcrRate> = rates.iter().collect();
    ordered.sort_by(|a, b| a.lower_limit.total_cmp(&b.lower_limit));
    ordered.into_iter().find(|band| band.contains(fcr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::batch::BatchCounters;
    use crate::domain::catalog::ItemRef;
    use crate::domain::ledger::{
        BatchUpdate, ConsumedItemLine, FeedAllocationLine, FeedReturnLine, MiscItemLine,
        UpdateLines,
    };
    use crate::domain::types::{BatchStatus, RemarksPriority, UnitType};
    use chrono::NaiveDate;

    fn rates() -> Vec<FcrRate> {
        vec![
            FcrRate {
                id: 2,
                lower_limit: 2.0,
                upper_limit: None,
                rate: 5.0,
            },
            FcrRate {
                id: 1,
                lower_limit: 0.0,
                upper_limit: Some(2.0),
                rate: 10.0,
            },
        ]
    }

    fn batch(feed_stock: f64) -> Batch {
        Batch {
            id: 1,
            farm_id: 1,
            farm_batch_number: 1,
            manager_id: None,
            total_birds: 110,
            extra_chicks: 10,
            shed_birds: vec![110],
            counters: BatchCounters {
                available_birds: 0,
                total_mortality: 10,
                feed_stock,
                feed_usage: 0.0,
            },
            cost_per_chicken: 30.0,
            status: BatchStatus::Closed,
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            revision: 1,
        }
    }

    fn detail(day: u32, lines: UpdateLines) -> BatchUpdateDetail {
        let date = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        BatchUpdateDetail {
            update: BatchUpdate {
                id: i64::from(day),
                batch_id: 1,
                date,
                mortality_count: 0,
                feed_used: 0.0,
                avg_weight: 0.0,
                male_weight: None,
                female_weight: None,
                remarks: None,
                remarks_priority: RemarksPriority::Low,
                created_at: date.and_hms_opt(0, 0, 0).unwrap(),
            },
            lines,
        }
    }

    fn feed_line(quantity: f64, qpu: f64, price: f64) -> FeedAllocationLine {
        FeedAllocationLine {
            feed_id: 1,
            quantity,
            quantity_per_unit_at_time: qpu,
            price_at_time: price,
            total_cost: quantity * price,
        }
    }

    fn history(feed_stock: f64) -> BatchHistory {
        BatchHistory {
            batch: batch(feed_stock),
            updates: vec![
                detail(
                    2,
                    UpdateLines {
                        feeds: vec![feed_line(10.0, 50.0, 100.0)],
                        items: vec![ConsumedItemLine {
                            item: ItemRef::Vaccine {
                                id: 3,
                                dose_number: 1,
                            },
                            quantity: 2.0,
                            quantity_per_unit_at_time: 1000.0,
                            unit_type: UnitType::Dose,
                            price_at_time: 40.0,
                            total_cost: 80.0,
                            schedule_id: None,
                        }],
                        misc_items: vec![MiscItemLine {
                            name: "垫料".to_string(),
                            quantity: 3.0,
                            unit_price: 5.0,
                            total_cost: 15.0,
                        }],
                        ..Default::default()
                    },
                ),
                detail(
                    3,
                    UpdateLines {
                        feeds: vec![feed_line(10.0, 40.0, 120.0)],
                        feed_returns: vec![FeedReturnLine {
                            feed_id: 1,
                            quantity: 2.0,
                            quantity_per_unit_at_time: 40.0,
                            price_at_time: 120.0,
                        }],
                        ..Default::default()
                    },
                ),
            ],
            harvests: vec![Harvest {
                id: 1,
                batch_id: 1,
                date: NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
                quantity: 100,
                weight: 400.0,
                selling_price: 10.0,
                total_value: 4000.0,
            }],
        }
    }

    #[test]
    fn test_lookup_fcr_rate_分档() {
        let r = rates();
        assert_eq!(lookup_fcr_rate(&r, 1.5).map(|b| b.rate), Some(10.0));
        assert_eq!(lookup_fcr_rate(&r, 3.0).map(|b| b.rate), Some(5.0));
        assert_eq!(lookup_fcr_rate(&r, 2.0).map(|b| b.rate), Some(5.0));
        assert!(lookup_fcr_rate(&[], 1.0).is_none());
    }

    #[test]
    fn test_calculate_无剩余库存() {
        let calc = FinancialCalculator::new(FeedResidualValuation::WeightedAverage);
        let f = calc.calculate(&history(0.0), &rates());

        // 投料 1000 + 1200，退料 240
        assert_eq!(f.feed_cost, 1960.0);
        // 500 + 400 - 80
        assert_eq!(f.feed_consumed_kg, 820.0);
        assert_eq!(f.vaccine_cost, 80.0);
        assert_eq!(f.misc_cost, 15.0);
        assert_eq!(f.bird_cost, 3000.0);
        assert_eq!(f.total_revenue, 4000.0);
        assert_eq!(f.fcr_value, 820.0 / 400.0);
        assert_eq!(f.fcr_rate, 5.0);
        assert_eq!(f.fcr_price, 2000.0);
        assert_eq!(f.total_cost, 1960.0 + 80.0 + 15.0 + 3000.0);
        assert_eq!(f.total_profit, 4000.0 - (5055.0 + 2000.0));
    }

    #[test]
    fn test_calculate_加权平均估值() {
        let calc = FinancialCalculator::new(FeedResidualValuation::WeightedAverage);
        let f = calc.calculate(&history(4.0), &rates());

        // 均价 (1000+1200)/20 = 110，均重 (500+400)/20 = 45
        assert_eq!(f.feed_cost, 1960.0 - 440.0);
        assert_eq!(f.feed_consumed_kg, 820.0 - 180.0);
    }

    #[test]
    fn test_calculate_最近价格估值() {
        let calc = FinancialCalculator::new(FeedResidualValuation::LatestPrice);
        let f = calc.calculate(&history(4.0), &rates());

        assert_eq!(f.feed_cost, 1960.0 - 480.0);
        assert_eq!(f.feed_consumed_kg, 820.0 - 160.0);
    }

    #[test]
    fn test_calculate_幂等() {
        let calc = FinancialCalculator::new(FeedResidualValuation::WeightedAverage);
        let h = history(4.0);
        assert_eq!(calc.calculate(&h, &rates()), calc.calculate(&h, &rates()));
    }

    #[test]
    fn test_calculate_未出栏料肉比为0() {
        let calc = FinancialCalculator::new(FeedResidualValuation::None);
        let mut h = history(0.0);
        h.harvests.clear();
        let f = calc.calculate(&h, &rates());

        assert_eq!(f.fcr_value, 0.0);
        assert_eq!(f.fcr_price, 0.0);
        assert_eq!(f.total_revenue, 0.0);
    }
}
