// ==========================================
// 肉鸡养殖台账系统 - 计划生成引擎
// ==========================================
// 职责: 按自动计划模板的日龄偏移生成具体日期的计划
// 规则: scheduled_date = 入栏日期 + 偏移天数
// 规则: 疫苗剂次按疫苗自身剂次日龄匹配，未命中回退第 1 剂
// ==========================================

use crate::domain::catalog::CatalogItem;
use crate::domain::schedule::{AutoSchedule, PlannedSchedule, ScheduleTarget};
use crate::domain::types::CatalogKind;
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use tracing::warn;

pub struct SchedulePlanner {
    // 无状态引擎
}

impl SchedulePlanner {
    pub fn new() -> Self {
        Self {}
    }

    /// 为批次生成计划
    ///
    /// # 参数
    /// - start_date: 批次入栏日期
    /// - templates: 自动计划模板
    /// - catalog: 模板涉及的目录物料（疫苗需要剂次日龄）
    ///
    /// # 返回
    /// 按日期、模板顺序排列的待写入计划；目录中已不存在的模板被跳过
    pub fn plan_for_batch(
        &self,
        start_date: NaiveDate,
        templates: &[AutoSchedule],
        catalog: &HashMap<i64, CatalogItem>,
    ) -> Vec<PlannedSchedule> {
        let mut planned = Vec::new();

        for template in templates {
            let item = match catalog.get(&template.item_id).filter(|i| i.kind == template.kind) {
                Some(item) => item,
                None => {
                    warn!(
                        auto_schedule_id = template.id,
                        item_id = template.item_id,
                        kind = %template.kind,
                        "自动计划模板引用的物料不存在，跳过"
                    );
                    continue;
                }
            };

            for offset in &template.offsets {
                let target = match template.kind {
                    CatalogKind::Medicine => ScheduleTarget::Medicine {
                        medicine_id: item.id,
                    },
                    CatalogKind::Vaccine => ScheduleTarget::Vaccine {
                        vaccine_id: item.id,
                        dose_number: item.dose_number_for_age(*offset),
                    },
                    CatalogKind::HealthMaterial => ScheduleTarget::HealthMaterial {
                        health_material_id: item.id,
                    },
                    CatalogKind::Feed => continue,
                };

                planned.push(PlannedSchedule {
                    target,
                    scheduled_date: start_date + Duration::days(i64::from(*offset)),
                    notes: Some(format!("自动计划: 第{}日龄", offset)),
                });
            }
        }

        planned.sort_by_key(|p| p.scheduled_date);
        planned
    }

    /// 入栏日期变化后的计划日期平移
    pub fn shift(&self, date: NaiveDate, delta_days: i64) -> NaiveDate {
        date + Duration::days(delta_days)
    }
}

impl Default for SchedulePlanner {
    fn default() -> Self {
        Self::new()
    }
}
