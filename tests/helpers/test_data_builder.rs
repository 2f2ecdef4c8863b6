// ==========================================
// 测试数据构建器
// ==========================================
// 职责: 以链式调用构造领域入参，减少测试样板代码
// ==========================================

use broiler_farm_ledger::domain::catalog::{ItemRef, NewCatalogItem};
use broiler_farm_ledger::domain::farm::NewFarm;
use broiler_farm_ledger::domain::harvest::NewHarvest;
use broiler_farm_ledger::domain::ledger::{
    ConsumedItemInput, FeedAllocationInput, FeedReturnInput, MiscItemInput, UpdateInput,
};
use broiler_farm_ledger::domain::types::{CatalogKind, UnitType};
use chrono::NaiveDate;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ==========================================
// 养殖场
// ==========================================
pub struct FarmBuilder {
    farm: NewFarm,
}

impl FarmBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            farm: NewFarm {
                name: name.to_string(),
                location: None,
                capacity: 1000,
                shed_capacities: vec![1000],
                condition: None,
            },
        }
    }

    pub fn capacity(mut self, capacity: i64) -> Self {
        self.farm.capacity = capacity;
        self
    }

    pub fn sheds(mut self, sheds: &[i64]) -> Self {
        self.farm.shed_capacities = sheds.to_vec();
        self
    }

    pub fn build(self) -> NewFarm {
        self.farm
    }
}

// ==========================================
// 物料
// ==========================================
pub struct CatalogItemBuilder {
    item: NewCatalogItem,
}

impl CatalogItemBuilder {
    pub fn feed(name: &str, price: f64) -> Self {
        Self::new(CatalogKind::Feed, name, UnitType::Packet, 50.0, price)
    }

    pub fn medicine(name: &str, price: f64) -> Self {
        Self::new(CatalogKind::Medicine, name, UnitType::Gram, 100.0, price)
    }

    pub fn vaccine(name: &str, price: f64, dose_ages: &[u32]) -> Self {
        let mut builder = Self::new(CatalogKind::Vaccine, name, UnitType::Dose, 1000.0, price);
        builder.item.dose_ages = dose_ages.to_vec();
        builder
    }

    fn new(kind: CatalogKind, name: &str, unit_type: UnitType, qpu: f64, price: f64) -> Self {
        Self {
            item: NewCatalogItem {
                kind,
                name: name.to_string(),
                unit_type,
                quantity_per_unit: qpu,
                price,
                description: None,
                dose_ages: Vec::new(),
            },
        }
    }

    pub fn quantity_per_unit(mut self, qpu: f64) -> Self {
        self.item.quantity_per_unit = qpu;
        self
    }

    pub fn build(self) -> NewCatalogItem {
        self.item
    }
}

// ==========================================
// 日报
// ==========================================
pub struct UpdateBuilder {
    input: UpdateInput,
}

impl UpdateBuilder {
    pub fn on(date: NaiveDate) -> Self {
        Self {
            input: UpdateInput {
                date,
                ..Default::default()
            },
        }
    }

    pub fn mortality(mut self, count: i64) -> Self {
        self.input.mortality_count = count;
        self
    }

    pub fn feed_used(mut self, packets: f64) -> Self {
        self.input.feed_used = packets;
        self
    }

    pub fn avg_weight(mut self, kg: f64) -> Self {
        self.input.avg_weight = kg;
        self
    }

    pub fn allocate(mut self, feed_id: i64, quantity: f64) -> Self {
        self.input.feeds.push(FeedAllocationInput { feed_id, quantity });
        self
    }

    pub fn return_feed(mut self, feed_id: i64, quantity: f64) -> Self {
        self.input.feed_returns.push(FeedReturnInput { feed_id, quantity });
        self
    }

    pub fn consume(mut self, item: ItemRef, quantity: f64, schedule_id: Option<i64>) -> Self {
        self.input.items.push(ConsumedItemInput {
            item,
            quantity,
            schedule_id,
        });
        self
    }

    pub fn misc(mut self, name: &str, quantity: f64, unit_price: f64) -> Self {
        self.input.misc_items.push(MiscItemInput {
            name: name.to_string(),
            quantity,
            unit_price,
        });
        self
    }

    pub fn build(self) -> UpdateInput {
        self.input
    }
}

// ==========================================
// 出栏
// ==========================================
pub fn harvest(date: NaiveDate, quantity: i64, weight: f64, selling_price: f64) -> NewHarvest {
    NewHarvest {
        date,
        quantity,
        weight,
        selling_price,
    }
}
