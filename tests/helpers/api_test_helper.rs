// ==========================================
// API集成测试辅助工具
// ==========================================
// 职责: 提供API层集成测试的通用环境与断言
// ==========================================

#[path = "../test_helpers.rs"]
mod test_helpers;

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tempfile::NamedTempFile;

use broiler_farm_ledger::api::{
    ApiError, BatchApi, CatalogApi, FarmApi, FinancialApi, LedgerApi, ScheduleApi,
};
use broiler_farm_ledger::app::AppState;
use broiler_farm_ledger::config::ConfigManager;
use broiler_farm_ledger::domain::batch::NewBatch;
use broiler_farm_ledger::importer::CatalogImporter;

use super::test_data_builder::{CatalogItemBuilder, FarmBuilder};

// ==========================================
// API测试环境
// ==========================================

/// API测试环境
///
/// 包含所有API实例；临时数据库随环境释放
pub struct ApiTestEnv {
    pub db_path: String,
    pub farm_api: Arc<FarmApi>,
    pub catalog_api: Arc<CatalogApi>,
    pub batch_api: Arc<BatchApi>,
    pub ledger_api: Arc<LedgerApi>,
    pub schedule_api: Arc<ScheduleApi>,
    pub financial_api: Arc<FinancialApi>,
    pub catalog_importer: Arc<CatalogImporter>,
    pub config_manager: Arc<ConfigManager>,

    // 临时文件（确保生命周期）
    _temp_file: NamedTempFile,
}

impl ApiTestEnv {
    /// 创建新的测试环境
    pub fn new() -> Result<Self, String> {
        broiler_farm_ledger::logging::init_test();

        let (temp_file, db_path) =
            test_helpers::create_test_db().map_err(|e| format!("无法创建测试数据库: {}", e))?;
        let state = AppState::new(db_path.clone())?;

        Ok(Self {
            db_path,
            farm_api: state.farm_api,
            catalog_api: state.catalog_api,
            batch_api: state.batch_api,
            ledger_api: state.ledger_api,
            schedule_api: state.schedule_api,
            financial_api: state.financial_api,
            catalog_importer: state.catalog_importer,
            config_manager: state.config_manager,
            _temp_file: temp_file,
        })
    }

    /// 单舍养殖场
    pub fn create_farm(&self, capacity: i64) -> i64 {
        self.create_farm_with_sheds(capacity, &[capacity])
    }

    pub fn create_farm_with_sheds(&self, capacity: i64, sheds: &[i64]) -> i64 {
        self.farm_api
            .create_farm(FarmBuilder::new("测试鸡场").capacity(capacity).sheds(sheds).build())
            .expect("创建养殖场失败")
    }

    /// 饲料（每包 50 公斤）
    pub fn create_feed(&self, name: &str, price: f64) -> i64 {
        self.catalog_api
            .create_item(CatalogItemBuilder::feed(name, price).build())
            .expect("创建饲料失败")
    }

    pub fn create_batch(&self, farm_id: i64, shed_birds: &[i64], start: NaiveDate) -> i64 {
        self.create_batch_with_cost(farm_id, shed_birds, start, 3.0)
    }

    pub fn create_batch_with_cost(
        &self,
        farm_id: i64,
        shed_birds: &[i64],
        start: NaiveDate,
        cost_per_chicken: f64,
    ) -> i64 {
        self.batch_api
            .create_batch(new_batch(farm_id, shed_birds, start, cost_per_chicken))
            .expect("创建批次失败")
    }
}

pub fn start_of(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(8, 0, 0).unwrap()
}

pub fn new_batch(farm_id: i64, shed_birds: &[i64], start: NaiveDate, cost: f64) -> NewBatch {
    NewBatch {
        farm_id,
        shed_birds: shed_birds.to_vec(),
        extra_chicks: 0,
        manager_id: None,
        cost_per_chicken: cost,
        created_at: start_of(start),
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "期望 {}, 实际 {}",
        expected,
        actual
    );
}

// ==========================================
// 错误断言
// ==========================================

pub fn assert_capacity_exceeded<T: std::fmt::Debug>(result: Result<T, ApiError>) {
    match result {
        Err(ApiError::CapacityExceeded(_)) => {}
        other => panic!("期望 CapacityExceeded，实际 {:?}", other),
    }
}

pub fn assert_insufficient_birds<T: std::fmt::Debug>(result: Result<T, ApiError>) {
    match result {
        Err(ApiError::InsufficientBirds { .. }) => {}
        other => panic!("期望 InsufficientBirds，实际 {:?}", other),
    }
}

pub fn assert_inconsistent_state<T: std::fmt::Debug>(result: Result<T, ApiError>) {
    match result {
        Err(ApiError::InconsistentState(_)) => {}
        other => panic!("期望 InconsistentState，实际 {:?}", other),
    }
}

pub fn assert_invalid_input<T: std::fmt::Debug>(result: Result<T, ApiError>) {
    match result {
        Err(ApiError::InvalidInput(_)) => {}
        other => panic!("期望 InvalidInput，实际 {:?}", other),
    }
}

pub fn assert_not_found<T: std::fmt::Debug>(result: Result<T, ApiError>) {
    match result {
        Err(ApiError::NotFound(_)) => {}
        other => panic!("期望 NotFound，实际 {:?}", other),
    }
}
