// ==========================================
// 肉鸡养殖台账系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享连接、仓储与 API 实例
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{BatchApi, CatalogApi, FarmApi, FinancialApi, LedgerApi, ScheduleApi};
use crate::config::ConfigManager;
use crate::db::open_and_init;
use crate::importer::CatalogImporter;
use crate::repository::{
    BatchRepository, CatalogRepository, FarmRepository, FinancialRepository, HarvestRepository,
    LedgerRepository, ScheduleRepository,
};

/// 应用状态
///
/// 所有 API 共享同一个连接；写操作各自开启事务
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 共享连接
    pub conn: Arc<Mutex<Connection>>,

    pub farm_api: Arc<FarmApi>,
    pub catalog_api: Arc<CatalogApi>,
    pub batch_api: Arc<BatchApi>,
    pub ledger_api: Arc<LedgerApi>,
    pub schedule_api: Arc<ScheduleApi>,
    pub financial_api: Arc<FinancialApi>,

    /// 物料目录导入器
    pub catalog_importer: Arc<CatalogImporter>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 1. 打开数据库并初始化表结构（幂等）
    /// 2. 初始化所有Repository
    /// 3. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_and_init(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        Self::from_connection(db_path, conn)
    }

    /// 由已初始化的连接构建（测试与内存库使用）
    pub fn from_connection(db_path: String, conn: Arc<Mutex<Connection>>) -> Result<Self, String> {
        // ==========================================
        // Repository层
        // ==========================================
        let farm_repo = Arc::new(FarmRepository::from_connection(conn.clone()));
        let catalog_repo = Arc::new(CatalogRepository::from_connection(conn.clone()));
        let batch_repo = Arc::new(BatchRepository::from_connection(conn.clone()));
        let harvest_repo = Arc::new(HarvestRepository::from_connection(conn.clone()));
        let ledger_repo = Arc::new(LedgerRepository::from_connection(conn.clone()));
        let schedule_repo = Arc::new(ScheduleRepository::from_connection(conn.clone()));
        let financial_repo = Arc::new(FinancialRepository::from_connection(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // API层
        // ==========================================
        let farm_api = Arc::new(FarmApi::new(conn.clone(), farm_repo));
        let catalog_api = Arc::new(CatalogApi::new(conn.clone(), catalog_repo));
        let batch_api = Arc::new(BatchApi::new(conn.clone(), batch_repo, harvest_repo));
        let ledger_api = Arc::new(LedgerApi::new(conn.clone(), ledger_repo));
        let schedule_api = Arc::new(ScheduleApi::new(conn.clone(), schedule_repo));
        let financial_api = Arc::new(FinancialApi::new(conn.clone(), financial_repo));
        let catalog_importer = Arc::new(CatalogImporter::new(conn.clone()));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            conn,
            farm_api,
            catalog_api,
            batch_api,
            ledger_api,
            schedule_api,
            financial_api,
            catalog_importer,
            config_manager,
        })
    }
}

/// 默认数据库路径
///
/// 优先级: 环境变量 BROILER_LEDGER_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("BROILER_LEDGER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("broiler-farm-ledger");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            return dir.join("broiler_ledger.db").to_string_lossy().to_string();
        }
    }

    "./broiler_ledger.db".to_string()
}
