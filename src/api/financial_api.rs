// ==========================================
// 肉鸡养殖台账系统 - 财务汇总 API
// ==========================================
// 职责: 财务试算、汇总查询与重算、料肉比分档维护
// 约定: 汇总只为已结批批次持久化；试算不写库
// ==========================================

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::api::batch_state::{compute_figures_tx, store_summary_tx};
use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::financial::{validate_fcr_bands, FcrRate, FinancialFigures, FinancialSummary, NewFcrRate};
use crate::domain::types::BatchStatus;
use crate::repository::{BatchRepository, FinancialRepository};

pub struct FinancialApi {
    conn: Arc<Mutex<Connection>>,
    financial_repo: Arc<FinancialRepository>,
}

impl FinancialApi {
    pub fn new(conn: Arc<Mutex<Connection>>, financial_repo: Arc<FinancialRepository>) -> Self {
        Self {
            conn,
            financial_repo,
        }
    }

    fn lock(&self) -> ApiResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ApiError::DatabaseError(format!("数据库锁获取失败: {}", e)))
    }

    /// 按当前历史试算（任意状态，不写库）
    pub fn calculate(&self, batch_id: i64) -> ApiResult<FinancialFigures> {
        let conn = self.lock()?;
        let settings = ConfigManager::load_settings_tx(&conn)?;
        let batch = BatchRepository::get_tx(&conn, batch_id)?;
        compute_figures_tx(&conn, &batch, &settings)
    }

    /// 已持久化的财务汇总（未结批为 None）
    pub fn get_summary(&self, batch_id: i64) -> ApiResult<Option<FinancialSummary>> {
        Ok(self.financial_repo.find_summary(batch_id)?)
    }

    /// 重算已结批批次的汇总（分档或配置调整后使用）
    #[instrument(skip(self))]
    pub fn recalculate(&self, batch_id: i64) -> ApiResult<FinancialSummary> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let settings = ConfigManager::load_settings_tx(&tx)?;
        let batch = BatchRepository::get_tx(&tx, batch_id)?;
        if batch.status != BatchStatus::Closed {
            return Err(ApiError::InconsistentState(format!(
                "批次{}未结批（{}），不能生成财务汇总",
                batch_id, batch.status
            )));
        }
        let summary = store_summary_tx(&tx, &batch, &settings)?;

        tx.commit()?;
        Ok(summary)
    }

    /// 整体替换料肉比分档（不自动重算已有汇总）
    pub fn replace_fcr_rates(&self, mut bands: Vec<NewFcrRate>) -> ApiResult<usize> {
        bands.sort_by(|a, b| a.lower_limit.total_cmp(&b.lower_limit));
        validate_fcr_bands(&bands).map_err(ApiError::InvalidInput)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let count = FinancialRepository::replace_fcr_rates_tx(&tx, &bands)?;
        tx.commit()?;

        info!(count, "料肉比分档已替换");
        Ok(count)
    }

    pub fn list_fcr_rates(&self) -> ApiResult<Vec<FcrRate>> {
        Ok(self.financial_repo.list_fcr_rates()?)
    }
}
