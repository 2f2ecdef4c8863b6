// ==========================================
// 肉鸡养殖台账系统 - 物料目录 API
// ==========================================
// 职责: 饲料/药品/疫苗/保健耗材目录维护与按标签解析
// 约定: 调价只影响之后的录入，已入账明细保留快照
// ==========================================

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::catalog::{CatalogItem, ItemRef, NewCatalogItem};
use crate::domain::types::CatalogKind;
use crate::repository::CatalogRepository;

pub struct CatalogApi {
    conn: Arc<Mutex<Connection>>,
    catalog_repo: Arc<CatalogRepository>,
}

impl CatalogApi {
    pub fn new(conn: Arc<Mutex<Connection>>, catalog_repo: Arc<CatalogRepository>) -> Self {
        Self { conn, catalog_repo }
    }

    fn lock(&self) -> ApiResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ApiError::DatabaseError(format!("数据库锁获取失败: {}", e)))
    }

    /// 新建物料
    pub fn create_item(&self, item: NewCatalogItem) -> ApiResult<i64> {
        item.validate().map_err(ApiError::InvalidInput)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let item_id = CatalogRepository::insert_tx(&tx, &item)?;
        tx.commit()?;

        info!(item_id, kind = %item.kind, name = %item.name, price = item.price, "物料已创建");
        Ok(item_id)
    }

    /// 调整目录价格（不追溯已入账明细）
    pub fn update_price(&self, item_id: i64, price: f64) -> ApiResult<()> {
        if !price.is_finite() || price < 0.0 {
            return Err(ApiError::InvalidInput(format!("价格必须为非负数: {}", price)));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let old = CatalogRepository::get_tx(&tx, item_id)?;
        CatalogRepository::update_price_tx(&tx, item_id, price)?;
        tx.commit()?;

        info!(item_id, old_price = old.price, new_price = price, "物料已调价");
        Ok(())
    }

    /// 修改物料（类别不可变更）
    pub fn update_item(&self, item_id: i64, item: NewCatalogItem) -> ApiResult<()> {
        item.validate().map_err(ApiError::InvalidInput)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let existing = CatalogRepository::get_tx(&tx, item_id)?;
        if existing.kind != item.kind {
            return Err(ApiError::InvalidInput(format!(
                "物料类别不可变更: {} -> {}",
                existing.kind, item.kind
            )));
        }
        CatalogRepository::update_tx(&tx, item_id, &item)?;
        tx.commit()?;

        info!(item_id, "物料已修改");
        Ok(())
    }

    pub fn get_item(&self, item_id: i64) -> ApiResult<CatalogItem> {
        self.catalog_repo
            .find_by_id(item_id)?
            .ok_or_else(|| ApiError::NotFound(format!("CatalogItem(id={})不存在", item_id)))
    }

    /// 按类别列出物料（None 表示全部）
    pub fn list_items(&self, kind: Option<CatalogKind>) -> ApiResult<Vec<CatalogItem>> {
        Ok(self.catalog_repo.list_by_kind(kind)?)
    }

    /// 删除物料（仍被台账明细、计划或模板引用时拒绝）
    pub fn delete_item(&self, item_id: i64) -> ApiResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        CatalogRepository::get_tx(&tx, item_id)?;
        let references = CatalogRepository::count_references_tx(&tx, item_id)?;
        if references > 0 {
            return Err(ApiError::InconsistentState(format!(
                "物料(id={})仍被{}条记录引用，不能删除",
                item_id, references
            )));
        }
        CatalogRepository::delete_tx(&tx, item_id)?;
        tx.commit()?;

        info!(item_id, "物料已删除");
        Ok(())
    }

    /// 按标签解析物料（ID 不存在或类别不符均为 NotFound）
    pub fn resolve(&self, item: ItemRef) -> ApiResult<CatalogItem> {
        match self.catalog_repo.find_by_id(item.id())? {
            Some(found) if found.kind == item.kind() => Ok(found),
            _ => Err(ApiError::NotFound(format!(
                "{}(id={})不存在",
                item.kind(),
                item.id()
            ))),
        }
    }
}
