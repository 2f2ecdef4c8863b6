// ==========================================
// 肉鸡养殖台账系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::engine::financial::FeedResidualValuation;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// LedgerSettings - 台账与财务运行参数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// 结批时剩余饲料库存估值口径
    pub feed_residual_valuation: FeedResidualValuation,
    /// 是否容忍饲料库存为负（false 时拒绝写入）
    pub allow_negative_feed_stock: bool,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            feed_residual_valuation: FeedResidualValuation::WeightedAverage,
            allow_negative_feed_stock: true,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        Ok(Self::get_config_value_tx(&conn, key)?)
    }

    fn get_config_value_tx(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 写入配置值（仅接受已知键，值按类型校验）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let value = value.trim();
        match key {
            config_keys::FEED_RESIDUAL_VALUATION => {
                if FeedResidualValuation::from_config_str(value).is_none() {
                    return Err(format!("无效的库存估值口径: {}", value).into());
                }
            }
            config_keys::ALLOW_NEGATIVE_FEED_STOCK => {
                value
                    .parse::<bool>()
                    .map_err(|_| format!("{} 只接受 true/false: {}", key, value))?;
            }
            _ => return Err(format!("未知配置项: {}", key).into()),
        }

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;

        tracing::info!(key = key, value = value, "配置已更新");
        Ok(())
    }

    /// 读取台账运行参数
    pub fn load_settings(&self) -> Result<LedgerSettings, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        Ok(Self::load_settings_tx(&conn)?)
    }

    /// 在调用方持有的连接/事务内读取台账运行参数
    ///
    /// 无法解析的值回退默认值并记录警告
    pub fn load_settings_tx(conn: &Connection) -> rusqlite::Result<LedgerSettings> {
        let defaults = LedgerSettings::default();

        let feed_residual_valuation =
            match Self::get_config_value_tx(conn, config_keys::FEED_RESIDUAL_VALUATION)? {
                Some(raw) => FeedResidualValuation::from_config_str(&raw).unwrap_or_else(|| {
                    tracing::warn!(
                        config_key = config_keys::FEED_RESIDUAL_VALUATION,
                        raw_value = %raw,
                        "库存估值口径配置无效，使用默认值"
                    );
                    defaults.feed_residual_valuation
                }),
                None => defaults.feed_residual_valuation,
            };

        let allow_negative_feed_stock =
            match Self::get_config_value_tx(conn, config_keys::ALLOW_NEGATIVE_FEED_STOCK)? {
                Some(raw) => raw.trim().parse::<bool>().unwrap_or_else(|_| {
                    tracing::warn!(
                        config_key = config_keys::ALLOW_NEGATIVE_FEED_STOCK,
                        raw_value = %raw,
                        "负库存开关配置无效，使用默认值"
                    );
                    defaults.allow_negative_feed_stock
                }),
                None => defaults.allow_negative_feed_stock,
            };

        Ok(LedgerSettings {
            feed_residual_valuation,
            allow_negative_feed_stock,
        })
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// 未显式配置的已知键以默认值补齐
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare("SELECT key, value FROM config_kv ORDER BY key")?;
        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let defaults = LedgerSettings::default();
        config_map
            .entry(config_keys::FEED_RESIDUAL_VALUATION.to_string())
            .or_insert_with(|| defaults.feed_residual_valuation.to_config_str().to_string());
        config_map
            .entry(config_keys::ALLOW_NEGATIVE_FEED_STOCK.to_string())
            .or_insert_with(|| defaults.allow_negative_feed_stock.to_string());

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    pub const FEED_RESIDUAL_VALUATION: &str = "financial.feed_residual_valuation";
    pub const ALLOW_NEGATIVE_FEED_STOCK: &str = "ledger.allow_negative_feed_stock";
}
