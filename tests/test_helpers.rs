// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的临时数据库初始化
// ==========================================

use broiler_farm_ledger::db::open_and_init;
use rusqlite::Connection;
use std::error::Error;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是合法 UTF-8")?
        .to_string();

    open_and_init(&db_path)?;

    Ok((temp_file, db_path))
}

/// 打开已初始化的测试数据库连接
pub fn open_test_connection(db_path: &str) -> Result<Connection, Box<dyn Error>> {
    Ok(open_and_init(db_path)?)
}
