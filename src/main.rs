// ==========================================
// 肉鸡养殖台账系统 - 运维命令行入口
// ==========================================
// 用法:
//   broiler-farm-ledger init-db
//   broiler-farm-ledger import-catalog <file.csv|file.xlsx>
//   broiler-farm-ledger overview <batch_id> [YYYY-MM-DD]
//   broiler-farm-ledger summary <batch_id>
//   broiler-farm-ledger config
//
// 数据库路径: BROILER_LEDGER_DB_PATH 或用户数据目录
// 日志: RUST_LOG 控制级别；BROILER_LEDGER_LOG_JSON=1 输出 JSON 行
// ==========================================

use broiler_farm_ledger::app::{get_default_db_path, AppState};
use broiler_farm_ledger::logging;
use chrono::NaiveDate;

const USAGE: &str = "用法: broiler-farm-ledger <init-db | import-catalog <path> | overview <batch_id> [date] | summary <batch_id> | config>";

fn parse_batch_id(raw: Option<String>) -> Result<i64, Box<dyn std::error::Error>> {
    let raw = raw.ok_or("缺少 batch_id 参数")?;
    Ok(raw.trim().parse::<i64>().map_err(|_| format!("batch_id 无效: {}", raw))?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("BROILER_LEDGER_LOG_JSON").is_ok_and(|v| v == "1") {
        logging::init_json();
    } else {
        logging::init();
    }

    let mut args = std::env::args().skip(1);
    let command = args.next().ok_or(USAGE)?;

    let db_path = get_default_db_path();
    tracing::info!(
        version = broiler_farm_ledger::VERSION,
        db_path = %db_path,
        "{}",
        broiler_farm_ledger::APP_NAME
    );
    let state = AppState::new(db_path)?;

    match command.as_str() {
        "init-db" => {
            println!("数据库已就绪: {}", state.db_path);
        }
        "import-catalog" => {
            let path = args.next().ok_or("缺少导入文件路径")?;
            let report = state.catalog_importer.import_file(&path)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "overview" => {
            let batch_id = parse_batch_id(args.next())?;
            let as_of = match args.next() {
                Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                    .map_err(|_| format!("日期格式应为 YYYY-MM-DD: {}", raw))?,
                None => chrono::Local::now().date_naive(),
            };
            let overview = state.batch_api.batch_overview(batch_id, as_of)?;
            println!("{}", serde_json::to_string_pretty(&overview)?);
        }
        "summary" => {
            let batch_id = parse_batch_id(args.next())?;
            match state.financial_api.get_summary(batch_id)? {
                Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                None => {
                    // 未结批时输出试算结果
                    let figures = state.financial_api.calculate(batch_id)?;
                    println!("批次{}尚未结批，以下为试算结果:", batch_id);
                    println!("{}", serde_json::to_string_pretty(&figures)?);
                }
            }
        }
        "config" => {
            println!("{}", state.config_manager.get_config_snapshot()?);
        }
        other => {
            return Err(format!("未知命令: {}\n{}", other, USAGE).into());
        }
    }

    Ok(())
}
