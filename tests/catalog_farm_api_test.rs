// ==========================================
// 养殖场 / 物料目录 / 导入 / 配置 集成测试
// ==========================================
// 测试范围:
// 1. 养殖场修改与删除约束
// 2. 物料修改、解析、删除约束
// 3. CSV 目录导入（整体回滚）
// 4. 配置快照
// ==========================================

mod helpers;

use std::io::Write;

use broiler_farm_ledger::config::config_keys;
use broiler_farm_ledger::domain::catalog::ItemRef;
use broiler_farm_ledger::domain::farm::CapacityConstraint;
use broiler_farm_ledger::domain::types::CatalogKind;
use broiler_farm_ledger::importer::ImportError;
use helpers::api_test_helper::*;
use helpers::test_data_builder::{date, CatalogItemBuilder, FarmBuilder, UpdateBuilder};
use tempfile::NamedTempFile;

fn write_csv(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("无法创建临时文件");
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

// ==========================================
// 养殖场
// ==========================================

#[test]
fn test_update_farm_respects_active_batches() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let farm_id = env.create_farm_with_sheds(200, &[100, 100]);
    env.create_batch(farm_id, &[80, 60], date(2024, 3, 1));

    // 鸡舍数量不可变
    let result = env
        .farm_api
        .update_farm(farm_id, FarmBuilder::new("测试鸡场").capacity(300).sheds(&[300]).build());
    assert_inconsistent_state(result);

    // 容量不可低于占用
    let result = env
        .farm_api
        .update_farm(farm_id, FarmBuilder::new("测试鸡场").capacity(120).sheds(&[100, 100]).build());
    assert_capacity_exceeded(result);
    let result = env
        .farm_api
        .update_farm(farm_id, FarmBuilder::new("测试鸡场").capacity(200).sheds(&[70, 100]).build());
    assert_capacity_exceeded(result);

    env.farm_api
        .update_farm(farm_id, FarmBuilder::new("一号场").capacity(150).sheds(&[90, 60]).build())
        .unwrap();
    let farm = env.farm_api.get_farm(farm_id).unwrap();
    assert_eq!(farm.name, "一号场");
    assert_eq!(farm.shed_capacities, vec![90, 60]);

    let usage = env.farm_api.farm_usage(farm_id).unwrap();
    assert_eq!(usage.used, 140);
    assert_eq!(usage.remaining(), 10);
}

#[test]
fn test_create_farm_validation() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    assert_invalid_input(env.farm_api.create_farm(FarmBuilder::new("  ").build()));
    assert_invalid_input(env.farm_api.create_farm(FarmBuilder::new("a").capacity(0).build()));
    assert_invalid_input(env.farm_api.create_farm(FarmBuilder::new("a").sheds(&[]).build()));
    assert_invalid_input(env.farm_api.create_farm(FarmBuilder::new("a").sheds(&[10, 0]).build()));
}

#[test]
fn test_delete_farm_blocked_by_batches() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let farm_id = env.create_farm(100);
    let batch_id = env.create_batch(farm_id, &[10], date(2024, 3, 1));

    assert_inconsistent_state(env.farm_api.delete_farm(farm_id));

    env.batch_api.delete_batch(batch_id).unwrap();
    env.farm_api.delete_farm(farm_id).unwrap();
    assert_not_found(env.farm_api.get_farm(farm_id));
}

// ==========================================
// 物料目录
// ==========================================

#[test]
fn test_catalog_update_and_resolve() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let feed_id = env.create_feed("育雏料", 120.0);
    let medicine_id = env
        .catalog_api
        .create_item(CatalogItemBuilder::medicine("阿莫西林", 12.0).build())
        .unwrap();

    let as_medicine = CatalogItemBuilder::medicine("育雏料", 120.0).build();
    assert_invalid_input(env.catalog_api.update_item(feed_id, as_medicine));

    env.catalog_api
        .update_item(
            feed_id,
            CatalogItemBuilder::feed("育雏料", 130.0).quantity_per_unit(40.0).build(),
        )
        .unwrap();
    let feed = env.catalog_api.get_item(feed_id).unwrap();
    assert_close(feed.price, 130.0);
    assert_close(feed.quantity_per_unit, 40.0);

    env.catalog_api.update_price(medicine_id, 15.0).unwrap();
    let medicine = env.catalog_api.resolve(ItemRef::Medicine { id: medicine_id }).unwrap();
    assert_close(medicine.price, 15.0);

    // 类别不符或 ID 不存在
    assert_not_found(env.catalog_api.resolve(ItemRef::HealthMaterial { id: medicine_id }));
    assert_not_found(env.catalog_api.resolve(ItemRef::Medicine { id: feed_id }));
    assert_not_found(env.catalog_api.resolve(ItemRef::Medicine { id: 9999 }));
    assert_invalid_input(env.catalog_api.update_price(feed_id, -1.0));
}

#[test]
fn test_delete_item_blocked_by_ledger_reference() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let farm_id = env.create_farm(100);
    let feed_id = env.create_feed("育雏料", 120.0);
    let unused_id = env.create_feed("育肥料", 140.0);
    let batch_id = env.create_batch(farm_id, &[10], date(2024, 3, 1));

    env.ledger_api
        .apply_update(
            batch_id,
            UpdateBuilder::on(date(2024, 3, 2)).allocate(feed_id, 1.0).build(),
        )
        .unwrap();

    assert_inconsistent_state(env.catalog_api.delete_item(feed_id));
    env.catalog_api.delete_item(unused_id).unwrap();

    let feeds = env.catalog_api.list_items(Some(CatalogKind::Feed)).unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].id, feed_id);
}

// ==========================================
// 目录导入
// ==========================================

#[test]
fn test_import_catalog_csv() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let file = write_csv(
        "kind,name,unit_type,quantity_per_unit,price,description,dose_ages\n\
         feed,玉米料,packet,50,120,,\n\
         Medicine,阿莫西林,g,100,12.5,饮水,\n\
         vaccine,新城疫,dose,1000,35,,7;14\n",
    );

    let report = env.catalog_importer.import_file(file.path()).unwrap();
    assert_eq!(report.total_rows, 3);
    assert_eq!(report.imported, 3);
    assert_eq!(report.by_kind.get("feed"), Some(&1));

    let vaccines = env.catalog_api.list_items(Some(CatalogKind::Vaccine)).unwrap();
    assert_eq!(vaccines.len(), 1);
    assert_eq!(vaccines[0].dose_ages, vec![7, 14]);
    assert_eq!(vaccines[0].dose_number_for_age(14), 2);
}

#[test]
fn test_import_bad_row_inserts_nothing() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let file = write_csv(
        "kind,name,unit_type,quantity_per_unit,price\n\
         feed,玉米料,packet,50,120\n\
         feed,豆粕料,packet,50,abc\n",
    );

    match env.catalog_importer.import_file(file.path()) {
        Err(ImportError::FieldValueError { row, field, .. }) => {
            assert_eq!(row, 3);
            assert_eq!(field, "price");
        }
        other => panic!("期望 FieldValueError，实际: {:?}", other),
    }
    assert!(env.catalog_api.list_items(None).unwrap().is_empty());
}

#[test]
fn test_import_duplicate_rolls_back() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let file = write_csv(
        "kind,name,unit_type,quantity_per_unit,price\n\
         feed,玉米料,packet,50,120\n\
         feed,玉米料,packet,40,110\n",
    );

    match env.catalog_importer.import_file(file.path()) {
        Err(ImportError::DuplicateItem { row, .. }) => assert_eq!(row, 3),
        other => panic!("期望 DuplicateItem，实际: {:?}", other),
    }
    assert!(env.catalog_api.list_items(None).unwrap().is_empty());
}

#[test]
fn test_import_missing_column() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let file = write_csv("kind,name,price\nfeed,玉米料,120\n");

    assert!(matches!(
        env.catalog_importer.import_file(file.path()),
        Err(ImportError::MissingColumn(col)) if col == "unit_type"
    ));
}

// ==========================================
// 配置
// ==========================================

#[test]
fn test_config_snapshot_includes_defaults() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");

    let snapshot: serde_json::Value =
        serde_json::from_str(&env.config_manager.get_config_snapshot().unwrap()).unwrap();
    assert_eq!(snapshot[config_keys::FEED_RESIDUAL_VALUATION], "weighted_average");
    assert_eq!(snapshot[config_keys::ALLOW_NEGATIVE_FEED_STOCK], "true");

    env.config_manager
        .set_config_value(config_keys::ALLOW_NEGATIVE_FEED_STOCK, "false")
        .unwrap();
    let settings = env.config_manager.load_settings().unwrap();
    assert!(!settings.allow_negative_feed_stock);
}
