// ==========================================
// FinancialApi 集成测试
// ==========================================
// 测试范围:
// 1. 料肉比分档查找
// 2. 结批汇总的成本/收入/利润
// 3. 试算幂等、重算、剩余库存估值口径
// ==========================================

mod helpers;

use broiler_farm_ledger::config::config_keys;
use broiler_farm_ledger::domain::financial::NewFcrRate;
use broiler_farm_ledger::domain::types::BatchStatus;
use helpers::api_test_helper::*;
use helpers::test_data_builder::{date, harvest, UpdateBuilder};

fn standard_bands() -> Vec<NewFcrRate> {
    vec![
        NewFcrRate {
            lower_limit: 0.0,
            upper_limit: Some(2.0),
            rate: 10.0,
        },
        NewFcrRate {
            lower_limit: 2.0,
            upper_limit: None,
            rate: 5.0,
        },
    ]
}

/// 10 羽批次，投料 3 包（每包 50 公斤）全部耗尽，一次性出栏
fn closed_batch(env: &ApiTestEnv, weight_sold: f64) -> i64 {
    let farm_id = env.create_farm(100);
    let feed_id = env.create_feed("全价料", 120.0);
    let batch_id = env.create_batch_with_cost(farm_id, &[10], date(2024, 3, 1), 3.0);

    env.ledger_api
        .apply_update(
            batch_id,
            UpdateBuilder::on(date(2024, 3, 2)).allocate(feed_id, 3.0).feed_used(3.0).build(),
        )
        .unwrap();
    env.batch_api.transition(batch_id, BatchStatus::Closing).unwrap();
    env.batch_api
        .record_harvest(batch_id, harvest(date(2024, 4, 10), 10, weight_sold, 10.0))
        .unwrap();
    batch_id
}

#[test]
fn test_fcr_band_lookup_low_ratio() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.financial_api.replace_fcr_rates(standard_bands()).unwrap();

    // 150 公斤饲料 / 100 公斤出栏 = 1.5
    let batch_id = closed_batch(&env, 100.0);
    let summary = env.financial_api.get_summary(batch_id).unwrap().expect("应已结批");

    let f = summary.figures;
    assert_close(f.feed_consumed_kg, 150.0);
    assert_close(f.fcr_value, 1.5);
    assert_close(f.fcr_rate, 10.0);
    assert_close(f.fcr_price, 1000.0);
    assert_close(f.feed_cost, 360.0);
    assert_close(f.bird_cost, 30.0);
    assert_close(f.total_cost, 390.0);
    assert_close(f.total_revenue, 1000.0);
    assert_close(f.total_profit, 1000.0 - (390.0 + 1000.0));
}

#[test]
fn test_fcr_band_lookup_high_ratio() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.financial_api.replace_fcr_rates(standard_bands()).unwrap();

    // 150 / 50 = 3.0
    let batch_id = closed_batch(&env, 50.0);
    let summary = env.financial_api.get_summary(batch_id).unwrap().expect("应已结批");

    assert_close(summary.figures.fcr_value, 3.0);
    assert_close(summary.figures.fcr_rate, 5.0);
}

#[test]
fn test_replace_fcr_rates_rejects_overlap() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let bands = vec![
        NewFcrRate {
            lower_limit: 0.0,
            upper_limit: Some(2.5),
            rate: 10.0,
        },
        NewFcrRate {
            lower_limit: 2.0,
            upper_limit: None,
            rate: 5.0,
        },
    ];
    assert_invalid_input(env.financial_api.replace_fcr_rates(bands));

    // 输入顺序无关
    let mut reversed = standard_bands();
    reversed.reverse();
    assert_eq!(env.financial_api.replace_fcr_rates(reversed).unwrap(), 2);
    let stored = env.financial_api.list_fcr_rates().unwrap();
    assert_close(stored[0].lower_limit, 0.0);
    assert_eq!(stored[1].upper_limit, None);
}

#[test]
fn test_calculate_is_idempotent_and_matches_summary() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.financial_api.replace_fcr_rates(standard_bands()).unwrap();
    let batch_id = closed_batch(&env, 100.0);

    let first = env.financial_api.calculate(batch_id).unwrap();
    let second = env.financial_api.calculate(batch_id).unwrap();
    assert_eq!(first, second);

    let summary = env.financial_api.recalculate(batch_id).unwrap();
    assert_eq!(summary.figures, first);
    assert_eq!(
        env.financial_api.get_summary(batch_id).unwrap().unwrap().figures,
        first
    );
}

#[test]
fn test_recalculate_requires_closed_batch() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let farm_id = env.create_farm(100);
    let batch_id = env.create_batch(farm_id, &[10], date(2024, 3, 1));

    assert_inconsistent_state(env.financial_api.recalculate(batch_id));
    // 试算不受状态限制，也不写库
    env.financial_api.calculate(batch_id).unwrap();
    assert!(env.financial_api.get_summary(batch_id).unwrap().is_none());
}

#[test]
fn test_fcr_rate_zero_before_any_harvest() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.financial_api.replace_fcr_rates(standard_bands()).unwrap();
    let farm_id = env.create_farm(100);
    let feed_id = env.create_feed("全价料", 120.0);
    let batch_id = env.create_batch(farm_id, &[10], date(2024, 3, 1));
    env.ledger_api
        .apply_update(
            batch_id,
            UpdateBuilder::on(date(2024, 3, 2)).allocate(feed_id, 1.0).feed_used(1.0).build(),
        )
        .unwrap();

    let figures = env.financial_api.calculate(batch_id).unwrap();
    assert_close(figures.fcr_value, 0.0);
    assert_close(figures.fcr_rate, 0.0);
    assert_close(figures.fcr_price, 0.0);
}

#[test]
fn test_feed_return_valued_at_allocation_snapshot() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let farm_id = env.create_farm(100);
    let feed_id = env.create_feed("全价料", 2.0);
    let batch_id = env.create_batch_with_cost(farm_id, &[10], date(2024, 3, 1), 0.0);

    env.ledger_api
        .apply_update(batch_id, UpdateBuilder::on(date(2024, 3, 2)).allocate(feed_id, 10.0).build())
        .unwrap();
    env.catalog_api.update_price(feed_id, 5.0).unwrap();
    env.ledger_api
        .apply_update(batch_id, UpdateBuilder::on(date(2024, 3, 3)).return_feed(feed_id, 10.0).build())
        .unwrap();

    env.batch_api.transition(batch_id, BatchStatus::Closing).unwrap();
    env.batch_api
        .record_harvest(batch_id, harvest(date(2024, 4, 10), 10, 20.0, 10.0))
        .unwrap();

    let summary = env.financial_api.get_summary(batch_id).unwrap().expect("应已结批");
    assert_close(summary.figures.feed_cost, 0.0);
    assert_close(summary.figures.feed_consumed_kg, 0.0);
}

#[test]
fn test_closed_batch_update_recomputes_summary() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    env.financial_api.replace_fcr_rates(standard_bands()).unwrap();
    let batch_id = closed_batch(&env, 100.0);

    env.ledger_api
        .apply_update(
            batch_id,
            UpdateBuilder::on(date(2024, 4, 10)).misc("清粪", 1.0, 50.0).build(),
        )
        .unwrap();

    let summary = env.financial_api.get_summary(batch_id).unwrap().unwrap();
    assert_eq!(
        env.batch_api.get_batch(batch_id).unwrap().status,
        BatchStatus::Closed
    );
    assert_close(summary.figures.misc_cost, 50.0);
    assert_close(summary.figures.total_cost, 440.0);
}

#[test]
fn test_residual_stock_valuation_modes() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let farm_id = env.create_farm(100);
    let cheap = env.create_feed("玉米料", 100.0);
    let dear = env.create_feed("育肥料", 200.0);
    let batch_id = env.create_batch_with_cost(farm_id, &[10], date(2024, 3, 1), 0.0);

    env.ledger_api
        .apply_update(
            batch_id,
            UpdateBuilder::on(date(2024, 3, 2)).allocate(cheap, 2.0).feed_used(1.5).build(),
        )
        .unwrap();
    env.ledger_api
        .apply_update(
            batch_id,
            UpdateBuilder::on(date(2024, 3, 3)).allocate(dear, 2.0).feed_used(1.5).build(),
        )
        .unwrap();
    // 剩余 1 包

    let weighted = env.financial_api.calculate(batch_id).unwrap();
    assert_close(weighted.feed_cost, 600.0 - 150.0);
    assert_close(weighted.feed_consumed_kg, 200.0 - 50.0);

    env.config_manager
        .set_config_value(config_keys::FEED_RESIDUAL_VALUATION, "latest_price")
        .unwrap();
    let latest = env.financial_api.calculate(batch_id).unwrap();
    assert_close(latest.feed_cost, 600.0 - 200.0);

    env.config_manager
        .set_config_value(config_keys::FEED_RESIDUAL_VALUATION, "none")
        .unwrap();
    let none = env.financial_api.calculate(batch_id).unwrap();
    assert_close(none.feed_cost, 600.0);
}
