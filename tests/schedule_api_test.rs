// ==========================================
// ScheduleApi 集成测试
// ==========================================
// 测试范围:
// 1. 入栏按模板生成计划（疫苗剂次）
// 2. 入栏日期变化平移计划
// 3. 日报消耗标记完成，撤销后恢复
// 4. 共享计划与批次删除
// ==========================================

mod helpers;

use broiler_farm_ledger::domain::batch::BatchEdit;
use broiler_farm_ledger::domain::catalog::ItemRef;
use broiler_farm_ledger::domain::schedule::{Actor, ScheduleTarget};
use broiler_farm_ledger::domain::types::CatalogKind;
use helpers::api_test_helper::*;
use helpers::test_data_builder::{date, CatalogItemBuilder, UpdateBuilder};

fn create_vaccine(env: &ApiTestEnv) -> i64 {
    env.catalog_api
        .create_item(CatalogItemBuilder::vaccine("新城疫", 35.0, &[7, 14]).build())
        .unwrap()
}

#[test]
fn test_batch_creation_seeds_auto_schedules() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let vaccine_id = create_vaccine(&env);
    env.schedule_api
        .save_auto_schedule(CatalogKind::Vaccine, vaccine_id, &[7, 14])
        .unwrap();

    let farm_id = env.create_farm(100);
    let batch_id = env.create_batch(farm_id, &[50], date(2024, 3, 1));

    let schedules = env.schedule_api.list_for_batch(batch_id).unwrap();
    assert_eq!(schedules.len(), 2);
    assert_eq!(schedules[0].scheduled_date, date(2024, 3, 8));
    assert_eq!(
        schedules[0].target,
        ScheduleTarget::Vaccine {
            vaccine_id,
            dose_number: 1
        }
    );
    assert_eq!(schedules[1].scheduled_date, date(2024, 3, 15));
    assert_eq!(schedules[1].target.dose_number(), Some(2));
    assert!(schedules.iter().all(|s| !s.completed && s.batch_ids == vec![batch_id]));

    let overview = env.batch_api.batch_overview(batch_id, date(2024, 3, 1)).unwrap();
    assert_eq!(overview.pending_schedules, 2);
}

#[test]
fn test_auto_schedule_validation() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let vaccine_id = create_vaccine(&env);
    let feed_id = env.create_feed("育雏料", 120.0);

    assert_invalid_input(env.schedule_api.save_auto_schedule(CatalogKind::Vaccine, vaccine_id, &[]));
    assert_invalid_input(env.schedule_api.save_auto_schedule(CatalogKind::Vaccine, vaccine_id, &[14, 7]));
    assert_invalid_input(env.schedule_api.save_auto_schedule(CatalogKind::Feed, feed_id, &[3]));
    assert_not_found(env.schedule_api.save_auto_schedule(CatalogKind::Medicine, vaccine_id, &[3]));

    // 同一物料再次保存覆盖偏移
    env.schedule_api
        .save_auto_schedule(CatalogKind::Vaccine, vaccine_id, &[7])
        .unwrap();
    env.schedule_api
        .save_auto_schedule(CatalogKind::Vaccine, vaccine_id, &[7, 14])
        .unwrap();
    let templates = env.schedule_api.list_auto_schedules().unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].offsets, vec![7, 14]);
}

#[test]
fn test_start_date_change_shifts_schedules() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let vaccine_id = create_vaccine(&env);
    env.schedule_api
        .save_auto_schedule(CatalogKind::Vaccine, vaccine_id, &[7, 14])
        .unwrap();
    let farm_id = env.create_farm(100);
    let batch_id = env.create_batch(farm_id, &[50], date(2024, 3, 1));

    let edit = BatchEdit {
        created_at: Some(start_of(date(2024, 3, 3))),
        ..Default::default()
    };
    env.batch_api.edit_batch(batch_id, edit).unwrap();

    let dates: Vec<_> = env
        .schedule_api
        .list_for_batch(batch_id)
        .unwrap()
        .iter()
        .map(|s| s.scheduled_date)
        .collect();
    assert_eq!(dates, vec![date(2024, 3, 10), date(2024, 3, 17)]);

    // 提前入栏日期同样平移
    let edit = BatchEdit {
        created_at: Some(start_of(date(2024, 2, 28))),
        ..Default::default()
    };
    env.batch_api.edit_batch(batch_id, edit).unwrap();
    let first = &env.schedule_api.list_for_batch(batch_id).unwrap()[0];
    assert_eq!(first.scheduled_date, date(2024, 3, 6));
}

#[test]
fn test_start_date_change_keeps_shared_schedule() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let medicine_id = env
        .catalog_api
        .create_item(CatalogItemBuilder::medicine("阿莫西林", 12.0).build())
        .unwrap();
    let farm_id = env.create_farm(200);
    let batch_a = env.create_batch(farm_id, &[50], date(2024, 3, 1));
    let batch_b = env.create_batch(farm_id, &[50], date(2024, 3, 1));
    let target = ScheduleTarget::Medicine { medicine_id };

    let shared = env
        .schedule_api
        .create_schedule(target, date(2024, 3, 5), &[batch_a, batch_b], None)
        .unwrap();
    let only_a = env
        .schedule_api
        .create_schedule(target, date(2024, 3, 9), &[batch_a], None)
        .unwrap();

    assert_eq!(env.schedule_api.shift_for_date_change(batch_a, 2).unwrap(), 1);
    assert_eq!(
        env.schedule_api.get_schedule(shared).unwrap().scheduled_date,
        date(2024, 3, 5)
    );
    assert_eq!(
        env.schedule_api.get_schedule(only_a).unwrap().scheduled_date,
        date(2024, 3, 11)
    );
}

#[test]
fn test_seed_for_batch_is_idempotent() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let medicine_id = env
        .catalog_api
        .create_item(CatalogItemBuilder::medicine("阿莫西林", 12.0).build())
        .unwrap();
    env.schedule_api
        .save_auto_schedule(CatalogKind::Medicine, medicine_id, &[3, 7])
        .unwrap();
    let farm_id = env.create_farm(100);
    let batch_id = env.create_batch(farm_id, &[50], date(2024, 3, 1));
    assert_eq!(env.schedule_api.list_for_batch(batch_id).unwrap().len(), 2);

    assert!(env.schedule_api.seed_for_batch(batch_id).unwrap().is_empty());
    assert_eq!(env.schedule_api.list_for_batch(batch_id).unwrap().len(), 2);

    // 模板新增偏移后只补充缺少的
    env.schedule_api
        .save_auto_schedule(CatalogKind::Medicine, medicine_id, &[3, 7, 10])
        .unwrap();
    assert_eq!(env.schedule_api.seed_for_batch(batch_id).unwrap().len(), 1);
    assert_eq!(env.schedule_api.list_for_batch(batch_id).unwrap().len(), 3);
}

#[test]
fn test_consumption_completes_and_delete_resets_schedule() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let vaccine_id = create_vaccine(&env);
    env.schedule_api
        .save_auto_schedule(CatalogKind::Vaccine, vaccine_id, &[7, 14])
        .unwrap();
    let farm_id = env.create_farm(100);
    let batch_id = env.create_batch(farm_id, &[50], date(2024, 3, 1));
    let schedule_id = env.schedule_api.list_for_batch(batch_id).unwrap()[0].id;

    assert_eq!(env.schedule_api.due_on(batch_id, date(2024, 3, 8)).unwrap().len(), 1);

    let update_id = env
        .ledger_api
        .apply_update(
            batch_id,
            UpdateBuilder::on(date(2024, 3, 8))
                .consume(
                    ItemRef::Vaccine {
                        id: vaccine_id,
                        dose_number: 1,
                    },
                    1.0,
                    Some(schedule_id),
                )
                .build(),
        )
        .unwrap();

    assert!(env.schedule_api.get_schedule(schedule_id).unwrap().completed);
    assert!(env.schedule_api.due_on(batch_id, date(2024, 3, 8)).unwrap().is_empty());
    let detail = env.ledger_api.get_update(update_id).unwrap();
    assert_close(detail.lines.items[0].total_cost, 35.0);

    env.ledger_api.delete_update(update_id).unwrap();
    assert!(!env.schedule_api.get_schedule(schedule_id).unwrap().completed);
}

#[test]
fn test_edit_update_dropping_schedule_reference_resets_it() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let vaccine_id = create_vaccine(&env);
    env.schedule_api
        .save_auto_schedule(CatalogKind::Vaccine, vaccine_id, &[7])
        .unwrap();
    let farm_id = env.create_farm(100);
    let batch_id = env.create_batch(farm_id, &[50], date(2024, 3, 1));
    let schedule_id = env.schedule_api.list_for_batch(batch_id).unwrap()[0].id;
    let vaccine = ItemRef::Vaccine {
        id: vaccine_id,
        dose_number: 1,
    };

    let update_id = env
        .ledger_api
        .apply_update(
            batch_id,
            UpdateBuilder::on(date(2024, 3, 8)).consume(vaccine, 1.0, Some(schedule_id)).build(),
        )
        .unwrap();
    assert!(env.schedule_api.get_schedule(schedule_id).unwrap().completed);

    env.ledger_api
        .edit_update(
            update_id,
            UpdateBuilder::on(date(2024, 3, 8)).consume(vaccine, 1.0, None).build(),
        )
        .unwrap();
    assert!(!env.schedule_api.get_schedule(schedule_id).unwrap().completed);
}

#[test]
fn test_schedule_target_must_match_consumed_item() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let vaccine_id = create_vaccine(&env);
    let medicine_id = env
        .catalog_api
        .create_item(CatalogItemBuilder::medicine("阿莫西林", 12.0).build())
        .unwrap();
    env.schedule_api
        .save_auto_schedule(CatalogKind::Vaccine, vaccine_id, &[7])
        .unwrap();
    let farm_id = env.create_farm(100);
    let batch_id = env.create_batch(farm_id, &[50], date(2024, 3, 1));
    let schedule_id = env.schedule_api.list_for_batch(batch_id).unwrap()[0].id;

    let result = env.ledger_api.apply_update(
        batch_id,
        UpdateBuilder::on(date(2024, 3, 8))
            .consume(ItemRef::Medicine { id: medicine_id }, 1.0, Some(schedule_id))
            .build(),
    );
    assert_invalid_input(result);

    let missing = env.ledger_api.apply_update(
        batch_id,
        UpdateBuilder::on(date(2024, 3, 8))
            .consume(ItemRef::Medicine { id: medicine_id }, 1.0, Some(9999))
            .build(),
    );
    assert_not_found(missing);
    assert!(!env.schedule_api.get_schedule(schedule_id).unwrap().completed);
}

#[test]
fn test_manual_complete_is_idempotent() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let medicine_id = env
        .catalog_api
        .create_item(CatalogItemBuilder::medicine("阿莫西林", 12.0).build())
        .unwrap();
    let farm_id = env.create_farm(100);
    let batch_id = env.create_batch(farm_id, &[50], date(2024, 3, 1));

    let schedule_id = env
        .schedule_api
        .create_schedule(
            ScheduleTarget::Medicine { medicine_id },
            date(2024, 3, 5),
            &[batch_id],
            Some("饮水给药"),
        )
        .unwrap();

    let actor = Actor::new(1, "manager");
    assert!(env.schedule_api.complete(schedule_id, &actor).unwrap().completed);
    assert!(env.schedule_api.complete(schedule_id, &actor).unwrap().completed);
    assert_not_found(env.schedule_api.complete(9999, &actor));
}

#[test]
fn test_shared_schedule_survives_batch_delete() {
    let env = ApiTestEnv::new().expect("无法创建测试环境");
    let medicine_id = env
        .catalog_api
        .create_item(CatalogItemBuilder::medicine("阿莫西林", 12.0).build())
        .unwrap();
    let farm_id = env.create_farm(200);
    let batch_a = env.create_batch(farm_id, &[50], date(2024, 3, 1));
    let batch_b = env.create_batch(farm_id, &[50], date(2024, 3, 1));

    let shared = env
        .schedule_api
        .create_schedule(
            ScheduleTarget::Medicine { medicine_id },
            date(2024, 3, 5),
            &[batch_a, batch_b],
            None,
        )
        .unwrap();
    let only_a = env
        .schedule_api
        .create_schedule(
            ScheduleTarget::Medicine { medicine_id },
            date(2024, 3, 9),
            &[batch_a],
            None,
        )
        .unwrap();

    env.ledger_api
        .apply_update(
            batch_a,
            UpdateBuilder::on(date(2024, 3, 5))
                .consume(ItemRef::Medicine { id: medicine_id }, 2.0, Some(shared))
                .build(),
        )
        .unwrap();
    assert!(env.schedule_api.get_schedule(shared).unwrap().completed);

    env.batch_api.delete_batch(batch_a).unwrap();

    let remaining = env.schedule_api.get_schedule(shared).unwrap();
    assert_eq!(remaining.batch_ids, vec![batch_b]);
    assert!(!remaining.completed);
    assert_not_found(env.schedule_api.get_schedule(only_a));
}
