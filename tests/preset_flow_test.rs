mod common;

use common::*;
use glam::Vec3;
use modcar_provision::adapters::memory::{MemoryPresetStore, StaticPermissions};
use modcar_provision::core::engine_parts::UpgradeReport;
use modcar_provision::core::socket_planner::SocketOp;
use modcar_provision::domain::model::{Capability, Part, PartKind, Preset, PresetScope, Socket};
use modcar_provision::domain::ports::{InventorySystem, PresetStore};
use modcar_provision::ProvisionError;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn store_with(scope: &PresetScope, presets: Vec<Preset>) -> MemoryPresetStore {
    let mut store = MemoryPresetStore::new();
    for preset in presets {
        store.insert(scope, preset).unwrap();
    }
    store
}

#[tokio::test]
async fn test_load_preset_keeps_parts_above_tier() {
    let scope = PresetScope::Actor(ACTOR);
    let store = store_with(&scope, vec![Preset::new("Swap", ids(&[100, 300]))]);
    let (mut provisioner, _clock) = build(StaticPermissions::allow_all(4, 1), store);

    let handle = provisioner.provision(ACTOR, request(&[300, 100])).await.unwrap().handle;
    let mut storages = provisioner.world().engine_storages(handle).unwrap();
    for (slot, tier) in storages[0].slots.iter_mut().zip([3, 3, 1, 1]) {
        slot.part = Some(Part::new(slot.kind, tier, 100.0).damaged(20.0));
    }
    provisioner.world_mut().store_engine_storages(handle, storages).unwrap();

    let report = provisioner.load_preset(ACTOR, &scope, "swap").await.unwrap();

    assert_eq!(
        report.socket_ops,
        vec![
            SocketOp::Remove(0),
            SocketOp::Remove(1),
            SocketOp::Add(0, COCKPIT),
            SocketOp::Add(1, ENGINE),
        ]
    );
    assert!(report.refused.is_empty());
    assert_eq!(report.discarded, 2);
    assert!(report.leftover.is_empty());
    assert_eq!(
        report.fix.engine,
        UpgradeReport {
            replaced: 0,
            repaired: 2,
            installed: 2,
            unavailable: 0,
        }
    );

    let storages = provisioner.world().engine_storages(handle).unwrap();
    assert_eq!(storages.len(), 1);
    assert_eq!(storages[0].socket, 1);
    let tiers: Vec<u8> = storages[0]
        .slots
        .iter()
        .filter_map(|slot| slot.part.as_ref().map(|part| part.tier))
        .collect();
    assert_eq!(tiers, vec![3, 3, 1, 1]);
    let crankshaft = storages[0].slots[0].part.as_ref().unwrap();
    assert_eq!(crankshaft.kind, PartKind::Crankshaft);
    assert_eq!(crankshaft.condition, crankshaft.max_condition);

    let again = provisioner.load_preset(ACTOR, &scope, "swap").await;
    assert!(matches!(again, Err(ProvisionError::OnCooldown { .. })));
}

#[tokio::test]
async fn test_load_preset_requires_matching_socket_count() {
    let scope = PresetScope::Actor(ACTOR);
    let store = store_with(&scope, vec![Preset::new("Medium", ids(&[100, 0, 200]))]);
    let (mut provisioner, _clock) = build(StaticPermissions::allow_all(4, 3), store);
    assert_ok!(provisioner.provision(ACTOR, request(&[100, 0])).await);

    let result = provisioner.load_preset(ACTOR, &scope, "medium").await;

    assert!(matches!(
        result,
        Err(ProvisionError::SocketCountMismatch { current: 2, target: 3 })
    ));
}

#[tokio::test]
async fn test_load_preset_denied_without_capability() {
    let scope = PresetScope::Actor(ACTOR);
    let store = store_with(&scope, vec![Preset::new("Pair", ids(&[200, 100]))]);
    let permissions = StaticPermissions::allow_all(4, 3).without(Capability::PresetLoad);
    let (mut provisioner, _clock) = build(permissions, store);
    assert_ok!(provisioner.provision(ACTOR, request(&[100, 0])).await);

    let result = provisioner.load_preset(ACTOR, &scope, "pair").await;
    assert!(matches!(result, Err(ProvisionError::PermissionDenied { .. })));
}

#[tokio::test]
async fn test_save_and_list_presets_from_vehicle() {
    let (mut provisioner, _clock) = provisioner();
    let scope = PresetScope::Actor(ACTOR);
    assert_ok!(provisioner.provision(ACTOR, request(&[100, 400, 0])).await);

    let saved = provisioner.save_preset(ACTOR, &scope, None).unwrap();
    assert_eq!(saved.name, "default");
    assert_eq!(saved.module_ids, ids(&[100, 400, 0]));

    assert_ok!(provisioner.save_preset(ACTOR, &scope, Some("Zeta")));
    assert_ok!(provisioner.save_preset(ACTOR, &scope, Some("alpha")));
    assert_err!(provisioner.save_preset(ACTOR, &scope, Some("ZETA")));

    let names: Vec<String> = provisioner
        .list_presets(ACTOR, &scope)
        .unwrap()
        .into_iter()
        .map(|preset| preset.name)
        .collect();
    assert_eq!(names, vec!["default", "alpha", "Zeta"]);

    let renamed = provisioner.rename_preset(ACTOR, &scope, "zet", "Omega").unwrap();
    assert_eq!(renamed.name, "Omega");
    let deleted = provisioner.delete_preset(ACTOR, &scope, "alp").unwrap();
    assert_eq!(deleted.name, "alpha");
    assert_eq!(provisioner.list_presets(ACTOR, &scope).unwrap().len(), 2);
}

#[tokio::test]
async fn test_update_preset_overwrites_layout() {
    let scope = PresetScope::Actor(ACTOR);
    let store = store_with(&scope, vec![Preset::new("Work", ids(&[100, 0]))]);
    let (mut provisioner, _clock) = build(StaticPermissions::allow_all(4, 3), store);
    assert_ok!(provisioner.provision(ACTOR, request(&[200, 100])).await);

    let updated = provisioner.update_preset(ACTOR, &scope, Some("work")).unwrap();

    assert_eq!(updated.name, "Work");
    assert_eq!(
        provisioner.presets().store().find_exact(&scope, "work").unwrap().module_ids,
        ids(&[200, 100])
    );
}

#[tokio::test]
async fn test_common_presets_need_manage_capability() {
    let common = PresetScope::Common;
    let store = store_with(
        &common,
        vec![
            Preset::new("Long Hauler", ids(&[100, 0, 0, 200])),
            Preset::new("Runabout", ids(&[100, 200])),
        ],
    );
    let permissions = StaticPermissions::allow_all(3, 3).without(Capability::ManageCommonPresets);
    let (mut provisioner, _clock) = build(permissions, store);
    assert_ok!(provisioner.provision(ACTOR, request(&[100, 0])).await);

    let saved = provisioner.save_preset(ACTOR, &common, Some("Mine"));
    assert!(matches!(saved, Err(ProvisionError::PermissionDenied { .. })));

    let visible = provisioner.list_presets(ACTOR, &common).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].name, "Runabout");

    let foreign = provisioner.list_presets(ACTOR, &PresetScope::Actor(OTHER));
    assert!(matches!(foreign, Err(ProvisionError::PermissionDenied { .. })));
}

#[tokio::test]
async fn test_spawn_prefers_default_preset() {
    let scope = PresetScope::Actor(ACTOR);
    let store = store_with(&scope, vec![Preset::new("Default", ids(&[400, 0, 100]))]);
    let (mut provisioner, _clock) = build(StaticPermissions::allow_all(4, 3), store);

    let provisioned = provisioner.spawn(ACTOR, Vec3::ZERO, Vec3::Z).await.unwrap();

    assert_eq!(
        provisioner.world().sockets(provisioned.handle).unwrap(),
        vec![
            Socket::primary(FLATBED),
            Socket::continuation(FLATBED),
            Socket::primary(COCKPIT),
        ]
    );
}

#[tokio::test]
async fn test_spawn_without_default_uses_random_modules() {
    let (mut provisioner, clock) = build(StaticPermissions::allow_all(3, 3), MemoryPresetStore::new());

    let provisioned = provisioner.spawn(ACTOR, Vec3::ZERO, Vec3::Z).await.unwrap();
    assert_eq!(provisioner.world().sockets(provisioned.handle).unwrap().len(), 3);
    assert_eq!(provisioner.world().vehicle(provisioned.handle).unwrap().fuel, 500);

    assert_ok!(provisioner.destroy(ACTOR));
    clock.advance(Duration::from_secs(3600));

    let (mut tiny, _clock) = build(StaticPermissions::allow_all(1, 3), MemoryPresetStore::new());
    let denied = tiny.spawn(ACTOR, Vec3::ZERO, Vec3::Z).await;
    assert!(matches!(denied, Err(ProvisionError::PermissionDenied { .. })));

    assert_ok!(provisioner.spawn(ACTOR, Vec3::ZERO, Vec3::Z).await);
}

#[tokio::test]
async fn test_spawn_preset_resolves_partial_name() {
    let scope = PresetScope::Actor(ACTOR);
    let store = store_with(
        &scope,
        vec![
            Preset::new("Tanker", ids(&[100, 500])),
            Preset::new("Storage Run", ids(&[200, 100])),
        ],
    );
    let (mut provisioner, _clock) = build(StaticPermissions::allow_all(4, 3), store);

    let ambiguous = provisioner.spawn_preset(ACTOR, &scope, "r", Vec3::ZERO, Vec3::Z).await;
    assert!(matches!(ambiguous, Err(ProvisionError::AmbiguousPresetMatch { .. })));

    let provisioned = provisioner
        .spawn_preset(ACTOR, &scope, "tank", Vec3::ZERO, Vec3::Z)
        .await
        .unwrap();
    assert_eq!(
        provisioner.world().sockets(provisioned.handle).unwrap(),
        vec![Socket::primary(COCKPIT), Socket::primary(TANKER)]
    );
}

#[tokio::test]
async fn test_failed_attach_puts_parts_back_into_engine() {
    let scope = PresetScope::Actor(ACTOR);
    let store = store_with(&scope, vec![Preset::new("Cargo", ids(&[300, 200]))]);
    let (mut provisioner, _clock) = build(StaticPermissions::allow_all(4, 1), store);

    let handle = provisioner.provision(ACTOR, request(&[300, 100])).await.unwrap().handle;
    let mut storages = provisioner.world().engine_storages(handle).unwrap();
    for (slot, tier) in storages[0].slots.iter_mut().zip([3, 3, 1, 1]) {
        slot.part = Some(Part::new(slot.kind, tier, 100.0));
    }
    provisioner.world_mut().store_engine_storages(handle, storages).unwrap();
    provisioner.world_mut().vehicle_mut(handle).unwrap().attach_fails = true;

    let result = provisioner.load_preset(ACTOR, &scope, "cargo").await;
    assert!(matches!(result, Err(ProvisionError::Collaborator { .. })));

    let storages = provisioner.world().engine_storages(handle).unwrap();
    let tiers: Vec<Option<u8>> = storages[0]
        .slots
        .iter()
        .map(|slot| slot.part.as_ref().map(|part| part.tier))
        .collect();
    assert_eq!(tiers, vec![Some(3), Some(3), None, None]);

    // 失敗的載入不會啟動冷卻
    provisioner.world_mut().vehicle_mut(handle).unwrap().attach_fails = false;
    assert_ok!(provisioner.load_preset(ACTOR, &scope, "cargo").await);
}

#[tokio::test]
async fn test_failed_attach_without_engine_returns_parts_in_error() {
    let scope = PresetScope::Actor(ACTOR);
    let store = store_with(&scope, vec![Preset::new("Swap", ids(&[100, 300]))]);
    let (mut provisioner, _clock) = build(StaticPermissions::allow_all(4, 1), store);

    let handle = provisioner.provision(ACTOR, request(&[300, 100])).await.unwrap().handle;
    let mut storages = provisioner.world().engine_storages(handle).unwrap();
    for (slot, tier) in storages[0].slots.iter_mut().zip([3, 3, 1, 1]) {
        slot.part = Some(Part::new(slot.kind, tier, 100.0));
    }
    provisioner.world_mut().store_engine_storages(handle, storages).unwrap();
    provisioner.world_mut().vehicle_mut(handle).unwrap().attach_fails = true;

    let result = provisioner.load_preset(ACTOR, &scope, "swap").await;

    match result {
        Err(ProvisionError::PartsReturned { parts, source }) => {
            let mut kinds: Vec<PartKind> = parts.iter().map(|part| part.kind).collect();
            kinds.sort();
            assert_eq!(kinds, vec![PartKind::Crankshaft, PartKind::Piston]);
            assert!(parts.iter().all(|part| part.tier == 3));
            assert!(matches!(*source, ProvisionError::Collaborator { .. }));
        }
        other => panic!("expected returned parts, got {:?}", other),
    }
    assert!(provisioner.world().engine_storages(handle).unwrap().is_empty());
}
