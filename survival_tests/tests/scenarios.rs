//! Deterministic gameplay scenarios driven directly against `Game`.

use survival_server::{player::LifeState, Rejected};
use survival_shared::{
    entity::EntityId,
    math::Vec2,
    model::{AttackOutcome, BuildingKind, Inventory, ItemKind, SourceKind},
    net::{BuildRequest, MoveInput},
};
use survival_tests::{empty_game, init_tracing, join_at, run_ticks};

fn build_req(kind: BuildingKind, x: f32, y: f32) -> BuildRequest {
    BuildRequest { kind, x, y }
}

fn owned_windmills(game: &survival_server::Game, owner: EntityId) -> u32 {
    game.world()
        .buildings()
        .filter(|b| b.kind == BuildingKind::Windmill && b.owner == Some(owner))
        .count() as u32
}

/// Hits `target` until it dies; returns the dropped inventory.
fn kill(game: &mut survival_server::Game, attacker: EntityId, target: EntityId) -> Inventory {
    for _ in 0..100 {
        match game.attack(attacker, target).unwrap() {
            AttackOutcome::PlayerKilled {
                dropped_resources, ..
            } => return dropped_resources,
            AttackOutcome::PlayerDamaged { .. } => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    panic!("target never died");
}

#[test]
fn building_a_wall_spends_wood() {
    init_tracing();
    let mut game = empty_game(1);
    let id = join_at(&mut game, "builder", Vec2::new(500.0, 500.0));
    game.player_mut(id).unwrap().inventory = Inventory::new(20, 0, 0, 0);

    let built = game
        .build(id, &build_req(BuildingKind::Wall, 520.0, 500.0))
        .unwrap();

    assert_eq!(built.inventory, Inventory::new(10, 0, 0, 0));
    assert_eq!(built.building.health, 300);
    assert_eq!(built.building.max_health, 300);
    assert_eq!(built.building.owner, Some(id));
    assert_eq!(built.building.position, Vec2::new(520.0, 500.0));
    assert_eq!(game.world().building_count(), 1);
    assert_eq!(
        game.player(id).unwrap().inventory,
        Inventory::new(10, 0, 0, 0)
    );
}

#[test]
fn shortfall_leaves_inventory_untouched() {
    let mut game = empty_game(2);
    let id = join_at(&mut game, "poor", Vec2::new(500.0, 500.0));
    game.player_mut(id).unwrap().inventory = Inventory::new(49, 100, 3, 0);

    let res = game.build(id, &build_req(BuildingKind::Windmill, 510.0, 500.0));

    assert!(matches!(res, Err(Rejected::InsufficientResources(_))));
    let player = game.player(id).unwrap();
    assert_eq!(player.inventory, Inventory::new(49, 100, 3, 0));
    assert_eq!(player.windmills(), 0);
    assert_eq!(game.world().building_count(), 0);
}

#[test]
fn crafting_a_sword_upgrades_stats() {
    let mut game = empty_game(3);
    let id = join_at(&mut game, "smith", Vec2::new(500.0, 500.0));
    game.player_mut(id).unwrap().inventory = Inventory::new(15, 10, 0, 0);

    let crafted = game.craft(id, "sword").unwrap();

    assert_eq!(crafted.item, ItemKind::Sword);
    assert_eq!(crafted.inventory, Inventory::EMPTY);
    let player = game.player(id).unwrap();
    assert_eq!(player.damage, 25);
    assert_eq!(player.range, 80.0);
    assert!(player.tools.contains(&ItemKind::Sword));

    // Second sword with an empty inventory: rejected, stats untouched.
    assert!(matches!(
        game.craft(id, "sword"),
        Err(Rejected::InsufficientResources(_))
    ));
    let player = game.player(id).unwrap();
    assert_eq!((player.damage, player.range), (25, 80.0));
}

#[test]
fn crafting_without_materials_fails() {
    let mut game = empty_game(3);
    let id = join_at(&mut game, "smith", Vec2::new(500.0, 500.0));
    game.player_mut(id).unwrap().inventory = Inventory::new(15, 9, 0, 0);

    assert!(matches!(
        game.craft(id, "sword"),
        Err(Rejected::InsufficientResources(_))
    ));
    let player = game.player(id).unwrap();
    assert_eq!(player.damage, 10);
    assert!(player.tools.is_empty());
    assert_eq!(player.inventory, Inventory::new(15, 9, 0, 0));
}

#[test]
fn gather_range_is_inclusive() {
    let mut game = empty_game(4);
    let id = join_at(&mut game, "picker", Vec2::new(1000.0, 1000.0));

    let near = game
        .world_mut()
        .spawn_resource_at(SourceKind::Rock, Vec2::new(1000.0, 1100.0));
    let far = game
        .world_mut()
        .spawn_resource_at(SourceKind::Rock, Vec2::new(1000.0, 1100.01));

    assert!(matches!(
        game.gather(id, far.id),
        Err(Rejected::OutOfRange { .. })
    ));
    assert!(game.world().resource(far.id).is_some());

    let got = game.gather(id, near.id).unwrap();
    assert_eq!(got.amount, 5);
    assert_eq!(game.player(id).unwrap().inventory.stone, 5);
    // One gathered, one replacement spawned.
    assert_eq!(game.world().resource_count(), 2);
}

#[test]
fn building_reach_is_range_plus_fifty() {
    let mut game = empty_game(5);
    let owner = join_at(&mut game, "owner", Vec2::new(100.0, 100.0));
    let hitter = join_at(&mut game, "hitter", Vec2::new(1000.0, 1000.0));
    game.player_mut(owner).unwrap().inventory = Inventory::new(20, 0, 0, 0);

    let edge = game
        .build(owner, &build_req(BuildingKind::Wall, 1110.0, 1000.0))
        .unwrap()
        .building;
    let beyond = game
        .build(owner, &build_req(BuildingKind::Wall, 1000.0, 1110.01))
        .unwrap()
        .building;

    assert_eq!(
        game.attack(hitter, edge.id),
        Ok(AttackOutcome::BuildingDamaged {
            target: edge.id,
            health: 290
        })
    );
    assert_eq!(game.attack(hitter, beyond.id), Ok(AttackOutcome::Miss));
    assert_eq!(game.world().building(beyond.id).unwrap().health, 300);
}

#[test]
fn player_reach_is_range_plus_thirty() {
    let mut game = empty_game(6);
    let hitter = join_at(&mut game, "hitter", Vec2::new(1000.0, 1000.0));
    let edge = join_at(&mut game, "edge", Vec2::new(1090.0, 1000.0));
    let beyond = join_at(&mut game, "beyond", Vec2::new(1000.0, 909.99));

    assert_eq!(
        game.attack(hitter, edge),
        Ok(AttackOutcome::PlayerDamaged {
            target: edge,
            health: 90,
            max_health: 100
        })
    );
    assert_eq!(game.attack(hitter, beyond), Ok(AttackOutcome::Miss));
    assert_eq!(game.player(beyond).unwrap().health, 100);
}

#[test]
fn destroying_a_building_removes_it() {
    let mut game = empty_game(7);
    let id = join_at(&mut game, "wrecker", Vec2::new(1000.0, 1000.0));
    game.player_mut(id).unwrap().inventory = Inventory::new(15, 5, 0, 0);
    let spike = game
        .build(id, &build_req(BuildingKind::Spike, 1020.0, 1000.0))
        .unwrap()
        .building;

    for _ in 0..14 {
        assert!(matches!(
            game.attack(id, spike.id),
            Ok(AttackOutcome::BuildingDamaged { .. })
        ));
    }
    assert_eq!(
        game.attack(id, spike.id),
        Ok(AttackOutcome::BuildingDestroyed {
            target: spike.id,
            kind: BuildingKind::Spike,
            owner: Some(id)
        })
    );
    assert!(game.world().building(spike.id).is_none());
    assert_eq!(game.attack(id, spike.id), Ok(AttackOutcome::Miss));
}

#[test]
fn dead_player_respawns_after_one_hundred_ticks() {
    init_tracing();
    let mut game = empty_game(8);
    let killer = join_at(&mut game, "killer", Vec2::new(1000.0, 1000.0));
    let victim = join_at(&mut game, "victim", Vec2::new(1050.0, 1000.0));
    game.player_mut(victim).unwrap().inventory = Inventory::new(100, 40, 7, 2);
    let _ = game
        .build(victim, &build_req(BuildingKind::Windmill, 1200.0, 1200.0))
        .unwrap();
    assert_eq!(game.player(victim).unwrap().windmills(), 1);

    let dropped = kill(&mut game, killer, victim);
    assert_eq!(dropped, Inventory::new(50, 20, 7, 2));

    let dead = game.player(victim).unwrap();
    assert!(dead.is_dead());
    assert_eq!(dead.inventory, Inventory::EMPTY);
    assert_eq!(
        dead.life(),
        LifeState::Dead {
            respawn_in_ms: 5000
        }
    );

    // Dead players cannot act.
    assert_eq!(
        game.craft(victim, "arrow"),
        Err(Rejected::PlayerDead(victim))
    );
    assert!(game
        .apply_move(
            victim,
            &MoveInput {
                x: Some(10.0),
                ..MoveInput::default()
            }
        )
        .is_none());

    run_ticks(&mut game, 99);
    assert!(game.player(victim).unwrap().is_dead());

    let report = game.tick();
    assert_eq!(report.respawned, vec![victim]);
    let back = game.player(victim).unwrap();
    assert!(!back.is_dead());
    assert_eq!(back.health, 100);
    assert_eq!(back.inventory, Inventory::EMPTY);
    assert_eq!(back.windmills(), 0);
    assert_eq!(owned_windmills(&game, victim), 0);
    // The windmill itself stays standing, unowned.
    assert_eq!(game.world().building_count(), 1);
}

#[test]
fn windmills_pay_gold_every_sixty_ticks() {
    let mut game = empty_game(9);
    let id = join_at(&mut game, "miller", Vec2::new(500.0, 500.0));
    game.player_mut(id).unwrap().inventory = Inventory::new(100, 40, 0, 0);
    for x in [600.0, 700.0] {
        let _ = game
            .build(id, &build_req(BuildingKind::Windmill, x, 500.0))
            .unwrap();
    }

    run_ticks(&mut game, 59);
    assert_eq!(game.player(id).unwrap().inventory.gold, 0);

    let report = game.tick();
    assert_eq!(report.income, vec![(id, 2)]);
    assert_eq!(game.player(id).unwrap().inventory.gold, 2);

    run_ticks(&mut game, 60);
    assert_eq!(game.player(id).unwrap().inventory.gold, 4);
}

#[test]
fn players_without_windmills_earn_nothing() {
    let mut game = empty_game(9);
    let id = join_at(&mut game, "idle", Vec2::new(500.0, 500.0));
    run_ticks(&mut game, 180);
    assert_eq!(game.player(id).unwrap().inventory.gold, 0);
}

#[test]
fn windmill_counter_tracks_live_windmills() {
    let mut game = empty_game(10);
    let owner = join_at(&mut game, "owner", Vec2::new(1000.0, 1000.0));
    let raider = join_at(&mut game, "raider", Vec2::new(1000.0, 1040.0));
    game.player_mut(owner).unwrap().inventory = Inventory::new(100, 40, 0, 0);

    let first = game
        .build(owner, &build_req(BuildingKind::Windmill, 1010.0, 1000.0))
        .unwrap()
        .building;
    let _second = game
        .build(owner, &build_req(BuildingKind::Windmill, 990.0, 1000.0))
        .unwrap()
        .building;
    assert_eq!(game.player(owner).unwrap().windmills(), 2);
    assert_eq!(owned_windmills(&game, owner), 2);

    loop {
        match game.attack(raider, first.id).unwrap() {
            AttackOutcome::BuildingDamaged { .. } => {}
            AttackOutcome::BuildingDestroyed { owner: by, .. } => {
                assert_eq!(by, Some(owner));
                break;
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(game.player(owner).unwrap().windmills(), 1);
    assert_eq!(owned_windmills(&game, owner), 1);

    let _ = kill(&mut game, raider, owner);
    run_ticks(&mut game, 100);
    assert_eq!(game.player(owner).unwrap().windmills(), 0);
    assert_eq!(owned_windmills(&game, owner), 0);
}

#[test]
fn moves_are_clamped_to_the_world() {
    let mut game = empty_game(11);
    let id = join_at(&mut game, "runner", Vec2::new(500.0, 500.0));

    let moved = game
        .apply_move(
            id,
            &MoveInput {
                x: Some(-40.0),
                y: Some(9000.0),
                angle: Some(1.5),
                selected_tool: None,
            },
        )
        .unwrap();

    assert_eq!(moved.position, Vec2::new(0.0, 3000.0));
    assert_eq!(moved.angle, 1.5);
    assert_eq!(game.player(id).unwrap().position, Vec2::new(0.0, 3000.0));
}

#[test]
fn projectiles_fly_straight_and_expire() {
    let mut game = empty_game(12);
    let owner = join_at(&mut game, "archer", Vec2::new(2500.0, 2500.0));
    let shot = game.spawn_projectile(owner, Vec2::new(100.0, 100.0), 0.0, 15.0, 60);

    let _ = game.tick();
    let p = &game.projectiles()[0];
    assert_eq!(p.id, shot.id);
    assert!((p.position.x - 115.0).abs() < 1e-3);
    assert!((p.position.y - 100.0).abs() < 1e-3);
    assert_eq!(p.life, 59);

    run_ticks(&mut game, 58);
    assert_eq!(game.projectiles().len(), 1);
    let report = game.tick();
    assert_eq!(report.expired, vec![shot.id]);
    assert!(game.projectiles().is_empty());
}

#[test]
fn projectile_hits_lowest_id_first() {
    let mut game = empty_game(13);
    let owner = join_at(&mut game, "archer", Vec2::new(2500.0, 2500.0));
    let first = join_at(&mut game, "first", Vec2::new(500.0, 500.0));
    let second = join_at(&mut game, "second", Vec2::new(500.0, 500.0));
    assert!(first < second);

    let shot = game.spawn_projectile(owner, Vec2::new(470.0, 500.0), 0.0, 15.0, 60);
    let report = game.tick();

    assert_eq!(report.hits.len(), 1);
    assert_eq!(report.hits[0].projectile, shot.id);
    assert_eq!(report.hits[0].owner, owner);
    assert_eq!(
        report.hits[0].outcome,
        AttackOutcome::PlayerDamaged {
            target: first,
            health: 85,
            max_health: 100
        }
    );
    assert_eq!(game.player(second).unwrap().health, 100);
    assert!(game.projectiles().is_empty());
}

#[test]
fn projectiles_ignore_their_owner_and_can_kill() {
    let mut game = empty_game(14);
    let owner = join_at(&mut game, "archer", Vec2::new(500.0, 500.0));
    let target = join_at(&mut game, "target", Vec2::new(540.0, 500.0));
    game.player_mut(target).unwrap().health = 10;

    let _ = game.fire_projectile(owner, 0.0).unwrap();
    let report = game.tick();

    assert_eq!(game.player(owner).unwrap().health, 100);
    assert!(matches!(
        report.hits[0].outcome,
        AttackOutcome::PlayerKilled { target: t, .. } if t == target
    ));
    assert!(game.player(target).unwrap().is_dead());
}

#[test]
fn snapshot_reflects_the_world() {
    let mut game = empty_game(15);
    let id = join_at(&mut game, "watcher", Vec2::new(500.0, 500.0));
    game.player_mut(id).unwrap().inventory = Inventory::new(10, 0, 0, 0);
    let _ = game
        .build(id, &build_req(BuildingKind::Wall, 500.0, 540.0))
        .unwrap();
    let _ = game.fire_projectile(id, 1.0).unwrap();
    let _ = game.tick();

    let snap = game.snapshot();
    assert_eq!(snap.tick, 1);
    assert_eq!(snap.players.len(), 1);
    assert_eq!(snap.players[0].name, "watcher");
    assert_eq!(snap.buildings.len(), 1);
    assert_eq!(snap.projectiles.len(), 1);
    assert_eq!(snap.alive_players().count(), 1);
}

#[test]
fn rejoin_does_not_revive_a_dead_player() {
    let mut game = empty_game(16);
    let killer = join_at(&mut game, "killer", Vec2::new(1000.0, 1000.0));
    let victim = join_at(&mut game, "victim", Vec2::new(1040.0, 1000.0));
    let _ = kill(&mut game, killer, victim);

    let view = game.add_player(victim, "victim again");

    assert!(view.dead);
    assert_eq!(view.name, "victim");
    let player = game.player(victim).unwrap();
    assert!(player.is_dead());
    assert!(player.health <= 0);
    assert_eq!(
        player.life(),
        LifeState::Dead {
            respawn_in_ms: 5000
        }
    );

    // The regular respawn still happens on schedule.
    run_ticks(&mut game, 100);
    assert!(!game.player(victim).unwrap().is_dead());
}

#[test]
fn rejoin_keeps_windmills_and_inventory() {
    let mut game = empty_game(17);
    let id = join_at(&mut game, "miller", Vec2::new(500.0, 500.0));
    game.player_mut(id).unwrap().inventory = Inventory::new(60, 20, 0, 0);
    let _ = game
        .build(id, &build_req(BuildingKind::Windmill, 600.0, 500.0))
        .unwrap();

    let view = game.add_player(id, "miller");

    assert_eq!(view.windmills, 1);
    let player = game.player(id).unwrap();
    assert_eq!(player.windmills(), owned_windmills(&game, id));
    assert_eq!(player.windmills(), 1);
    assert_eq!(player.inventory, Inventory::new(10, 0, 0, 0));
    assert_eq!(player.position, Vec2::new(500.0, 500.0));
}

#[test]
fn dead_players_cannot_be_targeted() {
    let mut game = empty_game(18);
    let killer = join_at(&mut game, "killer", Vec2::new(1000.0, 1000.0));
    let victim = join_at(&mut game, "victim", Vec2::new(1040.0, 1000.0));
    let _ = kill(&mut game, killer, victim);
    let health = game.player(victim).unwrap().health;
    let life = game.player(victim).unwrap().life();

    assert_eq!(game.attack(killer, victim), Ok(AttackOutcome::Miss));

    let player = game.player(victim).unwrap();
    assert_eq!(player.health, health);
    assert_eq!(player.life(), life);
}

#[test]
fn projectiles_pass_through_dead_players() {
    let mut game = empty_game(19);
    let owner = join_at(&mut game, "archer", Vec2::new(2500.0, 2500.0));
    let killer = join_at(&mut game, "killer", Vec2::new(500.0, 560.0));
    let corpse = join_at(&mut game, "corpse", Vec2::new(500.0, 500.0));
    let target = join_at(&mut game, "target", Vec2::new(530.0, 500.0));
    let _ = kill(&mut game, killer, corpse);
    let corpse_health = game.player(corpse).unwrap().health;

    let shot = game.spawn_projectile(owner, Vec2::new(470.0, 500.0), 0.0, 15.0, 60);

    // Tick 1 lands on the corpse, tick 2 is exactly 30 from the target.
    for _ in 0..2 {
        assert!(game.tick().hits.is_empty());
    }
    let report = game.tick();

    assert_eq!(report.hits.len(), 1);
    assert_eq!(report.hits[0].projectile, shot.id);
    assert_eq!(
        report.hits[0].outcome,
        AttackOutcome::PlayerDamaged {
            target,
            health: 85,
            max_health: 100
        }
    );
    assert_eq!(game.player(corpse).unwrap().health, corpse_health);
    assert_eq!(game.player(killer).unwrap().health, 100);
}

#[test]
fn no_income_while_dead() {
    let mut game = empty_game(20);
    let killer = join_at(&mut game, "killer", Vec2::new(1000.0, 1000.0));
    let miller = join_at(&mut game, "miller", Vec2::new(1040.0, 1000.0));
    game.player_mut(miller).unwrap().inventory = Inventory::new(50, 20, 0, 0);
    let _ = game
        .build(miller, &build_req(BuildingKind::Windmill, 1500.0, 1500.0))
        .unwrap();

    // Halfway through the income cycle.
    run_ticks(&mut game, 30);
    let _ = kill(&mut game, killer, miller);

    for _ in 0..99 {
        let report = game.tick();
        assert!(report.income.is_empty());
        assert_eq!(game.player(miller).unwrap().inventory.gold, 0);
    }
    assert!(game.player(miller).unwrap().is_dead());
}
