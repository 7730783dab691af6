//! Fixed timestep simulation tick
//!
//! Order within one step: player input, tank timers and enemy behaviour,
//! bullet travel, collision resolution with dead-entity removal, particles,
//! then the terminal check. Nothing mutates once the round has ended.

use glam::Vec2;

use super::collision::{
    BulletImpact, Rect, blocked_by_boxes, blocked_by_terrain, box_contact, bullet_impact,
    clamp_to_arena, tile_rect,
};
use super::enemy::{try_spawn, update_director};
use super::state::{Bullet, Direction, GameEvent, GameState, Owner, particle_color};
use super::tile::{Tile, TileCoord};
use crate::consts::*;
use crate::host::{GameResult, LossReason};

/// Largest cross-axis nudge applied when a tank turns onto a tile lane
const LANE_SNAP: f32 = 8.0;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickInput {
    /// Held movement key, if any
    pub movement: Option<Direction>,
    /// Fire held
    pub fire: bool,
}

/// Advance the game state by one fixed timestep
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) {
    if state.session.ended() {
        return;
    }

    state.time_ticks += 1;
    state.time += dt;

    // Player
    if let Some(dir) = input.movement {
        move_player(state, dir, dt);
    }
    state.player.cool_down(dt);
    if input.fire {
        player_fire(state);
    }

    // Enemies
    update_enemies(state, dt);
    update_director(state, dt);

    // Bullets
    for bullet in &mut state.bullets {
        bullet.pos += bullet.vel * dt;
    }
    resolve_bullets(state);

    // Particles
    for particle in &mut state.particles {
        particle.pos += particle.vel * dt;
        particle.vel *= 0.92;
        particle.life -= dt * 2.0;
    }
    state.particles.retain(|p| p.life > 0.0);

    check_terminal(state);
}

/// Nearest tile-aligned position on the cross axis of `dir`, if it is within
/// snapping distance
fn snap_to_lane(pos: Vec2, dir: Direction) -> Vec2 {
    let inset = (TILE_SIZE - TANK_SIZE) / 2.0;
    let snap = |v: f32| {
        let lane = ((v - inset) / TILE_SIZE).round() * TILE_SIZE + inset;
        if (lane - v).abs() <= LANE_SNAP { lane } else { v }
    };
    match dir {
        Direction::Up | Direction::Down => Vec2::new(snap(pos.x), pos.y),
        Direction::Left | Direction::Right => Vec2::new(pos.x, snap(pos.y)),
    }
}

fn player_blocked(state: &GameState, rect: &Rect) -> bool {
    blocked_by_terrain(&state.map.grid, rect)
        || state.enemies.iter().any(|e| e.rect().overlaps(rect))
}

fn move_player(state: &mut GameState, dir: Direction, dt: f32) {
    // Facing follows input even when the move is refused
    state.player.facing = dir;

    let snapped = snap_to_lane(state.player.pos, dir);
    if snapped != state.player.pos && !player_blocked(state, &Rect::square(snapped, TANK_SIZE)) {
        state.player.pos = snapped;
    }

    let target = clamp_to_arena(
        state.player.pos + dir.vector() * state.player.speed * dt,
        TANK_SIZE,
    );
    let rect = Rect::square(target, TANK_SIZE);

    let (now, last) = (state.time, state.last_box_trigger);
    let ready = |c: TileCoord| {
        !last.is_some_and(|(prev, at)| prev == c && now - at < BOX_RETRIGGER_COOLDOWN)
    };
    if let Some((coord, tile)) = box_contact(&state.map.grid, &rect, ready) {
        state.last_box_trigger = Some((coord, now));
        state.events.push(GameEvent::BoxContact { coord, tile });
    }
    if !player_blocked(state, &rect) {
        state.player.pos = target;
    }
}

fn player_fire(state: &mut GameState) {
    if state.player.fire_cooldown > 0.0 {
        return;
    }
    state.player.fire_cooldown = FIRE_COOLDOWN;

    if state.session.ammo == 0 {
        state.events.push(GameEvent::AmmoEmpty);
        return;
    }
    state.session.ammo -= 1;
    let (pos, facing, id) = (state.player.muzzle(), state.player.facing, state.player.id);
    spawn_bullet(state, pos, facing, id, Owner::Player);
    state.events.push(GameEvent::PlayerFired);
}

fn spawn_bullet(state: &mut GameState, pos: Vec2, facing: Direction, tank_id: u32, owner: Owner) {
    let id = state.next_entity_id();
    state.bullets.push(Bullet {
        id,
        pos,
        vel: facing.vector() * BULLET_SPEED,
        tank_id,
        owner,
    });
}

fn enemy_blocked(state: &GameState, index: usize, rect: &Rect) -> bool {
    !rect.inside_arena()
        || blocked_by_terrain(&state.map.grid, rect)
        || blocked_by_boxes(&state.map.grid, rect)
        || state.player.rect().overlaps(rect)
        || state
            .enemies
            .iter()
            .enumerate()
            .any(|(j, e)| j != index && e.rect().overlaps(rect))
}

fn update_enemies(state: &mut GameState, dt: f32) {
    for index in 0..state.enemies.len() {
        let Some(mut ai) = state.enemies[index].ai else {
            continue;
        };
        let decision = ai.decide(&mut state.rng);

        if let Some(dir) = decision.turn {
            state.enemies[index].facing = dir;
            let snapped = snap_to_lane(state.enemies[index].pos, dir);
            if !enemy_blocked(state, index, &Rect::square(snapped, TANK_SIZE)) {
                state.enemies[index].pos = snapped;
            }
        }

        let tank = &state.enemies[index];
        let target = tank.pos + tank.facing.vector() * tank.speed * dt;
        let rect = tank.rect_at(target);
        if enemy_blocked(state, index, &rect) {
            ai.stalled = true;
        } else {
            state.enemies[index].pos = target;
        }

        let tank = &mut state.enemies[index];
        tank.cool_down(dt);
        tank.ai = Some(ai);

        if decision.fire && tank.fire_cooldown <= 0.0 {
            tank.fire_cooldown = ENEMY_FIRE_COOLDOWN;
            let (pos, facing, id) = (tank.muzzle(), tank.facing, tank.id);
            spawn_bullet(state, pos, facing, id, Owner::Enemy);
            state.events.push(GameEvent::EnemyFired);
        }
    }
}

fn resolve_bullets(state: &mut GameState) {
    let bullets = std::mem::take(&mut state.bullets);
    let mut survivors = Vec::with_capacity(bullets.len());

    for bullet in bullets {
        let rect = bullet.rect();
        match bullet_impact(&state.map.grid, &rect) {
            BulletImpact::Clear => {}
            BulletImpact::OutOfBounds => {
                state.burst(bullet.pos, particle_color::SPARK, 4);
                continue;
            }
            BulletImpact::Terrain { coord, tile } => {
                match tile {
                    Tile::Brick => {
                        state.map.grid.set(coord, Tile::Empty);
                        state.events.push(GameEvent::BrickDestroyed(coord));
                        state.burst(tile_rect(coord).center(), particle_color::BRICK, 10);
                    }
                    Tile::Steel => {
                        state.events.push(GameEvent::SteelHit(coord));
                        state.burst(bullet.pos, particle_color::SPARK, 6);
                    }
                    _ => {
                        state.events.push(GameEvent::BulletSplash(coord));
                        state.burst(bullet.pos, particle_color::SPARK, 3);
                    }
                }
                continue;
            }
        }

        match bullet.owner {
            Owner::Player => {
                if let Some(index) = state.enemies.iter().position(|e| e.rect().overlaps(&rect)) {
                    let enemy = state.enemies.remove(index);
                    let pos = enemy.center();
                    state.session.kills += 1;
                    state.session.score += KILL_SCORE;
                    state.events.push(GameEvent::EnemyDestroyed { id: enemy.id, pos });
                    state.burst(pos, particle_color::FIRE, 16);
                    log::debug!(
                        "Enemy {} destroyed by tank {} ({}/{})",
                        enemy.id,
                        bullet.tank_id,
                        state.session.kills,
                        state.session.enemy_quota
                    );
                    try_spawn(state);
                    continue;
                }
            }
            Owner::Enemy => {
                if state.player.rect().overlaps(&rect) {
                    if state.player.invulnerable <= 0.0 {
                        state.session.lives = state.session.lives.saturating_sub(1);
                        state.player.invulnerable = INVULNERABLE_TIME;
                        state.events.push(GameEvent::PlayerHit {
                            lives_left: state.session.lives,
                        });
                        let pos = state.player.center();
                        state.burst(pos, particle_color::FIRE, 12);
                    }
                    continue;
                }
            }
        }

        survivors.push(bullet);
    }

    state.bullets = survivors;
}

fn check_terminal(state: &mut GameState) {
    let session = &state.session;
    let result = if session.lives == 0 {
        Some(GameResult::Lost(LossReason::NoHeart))
    } else if session.kills >= session.enemy_quota && state.enemies.is_empty() {
        Some(GameResult::Won)
    } else if session.ammo == 0
        && state.map.question_boxes() == 0
        && state.player_bullets_in_flight() == 0
    {
        Some(GameResult::Lost(LossReason::OutOfAmmo))
    } else {
        None
    };

    if let Some(result) = result {
        state.finish(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::sim::enemy::EnemyAi;
    use crate::sim::state::{Tank, centered_in_tile};
    use proptest::prelude::*;

    const SPAWN: TileCoord = TileCoord { x: 11, y: 21 };

    /// Empty arena, spawn bottom centre, director held back
    fn open_arena(tweak: impl FnOnce(&mut GameConfig)) -> GameState {
        let mut codes = vec![0u8; GRID_CELLS];
        codes[SPAWN.y as usize * GRID_SIZE + SPAWN.x as usize] = 9;
        let mut config = GameConfig {
            map: Some(codes),
            ..GameConfig::default()
        };
        tweak(&mut config);
        let mut state = GameState::new(&config, 7);
        state.director.spawn_timer = f32::MAX;
        state
    }

    fn idle_enemy(state: &mut GameState, tile: TileCoord) -> u32 {
        let id = state.next_entity_id();
        let mut tank = Tank::enemy(id, tile, Direction::Down);
        tank.speed = 0.0;
        tank.ai = Some(EnemyAi {
            turn_chance: 0.0,
            fire_chance: 0.0,
            stalled: false,
        });
        state.enemies.push(tank);
        id
    }

    fn enemy_bullet(state: &mut GameState, pos: Vec2) {
        let id = state.next_entity_id();
        state.bullets.push(Bullet {
            id,
            pos,
            vel: Vec2::ZERO,
            tank_id: 99,
            owner: Owner::Enemy,
        });
    }

    fn run(state: &mut GameState, input: TickInput, ticks: usize) -> Vec<GameEvent> {
        let mut events = Vec::new();
        for _ in 0..ticks {
            tick(state, &input, SIM_DT);
            events.extend(state.drain_events());
        }
        events
    }

    fn fire() -> TickInput {
        TickInput {
            fire: true,
            ..Default::default()
        }
    }

    fn moving(dir: Direction) -> TickInput {
        TickInput {
            movement: Some(dir),
            fire: false,
        }
    }

    #[test]
    fn test_player_moves_and_turns() {
        let mut state = open_arena(|_| {});
        let start = state.player.pos;
        tick(&mut state, &moving(Direction::Right), SIM_DT);
        assert_eq!(state.player.facing, Direction::Right);
        assert!((state.player.pos.x - (start.x + PLAYER_SPEED * SIM_DT)).abs() < 1e-3);
        assert_eq!(state.player.pos.y, start.y);
    }

    #[test]
    fn test_blocked_move_still_turns() {
        let mut state = open_arena(|_| {});
        state.map.grid.set(TileCoord::new(10, 21), Tile::Brick);
        let start = state.player.pos;
        run(&mut state, moving(Direction::Left), 10);
        assert_eq!(state.player.facing, Direction::Left);
        // Slides up to the brick face but never into it
        assert!(state.player.pos.x >= 11.0 * TILE_SIZE);
        assert!(state.player.pos.x <= start.x);
    }

    #[test]
    fn test_arena_edge_clamps() {
        let mut state = open_arena(|_| {});
        run(&mut state, moving(Direction::Down), 30);
        assert!(state.player.rect().inside_arena());
    }

    #[test]
    fn test_fire_respects_cooldown_and_ammo() {
        let mut state = open_arena(|c| c.initial_ammo = 5);
        let events = run(&mut state, fire(), 2);
        assert_eq!(state.session.ammo, 4);
        assert_eq!(state.bullets.len(), 1);
        assert_eq!(events.iter().filter(|e| **e == GameEvent::PlayerFired).count(), 1);
    }

    #[test]
    fn test_empty_magazine_with_no_boxes_loses() {
        let mut state = open_arena(|c| c.initial_ammo = 0);
        let events = run(&mut state, fire(), 1);
        assert!(events.contains(&GameEvent::AmmoEmpty));
        assert!(state.bullets.is_empty());
        assert_eq!(
            state.session.outcome,
            Some(GameResult::Lost(LossReason::OutOfAmmo))
        );
    }

    #[test]
    fn test_out_of_ammo_waits_for_bullets_in_flight() {
        let mut state = open_arena(|c| c.initial_ammo = 1);
        run(&mut state, fire(), 1);
        assert_eq!(state.session.ammo, 0);
        assert!(!state.session.ended());
        run(&mut state, TickInput::default(), 200);
        assert_eq!(
            state.session.outcome,
            Some(GameResult::Lost(LossReason::OutOfAmmo))
        );
    }

    #[test]
    fn test_bullet_destroys_brick() {
        let mut state = open_arena(|_| {});
        let brick = TileCoord::new(11, 17);
        state.map.grid.set(brick, Tile::Brick);
        let mut events = run(&mut state, fire(), 1);
        events.extend(run(&mut state, TickInput::default(), 60));
        assert_eq!(state.map.grid.get(brick), Some(Tile::Empty));
        assert!(events.contains(&GameEvent::BrickDestroyed(brick)));
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_steel_and_water_absorb() {
        let target = TileCoord::new(11, 18);
        for (tile, expected) in [
            (Tile::Steel, GameEvent::SteelHit(target)),
            (Tile::Water, GameEvent::BulletSplash(target)),
        ] {
            let mut state = open_arena(|_| {});
            state.map.grid.set(target, tile);
            run(&mut state, fire(), 1);
            let events = run(&mut state, TickInput::default(), 60);
            assert_eq!(state.map.grid.get(target), Some(tile));
            assert!(events.contains(&expected));
            assert!(state.bullets.is_empty());
        }
    }

    #[test]
    fn test_trees_and_boxes_let_bullets_through() {
        let mut state = open_arena(|_| {});
        state.map.grid.set(TileCoord::new(11, 19), Tile::Tree);
        state.map.grid.set(TileCoord::new(11, 18), Tile::KnowledgeBox);
        state.map.grid.set(TileCoord::new(11, 10), Tile::Brick);
        run(&mut state, fire(), 1);
        let events = run(&mut state, TickInput::default(), 100);
        assert!(events.contains(&GameEvent::BrickDestroyed(TileCoord::new(11, 10))));
        assert_eq!(state.map.grid.get(TileCoord::new(11, 18)), Some(Tile::KnowledgeBox));
    }

    #[test]
    fn test_kill_scores_and_wins() {
        let mut state = open_arena(|c| c.enemies = 1);
        let id = idle_enemy(&mut state, TileCoord::new(11, 15));
        let mut events = run(&mut state, fire(), 1);
        events.extend(run(&mut state, TickInput::default(), 60));

        assert!(
            events
                .iter()
                .any(|e| matches!(e, GameEvent::EnemyDestroyed { id: hit, .. } if *hit == id))
        );
        assert_eq!(state.session.kills, 1);
        assert_eq!(state.session.score, KILL_SCORE);
        assert_eq!(state.session.outcome, Some(GameResult::Won));
        assert_eq!(
            events.iter().filter(|e| matches!(e, GameEvent::Ended(_))).count(),
            1
        );
    }

    #[test]
    fn test_enemy_bullets_respect_invulnerability() {
        let mut state = open_arena(|c| c.hearts = 3);
        let center = state.player.center();
        enemy_bullet(&mut state, center);
        enemy_bullet(&mut state, center);
        let events = run(&mut state, TickInput::default(), 1);
        assert_eq!(state.session.lives, 2);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, GameEvent::PlayerHit { .. }))
                .count(),
            1
        );
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_last_life_loses() {
        let mut state = open_arena(|c| c.hearts = 1);
        let center = state.player.center();
        enemy_bullet(&mut state, center);
        run(&mut state, TickInput::default(), 1);
        assert_eq!(
            state.session.outcome,
            Some(GameResult::Lost(LossReason::NoHeart))
        );
    }

    #[test]
    fn test_player_bullets_ignore_player() {
        let mut state = open_arena(|_| {});
        let id = state.next_entity_id();
        let pos = state.player.center();
        state.bullets.push(Bullet {
            id,
            pos,
            vel: Vec2::ZERO,
            tank_id: state.player.id,
            owner: Owner::Player,
        });
        run(&mut state, TickInput::default(), 1);
        assert_eq!(state.session.lives, state.session.max_lives);
        assert_eq!(state.bullets.len(), 1);
    }

    #[test]
    fn test_box_contact_cooldown() {
        let mut state = open_arena(|_| {});
        let knowledge = TileCoord::new(12, 21);
        state.map.grid.set(knowledge, Tile::KnowledgeBox);

        // Drive into the box and across it, well inside the cooldown
        let events = run(&mut state, moving(Direction::Right), 60);
        let contacts: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, GameEvent::BoxContact { .. }))
            .collect();
        assert_eq!(
            contacts,
            vec![&GameEvent::BoxContact {
                coord: knowledge,
                tile: Tile::KnowledgeBox
            }]
        );
    }

    #[test]
    fn test_cooling_box_does_not_hide_its_neighbour() {
        let mut state = open_arena(|_| {});
        let cooling = TileCoord::new(12, 20);
        let fresh = TileCoord::new(12, 21);
        state.map.grid.set(cooling, Tile::KnowledgeBox);
        state.map.grid.set(fresh, Tile::QuestionBox);
        state.last_box_trigger = Some((cooling, state.time));
        // Flush against column 12, straddling rows 20 and 21
        state.player.pos = Vec2::new(12.0 * TILE_SIZE - TANK_SIZE - 1.0, 656.0);

        let events = run(&mut state, moving(Direction::Right), 1);
        assert!(events.contains(&GameEvent::BoxContact {
            coord: fresh,
            tile: Tile::QuestionBox
        }));
        assert_eq!(state.last_box_trigger.map(|(c, _)| c), Some(fresh));
    }

    #[test]
    fn test_boxes_block_enemies() {
        let mut state = open_arena(|_| {});
        let id = state.next_entity_id();
        let mut tank = Tank::enemy(id, TileCoord::new(5, 5), Direction::Right);
        tank.ai = Some(EnemyAi {
            turn_chance: 0.0,
            fire_chance: 0.0,
            stalled: false,
        });
        state.enemies.push(tank);
        state.map.grid.set(TileCoord::new(6, 5), Tile::QuestionBox);

        run(&mut state, TickInput::default(), 1);
        let expected =
            centered_in_tile(TileCoord::new(5, 5)) + Vec2::new(ENEMY_SPEED * SIM_DT, 0.0);
        assert!((state.enemies[0].pos - expected).length() < 1e-3);

        run(&mut state, TickInput::default(), 60);
        assert!(state.enemies[0].rect().max().x <= 6.0 * TILE_SIZE);
    }

    #[test]
    fn test_lane_snap() {
        let inset = (TILE_SIZE - TANK_SIZE) / 2.0;
        let near = Vec2::new(TILE_SIZE * 4.0 + inset + 5.0, 100.0);
        assert_eq!(snap_to_lane(near, Direction::Up).x, TILE_SIZE * 4.0 + inset);
        let far = Vec2::new(TILE_SIZE * 4.0 + inset + 16.0, 100.0);
        assert_eq!(snap_to_lane(far, Direction::Up).x, far.x);
        assert_eq!(snap_to_lane(near, Direction::Left).x, near.x);
    }

    #[test]
    fn test_no_mutation_after_end() {
        let mut state = open_arena(|_| {});
        state.finish(GameResult::Won);
        state.drain_events();
        let ticks = state.time_ticks;
        let pos = state.player.pos;
        let events = run(&mut state, moving(Direction::Up), 10);
        assert!(events.is_empty());
        assert_eq!(state.time_ticks, ticks);
        assert_eq!(state.player.pos, pos);
    }

    proptest! {
        #[test]
        fn prop_world_invariants(
            seed in any::<u64>(),
            quota in 1u32..8,
            moves in prop::collection::vec((0usize..5, any::<bool>()), 1..400),
        ) {
            let config = GameConfig { enemies: quota, ..GameConfig::default() };
            let mut state = GameState::new(&config, seed);
            let mut ended = 0;

            for (dir, fire) in moves {
                let input = TickInput { movement: Direction::ALL.get(dir).copied(), fire };
                tick(&mut state, &input, SIM_DT);

                prop_assert!(state.enemies.len() <= MAX_CONCURRENT_ENEMIES);
                prop_assert!(state.enemies.len() as u32 + state.session.kills <= quota);
                prop_assert!(state.session.lives <= state.session.max_lives);
                prop_assert!(state.player.rect().inside_arena());
                prop_assert!(!blocked_by_terrain(&state.map.grid, &state.player.rect()));

                ended += state
                    .drain_events()
                    .iter()
                    .filter(|e| matches!(e, GameEvent::Ended(_)))
                    .count();
                prop_assert!(ended <= 1);
            }
        }
    }
}
