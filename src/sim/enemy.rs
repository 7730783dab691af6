//! Enemy director and reactive enemy behaviour
//!
//! Enemies wander and shoot at random; there is no path-finding. The director
//! keeps `active + kills <= quota` and never lets more than
//! `MAX_CONCURRENT_ENEMIES` be alive at once.

use rand::Rng;
use rand_pcg::Pcg32;

use super::collision::{Rect, blocked_by_boxes, blocked_by_terrain};
use super::state::{Direction, GameEvent, GameState, Session, Tank, centered_in_tile};
use super::tile::TileCoord;
use crate::consts::*;

/// Per-tank behaviour, stepped with the world passed in each tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyAi {
    /// Chance per tick of picking a new heading
    pub turn_chance: f64,
    /// Chance per tick of firing
    pub fire_chance: f64,
    /// Last move attempt hit something
    pub stalled: bool,
}

impl Default for EnemyAi {
    fn default() -> Self {
        Self {
            turn_chance: ENEMY_TURN_CHANCE,
            fire_chance: ENEMY_FIRE_CHANCE,
            stalled: false,
        }
    }
}

/// What an enemy wants to do this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AiDecision {
    pub turn: Option<Direction>,
    pub fire: bool,
}

impl EnemyAi {
    pub fn decide(&mut self, rng: &mut Pcg32) -> AiDecision {
        let turn = if self.stalled || rng.random_bool(self.turn_chance) {
            self.stalled = false;
            Some(Direction::ALL[rng.random_range(0..Direction::ALL.len())])
        } else {
            None
        };
        AiDecision {
            turn,
            fire: rng.random_bool(self.fire_chance),
        }
    }
}

/// Spawn pacing
#[derive(Debug, Clone, Default)]
pub struct EnemyDirector {
    /// Seconds until the next timed spawn attempt
    pub spawn_timer: f32,
}

impl EnemyDirector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the quota and concurrency cap leave room for one more enemy
    pub fn can_spawn(&self, session: &Session, active: usize) -> bool {
        active < MAX_CONCURRENT_ENEMIES && active as u32 + session.kills < session.enemy_quota
    }
}

/// Advance the spawn timer and try a spawn when it fires
pub fn update_director(state: &mut GameState, dt: f32) {
    state.director.spawn_timer -= dt;
    if state.director.spawn_timer <= 0.0 {
        state.director.spawn_timer = ENEMY_SPAWN_INTERVAL;
        try_spawn(state);
    }
}

/// Spawn one enemy on the half of the arena the player is not in.
///
/// Returns the new tank's id, or `None` when the quota is met or every
/// sampled column was blocked.
pub fn try_spawn(state: &mut GameState) -> Option<u32> {
    if !state.director.can_spawn(&state.session, state.enemies.len()) {
        return None;
    }

    let bottom = GRID_SIZE as i32 - 1;
    let (row, facing) = if state.player.tile().y >= GRID_SIZE as i32 / 2 {
        (0, Direction::Down)
    } else {
        (bottom, Direction::Up)
    };

    for _ in 0..ENEMY_SPAWN_ATTEMPTS {
        let tile = TileCoord::new(state.rng.random_range(0..GRID_SIZE as i32), row);
        let rect = Rect::square(centered_in_tile(tile), TANK_SIZE);
        if !spawn_cell_free(state, &rect) {
            continue;
        }
        let id = state.next_entity_id();
        state.enemies.push(Tank::enemy(id, tile, facing));
        state.events.push(GameEvent::EnemySpawned { id });
        log::debug!("Enemy {id} spawned at {tile}");
        return Some(id);
    }

    log::debug!("No free spawn column on row {row}");
    None
}

fn spawn_cell_free(state: &GameState, rect: &Rect) -> bool {
    !blocked_by_terrain(&state.map.grid, rect)
        && !blocked_by_boxes(&state.map.grid, rect)
        && !state.player.rect().overlaps(rect)
        && !state.enemies.iter().any(|e| e.rect().overlaps(rect))
}
