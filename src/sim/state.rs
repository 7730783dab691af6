//! Game state and core simulation types
//!
//! Everything one engine instance mutates lives here: the arena, the tanks,
//! bullets and particles, and the session counters reported to the host.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::collision::Rect;
use super::enemy::{EnemyAi, EnemyDirector};
use super::map::ArenaMap;
use super::tile::TileCoord;
use crate::config::GameConfig;
use crate::consts::*;
use crate::host::GameResult;
use crate::{tile_to_world, world_to_tile};

/// Cardinal facing of a tank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit vector (screen space, y down)
    pub fn vector(self) -> Vec2 {
        match self {
            Direction::Up => Vec2::new(0.0, -1.0),
            Direction::Down => Vec2::new(0.0, 1.0),
            Direction::Left => Vec2::new(-1.0, 0.0),
            Direction::Right => Vec2::new(1.0, 0.0),
        }
    }
}

/// Who a tank (and its bullets) fights for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Owner {
    Player,
    Enemy,
}

/// A tank entity
#[derive(Debug, Clone)]
pub struct Tank {
    pub id: u32,
    /// Top-left corner
    pub pos: Vec2,
    pub facing: Direction,
    pub speed: f32,
    /// Seconds until the gun is ready again
    pub fire_cooldown: f32,
    pub owner: Owner,
    /// Seconds of remaining hit immunity
    pub invulnerable: f32,
    /// Reactive behaviour, enemies only
    pub ai: Option<EnemyAi>,
}

impl Tank {
    pub fn player(id: u32, spawn: TileCoord) -> Self {
        Self {
            id,
            pos: centered_in_tile(spawn),
            facing: Direction::Up,
            speed: PLAYER_SPEED,
            fire_cooldown: 0.0,
            owner: Owner::Player,
            invulnerable: 0.0,
            ai: None,
        }
    }

    pub fn enemy(id: u32, tile: TileCoord, facing: Direction) -> Self {
        Self {
            id,
            pos: centered_in_tile(tile),
            facing,
            speed: ENEMY_SPEED,
            fire_cooldown: ENEMY_FIRE_COOLDOWN,
            owner: Owner::Enemy,
            invulnerable: 0.0,
            ai: Some(EnemyAi::default()),
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::square(self.pos, TANK_SIZE)
    }

    pub fn rect_at(&self, pos: Vec2) -> Rect {
        Rect::square(pos, TANK_SIZE)
    }

    pub fn center(&self) -> Vec2 {
        self.pos + Vec2::splat(TANK_SIZE / 2.0)
    }

    /// Tile under the tank's centre
    pub fn tile(&self) -> TileCoord {
        world_to_tile(self.center())
    }

    /// Muzzle position (centre of the leading edge)
    pub fn muzzle(&self) -> Vec2 {
        self.center() + self.facing.vector() * (TANK_SIZE / 2.0 + BULLET_SIZE / 2.0)
    }

    /// Tick down timers
    pub fn cool_down(&mut self, dt: f32) {
        self.fire_cooldown = (self.fire_cooldown - dt).max(0.0);
        self.invulnerable = (self.invulnerable - dt).max(0.0);
    }
}

/// Top-left position that centres a tank in `tile`
pub fn centered_in_tile(tile: TileCoord) -> Vec2 {
    tile_to_world(tile) + Vec2::splat((TILE_SIZE - TANK_SIZE) / 2.0)
}

/// A projectile
#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: u32,
    /// Centre point
    pub pos: Vec2,
    pub vel: Vec2,
    /// Firing tank
    pub tank_id: u32,
    pub owner: Owner,
}

impl Bullet {
    pub fn rect(&self) -> Rect {
        Rect::centered(self.pos, BULLET_SIZE)
    }
}

/// A particle for visual effects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub color: u32,
    pub life: f32, // 0-1, decreases over time
    pub size: f32,
}

/// Particle palette indices
pub mod particle_color {
    pub const FIRE: u32 = 0;
    pub const BRICK: u32 = 1;
    pub const SPARK: u32 = 2;
}

/// Quotas and counters for one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub lives: u32,
    pub max_lives: u32,
    pub wrong_answers: u32,
    pub max_wrong_answers: u32,
    pub ammo: u32,
    pub ammo_per_correct: u32,
    pub score: u64,
    pub kills: u32,
    pub enemy_quota: u32,
    /// Set once, on the first terminal transition
    pub outcome: Option<GameResult>,
}

impl Session {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            lives: config.hearts,
            max_lives: config.hearts,
            wrong_answers: 0,
            max_wrong_answers: config.brains,
            ammo: config.initial_ammo,
            ammo_per_correct: config.ammo_per_correct,
            score: 0,
            kills: 0,
            enemy_quota: config.enemies,
            outcome: None,
        }
    }

    pub fn ended(&self) -> bool {
        self.outcome.is_some()
    }

    /// Record the terminal result. Only the first call sticks.
    pub fn end(&mut self, result: GameResult) -> bool {
        if self.ended() {
            return false;
        }
        self.outcome = Some(result);
        true
    }

    pub fn brains_left(&self) -> u32 {
        self.max_wrong_answers.saturating_sub(self.wrong_answers)
    }

    pub fn enemies_left(&self) -> u32 {
        self.enemy_quota.saturating_sub(self.kills)
    }
}

/// Things that happened during a tick, drained by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameEvent {
    PlayerFired,
    EnemyFired,
    /// Fire pressed with an empty magazine
    AmmoEmpty,
    BrickDestroyed(TileCoord),
    SteelHit(TileCoord),
    BulletSplash(TileCoord),
    EnemySpawned { id: u32 },
    EnemyDestroyed { id: u32, pos: Vec2 },
    PlayerHit { lives_left: u32 },
    /// Player drove into a box whose cooldown has elapsed
    BoxContact { coord: TileCoord, tile: super::tile::Tile },
    Ended(GameResult),
}

/// Complete simulation state for one engine instance
#[derive(Debug, Clone)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    pub rng: Pcg32,
    /// Simulated seconds (frozen while suspended)
    pub time: f32,
    /// Simulation tick counter
    pub time_ticks: u64,
    pub map: ArenaMap,
    pub player: Tank,
    pub enemies: Vec<Tank>,
    pub bullets: Vec<Bullet>,
    /// Visual particles (not gameplay-affecting)
    pub particles: Vec<Particle>,
    pub max_particles: usize,
    pub session: Session,
    pub director: EnemyDirector,
    /// Size of the question pool, bounds box refills
    pub question_pool: usize,
    /// Last box the player triggered and when
    pub last_box_trigger: Option<(TileCoord, f32)>,
    /// Pending events since the last drain
    pub events: Vec<GameEvent>,
    next_id: u32,
}

/// Default particle budget
pub const MAX_PARTICLES: usize = 256;

impl GameState {
    /// Build the arena and place the player on the resolved spawn
    pub fn new(config: &GameConfig, seed: u64) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let map = ArenaMap::build(
            config.map.as_deref(),
            config.questions.len(),
            config.knowledge.len(),
            &mut rng,
        );
        let player = Tank::player(1, map.spawn);

        Self {
            seed,
            rng,
            time: 0.0,
            time_ticks: 0,
            map,
            player,
            enemies: Vec::new(),
            bullets: Vec::new(),
            particles: Vec::new(),
            max_particles: MAX_PARTICLES,
            session: Session::new(config),
            director: EnemyDirector::new(),
            question_pool: config.questions.len(),
            last_box_trigger: None,
            events: Vec::new(),
            next_id: 2,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn player_bullets_in_flight(&self) -> usize {
        self.bullets
            .iter()
            .filter(|b| b.owner == Owner::Player)
            .count()
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Declare the round over. Returns false if it already was.
    pub fn finish(&mut self, result: GameResult) -> bool {
        if !self.session.end(result) {
            return false;
        }
        log::info!("Round ended: {result:?}");
        self.events.push(GameEvent::Ended(result));
        true
    }

    /// Spray particles from an impact point
    pub fn burst(&mut self, at: Vec2, color: u32, count: usize) {
        use rand::Rng;
        for _ in 0..count {
            if self.particles.len() >= self.max_particles {
                break;
            }
            let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
            let speed = self.rng.random_range(30.0..120.0);
            self.particles.push(Particle {
                pos: at,
                vel: Vec2::new(angle.cos(), angle.sin()) * speed,
                color,
                life: 1.0,
                size: self.rng.random_range(2.0..5.0),
            });
        }
    }
}
