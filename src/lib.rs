//! Quiz Tanks - a tile-based tank arena that gates ammo behind quiz questions
//!
//! Core modules:
//! - `sim`: Deterministic simulation (map, tanks, bullets, enemy AI, box interactions)
//! - `engine`: Per-frame orchestrator tying the simulation, audio and host together
//! - `audio`: Procedural sound effects and background melody
//! - `renderer`: WebGPU rendering pipeline
//! - `platform`: Browser host bridge
//! - `config`: Host-supplied quotas and content pools

pub mod audio;
pub mod config;
pub mod engine;
pub mod host;
pub mod platform;
pub mod renderer;
pub mod settings;
pub mod sim;

pub use config::{Answer, GameConfig, KnowledgeEntry, Question};
pub use engine::Engine;
pub use host::{GameResult, HostBridge, HudSnapshot, LossReason};
pub use settings::{QualityPreset, Settings};

use glam::Vec2;

use sim::TileCoord;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz, one display refresh)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Largest frame delta fed to the accumulator (seconds)
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Arena dimensions (tiles)
    pub const GRID_SIZE: usize = 22;
    pub const GRID_CELLS: usize = GRID_SIZE * GRID_SIZE;
    /// Tile edge in world units (pixels at 1x)
    pub const TILE_SIZE: f32 = 32.0;
    pub const ARENA_SIZE: f32 = GRID_SIZE as f32 * TILE_SIZE;

    /// Tank defaults
    pub const TANK_SIZE: f32 = 26.0;
    pub const PLAYER_SPEED: f32 = 110.0;
    pub const ENEMY_SPEED: f32 = 70.0;
    pub const FIRE_COOLDOWN: f32 = 0.25;
    pub const ENEMY_FIRE_COOLDOWN: f32 = 0.8;
    pub const INVULNERABLE_TIME: f32 = 1.5;

    /// Bullet defaults
    pub const BULLET_SIZE: f32 = 6.0;
    pub const BULLET_SPEED: f32 = 300.0;

    /// Enemy director
    pub const MAX_CONCURRENT_ENEMIES: usize = 4;
    pub const ENEMY_SPAWN_INTERVAL: f32 = 2.0;
    pub const ENEMY_SPAWN_ATTEMPTS: u32 = 20;
    /// Per-tick probability an enemy picks a new heading
    pub const ENEMY_TURN_CHANCE: f64 = 0.02;
    /// Per-tick probability an enemy pulls the trigger
    pub const ENEMY_FIRE_CHANCE: f64 = 0.015;

    /// Box placement
    pub const MAX_QUESTION_BOXES: usize = 10;
    pub const BOX_SPACING: i32 = 3;
    pub const BOX_SPACING_RELAXED: i32 = 2;
    pub const SPAWN_CLEARANCE: i32 = 4;
    pub const PLACEMENT_ATTEMPTS: u32 = 100;

    /// Same-tile box re-trigger delay (seconds of simulated time)
    pub const BOX_RETRIGGER_COOLDOWN: f32 = 3.0;
    /// Answer verdict display before the prompt closes (ms)
    pub const ANSWER_FEEDBACK_MS: f64 = 1200.0;
    /// End-of-round feedback before the host is told (ms)
    pub const END_OF_ROUND_DELAY_MS: f64 = 2000.0;
    /// How long the "no ammo" HUD warning stays lit (ms)
    pub const AMMO_WARNING_MS: f64 = 1000.0;

    pub const KILL_SCORE: u64 = 100;
    pub const CORRECT_ANSWER_SCORE: u64 = 50;
}

/// Tile containing a world-space point
#[inline]
pub fn world_to_tile(pos: Vec2) -> TileCoord {
    TileCoord::new(
        (pos.x / consts::TILE_SIZE).floor() as i32,
        (pos.y / consts::TILE_SIZE).floor() as i32,
    )
}

/// Top-left world position of a tile
#[inline]
pub fn tile_to_world(tile: TileCoord) -> Vec2 {
    Vec2::new(
        tile.x as f32 * consts::TILE_SIZE,
        tile.y as f32 * consts::TILE_SIZE,
    )
}
