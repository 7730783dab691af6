//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (spawn order for tanks and bullets)
//! - No rendering, audio or platform dependencies

pub mod collision;
pub mod enemy;
pub mod interaction;
pub mod map;
pub mod state;
pub mod tick;
pub mod tile;

pub use collision::Rect;
pub use interaction::{Interaction, InteractionState, Verdict};
pub use map::ArenaMap;
pub use state::{Bullet, Direction, GameEvent, GameState, Owner, Particle, Session, Tank};
pub use tick::{TickInput, tick};
pub use tile::{Tile, TileCoord, TileGrid};
