//! Shape generation for 2D primitives
//!
//! Everything is built in arena pixels (origin top-left, y down); the
//! pipeline maps to NDC.

use glam::Vec2;
use std::f32::consts::PI;

use super::vertex::{Vertex, colors};
use crate::consts::{ARENA_SIZE, BULLET_SIZE, TANK_SIZE, TILE_SIZE};
use crate::sim::collision::Rect;
use crate::sim::state::{Direction, GameState, Owner, Tank};
use crate::sim::tile::Tile;
use crate::tile_to_world;

/// Two triangles covering `rect`
pub fn rect(rect: Rect, color: [f32; 4]) -> Vec<Vertex> {
    let Vec2 { x: x0, y: y0 } = rect.min;
    let Vec2 { x: x1, y: y1 } = rect.max();
    vec![
        Vertex::new(x0, y0, color),
        Vertex::new(x1, y0, color),
        Vertex::new(x0, y1, color),
        Vertex::new(x0, y1, color),
        Vertex::new(x1, y0, color),
        Vertex::new(x1, y1, color),
    ]
}

/// Generate vertices for a filled circle
pub fn circle(center: Vec2, radius: f32, color: [f32; 4], segments: u32) -> Vec<Vertex> {
    let mut vertices = Vec::with_capacity((segments * 3) as usize);

    for i in 0..segments {
        let theta1 = (i as f32 / segments as f32) * 2.0 * PI;
        let theta2 = ((i + 1) as f32 / segments as f32) * 2.0 * PI;

        vertices.push(Vertex::new(center.x, center.y, color));
        vertices.push(Vertex::new(
            center.x + radius * theta1.cos(),
            center.y + radius * theta1.sin(),
            color,
        ));
        vertices.push(Vertex::new(
            center.x + radius * theta2.cos(),
            center.y + radius * theta2.sin(),
            color,
        ));
    }

    vertices
}

fn tile_rect(min: Vec2) -> Rect {
    Rect::square(min, TILE_SIZE)
}

/// Terrain and box art for one cell. Trees are drawn in a later layer.
fn tile_shapes(tile: Tile, min: Vec2, time: f32, out: &mut Vec<Vertex>) {
    let cell = tile_rect(min);
    match tile {
        Tile::Empty | Tile::Spawn | Tile::Tree => {}
        Tile::Brick => {
            out.extend(rect(cell, colors::BRICK_MORTAR));
            // Two staggered courses
            let half = TILE_SIZE / 2.0;
            for (row, offset) in [(0.0, 0.0), (half, half / 2.0)] {
                for col in 0..2 {
                    let x = (col as f32 * half + offset).min(TILE_SIZE - half);
                    let brick = Rect::new(
                        min + Vec2::new(x + 1.0, row + 1.0),
                        Vec2::new(half - 2.0, half - 2.0),
                    );
                    out.extend(rect(brick, colors::BRICK));
                }
            }
        }
        Tile::Steel => {
            out.extend(rect(cell, colors::STEEL));
            let inset = TILE_SIZE * 0.25;
            for corner in [
                Vec2::new(inset, inset),
                Vec2::new(TILE_SIZE - inset, inset),
                Vec2::new(inset, TILE_SIZE - inset),
                Vec2::new(TILE_SIZE - inset, TILE_SIZE - inset),
            ] {
                out.extend(circle(min + corner, 2.5, colors::STEEL_RIVET, 8));
            }
        }
        Tile::Water => {
            out.extend(rect(cell, colors::WATER));
            let shift = (time * 2.0 + min.x * 0.1).sin() * 4.0;
            let ripple = Rect::new(
                min + Vec2::new(6.0 + shift, TILE_SIZE * 0.45),
                Vec2::new(TILE_SIZE - 12.0, 2.0),
            );
            out.extend(rect(ripple, colors::WATER_RIPPLE));
        }
        Tile::QuestionBox | Tile::KnowledgeBox => {
            let color = if tile == Tile::QuestionBox {
                colors::QUESTION_BOX
            } else {
                colors::KNOWLEDGE_BOX
            };
            let pulse = 1.0 + (time * 4.0).sin() * 0.5;
            let inner = Rect::centered(cell.center(), TILE_SIZE - 4.0 - pulse * 2.0);
            out.extend(rect(inner, color));
            out.extend(circle(cell.center(), TILE_SIZE * 0.15, colors::BOX_MARK, 12));
        }
    }
}

/// Hull plus a barrel pointing along `facing`
pub fn tank(tank: &Tank, out: &mut Vec<Vertex>) {
    let body = match tank.owner {
        Owner::Player => colors::PLAYER,
        Owner::Enemy => colors::ENEMY,
    };
    out.extend(rect(tank.rect(), body));

    let center = tank.center();
    out.extend(circle(center, TANK_SIZE * 0.25, colors::TURRET, 12));

    let length = TANK_SIZE * 0.55;
    let width = 4.0;
    let vertical = Vec2::new(width, length);
    let horizontal = Vec2::new(length, width);
    let barrel = match tank.facing {
        Direction::Up => Rect::new(center - Vec2::new(width / 2.0, length), vertical),
        Direction::Down => Rect::new(center - Vec2::new(width / 2.0, 0.0), vertical),
        Direction::Left => Rect::new(center - Vec2::new(length, width / 2.0), horizontal),
        Direction::Right => Rect::new(center - Vec2::new(0.0, width / 2.0), horizontal),
    };
    out.extend(rect(barrel, colors::TURRET));
}

/// Blink while invulnerable
fn visible(tank: &Tank, time: f32) -> bool {
    tank.invulnerable <= 0.0 || (time * 10.0) as i32 % 2 == 0
}

/// Full frame in draw order: floor, terrain and boxes, bullets, tanks,
/// tree canopy, particles.
pub fn scene(state: &GameState) -> Vec<Vertex> {
    let time = state.time;
    let mut out = Vec::with_capacity(4096);

    let arena = Rect::square(Vec2::ZERO, ARENA_SIZE);
    out.extend(rect(arena, colors::ARENA_FLOOR));

    for (coord, tile) in state.map.grid.iter() {
        tile_shapes(tile, tile_to_world(coord), time, &mut out);
    }

    for bullet in &state.bullets {
        out.extend(circle(bullet.pos, BULLET_SIZE / 2.0, colors::BULLET, 8));
    }

    for enemy in &state.enemies {
        tank(enemy, &mut out);
    }
    if state.session.lives > 0 && visible(&state.player, time) {
        tank(&state.player, &mut out);
    }

    for (coord, tile) in state.map.grid.iter() {
        if tile == Tile::Tree {
            let min = tile_to_world(coord);
            for corner in [0.3, 0.7] {
                out.extend(circle(
                    min + Vec2::splat(TILE_SIZE * corner),
                    TILE_SIZE * 0.32,
                    colors::TREE,
                    10,
                ));
            }
            out.extend(circle(
                min + Vec2::new(TILE_SIZE * 0.7, TILE_SIZE * 0.3),
                TILE_SIZE * 0.28,
                colors::TREE,
                10,
            ));
        }
    }

    for particle in state.particles.iter().take(state.max_particles) {
        let [r, g, b] = colors::PARTICLES
            .get(particle.color as usize)
            .copied()
            .unwrap_or(colors::PARTICLES[0]);
        let alpha = particle.life.clamp(0.0, 1.0);
        out.extend(rect(
            Rect::centered(particle.pos, particle.size * alpha.max(0.3)),
            [r, g, b, alpha],
        ));
    }

    out
}
