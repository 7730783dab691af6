//! Vertex types for 2D rendering

use bytemuck::{Pod, Zeroable};

/// Simple 2D vertex with position and color
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    pub const fn new(x: f32, y: f32, color: [f32; 4]) -> Self {
        Self {
            position: [x, y],
            color,
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Colors for game elements
pub mod colors {
    pub const BACKGROUND: [f32; 4] = [0.02, 0.02, 0.05, 1.0];
    pub const ARENA_FLOOR: [f32; 4] = [0.06, 0.06, 0.08, 1.0];
    pub const BRICK: [f32; 4] = [0.72, 0.33, 0.18, 1.0];
    pub const BRICK_MORTAR: [f32; 4] = [0.45, 0.2, 0.1, 1.0];
    pub const STEEL: [f32; 4] = [0.7, 0.7, 0.78, 1.0];
    pub const STEEL_RIVET: [f32; 4] = [0.45, 0.45, 0.52, 1.0];
    pub const WATER: [f32; 4] = [0.15, 0.35, 0.8, 1.0];
    pub const WATER_RIPPLE: [f32; 4] = [0.4, 0.6, 1.0, 0.6];
    pub const TREE: [f32; 4] = [0.12, 0.55, 0.2, 0.85];
    pub const QUESTION_BOX: [f32; 4] = [0.95, 0.75, 0.15, 1.0];
    pub const KNOWLEDGE_BOX: [f32; 4] = [0.35, 0.8, 0.95, 1.0];
    pub const BOX_MARK: [f32; 4] = [0.1, 0.08, 0.05, 1.0];
    pub const PLAYER: [f32; 4] = [0.2, 0.8, 0.4, 1.0];
    pub const ENEMY: [f32; 4] = [0.85, 0.25, 0.25, 1.0];
    pub const TURRET: [f32; 4] = [0.15, 0.15, 0.15, 1.0];
    pub const BULLET: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

    /// Particle palette, indexed by `sim::state::particle_color`
    pub const PARTICLES: [[f32; 3]; 3] = [
        [1.0, 0.55, 0.15], // fire
        [0.72, 0.33, 0.18], // brick dust
        [1.0, 0.95, 0.6],  // spark
    ];
}
