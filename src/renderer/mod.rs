//! WebGPU rendering module
//!
//! The scene is rebuilt as a flat triangle list every frame from
//! [`crate::sim::GameState`] and uploaded in one draw call.

pub mod pipeline;
pub mod shapes;
pub mod vertex;

pub use pipeline::RenderState;
pub use shapes::scene;
