//! Platform embedding
//!
//! The browser build exports [`web::Arena`] to JavaScript; native builds
//! drive [`crate::Engine`] directly (see the headless runner).

#[cfg(target_arch = "wasm32")]
pub mod web;
