//! Core primitives.
//!
//! Engine-free building blocks shared by the game and network layers.

pub mod vec2;
pub mod rng;

// Re-export core types
pub use vec2::Vec2;
pub use rng::DeterministicRng;
