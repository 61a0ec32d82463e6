//! Shared types for the spinfield renderer.
//!
//! # Invariants
//! - Configuration is validated once, at setup, into a closed [`Capabilities`] set.
//! - Player pitch never leaves ±π/2.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    AppConfig, Capabilities, ClipDepth, GenerationParams, PlayerConfig, Projection, RenderConfig,
    TransformMode, WorldConfig,
};
pub use error::ConfigError;
pub use types::{PlayerState, WorldState};
