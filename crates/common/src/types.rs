use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, TAU};

use crate::config::{PlayerConfig, WorldConfig};

/// First-person player pose plus movement parameters.
///
/// Owned by the simulation. Only the movement integrator and FOV change
/// events mutate it; the camera pipeline reads it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub position: Vec3,
    /// Rotation about the vertical axis, radians. Zero looks down +Z.
    pub yaw: f32,
    /// Rotation about the horizontal axis, radians. Positive looks up.
    pitch: f32,
    /// Full vertical field of view, radians.
    pub fov: f32,
    /// Movement speed in world units per second.
    pub velocity: f32,
    pub in_menu: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::from_config(&PlayerConfig::default())
    }
}

impl PlayerState {
    pub fn from_config(config: &PlayerConfig) -> Self {
        Self {
            position: Vec3::from_array(config.start_position),
            yaw: 0.0,
            pitch: 0.0,
            fov: config.fov_degrees.to_radians(),
            velocity: config.velocity,
            in_menu: false,
        }
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Set pitch, clamped to ±π/2 so the view never flips over the pole.
    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.clamp(-FRAC_PI_2, FRAC_PI_2);
    }

    /// Horizontal forward direction for the current yaw.
    pub fn forward(&self) -> Vec3 {
        Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }
}

/// Scene-wide animation state: a single spin angle shared by every instance.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldState {
    /// Radians. Never wrapped; instances multiply it by their own spin rate.
    pub angle: f32,
}

impl WorldState {
    /// Advance the spin angle by `angular_rate` radians per second over `delta_ms`.
    pub fn advance(&mut self, angular_rate: f32, delta_ms: f64) {
        self.angle += angular_rate * (delta_ms / 1000.0) as f32;
    }

    /// Angular rate in radians per second for a world configuration.
    pub fn angular_rate(config: &WorldConfig) -> f32 {
        config.revolutions_per_second * TAU
    }
}
