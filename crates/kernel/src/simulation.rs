use std::f32::consts::PI;

use spinfield_common::config::valid_fov_degrees;
use spinfield_common::{AppConfig, PlayerState, WorldState};
use spinfield_input::InputState;

use crate::movement;

/// Explicit simulation context handed to update, render and input handlers.
#[derive(Debug, Clone)]
pub struct Simulation {
    player: PlayerState,
    world: WorldState,
    input: InputState,
    angular_rate: f32,
    mouse_sensitivity: f32,
    ticks: u64,
}

impl Simulation {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            player: PlayerState::from_config(&config.player),
            world: WorldState::default(),
            input: InputState::new(config.player.max_abs_y()),
            angular_rate: WorldState::angular_rate(&config.world),
            mouse_sensitivity: config.player.mouse_sensitivity,
            ticks: 0,
        }
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    /// Event callbacks write through this; they never advance the simulation.
    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance one frame by `delta_ms` milliseconds.
    pub fn update(&mut self, delta_ms: f64) {
        self.ticks += 1;
        self.world.advance(self.angular_rate, delta_ms);

        if let Some(in_menu) = self.input.take_menu_signal() {
            if in_menu != self.player.in_menu {
                tracing::info!(in_menu, "menu state changed");
            }
            self.player.in_menu = in_menu;
        }
        if self.player.in_menu {
            return;
        }

        let look = self.input.mouse_delta();
        self.player.yaw = self.mouse_sensitivity * PI * look.x;
        self.player.set_pitch(self.mouse_sensitivity * PI * look.y);

        movement::integrate(&mut self.player, self.input.held_keys(), delta_ms);
    }

    /// Apply a field-of-view change. Out-of-range values are ignored.
    pub fn set_fov_degrees(&mut self, degrees: f32) -> bool {
        if !valid_fov_degrees(degrees) {
            tracing::warn!(degrees, "ignoring invalid field of view");
            return false;
        }
        self.player.fov = degrees.to_radians();
        tracing::info!(degrees, "field of view changed");
        true
    }

    pub fn adjust_fov_degrees(&mut self, step: f32) -> bool {
        self.set_fov_degrees(self.player.fov.to_degrees() + step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};
    use spinfield_common::PlayerConfig;
    use spinfield_input::HoldKey;
    use std::f32::consts::FRAC_PI_2;

    fn playing(config: &AppConfig) -> Simulation {
        let mut sim = Simulation::new(config);
        sim.input_mut().focus_gained();
        sim.update(0.0);
        sim
    }

    #[test]
    fn world_spins_even_in_menu() {
        let mut sim = Simulation::new(&AppConfig::default());
        sim.input_mut().focus_lost();
        sim.update(500.0);
        assert!(sim.player().in_menu);
        assert!(sim.world().angle > 0.0);
    }

    #[test]
    fn player_frozen_in_menu() {
        let mut sim = playing(&AppConfig::default());
        sim.input_mut().set_held(HoldKey::Forward, true);
        sim.input_mut().focus_lost();
        // focus loss cleared the key; hold it again to prove the menu blocks movement
        sim.input_mut().set_held(HoldKey::Forward, true);
        let start = sim.player().position;
        sim.update(1000.0);
        assert_eq!(sim.player().position, start);
    }

    #[test]
    fn update_moves_player_forward() {
        let mut sim = playing(&AppConfig::default());
        sim.input_mut().set_held(HoldKey::Forward, true);
        let start = sim.player().position;
        sim.update(250.0);
        let moved = sim.player().position - start;
        assert!((moved - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-4);
    }

    #[test]
    fn clamped_pointer_keeps_pitch_in_range() {
        let mut sim = playing(&AppConfig::default());
        sim.input_mut().pointer_motion(Vec2::new(0.0, -1.0e6));
        sim.update(16.0);
        assert!(sim.player().pitch().abs() <= FRAC_PI_2);
        assert!((sim.player().pitch() - FRAC_PI_2).abs() < 1e-4);
    }

    #[test]
    fn pitch_clamped_even_with_loose_pointer_bound() {
        let config = AppConfig {
            player: PlayerConfig {
                max_abs_y: Some(1.0e6),
                ..PlayerConfig::default()
            },
            ..AppConfig::default()
        };
        let mut sim = playing(&config);
        sim.input_mut().pointer_motion(Vec2::new(0.0, 1.0e5));
        sim.update(16.0);
        assert_eq!(sim.player().pitch(), -FRAC_PI_2);
    }

    #[test]
    fn yaw_tracks_horizontal_offset() {
        let mut sim = playing(&AppConfig::default());
        sim.input_mut().pointer_motion(Vec2::new(100.0, 0.0));
        sim.update(16.0);
        let expected = 1.5 / 1000.0 * PI * 100.0;
        assert!((sim.player().yaw - expected).abs() < 1e-6);
    }

    #[test]
    fn fov_changes_validate_range() {
        let mut sim = Simulation::new(&AppConfig::default());
        assert!(sim.set_fov_degrees(90.0));
        assert!((sim.player().fov - FRAC_PI_2).abs() < 1e-6);
        assert!(!sim.set_fov_degrees(0.0));
        assert!(!sim.set_fov_degrees(f32::NAN));
        assert!((sim.player().fov - FRAC_PI_2).abs() < 1e-6);
        assert!(sim.adjust_fov_degrees(5.0));
        assert!((sim.player().fov.to_degrees() - 95.0).abs() < 1e-3);
    }

    #[test]
    fn ticks_count_updates() {
        let mut sim = Simulation::new(&AppConfig::default());
        for _ in 0..3 {
            sim.update(16.0);
        }
        assert_eq!(sim.ticks(), 3);
    }
}
