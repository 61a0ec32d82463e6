use glam::Vec3;
use spinfield_common::PlayerState;
use spinfield_input::{HeldKeys, HoldKey};

/// Below this L1 length the horizontal direction is treated as zero.
const NORMALIZE_EPSILON: f32 = 0.1;

/// World-space displacement for one tick.
///
/// The horizontal direction is normalized before the vertical keys are added,
/// so diagonal walking is no faster than straight walking while flying up or
/// down stacks on top at full speed.
pub fn displacement(held: HeldKeys, yaw: f32, delta_ms: f64, velocity: f32) -> Vec3 {
    let (sin, cos) = yaw.sin_cos();
    let forward = Vec3::new(sin, 0.0, cos);
    let sideways = Vec3::new(cos, 0.0, -sin);

    let mut direction = Vec3::ZERO;
    if held.contains(HoldKey::Forward) {
        direction += forward;
    }
    if held.contains(HoldKey::Left) {
        direction -= sideways;
    }
    if held.contains(HoldKey::Back) {
        direction -= forward;
    }
    if held.contains(HoldKey::Right) {
        direction += sideways;
    }

    let l1 = direction.x.abs() + direction.y.abs() + direction.z.abs();
    direction = if l1 > NORMALIZE_EPSILON {
        direction.normalize()
    } else {
        Vec3::ZERO
    };

    if held.contains(HoldKey::Up) {
        direction += Vec3::Y;
    }
    if held.contains(HoldKey::Down) {
        direction -= Vec3::Y;
    }

    direction * ((delta_ms / 1000.0) as f32 * velocity)
}

/// Move the player for one tick. Does nothing while the menu is open.
pub fn integrate(player: &mut PlayerState, held: HeldKeys, delta_ms: f64) {
    if player.in_menu {
        return;
    }
    player.position += displacement(held, player.yaw, delta_ms, player.velocity);
}
