use glam::{Mat4, Vec2, Vec3, Vec4};
use spinfield_common::{ClipDepth, PlayerState, Projection};

/// Per-axis scale that maps the shorter viewport side to [-1, 1].
///
/// Both factors are at most 1 and the longer side gets exactly 1. A
/// degenerate viewport (zero or negative extent) gets no correction.
pub fn aspect_correction(width: f32, height: f32) -> Vec2 {
    if !(width > 0.0 && height > 0.0) {
        return Vec2::ONE;
    }
    Vec2::new((height / width).min(1.0), (width / height).min(1.0))
}

/// Projection stage: maps camera space (looking down +Z) to clip space.
///
/// `w' = tan(fov/2)·z` for the perspective variant and `w' = c·z + k` for the
/// linear one. Depth is `-bias` under GL conventions and `w' - bias` when clip
/// depth runs from zero, so NDC depth is `1 - bias/w'` in that case.
pub fn projection_matrix(fov: f32, projection: &Projection, clip_depth: ClipDepth) -> Mat4 {
    let (wz, wk) = match *projection {
        Projection::Perspective { .. } => ((fov / 2.0).tan(), 0.0),
        Projection::Linear { c, k, .. } => (c, k),
    };
    let bias = projection.near_bias();
    let (zz, zk) = match clip_depth {
        ClipDepth::NegOneToOne => (0.0, -bias),
        ClipDepth::ZeroToOne => (wz, wk - bias),
    };
    Mat4::from_cols(
        Vec4::X,
        Vec4::Y,
        Vec4::new(0.0, 0.0, zz, wz),
        Vec4::new(0.0, 0.0, zk, wk),
    )
}

/// World-to-camera part of the pipeline: translate, then yaw, then pitch.
pub fn view_matrix(position: Vec3, yaw: f32, pitch: f32) -> Mat4 {
    Mat4::from_rotation_x(pitch) * Mat4::from_rotation_y(-yaw) * Mat4::from_translation(-position)
}

/// Camera transform pipeline settings. Pure: no state beyond configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Camera {
    pub projection: Projection,
    pub clip_depth: ClipDepth,
}

impl Camera {
    pub fn new(projection: Projection, clip_depth: ClipDepth) -> Self {
        Self {
            projection,
            clip_depth,
        }
    }

    /// Compose the column-major view-projection matrix for one frame.
    ///
    /// Applied to a point, the stages run in order: translate by `-position`,
    /// rotate by yaw, rotate by pitch, project, correct for aspect ratio.
    pub fn view_projection(&self, player: &PlayerState, width: f32, height: f32) -> Mat4 {
        let aspect = aspect_correction(width, height);
        let correction = Mat4::from_scale(aspect.extend(1.0));
        correction
            * projection_matrix(player.fov, &self.projection, self.clip_depth)
            * view_matrix(player.position, player.yaw, player.pitch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    fn player(position: Vec3, yaw: f32, pitch: f32) -> PlayerState {
        let mut p = PlayerState::default();
        p.position = position;
        p.yaw = yaw;
        p.set_pitch(pitch);
        p
    }

    fn ndc(m: Mat4, point: Vec3) -> Vec3 {
        let clip = m * point.extend(1.0);
        clip.truncate() / clip.w
    }

    #[test]
    fn aspect_factors_never_exceed_one() {
        for (w, h) in [(1920.0, 1080.0), (1080.0, 1920.0), (500.0, 500.0), (1.0, 4000.0)] {
            let a = aspect_correction(w, h);
            assert!(a.x <= 1.0 && a.y <= 1.0);
            if w >= h {
                assert_eq!(a.y, 1.0);
            }
            if h >= w {
                assert_eq!(a.x, 1.0);
            }
        }
        assert_eq!(aspect_correction(1600.0, 800.0), Vec2::new(0.5, 1.0));
        assert_eq!(aspect_correction(0.0, 800.0), Vec2::ONE);
    }

    #[test]
    fn pipeline_is_deterministic() {
        let cam = Camera::default();
        let p = player(Vec3::new(1.5, -2.0, 7.25), 0.9, -0.3);
        let a = cam.view_projection(&p, 1280.0, 720.0);
        let b = cam.view_projection(&p, 1280.0, 720.0);
        assert_eq!(a.to_cols_array().map(f32::to_bits), b.to_cols_array().map(f32::to_bits));
    }

    #[test]
    fn point_ahead_lands_in_centre() {
        let cam = Camera::default();
        let p = player(Vec3::new(0.0, 0.0, -5.0), 0.0, 0.0);
        let m = cam.view_projection(&p, 800.0, 600.0);
        let n = ndc(m, Vec3::new(0.0, 0.0, 20.0));
        assert!(n.x.abs() < 1e-6 && n.y.abs() < 1e-6);
        assert!((0.0..1.0).contains(&n.z));
    }

    #[test]
    fn yaw_turns_toward_forward_vector() {
        let cam = Camera::default();
        let p = player(Vec3::ZERO, FRAC_PI_4, 0.0);
        let m = cam.view_projection(&p, 800.0, 800.0);
        let n = ndc(m, p.forward() * 10.0);
        assert!(n.x.abs() < 1e-5 && n.y.abs() < 1e-5);
        // something to the right of the view direction lands on the right
        let right = ndc(m, p.forward() * 10.0 + Vec3::new(FRAC_PI_4.cos(), 0.0, -FRAC_PI_4.sin()));
        assert!(right.x > 0.0);
    }

    #[test]
    fn positive_pitch_looks_up() {
        let cam = Camera::default();
        let p = player(Vec3::ZERO, 0.0, FRAC_PI_4);
        let m = cam.view_projection(&p, 800.0, 800.0);
        let n = ndc(m, Vec3::new(0.0, 10.0, 10.0));
        assert!(n.x.abs() < 1e-5 && n.y.abs() < 1e-5);
    }

    #[test]
    fn stage_order_matters() {
        let p = player(Vec3::new(3.0, 1.0, -4.0), 0.7, 0.2);
        let pos = p.position;
        let proper = view_matrix(pos, p.yaw, p.pitch());
        let swapped = Mat4::from_translation(-pos)
            * Mat4::from_rotation_x(p.pitch())
            * Mat4::from_rotation_y(-p.yaw);
        assert!(!proper.abs_diff_eq(swapped, 1e-3));
        // the player position is the pivot: it maps to the camera origin
        let origin = proper * pos.extend(1.0);
        assert!(origin.truncate().length() < 1e-5);
    }

    #[test]
    fn gl_depth_rows_match_reference() {
        let fov = FRAC_PI_2;
        let m = projection_matrix(fov, &Projection::Perspective { near_bias: 0.1 }, ClipDepth::NegOneToOne);
        assert_eq!(m.row(2), Vec4::new(0.0, 0.0, 0.0, -0.1));
        assert!((m.row(3) - Vec4::new(0.0, 0.0, 1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn zero_to_one_depth_increases_with_distance() {
        let m = projection_matrix(1.0, &Projection::default(), ClipDepth::ZeroToOne);
        let depth = |z: f32| {
            let c = m * Vec4::new(0.0, 0.0, z, 1.0);
            c.z / c.w
        };
        let near = depth(1.0);
        let far = depth(100.0);
        assert!(near >= 0.0 && near < far && far < 1.0);
    }

    #[test]
    fn linear_projection_ignores_fov() {
        let proj = Projection::Linear {
            c: 1.0,
            k: 0.5,
            near_bias: 0.01,
        };
        let a = projection_matrix(0.3, &proj, ClipDepth::ZeroToOne);
        let b = projection_matrix(2.0, &proj, ClipDepth::ZeroToOne);
        assert_eq!(a, b);
        assert_eq!(a.row(3), Vec4::new(0.0, 0.0, 1.0, 0.5));
    }
}
