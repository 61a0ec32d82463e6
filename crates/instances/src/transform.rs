use glam::Mat3;
use spinfield_common::TransformMode;

use crate::stack::{InstanceId, InstanceStack};

/// Floats per host-computed transform: a column-major 3x3 matrix.
pub const TRANSFORM_FLOATS: usize = 9;

/// Canonical per-instance transform: `base_scale · R_y(spin_rate · angle)`.
///
/// The device vertex stage rebuilds exactly this matrix from the same three
/// scalars, so host and device modes agree up to float rounding.
pub fn spin_transform(base_scale: f32, spin_rate: f32, angle: f32) -> Mat3 {
    Mat3::from_rotation_y(spin_rate * angle) * base_scale
}

/// Host-side transform buffer, one column-major 3x3 matrix per instance.
#[derive(Debug, Clone)]
pub struct HostTransforms {
    columns: Vec<[f32; TRANSFORM_FLOATS]>,
}

impl HostTransforms {
    pub fn new(len: usize) -> Self {
        Self {
            columns: vec![[0.0; TRANSFORM_FLOATS]; len],
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Rewrite every slot for the given world angle.
    pub fn recompute(&mut self, stack: &InstanceStack, angle: f32) {
        debug_assert_eq!(self.columns.len(), stack.len());
        let params = stack.base_scales().iter().zip(stack.spin_rates());
        for (slot, (&scale, &rate)) in self.columns.iter_mut().zip(params) {
            let (sin, cos) = (rate * angle).sin_cos();
            let c = cos * scale;
            let s = sin * scale;
            *slot = [c, 0.0, -s, 0.0, scale, 0.0, s, 0.0, c];
        }
    }

    pub fn get(&self, id: InstanceId) -> Option<Mat3> {
        self.columns.get(id.index()).map(Mat3::from_cols_array)
    }

    /// Upload-ready view of the whole buffer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.columns)
    }
}

/// The instance stack plus whatever per-frame state its transform mode needs.
#[derive(Debug, Clone)]
pub struct InstanceModel {
    stack: InstanceStack,
    mode: TransformMode,
    host: Option<HostTransforms>,
}

impl InstanceModel {
    pub fn new(stack: InstanceStack, mode: TransformMode) -> Self {
        let host = (mode == TransformMode::HostComputed).then(|| HostTransforms::new(stack.len()));
        tracing::debug!(instances = stack.len(), %mode, "instance model ready");
        Self { stack, mode, host }
    }

    pub fn stack(&self) -> &InstanceStack {
        &self.stack
    }

    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Per-frame step. Only host-computed mode does any work here.
    ///
    /// Returns true when the host transform buffer was rewritten and needs
    /// re-uploading.
    pub fn update(&mut self, angle: f32) -> bool {
        match &mut self.host {
            Some(host) => {
                let _span = tracing::trace_span!("host_transforms", n = host.len()).entered();
                host.recompute(&self.stack, angle);
                true
            }
            None => false,
        }
    }

    pub fn host_transforms(&self) -> Option<&HostTransforms> {
        self.host.as_ref()
    }

    /// Canonical transform of one instance at `angle`.
    pub fn transform(&self, id: InstanceId, angle: f32) -> Option<Mat3> {
        let r = self.stack.get(id)?;
        Some(spin_transform(r.base_scale, r.spin_rate, angle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use spinfield_common::GenerationParams;
    use std::f32::consts::PI;

    fn single(scale: f32, spin: f32) -> InstanceStack {
        InstanceStack::from_parts(vec![[0.0; 3]], vec![scale], vec![spin], vec![[1.0; 3]]).unwrap()
    }

    #[test]
    fn zero_angle_is_scaled_identity() {
        let mut model = InstanceModel::new(single(2.0, 1.0), TransformMode::HostComputed);
        assert!(model.update(0.0));
        let t = model.host_transforms().unwrap().get(InstanceId(0)).unwrap();
        assert_eq!(t, Mat3::IDENTITY * 2.0);
        assert_eq!(spin_transform(2.0, 1.0, 0.0), Mat3::IDENTITY * 2.0);
    }

    #[test]
    fn half_turn_about_vertical_axis() {
        let t = spin_transform(1.0, 1.0, PI);
        let expected = Mat3::from_cols(
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::Y,
            Vec3::new(0.0, 0.0, -1.0),
        );
        assert!(t.abs_diff_eq(expected, 1e-6));
        // x maps to -x, y is fixed
        assert!((t * Vec3::X - Vec3::NEG_X).length() < 1e-6);
        assert_eq!(t * Vec3::Y, Vec3::Y);
    }

    #[test]
    fn host_buffer_matches_canonical_transform() {
        let stack = InstanceStack::generate(500, &GenerationParams::default(), 3);
        let mut model = InstanceModel::new(stack, TransformMode::HostComputed);
        let angle = 1.234;
        model.update(angle);
        let host = model.host_transforms().unwrap();
        for id in model.stack().ids() {
            let expected = model.transform(id, angle).unwrap();
            assert!(host.get(id).unwrap().abs_diff_eq(expected, 1e-6));
        }
    }

    #[test]
    fn device_mode_has_no_host_buffer() {
        let mut model = InstanceModel::new(single(1.0, 1.0), TransformMode::DeviceComputed);
        assert!(model.host_transforms().is_none());
        assert!(!model.update(1.0));
        let mut per_draw = InstanceModel::new(single(1.0, 1.0), TransformMode::PerDraw);
        assert!(!per_draw.update(1.0));
    }

    #[test]
    fn host_bytes_are_nine_floats_per_instance() {
        let stack = InstanceStack::generate(7, &GenerationParams::default(), 0);
        let mut model = InstanceModel::new(stack, TransformMode::HostComputed);
        model.update(0.5);
        let bytes = model.host_transforms().unwrap().as_bytes();
        assert_eq!(bytes.len(), 7 * TRANSFORM_FLOATS * 4);
    }

    #[test]
    fn recompute_tracks_angle_changes() {
        let mut model = InstanceModel::new(single(1.0, 2.0), TransformMode::HostComputed);
        model.update(0.0);
        let before = model.host_transforms().unwrap().get(InstanceId(0)).unwrap();
        model.update(0.3);
        let after = model.host_transforms().unwrap().get(InstanceId(0)).unwrap();
        assert_ne!(before, after);
        assert!(after.abs_diff_eq(Mat3::from_rotation_y(0.6), 1e-6));
    }
}
