use std::ops::AddAssign;

use glam::{Mat4, Vec3};
use spinfield_common::{Capabilities, PlayerState, TransformMode, WorldState};
use spinfield_instances::{InstanceModel, spin_transform};

use crate::backend::{
    AttributeLocation, BackendError, BufferHandle, BufferUsage, GraphicsBackend, UniformLocation,
    UniformValue,
};
use crate::camera::Camera;
use crate::mesh::Mesh;
use crate::program::{AttributeSpec, ProgramLayout, UniformSpec, names};

/// Reverse direction of the single directional light, before normalization.
pub const LIGHT_REVERSE_DIRECTION: Vec3 = Vec3::new(0.0, 0.8, -1.0);

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("backend lacks required capability: {0}")]
    MissingCapability(&'static str),
    #[error("program has no attribute named {0:?}")]
    MissingAttribute(&'static str),
    #[error("program has no uniform named {0:?}")]
    MissingUniform(&'static str),
    #[error("instance model uses {model} transforms but dispatch was set up for {configured}")]
    ModeMismatch {
        configured: TransformMode,
        model: TransformMode,
    },
    #[error("instance count changed from {expected} to {actual} after setup")]
    InstanceCountChanged { expected: usize, actual: usize },
}

/// Work issued for one frame, counted on the dispatch side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u64,
    pub instances_drawn: u64,
    pub bytes_uploaded: u64,
    pub uniform_writes: u64,
}

impl AddAssign for FrameStats {
    fn add_assign(&mut self, rhs: Self) {
        self.draw_calls += rhs.draw_calls;
        self.instances_drawn += rhs.instances_drawn;
        self.bytes_uploaded += rhs.bytes_uploaded;
        self.uniform_writes += rhs.uniform_writes;
    }
}

#[derive(Debug, Clone, Copy)]
struct PerDrawUniforms {
    offset: UniformLocation,
    color: UniformLocation,
    transform: UniformLocation,
}

/// Issues the draw call(s) for one capability set.
///
/// Everything that depends on the capability set is resolved in
/// [`RenderDispatch::setup`]; [`RenderDispatch::draw_frame`] only branches on
/// the already-resolved mode.
#[derive(Debug)]
pub struct RenderDispatch {
    capabilities: Capabilities,
    camera: Camera,
    vertex_count: u32,
    instance_count: usize,
    view_matrix: UniformLocation,
    light: Option<UniformLocation>,
    theta: Option<UniformLocation>,
    per_draw: Option<PerDrawUniforms>,
    transform_buffer: Option<BufferHandle>,
}

impl RenderDispatch {
    /// Build the program, resolve every location and upload the static buffers.
    pub fn setup(
        backend: &mut impl GraphicsBackend,
        mesh: &Mesh,
        model: &InstanceModel,
        capabilities: Capabilities,
        camera: Camera,
    ) -> Result<Self, RenderError> {
        let _span = tracing::info_span!("dispatch_setup", mode = %capabilities.mode).entered();

        if model.mode() != capabilities.mode {
            return Err(RenderError::ModeMismatch {
                configured: capabilities.mode,
                model: model.mode(),
            });
        }
        if capabilities.mode.is_instanced() && !backend.supports_instancing() {
            tracing::error!("instancing requested but the backend cannot draw instanced");
            return Err(RenderError::MissingCapability("instanced drawing"));
        }

        let layout = ProgramLayout::for_capabilities(capabilities);
        backend.prepare_program(&layout)?;

        let vertex_count = mesh.vertex_count();
        let mut lighting = capabilities.lighting;
        let mut transform_buffer = None;
        let stack = model.stack();

        for spec in &layout.attributes {
            let Some(location) = resolve_attribute(&*backend, spec, capabilities.lighting)? else {
                if spec.name == names::NORMAL {
                    lighting = false;
                }
                continue;
            };
            let data: &[u8] = match spec.name {
                names::POSITION => mesh.position_bytes(),
                names::NORMAL => mesh.normal_bytes(),
                names::OFFSET => bytemuck::cast_slice(stack.offsets()),
                names::COLOR => bytemuck::cast_slice(stack.colors()),
                names::SPIN_RATE => bytemuck::cast_slice(stack.spin_rates()),
                names::BASE_SCALE => bytemuck::cast_slice(stack.base_scales()),
                names::TRANSFORM => {
                    let size = stack.len() * spec.format.stride();
                    let buffer = backend.create_buffer(spec.name, size, BufferUsage::Dynamic)?;
                    backend.bind_attribute(location, buffer, spec.format, spec.step)?;
                    transform_buffer = Some(buffer);
                    continue;
                }
                other => {
                    tracing::warn!(name = other, "no data source for attribute");
                    continue;
                }
            };
            let buffer = backend.create_buffer(spec.name, data.len(), BufferUsage::Static)?;
            backend.upload_buffer(buffer, 0, data)?;
            backend.bind_attribute(location, buffer, spec.format, spec.step)?;
        }

        let uniform = |name: &'static str| -> Result<Option<UniformLocation>, RenderError> {
            match layout.uniform(name) {
                Some(spec) => resolve_uniform(&*backend, spec, capabilities.lighting),
                None => Ok(None),
            }
        };
        let view_matrix =
            uniform(names::VIEW_MATRIX)?.ok_or(RenderError::MissingUniform(names::VIEW_MATRIX))?;
        let light = uniform(names::LIGHT_REVERSE_DIRECTION)?;
        let theta = uniform(names::THETA)?;
        let per_draw = match capabilities.mode {
            TransformMode::PerDraw => Some(PerDrawUniforms {
                offset: uniform(names::OFFSET)?.ok_or(RenderError::MissingUniform(names::OFFSET))?,
                color: uniform(names::COLOR)?.ok_or(RenderError::MissingUniform(names::COLOR))?,
                transform: uniform(names::TRANSFORM)?
                    .ok_or(RenderError::MissingUniform(names::TRANSFORM))?,
            }),
            _ => None,
        };

        let light = if lighting { light } else { None };
        if capabilities.lighting && light.is_none() {
            tracing::warn!("lighting inputs unavailable, drawing unlit");
        }

        tracing::info!(
            instances = stack.len(),
            vertices = vertex_count,
            lighting = light.is_some(),
            "render dispatch ready"
        );
        Ok(Self {
            capabilities,
            camera,
            vertex_count,
            instance_count: stack.len(),
            view_matrix,
            light,
            theta,
            per_draw,
            transform_buffer,
        })
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Whether the light uniform is actually being written.
    pub fn lighting_active(&self) -> bool {
        self.light.is_some()
    }

    /// Upload per-frame data and issue this frame's draw call(s).
    ///
    /// In host-computed mode `model` must already have been updated for the
    /// current world angle. A frame that fails after `begin_frame` is still
    /// closed with `end_frame` before the error is returned.
    pub fn draw_frame(
        &mut self,
        backend: &mut impl GraphicsBackend,
        model: &InstanceModel,
        player: &PlayerState,
        world: &WorldState,
        viewport: (f32, f32),
    ) -> Result<FrameStats, RenderError> {
        let _span = tracing::trace_span!("draw_frame").entered();
        if model.mode() != self.capabilities.mode {
            return Err(RenderError::ModeMismatch {
                configured: self.capabilities.mode,
                model: model.mode(),
            });
        }
        if model.len() != self.instance_count {
            return Err(RenderError::InstanceCountChanged {
                expected: self.instance_count,
                actual: model.len(),
            });
        }

        backend.begin_frame()?;
        match self.issue(backend, model, player, world, viewport) {
            Ok(stats) => {
                backend.end_frame()?;
                Ok(stats)
            }
            Err(e) => {
                if let Err(close) = backend.end_frame() {
                    tracing::debug!("closing failed frame: {close}");
                }
                Err(e)
            }
        }
    }

    fn issue(
        &self,
        backend: &mut impl GraphicsBackend,
        model: &InstanceModel,
        player: &PlayerState,
        world: &WorldState,
        viewport: (f32, f32),
    ) -> Result<FrameStats, RenderError> {
        let mut stats = FrameStats::default();
        let view = self.camera.view_projection(player, viewport.0, viewport.1);
        backend.set_uniform(self.view_matrix, UniformValue::Mat4(view));
        stats.uniform_writes += 1;
        if let Some(light) = self.light {
            backend.set_uniform(light, UniformValue::Vec3(LIGHT_REVERSE_DIRECTION.normalize()));
            stats.uniform_writes += 1;
        }

        let instances = self.instance_count as u32;
        let drawn = u64::from(instances);
        match self.capabilities.mode {
            TransformMode::HostComputed => {
                let (Some(buffer), Some(host)) = (self.transform_buffer, model.host_transforms())
                else {
                    return Err(RenderError::MissingAttribute(names::TRANSFORM));
                };
                let bytes = host.as_bytes();
                backend.upload_buffer(buffer, 0, bytes)?;
                stats.bytes_uploaded += bytes.len() as u64;
                backend.draw_instanced(self.vertex_count, instances)?;
                stats.draw_calls += 1;
                stats.instances_drawn += drawn;
            }
            TransformMode::DeviceComputed => {
                if let Some(theta) = self.theta {
                    backend.set_uniform(theta, UniformValue::Float(world.angle));
                    stats.uniform_writes += 1;
                }
                backend.draw_instanced(self.vertex_count, instances)?;
                stats.draw_calls += 1;
                stats.instances_drawn += drawn;
            }
            TransformMode::PerDraw => {
                let Some(u) = self.per_draw else {
                    return Err(RenderError::MissingUniform(names::TRANSFORM));
                };
                for (_, r) in model.stack().iter() {
                    backend.set_uniform(u.offset, UniformValue::Vec3(r.offset));
                    backend.set_uniform(u.color, UniformValue::Vec3(r.color));
                    let transform = spin_transform(r.base_scale, r.spin_rate, world.angle);
                    backend.set_uniform(u.transform, UniformValue::Mat3(transform));
                    backend.draw(self.vertex_count)?;
                }
                stats.uniform_writes += 3 * drawn;
                stats.draw_calls += drawn;
                stats.instances_drawn += drawn;
            }
        }

        Ok(stats)
    }

    /// The matrix the next frame would upload, for inspection.
    pub fn view_projection(&self, player: &PlayerState, viewport: (f32, f32)) -> Mat4 {
        self.camera.view_projection(player, viewport.0, viewport.1)
    }
}

fn resolve_attribute(
    backend: &impl GraphicsBackend,
    spec: &AttributeSpec,
    lighting: bool,
) -> Result<Option<AttributeLocation>, RenderError> {
    match backend.attribute_location(spec.name) {
        Some(location) => Ok(Some(location)),
        None if spec.required => {
            tracing::error!(name = spec.name, "required attribute missing");
            Err(RenderError::MissingAttribute(spec.name))
        }
        None => {
            log_degraded("attribute", spec.name, lighting);
            Ok(None)
        }
    }
}

fn resolve_uniform(
    backend: &impl GraphicsBackend,
    spec: &UniformSpec,
    lighting: bool,
) -> Result<Option<UniformLocation>, RenderError> {
    match backend.uniform_location(spec.name) {
        Some(location) => Ok(Some(location)),
        None if spec.required => {
            tracing::error!(name = spec.name, "required uniform missing");
            Err(RenderError::MissingUniform(spec.name))
        }
        None => {
            log_degraded("uniform", spec.name, lighting);
            Ok(None)
        }
    }
}

fn log_degraded(kind: &str, name: &str, lighting: bool) {
    if lighting {
        tracing::warn!(kind, name, "optional location missing, feature disabled");
    } else {
        tracing::debug!(kind, name, "optional location missing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_runs_accumulate_past_u32() {
        // 200k per-draw instances with lighting, summed over 10k frames.
        let frame = FrameStats {
            draw_calls: 200_000,
            instances_drawn: 200_000,
            bytes_uploaded: 0,
            uniform_writes: 3 * 200_000 + 2,
        };
        let mut total = FrameStats::default();
        for _ in 0..10_000 {
            total += frame;
        }
        assert_eq!(total.draw_calls, 2_000_000_000);
        assert_eq!(total.uniform_writes, 6_000_020_000);
        assert!(total.uniform_writes > u64::from(u32::MAX));
    }
}
