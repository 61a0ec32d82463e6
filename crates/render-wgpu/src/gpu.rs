use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use spinfield_common::TransformMode;
use spinfield_render::{
    AttributeFormat, AttributeLocation, BackendError, BufferHandle, BufferUsage, GraphicsBackend,
    ProgramLayout, StepMode, UniformLocation, UniformValue, names,
};

use crate::shaders;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.8,
    b: 0.0,
    a: 1.0,
};
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FrameUniforms {
    view_matrix: [[f32; 4]; 4],
    light_reverse_direction: [f32; 3],
    theta: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Default, Pod, Zeroable)]
struct DrawUniforms {
    transform: [[f32; 4]; 3],
    offset: [f32; 4],
    color: [f32; 4],
}

const DRAW_UNIFORM_SIZE: u64 = std::mem::size_of::<DrawUniforms>() as u64;

#[derive(Debug, Clone, Copy)]
enum DrawCommand {
    Instanced { vertices: u32, instances: u32 },
    Single { vertices: u32, uniforms: u32 },
}

struct Program {
    layout: ProgramLayout,
    pipeline: wgpu::RenderPipeline,
    frame_bind_group: wgpu::BindGroup,
    per_draw_layout: Option<wgpu::BindGroupLayout>,
}

struct PerDrawBuffer {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    capacity: u64,
}

/// [`GraphicsBackend`] on top of a wgpu device and window surface.
///
/// Calls between `begin_frame` and `end_frame` are recorded; `end_frame`
/// writes the uniforms, encodes one render pass and presents.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    frame_buffer: wgpu::Buffer,
    program: Option<Program>,
    per_draw: Option<PerDrawBuffer>,
    draw_stride: u64,
    buffers: Vec<(wgpu::Buffer, u64)>,
    bindings: Vec<Option<BufferHandle>>,
    frame: FrameUniforms,
    current_draw: DrawUniforms,
    draw_uniforms: Vec<DrawUniforms>,
    staging: Vec<u8>,
    commands: Vec<DrawCommand>,
    in_frame: bool,
}

impl WgpuBackend {
    /// Configure `surface` and allocate the frame-wide resources.
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    ) -> Self {
        device.on_uncaptured_error(Box::new(|e: wgpu::Error| {
            tracing::error!("wgpu error: {e}");
        }));
        surface.configure(&device, &config);
        let depth_view = create_depth_texture(&device, config.width, config.height);
        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let draw_stride = DRAW_UNIFORM_SIZE.div_ceil(alignment) * alignment;

        Self {
            device,
            queue,
            surface,
            config,
            depth_view,
            frame_buffer,
            program: None,
            per_draw: None,
            draw_stride,
            buffers: Vec::new(),
            bindings: Vec::new(),
            frame: FrameUniforms {
                view_matrix: Mat4::IDENTITY.to_cols_array_2d(),
                light_reverse_direction: [0.0; 3],
                theta: 0.0,
            },
            current_draw: DrawUniforms::default(),
            draw_uniforms: Vec::new(),
            staging: Vec::new(),
            commands: Vec::new(),
            in_frame: false,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_texture(&self.device, self.config.width, self.config.height);
        tracing::debug!(width = self.config.width, height = self.config.height, "surface resized");
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn layout(&self) -> Option<&ProgramLayout> {
        self.program.as_ref().map(|p| &p.layout)
    }

    fn build_program(&self, layout: &ProgramLayout) -> Program {
        let frame_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_bind_group_layout"),
            entries: &[uniform_entry(false, None)],
        });
        let frame_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: self.frame_buffer.as_entire_binding(),
            }],
        });

        let per_draw_layout = (layout.capabilities.mode == TransformMode::PerDraw).then(|| {
            self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("per_draw_bind_group_layout"),
                entries: &[uniform_entry(true, NonZeroU64::new(DRAW_UNIFORM_SIZE))],
            })
        });
        let mut group_layouts = vec![&frame_layout];
        group_layouts.extend(per_draw_layout.as_ref());

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("spinfield_pipeline_layout"),
            bind_group_layouts: &group_layouts,
            push_constant_ranges: &[],
        });

        let source = shaders::compose(layout);
        tracing::trace!(%source, "composed shader");
        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("spinfield_shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let attributes: Vec<Vec<wgpu::VertexAttribute>> = layout
            .attributes
            .iter()
            .zip(shaders::shader_locations(layout))
            .map(|(spec, location)| vertex_attributes(spec.format, location))
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout> = layout
            .attributes
            .iter()
            .zip(&attributes)
            .map(|(spec, attributes)| wgpu::VertexBufferLayout {
                array_stride: spec.format.stride() as u64,
                step_mode: match spec.step {
                    StepMode::Vertex => wgpu::VertexStepMode::Vertex,
                    StepMode::Instance => wgpu::VertexStepMode::Instance,
                },
                attributes,
            })
            .collect();

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("spinfield_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        Program {
            layout: layout.clone(),
            pipeline,
            frame_bind_group,
            per_draw_layout,
        }
    }

    /// Make sure the per-draw uniform buffer holds `count` entries.
    fn reserve_per_draw(&mut self, count: u64) -> Result<(), BackendError> {
        let Some(layout) = self.program.as_ref().and_then(|p| p.per_draw_layout.as_ref()) else {
            return Ok(());
        };
        let current = self.per_draw.as_ref().map(|p| p.capacity);
        let limit = self.device.limits().max_buffer_size;
        if let Some(capacity) = per_draw_capacity(count, self.draw_stride, current, limit)? {
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("per_draw_uniforms"),
                size: capacity,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("per_draw_bind_group"),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &buffer,
                        offset: 0,
                        size: NonZeroU64::new(DRAW_UNIFORM_SIZE),
                    }),
                }],
            });
            tracing::debug!(bytes = capacity, "per-draw uniform buffer grown");
            self.per_draw = Some(PerDrawBuffer {
                buffer,
                bind_group,
                capacity,
            });
        }
        Ok(())
    }

    fn write_per_draw(&mut self) -> Result<(), BackendError> {
        if self.draw_uniforms.is_empty() {
            return Ok(());
        }
        self.reserve_per_draw(self.draw_uniforms.len() as u64)?;
        let stride = self.draw_stride as usize;
        self.staging.clear();
        self.staging.resize(self.draw_uniforms.len() * stride, 0);
        for (chunk, u) in self.staging.chunks_exact_mut(stride).zip(&self.draw_uniforms) {
            chunk[..DRAW_UNIFORM_SIZE as usize].copy_from_slice(bytemuck::bytes_of(u));
        }
        if let Some(per_draw) = &self.per_draw {
            self.queue.write_buffer(&per_draw.buffer, 0, &self.staging);
        }
        Ok(())
    }

    fn encode(&self, target: &wgpu::TextureView) -> Result<wgpu::CommandBuffer, BackendError> {
        let program = self.program.as_ref().ok_or(BackendError::NoProgram)?;
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("spinfield_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &program.frame_bind_group, &[]);
            for (slot, binding) in self.bindings.iter().enumerate() {
                let Some(handle) = binding else {
                    continue;
                };
                let (buffer, _) = self
                    .buffers
                    .get(handle.0 as usize)
                    .ok_or(BackendError::UnknownBuffer(*handle))?;
                pass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }

            for command in &self.commands {
                match *command {
                    DrawCommand::Instanced {
                        vertices,
                        instances,
                    } => pass.draw(0..vertices, 0..instances),
                    DrawCommand::Single { vertices, uniforms } => {
                        if let Some(per_draw) = &self.per_draw {
                            let offset = u64::from(uniforms) * self.draw_stride;
                            pass.set_bind_group(1, &per_draw.bind_group, &[offset as u32]);
                            pass.draw(0..vertices, 0..1);
                        }
                    }
                }
            }
        }
        Ok(encoder.finish())
    }
}

impl GraphicsBackend for WgpuBackend {
    fn prepare_program(&mut self, layout: &ProgramLayout) -> Result<(), BackendError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let program = self.build_program(layout);
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BackendError::Program(err.to_string()));
        }
        tracing::info!(mode = %layout.capabilities.mode, lighting = layout.capabilities.lighting, "pipeline built");
        self.bindings = vec![None; layout.attributes.len()];
        self.per_draw = None;
        self.program = Some(program);
        Ok(())
    }

    fn supports_instancing(&self) -> bool {
        true
    }

    fn attribute_location(&self, name: &str) -> Option<AttributeLocation> {
        self.layout()?.attribute_slot(name).map(AttributeLocation)
    }

    fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.layout()?.uniform_slot(name).map(UniformLocation)
    }

    fn create_buffer(
        &mut self,
        label: &str,
        size: usize,
        _usage: BufferUsage,
    ) -> Result<BufferHandle, BackendError> {
        let size = (size as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let limit = self.device.limits().max_buffer_size;
        if size > limit {
            return Err(BackendError::BufferTooLarge { size, limit });
        }
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let handle = BufferHandle(self.buffers.len() as u32);
        self.buffers.push((buffer, size));
        Ok(handle)
    }

    fn upload_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: usize,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let (target, size) = self
            .buffers
            .get(buffer.0 as usize)
            .ok_or(BackendError::UnknownBuffer(buffer))?;
        let end = (offset + data.len()) as u64;
        if end > *size || offset as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(BackendError::OutOfBounds {
                buffer,
                offset,
                len: data.len(),
                size: *size as usize,
            });
        }
        self.queue.write_buffer(target, offset as u64, data);
        Ok(())
    }

    fn bind_attribute(
        &mut self,
        location: AttributeLocation,
        buffer: BufferHandle,
        _format: AttributeFormat,
        _step: StepMode,
    ) -> Result<(), BackendError> {
        if buffer.0 as usize >= self.buffers.len() {
            return Err(BackendError::UnknownBuffer(buffer));
        }
        let slot = self
            .bindings
            .get_mut(location.0 as usize)
            .ok_or(BackendError::UnknownAttribute(location))?;
        *slot = Some(buffer);
        Ok(())
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(name) = self
            .layout()
            .and_then(|l| l.uniforms.get(location.0 as usize))
            .map(|u| u.name)
        else {
            return;
        };
        match (name, value) {
            (names::VIEW_MATRIX, UniformValue::Mat4(m)) => {
                self.frame.view_matrix = m.to_cols_array_2d();
            }
            (names::LIGHT_REVERSE_DIRECTION, UniformValue::Vec3(v)) => {
                self.frame.light_reverse_direction = v.to_array();
            }
            (names::THETA, UniformValue::Float(t)) => self.frame.theta = t,
            (names::OFFSET, UniformValue::Vec3(v)) => self.current_draw.offset = padded(v),
            (names::COLOR, UniformValue::Vec3(v)) => self.current_draw.color = padded(v),
            (names::TRANSFORM, UniformValue::Mat3(m)) => {
                let [x, y, z] = m.to_cols_array_2d();
                self.current_draw.transform = [padded(x.into()), padded(y.into()), padded(z.into())];
            }
            (name, value) => {
                tracing::warn!(name, kind = ?value.kind(), "uniform type mismatch, write dropped");
            }
        }
    }

    fn begin_frame(&mut self) -> Result<(), BackendError> {
        if self.program.is_none() {
            return Err(BackendError::NoProgram);
        }
        self.commands.clear();
        self.draw_uniforms.clear();
        self.in_frame = true;
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32) -> Result<(), BackendError> {
        if !self.in_frame {
            return Err(BackendError::NotInFrame);
        }
        let uniforms = self.draw_uniforms.len() as u32;
        self.draw_uniforms.push(self.current_draw);
        self.commands.push(DrawCommand::Single {
            vertices: vertex_count,
            uniforms,
        });
        Ok(())
    }

    fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32) -> Result<(), BackendError> {
        if !self.in_frame {
            return Err(BackendError::NotInFrame);
        }
        self.commands.push(DrawCommand::Instanced {
            vertices: vertex_count,
            instances: instance_count,
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        if !self.in_frame {
            return Err(BackendError::NotInFrame);
        }
        self.in_frame = false;

        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&self.frame));
        self.write_per_draw()?;

        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::debug!("surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::debug!("surface timeout, frame skipped");
                return Ok(());
            }
            Err(e) => return Err(BackendError::Surface(e.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let commands = self.encode(&view)?;
        self.queue.submit(std::iter::once(commands));
        output.present();
        Ok(())
    }
}

/// New per-draw buffer size for `count` entries of `stride` bytes, or `None`
/// when the `current` buffer already fits them. Sized exactly.
fn per_draw_capacity(
    count: u64,
    stride: u64,
    current: Option<u64>,
    limit: u64,
) -> Result<Option<u64>, BackendError> {
    let needed = count.max(1).saturating_mul(stride);
    if needed > limit {
        return Err(BackendError::BufferTooLarge {
            size: needed,
            limit,
        });
    }
    Ok(current.is_none_or(|c| c < needed).then_some(needed))
}

fn padded(v: Vec3) -> [f32; 4] {
    v.extend(0.0).to_array()
}

fn uniform_entry(dynamic: bool, min_binding_size: Option<NonZeroU64>) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size,
        },
        count: None,
    }
}

fn vertex_attributes(format: AttributeFormat, first_location: u32) -> Vec<wgpu::VertexAttribute> {
    match format {
        AttributeFormat::Float => vec![wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32,
            offset: 0,
            shader_location: first_location,
        }],
        AttributeFormat::Vec3 => vec![wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x3,
            offset: 0,
            shader_location: first_location,
        }],
        AttributeFormat::Mat3 => (0..3)
            .map(|i| wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x3,
                offset: u64::from(i) * 12,
                shader_location: first_location + i,
            })
            .collect(),
    }
}

fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}
