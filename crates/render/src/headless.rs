use std::collections::{BTreeMap, HashSet};

use crate::backend::{
    AttributeFormat, AttributeLocation, BackendError, BufferHandle, BufferUsage, GraphicsBackend,
    StepMode, UniformLocation, UniformValue,
};
use crate::program::ProgramLayout;

/// One recorded backend call, kept when command logging is on.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginFrame,
    Upload { buffer: BufferHandle, offset: usize, len: usize },
    SetUniform { name: &'static str, value: UniformValue },
    Draw { vertices: u32 },
    DrawInstanced { vertices: u32, instances: u32 },
    EndFrame,
}

/// Running totals over the backend's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessCounters {
    pub frames: u64,
    pub draw_calls: u64,
    pub instances_drawn: u64,
    pub bytes_uploaded: u64,
    pub uniform_writes: u64,
}

#[derive(Debug, Clone)]
struct Buffer {
    label: String,
    usage: BufferUsage,
    data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub buffer: BufferHandle,
    pub format: AttributeFormat,
    pub step: StepMode,
}

/// Backend that draws nothing and remembers everything.
///
/// Exposes exactly the inputs of the prepared [`ProgramLayout`] minus any
/// names hidden with [`HeadlessBackend::hide`], which is how lookup failures
/// are exercised.
#[derive(Debug, Clone)]
pub struct HeadlessBackend {
    instancing: bool,
    hidden: HashSet<String>,
    layout: Option<ProgramLayout>,
    buffers: Vec<Buffer>,
    bindings: BTreeMap<AttributeLocation, Binding>,
    uniforms: BTreeMap<UniformLocation, UniformValue>,
    counters: HeadlessCounters,
    log: Option<Vec<Command>>,
    in_frame: bool,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            instancing: true,
            hidden: HashSet::new(),
            layout: None,
            buffers: Vec::new(),
            bindings: BTreeMap::new(),
            uniforms: BTreeMap::new(),
            counters: HeadlessCounters::default(),
            log: None,
            in_frame: false,
        }
    }

    /// Report no instanced-draw support.
    pub fn without_instancing(mut self) -> Self {
        self.instancing = false;
        self
    }

    /// Make a named attribute or uniform fail to resolve.
    pub fn hide(mut self, name: &str) -> Self {
        self.hidden.insert(name.to_owned());
        self
    }

    /// Record every call into a command log.
    pub fn with_command_log(mut self) -> Self {
        self.log = Some(Vec::new());
        self
    }

    pub fn counters(&self) -> HeadlessCounters {
        self.counters
    }

    pub fn commands(&self) -> &[Command] {
        self.log.as_deref().unwrap_or_default()
    }

    pub fn clear_commands(&mut self) {
        if let Some(log) = &mut self.log {
            log.clear();
        }
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(buffer.0 as usize).map(|b| b.data.as_slice())
    }

    pub fn buffer_label(&self, buffer: BufferHandle) -> Option<&str> {
        self.buffers.get(buffer.0 as usize).map(|b| b.label.as_str())
    }

    pub fn buffer_usage(&self, buffer: BufferHandle) -> Option<BufferUsage> {
        self.buffers.get(buffer.0 as usize).map(|b| b.usage)
    }

    /// Binding of a named attribute, if it resolved and was bound.
    pub fn binding(&self, name: &str) -> Option<Binding> {
        let location = self.attribute_location(name)?;
        self.bindings.get(&location).copied()
    }

    /// Contents of the buffer bound to a named attribute.
    pub fn attribute_data(&self, name: &str) -> Option<&[u8]> {
        self.buffer_data(self.binding(name)?.buffer)
    }

    /// Last value written to a named uniform.
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        let location = self.uniform_location(name)?;
        self.uniforms.get(&location).copied()
    }

    fn record(&mut self, command: Command) {
        if let Some(log) = &mut self.log {
            log.push(command);
        }
    }

    fn buffer_mut(&mut self, buffer: BufferHandle) -> Result<&mut Buffer, BackendError> {
        self.buffers
            .get_mut(buffer.0 as usize)
            .ok_or(BackendError::UnknownBuffer(buffer))
    }

    fn visible(&self, name: &str) -> bool {
        !self.hidden.contains(name)
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn prepare_program(&mut self, layout: &ProgramLayout) -> Result<(), BackendError> {
        tracing::debug!(
            attributes = layout.attributes.len(),
            uniforms = layout.uniforms.len(),
            "headless program prepared"
        );
        self.layout = Some(layout.clone());
        self.bindings.clear();
        self.uniforms.clear();
        Ok(())
    }

    fn supports_instancing(&self) -> bool {
        self.instancing
    }

    fn attribute_location(&self, name: &str) -> Option<AttributeLocation> {
        if !self.visible(name) {
            return None;
        }
        self.layout.as_ref()?.attribute_slot(name).map(AttributeLocation)
    }

    fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        if !self.visible(name) {
            return None;
        }
        self.layout.as_ref()?.uniform_slot(name).map(UniformLocation)
    }

    fn create_buffer(
        &mut self,
        label: &str,
        size: usize,
        usage: BufferUsage,
    ) -> Result<BufferHandle, BackendError> {
        let handle = BufferHandle(self.buffers.len() as u32);
        self.buffers.push(Buffer {
            label: label.to_owned(),
            usage,
            data: vec![0; size],
        });
        Ok(handle)
    }

    fn upload_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: usize,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let target = self.buffer_mut(buffer)?;
        let size = target.data.len();
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= size)
            .ok_or(BackendError::OutOfBounds {
                buffer,
                offset,
                len: data.len(),
                size,
            })?;
        target.data[offset..end].copy_from_slice(data);
        self.counters.bytes_uploaded += data.len() as u64;
        self.record(Command::Upload {
            buffer,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn bind_attribute(
        &mut self,
        location: AttributeLocation,
        buffer: BufferHandle,
        format: AttributeFormat,
        step: StepMode,
    ) -> Result<(), BackendError> {
        self.buffer_mut(buffer)?;
        let known = self
            .layout
            .as_ref()
            .is_some_and(|l| (location.0 as usize) < l.attributes.len());
        if !known {
            return Err(BackendError::UnknownAttribute(location));
        }
        self.bindings.insert(
            location,
            Binding {
                buffer,
                format,
                step,
            },
        );
        Ok(())
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(name) = self
            .layout
            .as_ref()
            .and_then(|l| l.uniforms.get(location.0 as usize))
            .map(|u| u.name)
        else {
            tracing::trace!(?location, "uniform write to unknown location dropped");
            return;
        };
        self.uniforms.insert(location, value);
        self.counters.uniform_writes += 1;
        self.record(Command::SetUniform { name, value });
    }

    fn begin_frame(&mut self) -> Result<(), BackendError> {
        if self.layout.is_none() {
            return Err(BackendError::NoProgram);
        }
        self.in_frame = true;
        self.record(Command::BeginFrame);
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32) -> Result<(), BackendError> {
        if !self.in_frame {
            return Err(BackendError::NotInFrame);
        }
        self.counters.draw_calls += 1;
        self.counters.instances_drawn += 1;
        self.record(Command::Draw {
            vertices: vertex_count,
        });
        Ok(())
    }

    fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32) -> Result<(), BackendError> {
        if !self.instancing {
            return Err(BackendError::InstancingUnsupported);
        }
        if !self.in_frame {
            return Err(BackendError::NotInFrame);
        }
        self.counters.draw_calls += 1;
        self.counters.instances_drawn += u64::from(instance_count);
        self.record(Command::DrawInstanced {
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
        self.counters.frames += 1;
        self.record(Command::EndFrame);
        Ok(())
    }
}
