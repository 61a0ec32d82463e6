use glam::{Mat3, Mat4, Vec3};

use crate::program::ProgramLayout;

/// Opaque buffer name handed out by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// Resolved vertex attribute slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeLocation(pub u32);

/// Resolved uniform slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Written once at setup.
    Static,
    /// Rewritten every frame.
    Dynamic,
}

/// Element type of a vertex attribute. Every component is an `f32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeFormat {
    Float,
    Vec3,
    /// Column-major 3x3 matrix, three consecutive vec3 slots.
    Mat3,
}

impl AttributeFormat {
    pub fn components(self) -> usize {
        match self {
            AttributeFormat::Float => 1,
            AttributeFormat::Vec3 => 3,
            AttributeFormat::Mat3 => 9,
        }
    }

    pub fn stride(self) -> usize {
        self.components() * std::mem::size_of::<f32>()
    }
}

/// Whether an attribute advances per vertex or per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    Vertex,
    Instance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Vec3,
    Mat3,
    Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec3(Vec3),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Mat3(_) => UniformKind::Mat3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("program could not be built: {0}")]
    Program(String),
    #[error("no program prepared")]
    NoProgram,
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferHandle),
    #[error("write of {len} bytes at offset {offset} overruns buffer {buffer:?} of {size} bytes")]
    OutOfBounds {
        buffer: BufferHandle,
        offset: usize,
        len: usize,
        size: usize,
    },
    #[error("unknown attribute location {0:?}")]
    UnknownAttribute(AttributeLocation),
    #[error("instanced drawing is not supported by this backend")]
    InstancingUnsupported,
    #[error("draw issued outside begin_frame/end_frame")]
    NotInFrame,
    #[error("surface error: {0}")]
    Surface(String),
    #[error("buffer of {size} bytes exceeds the device limit of {limit} bytes")]
    BufferTooLarge { size: u64, limit: u64 },
}

/// The graphics capability surface consumed by render dispatch.
///
/// Location lookups return `None` rather than failing; the caller decides
/// whether a missing name is fatal. Draws are only valid between
/// [`begin_frame`](Self::begin_frame) and [`end_frame`](Self::end_frame).
pub trait GraphicsBackend {
    /// Build (compile and link) the program for a capability set.
    fn prepare_program(&mut self, layout: &ProgramLayout) -> Result<(), BackendError>;

    fn supports_instancing(&self) -> bool;

    fn attribute_location(&self, name: &str) -> Option<AttributeLocation>;

    fn uniform_location(&self, name: &str) -> Option<UniformLocation>;

    fn create_buffer(
        &mut self,
        label: &str,
        size: usize,
        usage: BufferUsage,
    ) -> Result<BufferHandle, BackendError>;

    fn upload_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: usize,
        data: &[u8],
    ) -> Result<(), BackendError>;

    fn bind_attribute(
        &mut self,
        location: AttributeLocation,
        buffer: BufferHandle,
        format: AttributeFormat,
        step: StepMode,
    ) -> Result<(), BackendError>;

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    fn begin_frame(&mut self) -> Result<(), BackendError>;

    fn draw(&mut self, vertex_count: u32) -> Result<(), BackendError>;

    fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32) -> Result<(), BackendError>;

    fn end_frame(&mut self) -> Result<(), BackendError>;
}
