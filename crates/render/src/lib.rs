//! Rendering core: camera pipeline, graphics capability surface, dispatch.
//!
//! # Invariants
//! - Rendering never mutates simulation state; it reads the player and world.
//! - The capability set is fixed at [`RenderDispatch::setup`]; frames never
//!   re-check configuration.
//! - Host, device and per-draw modes all evaluate the same per-instance
//!   transform, `base_scale · R_y(spin_rate · angle)`.
//!
//! Backends implement [`GraphicsBackend`]. [`HeadlessBackend`] draws nothing
//! and records what it was asked to do; the wgpu backend lives in its own crate.

pub mod backend;
pub mod camera;
pub mod dispatch;
pub mod headless;
pub mod mesh;
pub mod program;

pub use backend::{
    AttributeFormat, AttributeLocation, BackendError, BufferHandle, BufferUsage, GraphicsBackend,
    StepMode, UniformKind, UniformLocation, UniformValue,
};
pub use camera::{Camera, aspect_correction, projection_matrix, view_matrix};
pub use dispatch::{FrameStats, LIGHT_REVERSE_DIRECTION, RenderDispatch, RenderError};
pub use headless::{Command, HeadlessBackend, HeadlessCounters};
pub use mesh::{Mesh, cube_mesh};
pub use program::{AttributeSpec, ProgramLayout, UniformScope, UniformSpec, names};

pub fn crate_info() -> &'static str {
    "spinfield-render v0.1.0"
}
