//! wgpu implementation of the spinfield graphics capability surface.
//!
//! One render pipeline is built per capability set from WGSL composed in
//! [`shaders`]. Instance attributes live in their own vertex buffers stepped
//! per instance; per-draw mode writes one dynamic-offset uniform block per draw.

mod gpu;
pub mod shaders;

pub use gpu::WgpuBackend;
