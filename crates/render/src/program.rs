use spinfield_common::{Capabilities, TransformMode};

use crate::backend::{AttributeFormat, StepMode, UniformKind};

pub mod names {
    pub const POSITION: &str = "position";
    pub const NORMAL: &str = "normal";
    pub const OFFSET: &str = "offset";
    pub const COLOR: &str = "color";
    pub const TRANSFORM: &str = "transform";
    pub const SPIN_RATE: &str = "spin_rate";
    pub const BASE_SCALE: &str = "base_scale";

    pub const VIEW_MATRIX: &str = "view_matrix";
    pub const LIGHT_REVERSE_DIRECTION: &str = "light_reverse_direction";
    pub const THETA: &str = "theta";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub format: AttributeFormat,
    pub step: StepMode,
    /// Missing required inputs abort setup; optional ones degrade.
    pub required: bool,
}

/// How often a uniform changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformScope {
    Frame,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSpec {
    pub name: &'static str,
    pub kind: UniformKind,
    pub scope: UniformScope,
    pub required: bool,
}

/// Inputs a program exposes for one capability set.
///
/// Resolved once at setup; the backend builds its program from this and
/// dispatch looks the names up against that program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLayout {
    pub capabilities: Capabilities,
    pub attributes: Vec<AttributeSpec>,
    pub uniforms: Vec<UniformSpec>,
}

impl ProgramLayout {
    pub fn for_capabilities(capabilities: Capabilities) -> Self {
        use names::*;

        let attr = |name, format, step, required| AttributeSpec {
            name,
            format,
            step,
            required,
        };
        let uniform = |name, kind, scope, required| UniformSpec {
            name,
            kind,
            scope,
            required,
        };

        let mut attributes = vec![attr(POSITION, AttributeFormat::Vec3, StepMode::Vertex, true)];
        let mut uniforms = vec![uniform(VIEW_MATRIX, UniformKind::Mat4, UniformScope::Frame, true)];

        if capabilities.lighting {
            attributes.push(attr(NORMAL, AttributeFormat::Vec3, StepMode::Vertex, false));
            uniforms.push(uniform(
                LIGHT_REVERSE_DIRECTION,
                UniformKind::Vec3,
                UniformScope::Frame,
                false,
            ));
        }

        match capabilities.mode {
            TransformMode::PerDraw => {
                uniforms.push(uniform(OFFSET, UniformKind::Vec3, UniformScope::Draw, true));
                uniforms.push(uniform(COLOR, UniformKind::Vec3, UniformScope::Draw, true));
                uniforms.push(uniform(TRANSFORM, UniformKind::Mat3, UniformScope::Draw, true));
            }
            TransformMode::HostComputed => {
                attributes.push(attr(OFFSET, AttributeFormat::Vec3, StepMode::Instance, true));
                attributes.push(attr(COLOR, AttributeFormat::Vec3, StepMode::Instance, true));
                attributes.push(attr(TRANSFORM, AttributeFormat::Mat3, StepMode::Instance, true));
            }
            TransformMode::DeviceComputed => {
                attributes.push(attr(OFFSET, AttributeFormat::Vec3, StepMode::Instance, true));
                attributes.push(attr(COLOR, AttributeFormat::Vec3, StepMode::Instance, true));
                attributes.push(attr(SPIN_RATE, AttributeFormat::Float, StepMode::Instance, true));
                attributes.push(attr(BASE_SCALE, AttributeFormat::Float, StepMode::Instance, true));
                uniforms.push(uniform(THETA, UniformKind::Float, UniformScope::Frame, true));
            }
        }

        Self {
            capabilities,
            attributes,
            uniforms,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformSpec> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    /// Index of an attribute in the layout; backends use it as the buffer slot.
    pub fn attribute_slot(&self, name: &str) -> Option<u32> {
        self.attributes
            .iter()
            .position(|a| a.name == name)
            .map(|i| i as u32)
    }

    pub fn uniform_slot(&self, name: &str) -> Option<u32> {
        self.uniforms
            .iter()
            .position(|u| u.name == name)
            .map(|i| i as u32)
    }
}
