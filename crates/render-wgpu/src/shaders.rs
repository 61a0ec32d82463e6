use std::fmt::Write;

use spinfield_common::TransformMode;
use spinfield_render::{AttributeFormat, ProgramLayout};

/// First shader location of each attribute, in layout order.
///
/// A 3x3 matrix attribute occupies three consecutive locations.
pub fn shader_locations(layout: &ProgramLayout) -> Vec<u32> {
    let mut next = 0;
    layout
        .attributes
        .iter()
        .map(|a| {
            let first = next;
            next += match a.format {
                AttributeFormat::Mat3 => 3,
                AttributeFormat::Float | AttributeFormat::Vec3 => 1,
            };
            first
        })
        .collect()
}

fn wgsl_type(format: AttributeFormat) -> &'static str {
    match format {
        AttributeFormat::Float => "f32",
        AttributeFormat::Vec3 | AttributeFormat::Mat3 => "vec3<f32>",
    }
}

const GLOBALS: &str = r#"
struct Globals {
    view_matrix: mat4x4<f32>,
    light_reverse_direction: vec3<f32>,
    theta: f32,
};

@group(0) @binding(0)
var<uniform> globals: Globals;
"#;

const PER_DRAW: &str = r#"
struct PerDraw {
    transform_0: vec4<f32>,
    transform_1: vec4<f32>,
    transform_2: vec4<f32>,
    offset: vec4<f32>,
    color: vec4<f32>,
};

@group(1) @binding(0)
var<uniform> per_draw: PerDraw;
"#;

/// Columns of `R_y(angle)` in WGSL terms, with `c = cos(angle)` and
/// `s = sin(angle)`. Column-major, matching `glam::Mat3::from_rotation_y`.
const SPIN_COLUMNS: [[&str; 3]; 3] = [
    ["c", "0.0", "-s"],
    ["0.0", "1.0", "0.0"],
    ["s", "0.0", "c"],
];

fn push_spin_transform(src: &mut String) {
    src.push_str(
        "\nfn spin_transform(base_scale: f32, angle: f32) -> mat3x3<f32> {\n    \
         let c = cos(angle);\n    let s = sin(angle);\n    return base_scale * mat3x3<f32>(\n",
    );
    for [x, y, z] in SPIN_COLUMNS {
        let _ = writeln!(src, "        {x}, {y}, {z},");
    }
    src.push_str("    );\n}\n");
}

/// Compose the WGSL program for one capability set.
///
/// Entry points are `vs_main` and `fs_main`. Every variant computes
/// `transform * position + offset` and projects it with `globals.view_matrix`.
pub fn compose(layout: &ProgramLayout) -> String {
    let caps = layout.capabilities;
    let mut src = String::from(GLOBALS);
    if caps.mode == TransformMode::PerDraw {
        src.push_str(PER_DRAW);
    }

    src.push_str("\nstruct VertexInput {\n");
    for (spec, location) in layout.attributes.iter().zip(shader_locations(layout)) {
        let ty = wgsl_type(spec.format);
        if spec.format == AttributeFormat::Mat3 {
            for i in 0..3 {
                let _ = writeln!(src, "    @location({}) {}_{i}: {ty},", location + i, spec.name);
            }
        } else {
            let _ = writeln!(src, "    @location({location}) {}: {ty},", spec.name);
        }
    }
    src.push_str("};\n");

    src.push_str(
        r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec3<f32>,
"#,
    );
    if caps.lighting {
        src.push_str("    @location(1) normal: vec3<f32>,\n");
    }
    src.push_str("};\n");

    let (transform, offset, color) = match caps.mode {
        TransformMode::PerDraw => (
            "mat3x3<f32>(per_draw.transform_0.xyz, per_draw.transform_1.xyz, per_draw.transform_2.xyz)",
            "per_draw.offset.xyz",
            "per_draw.color.xyz",
        ),
        TransformMode::HostComputed => (
            "mat3x3<f32>(in.transform_0, in.transform_1, in.transform_2)",
            "in.offset",
            "in.color",
        ),
        TransformMode::DeviceComputed => (
            "spin_transform(in.base_scale, in.spin_rate * globals.theta)",
            "in.offset",
            "in.color",
        ),
    };

    if caps.mode == TransformMode::DeviceComputed {
        push_spin_transform(&mut src);
    }

    let _ = write!(
        src,
        r#"
@vertex
fn vs_main(in: VertexInput) -> VertexOutput {{
    let transform = {transform};
    let world_position = transform * in.position + {offset};

    var out: VertexOutput;
    out.clip_position = globals.view_matrix * vec4<f32>(world_position, 1.0);
    out.color = {color};
"#
    );
    if caps.lighting {
        src.push_str("    out.normal = transform * in.normal;\n");
    }
    src.push_str("    return out;\n}\n");

    if caps.lighting {
        src.push_str(
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let light = max(dot(normalize(in.normal), globals.light_reverse_direction), 0.0);
    return vec4<f32>(in.color * light, 1.0);
}
"#,
        );
    } else {
        src.push_str(
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(in.color, 1.0);
}
"#,
        );
    }
    src
}
