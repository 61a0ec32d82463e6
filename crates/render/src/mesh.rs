/// Non-indexed triangle mesh: one position and one normal per vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
}

impl Mesh {
    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }
}

/// Unit cube centred on the origin, 36 vertices with outward face normals.
pub fn cube_mesh() -> Mesh {
    let p = 0.5_f32;
    // four corners per face, counter-clockwise seen from outside
    #[rustfmt::skip]
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([0.0, 0.0, 1.0],  [[-p, -p,  p], [ p, -p,  p], [ p,  p,  p], [-p,  p,  p]]),
        ([0.0, 0.0, -1.0], [[ p, -p, -p], [-p, -p, -p], [-p,  p, -p], [ p,  p, -p]]),
        ([1.0, 0.0, 0.0],  [[ p, -p,  p], [ p, -p, -p], [ p,  p, -p], [ p,  p,  p]]),
        ([-1.0, 0.0, 0.0], [[-p, -p, -p], [-p, -p,  p], [-p,  p,  p], [-p,  p, -p]]),
        ([0.0, 1.0, 0.0],  [[-p,  p,  p], [ p,  p,  p], [ p,  p, -p], [-p,  p, -p]]),
        ([0.0, -1.0, 0.0], [[-p, -p, -p], [ p, -p, -p], [ p, -p,  p], [-p, -p,  p]]),
    ];

    let mut mesh = Mesh {
        positions: Vec::with_capacity(36),
        normals: Vec::with_capacity(36),
    };
    for (normal, corners) in faces {
        for i in [0, 1, 2, 2, 3, 0] {
            mesh.positions.push(corners[i]);
            mesh.normals.push(normal);
        }
    }
    mesh
}
