//! CPU-side procedural mesh generation.
//!
//! These meshes are authoring / staging data. The renderer uploads them into
//! GPU vertex/index buffers the first time a `MeshHandle` is drawn.

use std::f32::consts::TAU;

use vulkano::buffer::BufferContents;
use vulkano::pipeline::graphics::vertex_input::Vertex;

/// Position + normal, both object space.
#[derive(BufferContents, Vertex, Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct CpuVertex {
    #[format(R32G32B32_SFLOAT)]
    pub pos: [f32; 3],
    #[format(R32G32B32_SFLOAT)]
    pub normal: [f32; 3],
}

impl CpuVertex {
    pub const fn new(pos: [f32; 3], normal: [f32; 3]) -> Self {
        Self { pos, normal }
    }
}

/// Indexed triangle list.
#[derive(Debug, Clone, Default)]
pub struct CpuMesh {
    pub vertices: Vec<CpuVertex>,
    pub indices: Vec<u32>,
}

impl CpuMesh {
    pub fn new(vertices: Vec<CpuVertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    /// Append a quad `a b c d` (counter-clockwise seen from the front).
    fn push_quad(&mut self, corners: [[f32; 3]; 4], normal: [f32; 3]) {
        let base = self.vertex_count();
        self.vertices
            .extend(corners.iter().map(|&pos| CpuVertex::new(pos, normal)));
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

/// Procedural mesh constructors.
///
/// Triangles wind counter-clockwise seen from outside.
pub struct MeshFactory;

impl MeshFactory {
    /// Box centered at the origin with full size `extents`. Flat-shaded: 4
    /// vertices per face.
    pub fn cuboid(extents: [f32; 3]) -> CpuMesh {
        let h = extents.map(|e| e * 0.5);
        // (normal axis, u axis, v axis, sign) with u x v = sign * normal axis.
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        ];

        let mut mesh = CpuMesh::default();
        for (n, u, v) in faces {
            let corner = |su: f32, sv: f32| -> [f32; 3] {
                std::array::from_fn(|i| (n[i] + u[i] * su + v[i] * sv) * h[i])
            };
            mesh.push_quad(
                [
                    corner(-1.0, -1.0),
                    corner(1.0, -1.0),
                    corner(1.0, 1.0),
                    corner(-1.0, 1.0),
                ],
                n,
            );
        }
        mesh
    }

    /// Closed cylinder whose axis runs along X, centered at the origin.
    pub fn cylinder_x(radius: f32, width: f32, segments: u32) -> CpuMesh {
        let segments = segments.max(3);
        let half = width * 0.5;
        let ring: Vec<(f32, f32)> = (0..=segments)
            .map(|i| {
                let a = i as f32 / segments as f32 * TAU;
                (a.cos(), a.sin())
            })
            .collect();

        let mut mesh = CpuMesh::default();

        // Side: two vertices per ring step, seam duplicated for clean normals.
        for &(c, s) in &ring {
            let normal = [0.0, c, s];
            mesh.vertices
                .push(CpuVertex::new([-half, c * radius, s * radius], normal));
            mesh.vertices
                .push(CpuVertex::new([half, c * radius, s * radius], normal));
        }
        for i in 0..segments {
            let a = i * 2;
            let (b, c, d) = (a + 1, a + 2, a + 3);
            mesh.indices.extend_from_slice(&[a, c, b, b, c, d]);
        }

        // Caps: a center vertex fanned to its own ring.
        for side in [-1.0f32, 1.0] {
            let normal = [side, 0.0, 0.0];
            let center = mesh.vertex_count();
            mesh.vertices
                .push(CpuVertex::new([side * half, 0.0, 0.0], normal));
            for &(c, s) in &ring[..segments as usize] {
                mesh.vertices
                    .push(CpuVertex::new([side * half, c * radius, s * radius], normal));
            }
            for i in 0..segments {
                let a = center + 1 + i;
                let b = center + 1 + (i + 1) % segments;
                if side > 0.0 {
                    mesh.indices.extend_from_slice(&[center, a, b]);
                } else {
                    mesh.indices.extend_from_slice(&[center, b, a]);
                }
            }
        }

        mesh
    }

    /// Flat rectangle in the XY plane facing +Z.
    pub fn plane_xy(width: f32, height: f32) -> CpuMesh {
        let (x, y) = (width * 0.5, height * 0.5);
        let mut mesh = CpuMesh::default();
        mesh.push_quad(
            [[-x, -y, 0.0], [x, -y, 0.0], [x, y, 0.0], [-x, y, 0.0]],
            [0.0, 0.0, 1.0],
        );
        mesh
    }
}
