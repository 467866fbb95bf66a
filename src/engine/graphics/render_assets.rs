use slotmap::SlotMap;

use crate::engine::graphics::mesh::CpuMesh;
use crate::engine::graphics::primitives::MeshHandle;

/// CPU mesh registry.
///
/// Scene code refers to geometry by `MeshHandle`; the renderer uploads the
/// matching `CpuMesh` the first time it sees a handle and caches the GPU copy
/// under the same key.
#[derive(Debug, Default)]
pub struct RenderAssets {
    cpu_meshes: SlotMap<MeshHandle, CpuMesh>,
}

impl RenderAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register CPU mesh data and get a stable handle. Callers that want reuse
    /// keep and share the handle.
    pub fn register_mesh(&mut self, mesh: CpuMesh) -> MeshHandle {
        tracing::debug!(
            vertices = mesh.vertex_count(),
            indices = mesh.index_count(),
            "mesh registered"
        );
        self.cpu_meshes.insert(mesh)
    }

    pub fn cpu_mesh(&self, h: MeshHandle) -> Option<&CpuMesh> {
        self.cpu_meshes.get(h)
    }

    pub fn len(&self) -> usize {
        self.cpu_meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpu_meshes.is_empty()
    }
}
