use slotmap::SlotMap;

use crate::engine::graphics::light::{AmbientLight, DirectionalLight};
use crate::engine::graphics::mesh::CpuMesh;
use crate::engine::graphics::primitives::{InstanceHandle, MeshHandle, Transform};
use crate::engine::graphics::render_assets::RenderAssets;

const IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// CPU-side per-object payload (becomes GPU instance-buffer data).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instance {
    pub transform: Transform,
    pub mesh: MeshHandle,
    pub color: [f32; 4],
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Instance {
    /// Casts and receives shadows by default.
    pub fn new(mesh: MeshHandle, color: [f32; 4]) -> Self {
        Self {
            transform: Transform::default(),
            mesh,
            color,
            cast_shadow: true,
            receive_shadow: true,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_shadows(mut self, cast: bool, receive: bool) -> Self {
        self.cast_shadow = cast;
        self.receive_shadow = receive;
        self
    }
}

/// Linear distance fog blending into `color`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub color: [f32; 3],
    pub near: f32,
    pub far: f32,
}

/// Contiguous run of `draw_order` sharing one mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawBatch {
    pub mesh: MeshHandle,
    pub start: u32,
    pub count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DrawList {
    pub draw_order: Vec<InstanceHandle>,
    pub batches: Vec<DrawBatch>,
}

impl DrawList {
    pub fn is_empty(&self) -> bool {
        self.draw_order.is_empty()
    }
}

/// Renderer-facing scene: meshes, instances, lights, fog and camera.
pub struct VisualWorld {
    assets: RenderAssets,
    instances: SlotMap<InstanceHandle, Instance>,
    ambient: AmbientLight,
    sun: Option<DirectionalLight>,
    background: [f32; 3],
    fog: Option<Fog>,
    camera_view: [[f32; 4]; 4],
    camera_proj: [[f32; 4]; 4],
    camera_position: [f32; 3],
    viewport: [f32; 2],
}

impl Default for VisualWorld {
    fn default() -> Self {
        Self {
            assets: RenderAssets::new(),
            instances: SlotMap::with_key(),
            ambient: AmbientLight {
                color: [1.0; 3],
                intensity: 0.0,
            },
            sun: None,
            background: [0.0; 3],
            fog: None,
            camera_view: IDENTITY,
            camera_proj: IDENTITY,
            camera_position: [0.0; 3],
            viewport: [1.0, 1.0],
        }
    }
}

impl VisualWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assets(&self) -> &RenderAssets {
        &self.assets
    }

    pub fn add_mesh(&mut self, mesh: CpuMesh) -> MeshHandle {
        self.assets.register_mesh(mesh)
    }

    pub fn add_instance(&mut self, instance: Instance) -> InstanceHandle {
        self.instances.insert(instance)
    }

    pub fn instance(&self, h: InstanceHandle) -> Option<&Instance> {
        self.instances.get(h)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Returns `false` if `h` is not in this world.
    pub fn set_transform(&mut self, h: InstanceHandle, transform: Transform) -> bool {
        match self.instances.get_mut(h) {
            Some(instance) => {
                instance.transform = transform;
                true
            }
            None => false,
        }
    }

    pub fn set_ambient(&mut self, ambient: AmbientLight) {
        self.ambient = ambient;
    }

    pub fn ambient(&self) -> &AmbientLight {
        &self.ambient
    }

    pub fn set_sun(&mut self, sun: DirectionalLight) {
        self.sun = Some(sun);
    }

    pub fn sun(&self) -> Option<&DirectionalLight> {
        self.sun.as_ref()
    }

    pub fn set_background(&mut self, color: [f32; 3]) {
        self.background = color;
    }

    pub fn background(&self) -> [f32; 3] {
        self.background
    }

    pub fn set_fog(&mut self, fog: Fog) {
        self.fog = Some(fog);
    }

    pub fn fog(&self) -> Option<&Fog> {
        self.fog.as_ref()
    }

    pub fn set_camera(&mut self, view: [[f32; 4]; 4], proj: [[f32; 4]; 4], position: [f32; 3]) {
        self.camera_view = view;
        self.camera_proj = proj;
        self.camera_position = position;
    }

    pub fn camera_view(&self) -> [[f32; 4]; 4] {
        self.camera_view
    }

    pub fn camera_proj(&self) -> [[f32; 4]; 4] {
        self.camera_proj
    }

    pub fn camera_position(&self) -> [f32; 3] {
        self.camera_position
    }

    pub fn set_viewport(&mut self, size: [f32; 2]) {
        self.viewport = size;
    }

    pub fn viewport(&self) -> [f32; 2] {
        self.viewport
    }

    /// Instances ordered by mesh, split into one batch per mesh so each batch
    /// maps to a contiguous instance-buffer range. `casters_only` keeps just
    /// shadow casters (for the depth pass).
    pub fn draw_list(&self, casters_only: bool) -> DrawList {
        let mut order: Vec<(MeshHandle, InstanceHandle)> = self
            .instances
            .iter()
            .filter(|(_, inst)| !casters_only || inst.cast_shadow)
            .map(|(h, inst)| (inst.mesh, h))
            .collect();
        order.sort();

        let mut list = DrawList::default();
        for (i, (mesh, h)) in order.into_iter().enumerate() {
            list.draw_order.push(h);
            match list.batches.last_mut() {
                Some(batch) if batch.mesh == mesh => batch.count += 1,
                _ => list.batches.push(DrawBatch {
                    mesh,
                    start: i as u32,
                    count: 1,
                }),
            }
        }
        list
    }
}
