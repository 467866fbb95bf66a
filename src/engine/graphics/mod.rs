pub mod light;
pub mod mesh;
pub mod pipeline_descriptor_set_layouts;
pub mod primitives;
pub mod render_assets;
pub mod renderer;
pub mod visual_world;
pub mod vulkano_renderer;

pub use light::{AmbientLight, DirectionalLight, ShadowConfig};
pub use mesh::{CpuMesh, CpuVertex, MeshFactory};
pub use primitives::{InstanceHandle, MeshHandle, Transform};
pub use render_assets::RenderAssets;
pub use renderer::Renderer;
pub use visual_world::{DrawBatch, DrawList, Fog, Instance, VisualWorld};
