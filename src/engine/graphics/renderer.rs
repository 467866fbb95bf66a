use std::sync::Arc;

use crate::engine::graphics::VisualWorld;
use crate::engine::graphics::vulkano_renderer::VulkanoRenderer;
use crate::engine::{EngineError, EngineResult};
use winit::dpi::PhysicalSize;
use winit::window::Window;

/// Engine-facing renderer. Owns the GPU backend and maps its errors into
/// `EngineError`.
pub struct Renderer {
    backend: VulkanoRenderer,
}

impl Renderer {
    pub fn new(shadow_map_size: u32) -> Self {
        Self {
            backend: VulkanoRenderer::new(shadow_map_size),
        }
    }

    pub fn init_for_window(&mut self, window: &Arc<Window>) -> EngineResult<()> {
        self.backend
            .init_for_window(window)
            .map_err(|e| EngineError::Renderer(e.to_string()))
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.backend.resize(new_size);
    }

    pub fn draw_frame(&mut self, visual_world: &mut VisualWorld) -> EngineResult<()> {
        self.backend
            .render_visual_world(visual_world)
            .map_err(|e| EngineError::Renderer(e.to_string()))
    }
}
