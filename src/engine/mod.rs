pub mod animation_loop;
pub mod camera;
pub mod cli;
pub mod config;
pub mod graphics;
pub mod physics;
pub mod universe;
pub mod user_input;
pub mod windowing;

pub use animation_loop::AnimationLoop;
pub use config::DriveConfig;
pub use universe::Universe;
pub use windowing::Windowing;

/// Engine-level error type.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("renderer error: {0}")]
    Renderer(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
