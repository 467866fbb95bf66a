use std::sync::Arc;

use crate::engine::graphics::Renderer;
use crate::engine::user_input::UserInput;
use crate::engine::{AnimationLoop, EngineError, EngineResult, Universe};

use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

pub const WINDOW_TITLE: &str = "raycast-drive";

/// winit wrapper (ApplicationHandler style).
pub struct Windowing;

impl Windowing {
    /// Open the window and drive the universe until the window closes.
    ///
    /// Window or renderer setup failures end the loop and are returned.
    pub fn run_app(
        universe: Universe,
        renderer: Renderer,
        user_input: UserInput,
    ) -> EngineResult<()> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Wait);

        let mut app = App {
            window: None,
            universe,
            renderer,
            user_input,
            title: String::new(),
            fatal: None,
        };

        event_loop.run_app(&mut app)?;

        match app.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct App {
    window: Option<Arc<Window>>,
    universe: Universe,
    renderer: Renderer,
    user_input: UserInput,
    /// Last title pushed to the window.
    title: String,
    fatal: Option<EngineError>,
}

impl App {
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: EngineError) {
        tracing::error!("{err}");
        self.fatal = Some(err);
        event_loop.exit();
    }

    fn init_window(&mut self, event_loop: &ActiveEventLoop) -> EngineResult<()> {
        let attrs: WindowAttributes = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(winit::dpi::LogicalSize::new(1280.0, 720.0));

        let window = Arc::new(event_loop.create_window(attrs)?);
        self.renderer.init_for_window(&window)?;

        let size = window.inner_size();
        self.universe.resize(size.width, size.height);
        tracing::info!(width = size.width, height = size.height, "window ready");

        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    /// P pauses, R resets. Returns `true` if the key was one of them.
    fn handle_loop_key(&mut self, event: &KeyEvent) -> bool {
        if event.state != ElementState::Pressed || event.repeat {
            return false;
        }
        match event.physical_key {
            PhysicalKey::Code(KeyCode::KeyP) => {
                let state = self.universe.toggle_pause();
                tracing::info!(?state, "pause toggled");
                true
            }
            PhysicalKey::Code(KeyCode::KeyR) => {
                self.universe.reset_vehicle();
                tracing::info!("vehicle reset");
                true
            }
            _ => false,
        }
    }

    fn update_title(&mut self) {
        let Some(window) = &self.window else {
            return;
        };
        let title = format!("{WINDOW_TITLE} | {}", self.universe.speed_label());
        if title != self.title {
            window.set_title(&title);
            self.title = title;
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init_window(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if self.user_input.handle_window_event(&event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::KeyboardInput { event: key, .. } => {
                if key.state == ElementState::Pressed
                    && key.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    event_loop.exit();
                } else {
                    self.handle_loop_key(&key);
                }
            }

            WindowEvent::Resized(size) => {
                self.universe.resize(size.width, size.height);
                self.renderer.resize(size);
                if let Some(w) = &self.window {
                    w.request_redraw();
                }
            }

            WindowEvent::RedrawRequested => {
                let input = *self.user_input.state();
                let result =
                    AnimationLoop::new(&mut self.universe, &mut self.renderer).tick(&input);
                if let Err(err) = result {
                    self.fail(event_loop, err);
                    return;
                }

                self.update_title();

                if let Some(w) = &self.window {
                    w.pre_present_notify();
                    w.request_redraw();
                }
            }

            _ => {}
        }
    }
}
