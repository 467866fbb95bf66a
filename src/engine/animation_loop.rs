use rapier3d::na::Isometry3;

use crate::engine::EngineResult;
use crate::engine::Universe;
use crate::engine::graphics::Renderer;
use crate::engine::user_input::InputState;

/// One display tick: advance the universe by a fixed step, then draw it.
pub struct AnimationLoop<'a> {
    universe: &'a mut Universe,
    renderer: &'a mut Renderer,
}

impl<'a> AnimationLoop<'a> {
    pub fn new(universe: &'a mut Universe, renderer: &'a mut Renderer) -> Self {
        Self { universe, renderer }
    }

    pub fn tick(&mut self, input: &InputState) -> EngineResult<()> {
        self.universe.run_frame(input);
        self.renderer.draw_frame(&mut self.universe.visuals)
    }
}

/// Outcome of a windowless run.
#[derive(Debug, Clone, Copy)]
pub struct HeadlessReport {
    pub frames: u64,
    pub final_pose: Option<Isometry3<f32>>,
    pub speed_kmh: f32,
}

/// Run `frames` ticks without a window or GPU, holding `input` the whole time.
pub fn run_headless(universe: &mut Universe, input: &InputState, frames: u64) -> HeadlessReport {
    let frames_per_second = (1.0 / universe.physics.timestep()).round().max(1.0) as u64;

    for _ in 0..frames {
        universe.run_frame(input);
        if universe.frame() % frames_per_second == 0 {
            tracing::info!(
                second = universe.frame() / frames_per_second,
                speed = %universe.speed_label(),
                "headless"
            );
        }
    }

    HeadlessReport {
        frames,
        final_pose: universe.vehicle().chassis_pose(&universe.physics),
        speed_kmh: universe.speed_kmh(),
    }
}
