use std::f32::consts::FRAC_PI_2;

use rapier3d::na::{UnitQuaternion, Vector3};
use rapier3d::prelude::RigidBodyHandle;

use crate::engine::camera::ChaseCamera;
use crate::engine::config::{DriveConfig, rgb, rgba};
use crate::engine::graphics::light::lights_from_config;
use crate::engine::graphics::{Fog, Instance, MeshFactory, Transform, VisualWorld};
use crate::engine::physics::PhysicsWorld;
use crate::engine::physics::vehicle::Vehicle;
use crate::engine::user_input::InputState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Running,
    /// Physics and vehicle control are frozen; camera and rendering continue.
    Paused,
}

/// The driving world: physics, the car, and the scene drawn from it.
pub struct Universe {
    pub physics: PhysicsWorld,
    pub visuals: VisualWorld,
    vehicle: Vehicle,
    chase: ChaseCamera,
    ground: RigidBodyHandle,
    state: LoopState,
    frame: u64,
    speed_kmh: f32,
}

impl Universe {
    pub fn new(config: &DriveConfig) -> Self {
        let mut physics = PhysicsWorld::new(&config.world, config.contact);
        let mut visuals = VisualWorld::new();

        let ground = physics.add_ground(&config.scene);
        let [width, depth] = config.scene.ground_size;
        let ground_mesh = visuals.add_mesh(MeshFactory::plane_xy(width, depth));
        // plane_xy faces +Z; lay it flat facing +Y.
        let flat = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), -FRAC_PI_2);
        visuals.add_instance(
            Instance::new(ground_mesh, rgba(config.scene.ground_color))
                .with_transform(Transform::default().with_rotation(flat))
                .with_shadows(false, true),
        );

        let (ambient, sun) = lights_from_config(&config.lighting);
        visuals.set_ambient(ambient);
        visuals.set_sun(sun);

        let background = rgb(config.scene.background);
        visuals.set_background(background);
        visuals.set_fog(Fog {
            color: background,
            near: config.scene.fog_near,
            far: config.scene.fog_far,
        });

        let spawn = config.world.spawn();
        let vehicle = Vehicle::new(&mut physics, &mut visuals, config, spawn);
        let mut chase = ChaseCamera::new(&config.camera);
        chase.camera.look_at(spawn);

        tracing::info!(
            gravity = ?config.world.gravity,
            timestep = config.world.timestep,
            instances = visuals.instance_count(),
            "universe constructed"
        );

        let mut universe = Self {
            physics,
            visuals,
            vehicle,
            chase,
            ground,
            state: LoopState::Running,
            frame: 0,
            speed_kmh: 0.0,
        };
        universe.push_camera();
        universe
    }

    /// One fixed-timestep frame: physics step, vehicle control + visual sync,
    /// chase camera, speed readout. Always in that order.
    pub fn run_frame(&mut self, input: &InputState) {
        if self.state == LoopState::Running {
            let dt = self.physics.timestep();
            self.physics.step(dt);
            self.vehicle.update(input, &mut self.physics, &mut self.visuals);
        }

        if let Some(pose) = self.vehicle.chassis_pose(&self.physics) {
            self.chase.update(&pose);
        }
        self.push_camera();

        self.speed_kmh = self.vehicle.speed_kmh(&self.physics);
        self.frame += 1;
        tracing::trace!(frame = self.frame, speed = self.speed_kmh, ?input, "frame");
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn toggle_pause(&mut self) -> LoopState {
        self.state = match self.state {
            LoopState::Running => LoopState::Paused,
            LoopState::Paused => LoopState::Running,
        };
        tracing::debug!(state = ?self.state, "loop state changed");
        self.state
    }

    pub fn reset_vehicle(&mut self) {
        self.vehicle.reset(&mut self.physics);
        self.vehicle.sync_visuals(&self.physics, &mut self.visuals);
        self.speed_kmh = 0.0;
    }

    /// New drawable size in physical pixels. Zero-sized (minimized) is ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.chase.camera.set_viewport(width, height);
        self.visuals.set_viewport([width as f32, height as f32]);
        self.push_camera();
    }

    pub fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    pub fn chase_camera(&self) -> &ChaseCamera {
        &self.chase
    }

    pub fn ground(&self) -> RigidBodyHandle {
        self.ground
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Chassis speed as of the last frame.
    pub fn speed_kmh(&self) -> f32 {
        self.speed_kmh
    }

    pub fn speed_label(&self) -> String {
        speed_label(self.speed_kmh)
    }

    fn push_camera(&mut self) {
        let camera = &self.chase.camera;
        self.visuals
            .set_camera(camera.view(), camera.proj(), camera.position.coords.into());
    }
}

/// Floored km/h readout, e.g. `"42 km/h"`.
pub fn speed_label(kmh: f32) -> String {
    format!("{} km/h", kmh.max(0.0).floor() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::user_input::Control;

    #[test]
    fn builds_ground_car_lights_and_fog() {
        let config = DriveConfig::default();
        let universe = Universe::new(&config);

        // ground + chassis + four wheels
        assert_eq!(universe.visuals.instance_count(), 6);
        assert!(universe.visuals.sun().is_some());

        let fog = universe.visuals.fog().unwrap();
        assert_eq!(fog.near, 20.0);
        assert_eq!(fog.far, 100.0);
        assert_eq!(fog.color, universe.visuals.background());

        assert!(universe.physics.body(universe.ground()).unwrap().is_fixed());
        let chassis = universe.physics.body(universe.vehicle().chassis()).unwrap();
        assert_eq!(chassis.translation().y, 4.0);
    }

    #[test]
    fn frame_steps_physics_then_syncs_visuals() {
        let mut universe = Universe::new(&DriveConfig::default());
        universe.run_frame(&InputState::default());

        let pose = universe.vehicle().chassis_pose(&universe.physics).unwrap();
        let visual = universe
            .visuals
            .instance(universe.vehicle().chassis_visual())
            .unwrap();
        assert_eq!(visual.transform, Transform::from_isometry(&pose));
        assert!(pose.translation.y < 4.0, "gravity should have acted");
        assert_eq!(universe.frame(), 1);
    }

    #[test]
    fn camera_follows_and_is_pushed_to_the_scene() {
        let mut universe = Universe::new(&DriveConfig::default());
        let before = universe.chase_camera().camera.position;
        universe.run_frame(&InputState::default());

        let after = universe.chase_camera().camera.position;
        assert_ne!(before, after);
        let [x, y, z] = universe.visuals.camera_position();
        assert_eq!([x, y, z], [after.x, after.y, after.z]);
    }

    #[test]
    fn paused_frames_freeze_the_car_but_not_the_camera() {
        let mut universe = Universe::new(&DriveConfig::default());
        for _ in 0..10 {
            universe.run_frame(&InputState::default());
        }

        assert_eq!(universe.toggle_pause(), LoopState::Paused);
        let pose = universe.vehicle().chassis_pose(&universe.physics).unwrap();
        let camera = universe.chase_camera().camera.position;

        universe.run_frame(&InputState::holding(&[Control::Forward]));

        assert_eq!(
            universe.vehicle().chassis_pose(&universe.physics).unwrap(),
            pose
        );
        assert_ne!(universe.chase_camera().camera.position, camera);
        assert_eq!(universe.toggle_pause(), LoopState::Running);
    }

    #[test]
    fn reset_returns_the_car_to_spawn() {
        let mut universe = Universe::new(&DriveConfig::default());
        let forward = InputState::holding(&[Control::Forward]);
        for _ in 0..90 {
            universe.run_frame(&forward);
        }

        universe.reset_vehicle();
        let chassis = universe.physics.body(universe.vehicle().chassis()).unwrap();
        assert_eq!(chassis.translation(), &Vector3::new(0.0, 4.0, 0.0));
        assert_eq!(chassis.linvel().norm(), 0.0);
        assert_eq!(universe.speed_kmh(), 0.0);
    }

    #[test]
    fn resize_updates_aspect_and_skips_zero() {
        let mut universe = Universe::new(&DriveConfig::default());
        universe.resize(1280, 720);
        assert!((universe.chase_camera().camera.aspect - 1280.0 / 720.0).abs() < 1e-6);
        assert_eq!(universe.visuals.viewport(), [1280.0, 720.0]);

        universe.resize(0, 0);
        assert_eq!(universe.visuals.viewport(), [1280.0, 720.0]);
    }

    #[test]
    fn speed_label_is_floored() {
        assert_eq!(speed_label(0.0), "0 km/h");
        assert_eq!(speed_label(12.99), "12 km/h");
        assert_eq!(speed_label(100.0), "100 km/h");
    }
}
