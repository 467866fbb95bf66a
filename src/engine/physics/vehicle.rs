//! Raycast car: chassis body, four suspension wheels, and the visual
//! instances that mirror them.

use rapier3d::control::{DynamicRayCastVehicleController, WheelTuning};
use rapier3d::na::{Isometry3, Point3};
use rapier3d::prelude::RigidBodyHandle;

use crate::engine::config::{ControlConfig, DriveConfig, WheelConfig, rgba};
use crate::engine::graphics::{Instance, InstanceHandle, MeshFactory, Transform, VisualWorld};
use crate::engine::physics::{PhysicsWorld, VehicleHandle};
use crate::engine::user_input::InputState;

pub const WHEEL_COUNT: usize = 4;
/// Front pair; receives the steering angle.
pub const STEERED_WHEELS: [usize; 2] = [0, 1];
/// Rear pair; receives the engine force.
pub const DRIVEN_WHEELS: [usize; 2] = [2, 3];

/// Per-frame wheel inputs derived from the held controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelCommands {
    pub steering: f32,
    pub engine_force: f32,
    pub brake: f32,
}

impl WheelCommands {
    /// Left wins over right, forward wins over backward.
    pub fn from_input(input: &InputState, controls: &ControlConfig) -> Self {
        let steering = if input.left {
            controls.max_steer
        } else if input.right {
            -controls.max_steer
        } else {
            0.0
        };

        // Negative force drives toward the chassis' -Z.
        let engine_force = if input.forward {
            -controls.max_engine_force
        } else if input.backward {
            controls.max_engine_force
        } else {
            0.0
        };

        let brake = if input.brake { controls.brake_force } else { 0.0 };

        Self {
            steering,
            engine_force,
            brake,
        }
    }

    /// Write every command, every frame. Brake is released explicitly.
    pub fn apply(&self, controller: &mut DynamicRayCastVehicleController) {
        let wheels = controller.wheels_mut();
        for index in STEERED_WHEELS {
            if let Some(wheel) = wheels.get_mut(index) {
                wheel.steering = self.steering;
            }
        }
        for index in DRIVEN_WHEELS {
            if let Some(wheel) = wheels.get_mut(index) {
                wheel.engine_force = self.engine_force;
            }
        }
        for wheel in wheels.iter_mut().take(WHEEL_COUNT) {
            wheel.brake = self.brake;
        }
    }
}

fn wheel_tuning(wheel: &WheelConfig) -> WheelTuning {
    WheelTuning {
        suspension_stiffness: wheel.suspension_stiffness,
        suspension_compression: wheel.damping_compression,
        suspension_damping: wheel.damping_relaxation,
        max_suspension_travel: wheel.max_suspension_travel,
        friction_slip: wheel.friction_slip,
        max_suspension_force: wheel.max_suspension_force,
        ..WheelTuning::default()
    }
}

pub struct Vehicle {
    chassis: RigidBodyHandle,
    handle: VehicleHandle,
    chassis_visual: InstanceHandle,
    wheel_visuals: [InstanceHandle; WHEEL_COUNT],
    controls: ControlConfig,
    /// Spin rate for a driven wheel with no ground under it, if enabled.
    sliding_rotation: Option<f32>,
    /// Wheel spin as settled after the previous step.
    wheel_rotation: [f32; WHEEL_COUNT],
    spawn: Point3<f32>,
}

impl Vehicle {
    /// Build the chassis, register the raycast controller, and add one visual
    /// per body part to `visuals`.
    pub fn new(
        physics: &mut PhysicsWorld,
        visuals: &mut VisualWorld,
        config: &DriveConfig,
        spawn: Point3<f32>,
    ) -> Self {
        let chassis = physics.add_chassis(spawn, &config.chassis);

        let tuning = wheel_tuning(&config.wheel);
        let mut controller = DynamicRayCastVehicleController::new(chassis);
        controller.index_forward_axis = 2;
        for point in config.layout.connection_points() {
            controller.add_wheel(
                point,
                config.wheel.direction(),
                config.wheel.axle(),
                config.wheel.suspension_rest_length,
                config.wheel.radius,
                &tuning,
            );
        }
        let handle = physics.add_vehicle(controller);

        let chassis_mesh = visuals.add_mesh(MeshFactory::cuboid(config.chassis.extents));
        let start = Transform::from_translation(spawn.coords.into());
        let chassis_visual = visuals.add_instance(
            Instance::new(chassis_mesh, rgba(config.chassis.color)).with_transform(start),
        );

        let wheel_mesh = visuals.add_mesh(MeshFactory::cylinder_x(
            config.wheel.radius,
            config.wheel.width,
            config.wheel.segments,
        ));
        let wheel_color = rgba(config.wheel.color);
        let wheel_visuals = std::array::from_fn(|_| {
            visuals.add_instance(Instance::new(wheel_mesh, wheel_color).with_transform(start))
        });

        tracing::info!(?spawn, wheels = WHEEL_COUNT, "vehicle constructed");

        let vehicle = Self {
            chassis,
            handle,
            chassis_visual,
            wheel_visuals,
            controls: config.controls.clone(),
            sliding_rotation: config
                .wheel
                .use_custom_sliding_rotational_speed
                .then_some(config.wheel.custom_sliding_rotational_speed),
            wheel_rotation: [0.0; WHEEL_COUNT],
            spawn,
        };
        vehicle.sync_visuals(physics, visuals);
        vehicle
    }

    pub fn chassis(&self) -> RigidBodyHandle {
        self.chassis
    }

    pub fn handle(&self) -> VehicleHandle {
        self.handle
    }

    pub fn chassis_visual(&self) -> InstanceHandle {
        self.chassis_visual
    }

    pub fn wheel_visuals(&self) -> &[InstanceHandle; WHEEL_COUNT] {
        &self.wheel_visuals
    }

    pub fn spawn(&self) -> Point3<f32> {
        self.spawn
    }

    /// Apply controls, then mirror the post-step physics state onto the visuals.
    ///
    /// Must run after the physics step of the same frame.
    pub fn update(
        &mut self,
        input: &InputState,
        physics: &mut PhysicsWorld,
        visuals: &mut VisualWorld,
    ) {
        self.apply_controls(input, physics);
        self.sync_visuals(physics, visuals);
    }

    /// Settle the wheel spin of the step just taken, then write this frame's
    /// commands for the next one.
    pub fn apply_controls(&mut self, input: &InputState, physics: &mut PhysicsWorld) {
        let commands = WheelCommands::from_input(input, &self.controls);
        let dt = physics.timestep();
        let Some(controller) = physics.vehicle_mut(self.handle) else {
            return;
        };
        settle_wheel_rotation(controller, &mut self.wheel_rotation, self.sliding_rotation, dt);
        commands.apply(controller);
    }

    pub fn sync_visuals(&self, physics: &PhysicsWorld, visuals: &mut VisualWorld) {
        if let Some(pose) = self.chassis_pose(physics) {
            visuals.set_transform(self.chassis_visual, Transform::from_isometry(&pose));
        }
        for (index, &visual) in self.wheel_visuals.iter().enumerate() {
            if let Some(pose) = physics.wheel_world_transform(self.handle, index) {
                visuals.set_transform(visual, Transform::from_isometry(&pose));
            }
        }
    }

    pub fn chassis_pose(&self, physics: &PhysicsWorld) -> Option<Isometry3<f32>> {
        physics.body(self.chassis).map(|body| *body.position())
    }

    /// |linear velocity| in km/h.
    pub fn speed_kmh(&self, physics: &PhysicsWorld) -> f32 {
        physics
            .body(self.chassis)
            .map(|body| body.linvel().norm() * 3.6)
            .unwrap_or(0.0)
    }

    /// Put the car back at its spawn point, at rest.
    pub fn reset(&mut self, physics: &mut PhysicsWorld) {
        physics.reset_body(self.chassis, self.spawn);
        if let Some(controller) = physics.vehicle_mut(self.handle) {
            for wheel in controller.wheels_mut() {
                wheel.rotation = 0.0;
            }
        }
        self.wheel_rotation = [0.0; WHEEL_COUNT];
        tracing::debug!(spawn = ?self.spawn, "vehicle reset");
    }
}

/// Replace the spin rapier integrated during the last step, using the
/// commands that were in effect for it. A wheel whose brake outweighs its
/// engine is locked. With a sliding rate set, a wheel in the air that has
/// engine force spins at that fixed rate in the engine's direction.
fn settle_wheel_rotation(
    controller: &mut DynamicRayCastVehicleController,
    last: &mut [f32; WHEEL_COUNT],
    sliding_rotation: Option<f32>,
    dt: f32,
) {
    for (wheel, last) in controller.wheels_mut().iter_mut().zip(last.iter_mut()) {
        let engine = wheel.engine_force;
        if wheel.brake.abs() > engine.abs() {
            wheel.rotation = *last;
        } else if let Some(speed) = sliding_rotation {
            if !wheel.raycast_info().is_in_contact && engine != 0.0 {
                wheel.rotation = *last + engine.signum() * speed * dt;
            }
        }
        *last = wheel.rotation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controls() -> ControlConfig {
        ControlConfig::default()
    }

    #[test]
    fn steering_covers_every_left_right_combination() {
        let cases = [
            (false, false, 0.0),
            (true, false, 0.5),
            (false, true, -0.5),
            (true, true, 0.5),
        ];
        for (left, right, expected) in cases {
            let input = InputState {
                left,
                right,
                ..InputState::default()
            };
            let commands = WheelCommands::from_input(&input, &controls());
            assert_eq!(commands.steering, expected, "left={left} right={right}");
        }
    }

    #[test]
    fn engine_force_covers_every_forward_backward_combination() {
        let cases = [
            (false, false, 0.0),
            (true, false, -1000.0),
            (false, true, 1000.0),
            (true, true, -1000.0),
        ];
        for (forward, backward, expected) in cases {
            let input = InputState {
                forward,
                backward,
                ..InputState::default()
            };
            let commands = WheelCommands::from_input(&input, &controls());
            assert_eq!(commands.engine_force, expected, "forward={forward} backward={backward}");
        }
    }

    #[test]
    fn brake_is_all_or_nothing() {
        let on = WheelCommands::from_input(
            &InputState {
                brake: true,
                ..InputState::default()
            },
            &controls(),
        );
        let off = WheelCommands::from_input(&InputState::default(), &controls());

        assert_eq!(on.brake, 1_000_000.0);
        assert_eq!(off.brake, 0.0);
    }

    fn test_vehicle() -> (PhysicsWorld, VisualWorld, Vehicle) {
        let config = DriveConfig::default();
        let mut physics = PhysicsWorld::new(&config.world, config.contact);
        physics.add_ground(&config.scene);
        let mut visuals = VisualWorld::new();
        let vehicle = Vehicle::new(&mut physics, &mut visuals, &config, config.world.spawn());
        (physics, visuals, vehicle)
    }

    fn rotations(physics: &PhysicsWorld, vehicle: &Vehicle) -> [f32; WHEEL_COUNT] {
        let wheels = physics.vehicle(vehicle.handle()).unwrap().wheels();
        std::array::from_fn(|index| wheels[index].rotation)
    }

    #[test]
    fn commands_land_on_the_right_wheel_indices() {
        let (mut physics, _visuals, mut vehicle) = test_vehicle();
        let input = InputState {
            forward: true,
            left: true,
            brake: true,
            ..InputState::default()
        };

        vehicle.apply_controls(&input, &mut physics);

        let wheels = physics.vehicle(vehicle.handle()).unwrap().wheels();
        assert_eq!(wheels.len(), 4);
        assert_eq!(wheels[0].steering, 0.5);
        assert_eq!(wheels[1].steering, 0.5);
        assert_eq!(wheels[2].steering, 0.0);
        assert_eq!(wheels[3].steering, 0.0);

        assert_eq!(wheels[0].engine_force, 0.0);
        assert_eq!(wheels[1].engine_force, 0.0);
        assert_eq!(wheels[2].engine_force, -1000.0);
        assert_eq!(wheels[3].engine_force, -1000.0);

        assert!(wheels.iter().all(|w| w.brake == 1_000_000.0));
    }

    #[test]
    fn releasing_controls_clears_every_wheel() {
        let (mut physics, _visuals, mut vehicle) = test_vehicle();
        let held = InputState {
            backward: true,
            right: true,
            brake: true,
            ..InputState::default()
        };
        vehicle.apply_controls(&held, &mut physics);
        vehicle.apply_controls(&InputState::default(), &mut physics);

        let wheels = physics.vehicle(vehicle.handle()).unwrap().wheels();
        for wheel in wheels {
            assert_eq!(wheel.steering, 0.0);
            assert_eq!(wheel.engine_force, 0.0);
            assert_eq!(wheel.brake, 0.0);
        }
    }

    #[test]
    fn wheels_attach_at_layout_points() {
        let (physics, _visuals, vehicle) = test_vehicle();
        let wheels = physics.vehicle(vehicle.handle()).unwrap().wheels();
        let expected = DriveConfig::default().layout.connection_points();

        for (wheel, point) in wheels.iter().zip(expected) {
            assert_eq!(wheel.chassis_connection_point_cs, point);
            assert_eq!(wheel.radius, 0.5);
            assert_eq!(wheel.suspension_rest_length, 0.3);
            assert_eq!(wheel.suspension_stiffness, 30.0);
        }
    }

    #[test]
    fn visuals_mirror_physics_after_a_frame() {
        let (mut physics, mut visuals, mut vehicle) = test_vehicle();
        let input = InputState {
            left: true,
            ..InputState::default()
        };

        for _ in 0..10 {
            physics.step(1.0 / 60.0);
            vehicle.update(&input, &mut physics, &mut visuals);
        }

        let chassis_pose = vehicle.chassis_pose(&physics).unwrap();
        let chassis = visuals.instance(vehicle.chassis_visual()).unwrap();
        assert_eq!(chassis.transform, Transform::from_isometry(&chassis_pose));

        for (index, &visual) in vehicle.wheel_visuals().iter().enumerate() {
            let pose = physics.wheel_world_transform(vehicle.handle(), index).unwrap();
            let instance = visuals.instance(visual).unwrap();
            assert_eq!(instance.transform, Transform::from_isometry(&pose));
        }
    }

    #[test]
    fn airborne_driven_wheels_spin_at_sliding_rate() {
        let (mut physics, _visuals, mut vehicle) = test_vehicle();
        let input = InputState {
            forward: true,
            ..InputState::default()
        };
        let dt = physics.timestep();

        // Spawned at height 4 the wheels have nothing under them yet.
        vehicle.apply_controls(&input, &mut physics);
        physics.step(dt);
        vehicle.apply_controls(&input, &mut physics);

        let rotation = rotations(&physics, &vehicle);
        // sign(-1000) * -30 * dt
        let expected = 30.0 * dt;
        assert!((rotation[2] - expected).abs() < 1e-6);
        assert!((rotation[3] - expected).abs() < 1e-6);
        assert_eq!(rotation[0], 0.0);
    }

    #[test]
    fn sliding_rate_replaces_leftover_spin() {
        let (mut physics, mut visuals, mut vehicle) = test_vehicle();
        let dt = physics.timestep();
        let forward = InputState {
            forward: true,
            ..InputState::default()
        };
        for _ in 0..120 {
            physics.step(dt);
            vehicle.update(&forward, &mut physics, &mut visuals);
        }

        // Back in the air with the wheels still carrying rolling spin.
        vehicle.reset(&mut physics);
        vehicle.apply_controls(&forward, &mut physics);
        for _ in 0..5 {
            let before = rotations(&physics, &vehicle);
            physics.step(dt);
            vehicle.apply_controls(&forward, &mut physics);
            let after = rotations(&physics, &vehicle);
            for index in DRIVEN_WHEELS {
                assert!((after[index] - before[index] - 30.0 * dt).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn brake_locks_every_wheel() {
        let (mut physics, mut visuals, mut vehicle) = test_vehicle();
        let dt = physics.timestep();
        let forward = InputState {
            forward: true,
            ..InputState::default()
        };
        let brake = InputState {
            brake: true,
            ..InputState::default()
        };
        for _ in 0..120 {
            physics.step(dt);
            vehicle.update(&forward, &mut physics, &mut visuals);
        }

        // The first braking frame only writes the brake.
        physics.step(dt);
        vehicle.update(&brake, &mut physics, &mut visuals);
        let locked = rotations(&physics, &vehicle);
        for _ in 0..30 {
            physics.step(dt);
            vehicle.update(&brake, &mut physics, &mut visuals);
            assert_eq!(rotations(&physics, &vehicle), locked);
        }
    }

    #[test]
    fn reset_returns_to_spawn() {
        let (mut physics, mut visuals, mut vehicle) = test_vehicle();
        for _ in 0..30 {
            physics.step(1.0 / 60.0);
            vehicle.update(&InputState::default(), &mut physics, &mut visuals);
        }

        vehicle.reset(&mut physics);

        let pose = vehicle.chassis_pose(&physics).unwrap();
        assert_eq!(pose.translation.vector, vehicle.spawn().coords);
        assert_eq!(vehicle.speed_kmh(&physics), 0.0);
    }
}
