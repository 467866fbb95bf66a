//! Rigid-body world built on rapier.
//!
//! `PhysicsWorld` owns every rapier set plus the raycast vehicle controllers
//! registered with it. Vehicles are updated inside `step`, before the
//! pipeline integrates, so suspension/engine/brake impulses land in the same
//! fixed step.

pub mod vehicle;
mod vehicle_tests;

use rapier3d::control::DynamicRayCastVehicleController;
use rapier3d::na::{Isometry3, Point3, Unit, UnitQuaternion, Vector3};
use rapier3d::prelude::*;
use slotmap::{SlotMap, new_key_type};

use crate::engine::config::{ChassisConfig, ContactConfig, SceneConfig, WorldConfig};

pub use vehicle::{Vehicle, WheelCommands};

new_key_type! {
    /// Handle to a vehicle controller registered with a `PhysicsWorld`.
    pub struct VehicleHandle;
}

/// Ground slab thickness. Its top face sits on the y = 0 plane.
const GROUND_HALF_THICKNESS: f32 = 0.5;

pub struct PhysicsWorld {
    pub gravity: Vector<Real>,
    pub integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    query_pipeline: QueryPipeline,
    contact: ContactConfig,
    vehicles: SlotMap<VehicleHandle, DynamicRayCastVehicleController>,
}

impl PhysicsWorld {
    pub fn new(world: &WorldConfig, contact: ContactConfig) -> Self {
        tracing::info!(
            gravity = ?world.gravity,
            friction = contact.friction,
            restitution = contact.restitution,
            "physics world created"
        );

        Self {
            gravity: world.gravity(),
            integration_parameters: IntegrationParameters {
                dt: world.timestep,
                ..IntegrationParameters::default()
            },
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            contact,
            vehicles: SlotMap::with_key(),
        }
    }

    /// Static ground covering `scene.ground_size`, top face at y = 0.
    pub fn add_ground(&mut self, scene: &SceneConfig) -> RigidBodyHandle {
        let [width, depth] = scene.ground_size;
        let body = RigidBodyBuilder::fixed()
            .translation(vector![0.0, -GROUND_HALF_THICKNESS, 0.0])
            .build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::cuboid(width * 0.5, GROUND_HALF_THICKNESS, depth * 0.5)
            .friction(self.contact.friction)
            .restitution(self.contact.restitution)
            .friction_combine_rule(CoefficientCombineRule::Min)
            .restitution_combine_rule(CoefficientCombineRule::Min)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        tracing::debug!(width, depth, "ground added");
        handle
    }

    pub fn add_chassis(&mut self, spawn: Point3<f32>, chassis: &ChassisConfig) -> RigidBodyHandle {
        // The raycast controller applies its impulses without waking the body,
        // so a sleeping chassis would ignore the engine.
        let body = RigidBodyBuilder::dynamic()
            .translation(spawn.coords)
            .angular_damping(chassis.angular_damping)
            .can_sleep(false)
            .build();
        let handle = self.bodies.insert(body);

        let half = chassis.half_extents();
        let collider = ColliderBuilder::cuboid(half.x, half.y, half.z)
            .mass(chassis.mass)
            .friction(self.contact.friction)
            .restitution(self.contact.restitution)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        tracing::debug!(?spawn, mass = chassis.mass, "chassis added");
        handle
    }

    pub fn add_vehicle(&mut self, controller: DynamicRayCastVehicleController) -> VehicleHandle {
        self.vehicles.insert(controller)
    }

    pub fn vehicle(&self, handle: VehicleHandle) -> Option<&DynamicRayCastVehicleController> {
        self.vehicles.get(handle)
    }

    pub fn vehicle_mut(
        &mut self,
        handle: VehicleHandle,
    ) -> Option<&mut DynamicRayCastVehicleController> {
        self.vehicles.get_mut(handle)
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn timestep(&self) -> f32 {
        self.integration_parameters.dt
    }

    /// Advance the world by exactly `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;

        for (_, controller) in self.vehicles.iter_mut() {
            let filter = QueryFilter::default().exclude_rigid_body(controller.chassis);
            controller.update_vehicle(
                dt,
                &mut self.bodies,
                &self.colliders,
                &self.query_pipeline,
                filter,
            );
        }

        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    /// World transform of wheel `index`, derived from the chassis pose as it
    /// stands now: hard point pushed along the suspension direction, then
    /// steering about the local up axis and spin about the axle.
    pub fn wheel_world_transform(
        &self,
        vehicle: VehicleHandle,
        index: usize,
    ) -> Option<Isometry3<f32>> {
        let controller = self.vehicles.get(vehicle)?;
        let wheel = controller.wheels().get(index)?;
        let pose = self.bodies.get(controller.chassis)?.position();

        let hard_point = pose * wheel.chassis_connection_point_cs;
        let direction = pose.rotation * wheel.direction_cs;
        let center = hard_point + direction * wheel.raycast_info().suspension_length;

        let up = Unit::new_normalize(-wheel.direction_cs);
        let axle = Unit::new_normalize(wheel.axle_cs);
        let steering = UnitQuaternion::from_axis_angle(&up, wheel.steering);
        let spin = UnitQuaternion::from_axis_angle(&axle, wheel.rotation);

        Some(Isometry3::from_parts(
            center.coords.into(),
            pose.rotation * steering * spin,
        ))
    }

    /// Teleport a body to `position`, upright and at rest.
    pub fn reset_body(&mut self, handle: RigidBodyHandle, position: Point3<f32>) {
        let Some(body) = self.bodies.get_mut(handle) else {
            return;
        };
        body.set_position(Isometry3::translation(position.x, position.y, position.z), true);
        body.set_linvel(Vector3::zeros(), true);
        body.set_angvel(Vector3::zeros(), true);
        body.reset_forces(true);
        body.reset_torques(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::DriveConfig;

    fn world() -> (PhysicsWorld, DriveConfig) {
        let config = DriveConfig::default();
        let mut physics = PhysicsWorld::new(&config.world, config.contact);
        physics.add_ground(&config.scene);
        (physics, config)
    }

    #[test]
    fn chassis_carries_configured_mass_and_damping() {
        let (mut physics, config) = world();
        let handle = physics.add_chassis(config.world.spawn(), &config.chassis);
        let body = physics.body(handle).unwrap();

        assert!((body.mass() - 150.0).abs() < 1e-3);
        assert_eq!(body.angular_damping(), 0.5);
        assert_eq!(body.translation().y, 4.0);
    }

    #[test]
    fn ground_collider_uses_contact_material() {
        let (physics, _) = world();
        let (_, ground) = physics.colliders.iter().next().unwrap();

        assert_eq!(ground.friction(), 0.3);
        assert_eq!(ground.restitution(), 0.0);
    }

    #[test]
    fn bare_chassis_falls_under_gravity_and_stops_on_ground() {
        let (mut physics, config) = world();
        let handle = physics.add_chassis(config.world.spawn(), &config.chassis);

        physics.step(1.0 / 60.0);
        assert!(physics.body(handle).unwrap().linvel().y < 0.0);

        for _ in 0..240 {
            physics.step(1.0 / 60.0);
        }
        let body = physics.body(handle).unwrap();
        // Resting on its box, half-height above the slab.
        assert!(body.translation().y > 0.0);
        assert!(body.translation().y < 1.0);
    }

    #[test]
    fn chassis_never_falls_asleep() {
        let (mut physics, config) = world();
        let handle = physics.add_chassis(config.world.spawn(), &config.chassis);

        for _ in 0..600 {
            physics.step(1.0 / 60.0);
        }
        assert!(!physics.body(handle).unwrap().is_sleeping());
    }

    #[test]
    fn reset_body_zeroes_velocity() {
        let (mut physics, config) = world();
        let handle = physics.add_chassis(config.world.spawn(), &config.chassis);
        for _ in 0..30 {
            physics.step(1.0 / 60.0);
        }

        physics.reset_body(handle, Point3::new(1.0, 4.0, -2.0));
        let body = physics.body(handle).unwrap();

        assert_eq!(*body.translation(), Vector3::new(1.0, 4.0, -2.0));
        assert_eq!(body.linvel().norm(), 0.0);
        assert_eq!(body.angvel().norm(), 0.0);
    }
}
