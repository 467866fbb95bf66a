#[cfg(test)]
mod tests {
    use rapier3d::na::Vector3;

    use crate::engine::config::DriveConfig;
    use crate::engine::graphics::VisualWorld;
    use crate::engine::physics::{PhysicsWorld, Vehicle};
    use crate::engine::user_input::{Control, InputState};

    const DT: f32 = 1.0 / 60.0;

    struct Rig {
        physics: PhysicsWorld,
        visuals: VisualWorld,
        vehicle: Vehicle,
    }

    impl Rig {
        fn new() -> Self {
            let config = DriveConfig::default();
            let mut physics = PhysicsWorld::new(&config.world, config.contact);
            physics.add_ground(&config.scene);
            let mut visuals = VisualWorld::new();
            let vehicle = Vehicle::new(&mut physics, &mut visuals, &config, config.world.spawn());
            Self {
                physics,
                visuals,
                vehicle,
            }
        }

        fn frame(&mut self, input: &InputState) {
            self.physics.step(DT);
            self.vehicle.update(input, &mut self.physics, &mut self.visuals);
        }

        fn run(&mut self, input: &InputState, frames: usize) {
            for _ in 0..frames {
                self.frame(input);
            }
        }

        fn position(&self) -> Vector3<f32> {
            *self
                .physics
                .body(self.vehicle.chassis())
                .unwrap()
                .translation()
        }

        fn horizontal_speed(&self) -> f32 {
            let v = self.physics.body(self.vehicle.chassis()).unwrap().linvel();
            (v.x * v.x + v.z * v.z).sqrt()
        }

        fn settle(&mut self) {
            self.run(&InputState::default(), 120);
        }
    }

    #[test]
    fn settles_on_ground_with_zero_input() {
        let mut rig = Rig::new();

        for _ in 0..120 {
            rig.frame(&InputState::default());
            assert!(rig.position().y > 0.0, "chassis fell through the ground");
        }

        // Above the box's own half height, below spawn; riding on the wheels.
        let y = rig.position().y;
        assert!(y > 0.25 && y < 2.0, "settled at y = {y}");
        assert!(rig.horizontal_speed() < 0.5);
    }

    #[test]
    fn rest_state_is_stable() {
        let mut rig = Rig::new();
        rig.settle();
        let speed_after_settle = rig.vehicle.speed_kmh(&rig.physics);

        rig.run(&InputState::default(), 180);

        let speed = rig.vehicle.speed_kmh(&rig.physics);
        assert!(speed < 1.0, "still moving at {speed} km/h");
        assert!(speed <= speed_after_settle + 0.5);
    }

    #[test]
    fn idle_car_still_answers_the_throttle() {
        let mut rig = Rig::new();
        rig.run(&InputState::default(), 360);

        let speed = rig.vehicle.speed_kmh(&rig.physics);
        assert!(speed < 1.0, "still moving at {speed} km/h");

        let start_z = rig.position().z;
        rig.run(&InputState::holding(&[Control::Forward]), 60);

        let travelled = start_z - rig.position().z;
        assert!(travelled > 0.5, "only travelled {travelled} after idling");
    }

    #[test]
    fn forward_drives_along_negative_z() {
        let mut rig = Rig::new();
        rig.settle();

        let forward = InputState::holding(&[Control::Forward]);
        let start_z = rig.position().z;
        let mut travelled = Vec::with_capacity(60);
        for _ in 0..60 {
            rig.frame(&forward);
            travelled.push(start_z - rig.position().z);
        }

        let total = travelled[travelled.len() - 1];
        assert!(total > 0.5, "only travelled {total}");

        // Once the wheels have bitten, distance never goes backwards.
        for pair in travelled[10..].windows(2) {
            assert!(pair[1] >= pair[0] - 1e-3, "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn brake_only_slows_the_car() {
        let mut rig = Rig::new();
        rig.settle();
        rig.run(&InputState::holding(&[Control::Forward]), 90);

        let initial = rig.horizontal_speed();
        assert!(initial > 1.0, "not moving before braking: {initial}");

        let brake = InputState::holding(&[Control::Brake]);
        let mut previous = initial;
        for _ in 0..60 {
            rig.frame(&brake);
            let speed = rig.horizontal_speed();
            assert!(speed <= previous + 0.1, "{previous} -> {speed}");
            previous = speed;
        }
        assert!(previous < initial * 0.5);
    }

    #[test]
    fn steering_changes_heading() {
        let mut rig = Rig::new();
        rig.settle();
        let before = rig.vehicle.chassis_pose(&rig.physics).unwrap().rotation;

        rig.run(&InputState::holding(&[Control::Forward, Control::Left]), 120);

        let after = rig.vehicle.chassis_pose(&rig.physics).unwrap().rotation;
        assert!(before.angle_to(&after) > 0.1);
    }
}
