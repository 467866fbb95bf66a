use rapier3d::na::{Isometry3, Matrix4, Point3, Vector3};

use crate::engine::config::CameraConfig;

/// Perspective camera with a look-at target.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub fov_y_radians: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub position: Point3<f32>,
    pub target: Point3<f32>,
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default())
    }
}

impl Camera {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            fov_y_radians: config.fov_y_degrees.to_radians(),
            aspect: 1.0,
            z_near: config.z_near,
            z_far: config.z_far,
            position: Point3::from(config.initial_position),
            target: Point3::origin(),
        }
    }

    /// Recompute the aspect ratio. A zero-sized viewport (minimized window)
    /// keeps the previous one.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn look_at(&mut self, target: Point3<f32>) {
        self.target = target;
    }

    pub fn view(&self) -> [[f32; 4]; 4] {
        Matrix4::look_at_rh(&self.position, &self.target, &Vector3::y()).into()
    }

    pub fn proj(&self) -> [[f32; 4]; 4] {
        let mut proj = perspective_rh_zo(self.fov_y_radians, self.aspect, self.z_near, self.z_far);
        // Vulkan clip space has +Y pointing down.
        proj[1][1] = -proj[1][1];
        proj
    }
}

/// Right-handed, zero-to-one depth projection. Camera looks down -Z.
pub fn perspective_rh_zo(fov_y_radians: f32, aspect: f32, z_near: f32, z_far: f32) -> [[f32; 4]; 4] {
    let f = 1.0 / (0.5 * fov_y_radians).tan();
    let nf = 1.0 / (z_near - z_far);

    // Column-major:
    // [ f/aspect, 0,  0,                0 ]
    // [ 0,        f,  0,                0 ]
    // [ 0,        0,  z_far*nf,        -1 ]
    // [ 0,        0,  z_near*z_far*nf,  0 ]
    [
        [f / aspect, 0.0, 0.0, 0.0],
        [0.0, f, 0.0, 0.0],
        [0.0, 0.0, z_far * nf, -1.0],
        [0.0, 0.0, (z_near * z_far) * nf, 0.0],
    ]
}

/// Follows a pose from a fixed local offset.
///
/// Position eases toward the offset point by `lerp_factor` of the remaining
/// distance each update; the look-at target snaps to the pose every update.
#[derive(Debug, Clone, Copy)]
pub struct ChaseCamera {
    pub camera: Camera,
    offset: Vector3<f32>,
    lerp_factor: f32,
    look_height: f32,
}

impl ChaseCamera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            camera: Camera::from_config(config),
            offset: Vector3::from(config.chase_offset),
            lerp_factor: config.lerp_factor,
            look_height: config.look_height,
        }
    }

    /// The offset carried into world space by `pose`, so it turns with the car.
    pub fn desired_position(&self, pose: &Isometry3<f32>) -> Point3<f32> {
        pose * Point3::from(self.offset)
    }

    pub fn update(&mut self, pose: &Isometry3<f32>) {
        let desired = self.desired_position(pose);
        let position = self.camera.position;
        self.camera.position = position + (desired - position) * self.lerp_factor;

        let target = Point3::from(pose.translation.vector) + Vector3::y() * self.look_height;
        self.camera.look_at(target);
    }
}
