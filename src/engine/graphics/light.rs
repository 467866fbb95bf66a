use rapier3d::na::{Matrix4, Point3, Vector3};

use crate::engine::config::{LightingConfig, rgb};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: [f32; 3],
    pub intensity: f32,
}

impl AmbientLight {
    /// Color premultiplied by intensity.
    pub fn radiance(&self) -> [f32; 3] {
        self.color.map(|c| c * self.intensity)
    }
}

/// Orthographic shadow frustum in light view space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowConfig {
    pub map_size: u32,
    pub near: f32,
    pub far: f32,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub shadow: ShadowConfig,
}

impl DirectionalLight {
    /// Unit vector pointing from the target toward the light.
    pub fn direction_to_light(&self) -> [f32; 3] {
        let d = Vector3::from(self.position) - Vector3::from(self.target);
        let d = d.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::y);
        [d.x, d.y, d.z]
    }

    pub fn radiance(&self) -> [f32; 3] {
        self.color.map(|c| c * self.intensity)
    }

    /// World -> shadow clip space. Column-major, zero-to-one depth.
    pub fn view_proj(&self) -> [[f32; 4]; 4] {
        let eye = Point3::from(self.position);
        let target = Point3::from(self.target);
        let forward = target - eye;
        // Avoid a degenerate basis when looking straight down.
        let up = if forward.cross(&Vector3::y()).norm_squared() < 1e-6 {
            Vector3::z()
        } else {
            Vector3::y()
        };
        let view = Matrix4::look_at_rh(&eye, &target, &up);
        let s = &self.shadow;
        let proj = Matrix4::from(orthographic_rh_zo(
            s.left, s.right, s.bottom, s.top, s.near, s.far,
        ));
        (proj * view).into()
    }
}

/// Right-handed orthographic projection mapping view depth `[near, far]` to
/// `[0, 1]`, with Y flipped for Vulkan clip space.
pub fn orthographic_rh_zo(
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    near: f32,
    far: f32,
) -> [[f32; 4]; 4] {
    let rl = 1.0 / (right - left);
    let tb = 1.0 / (top - bottom);
    let nf = 1.0 / (near - far);
    [
        [2.0 * rl, 0.0, 0.0, 0.0],
        [0.0, -2.0 * tb, 0.0, 0.0],
        [0.0, 0.0, nf, 0.0],
        [-(right + left) * rl, (top + bottom) * tb, near * nf, 1.0],
    ]
}

/// Scene lights built from config: one ambient, one shadow-casting sun.
pub fn lights_from_config(config: &LightingConfig) -> (AmbientLight, DirectionalLight) {
    let ambient = AmbientLight {
        color: rgb(config.ambient_color),
        intensity: config.ambient_intensity,
    };
    let sun = DirectionalLight {
        color: rgb(config.sun_color),
        intensity: config.sun_intensity,
        position: config.sun_position,
        target: config.sun_target,
        shadow: ShadowConfig {
            map_size: config.shadow_map_size,
            near: config.shadow_near,
            far: config.shadow_far,
            left: config.shadow_left,
            right: config.shadow_right,
            top: config.shadow_top,
            bottom: config.shadow_bottom,
        },
    };
    (ambient, sun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::na::Vector4;

    fn project(m: [[f32; 4]; 4], p: [f32; 3]) -> Vector4<f32> {
        Matrix4::from(m) * Vector4::new(p[0], p[1], p[2], 1.0)
    }

    #[test]
    fn sun_target_projects_to_shadow_map_center() {
        let (_, sun) = lights_from_config(&LightingConfig::default());
        let clip = project(sun.view_proj(), [0.0, 0.0, 0.0]);

        assert!(clip.x.abs() < 1e-4);
        assert!(clip.y.abs() < 1e-4);
        // Origin sits ~86.6 units from the light.
        let expected = (50.0f32 * 3f32.sqrt() - 0.5) / (500.0 - 0.5);
        assert!((clip.z - expected).abs() < 1e-4);
        assert_eq!(clip.w, 1.0);
    }

    #[test]
    fn shadow_frustum_edges_map_to_clip_edges() {
        let m = orthographic_rh_zo(-100.0, 100.0, -100.0, 100.0, 0.5, 500.0);
        let right = project(m, [100.0, 0.0, -0.5]);
        let top_far = project(m, [0.0, 100.0, -500.0]);

        assert!((right.x - 1.0).abs() < 1e-6);
        assert!(right.z.abs() < 1e-6);
        // Y is flipped for Vulkan.
        assert!((top_far.y + 1.0).abs() < 1e-6);
        assert!((top_far.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn direction_points_at_light() {
        let (ambient, sun) = lights_from_config(&LightingConfig::default());
        let d = sun.direction_to_light();
        let inv_sqrt3 = 1.0 / 3f32.sqrt();
        for c in d {
            assert!((c - inv_sqrt3).abs() < 1e-6);
        }
        assert_eq!(ambient.radiance(), [0.5, 0.5, 0.5]);
    }
}
