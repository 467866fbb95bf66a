//! Typed, immutable tuning for every entity in the demo.
//!
//! All structs default to the stock car and scene, and every field carries
//! `#[serde(default)]` so a TOML file only needs the values it overrides.

use std::path::{Path, PathBuf};

use rapier3d::na::{Point3, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub world: WorldConfig,
    pub chassis: ChassisConfig,
    pub wheel: WheelConfig,
    pub layout: WheelLayout,
    pub controls: ControlConfig,
    pub contact: ContactConfig,
    pub camera: CameraConfig,
    pub lighting: LightingConfig,
    pub scene: SceneConfig,
}

impl DriveConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub gravity: [f32; 3],
    /// Seconds advanced per frame, independent of wall-clock frame time.
    pub timestep: f32,
    pub spawn: [f32; 3],
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.82, 0.0],
            timestep: 1.0 / 60.0,
            spawn: [0.0, 4.0, 0.0],
        }
    }
}

impl WorldConfig {
    pub fn gravity(&self) -> Vector3<f32> {
        Vector3::from(self.gravity)
    }

    pub fn spawn(&self) -> Point3<f32> {
        Point3::from(self.spawn)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChassisConfig {
    pub mass: f32,
    /// Full box size (width, height, length).
    pub extents: [f32; 3],
    pub angular_damping: f32,
    pub color: u32,
}

impl Default for ChassisConfig {
    fn default() -> Self {
        Self {
            mass: 150.0,
            extents: [2.0, 0.5, 4.0],
            angular_damping: 0.5,
            color: 0xff0000,
        }
    }
}

impl ChassisConfig {
    pub fn half_extents(&self) -> Vector3<f32> {
        Vector3::from(self.extents) * 0.5
    }
}

/// Static per-wheel configuration shared by all four wheels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelConfig {
    pub radius: f32,
    pub direction_local: [f32; 3],
    pub axle_local: [f32; 3],
    pub suspension_stiffness: f32,
    pub suspension_rest_length: f32,
    pub damping_relaxation: f32,
    pub damping_compression: f32,
    pub max_suspension_force: f32,
    pub max_suspension_travel: f32,
    pub friction_slip: f32,
    pub custom_sliding_rotational_speed: f32,
    pub use_custom_sliding_rotational_speed: bool,
    /// Visual only.
    pub width: f32,
    pub segments: u32,
    pub color: u32,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            radius: 0.5,
            direction_local: [0.0, -1.0, 0.0],
            axle_local: [-1.0, 0.0, 0.0],
            suspension_stiffness: 30.0,
            suspension_rest_length: 0.3,
            damping_relaxation: 2.3,
            damping_compression: 4.4,
            max_suspension_force: 100_000.0,
            max_suspension_travel: 0.3,
            friction_slip: 1.4,
            custom_sliding_rotational_speed: -30.0,
            use_custom_sliding_rotational_speed: true,
            width: 0.5,
            segments: 20,
            color: 0x333333,
        }
    }
}

impl WheelConfig {
    pub fn direction(&self) -> Vector3<f32> {
        Vector3::from(self.direction_local)
    }

    pub fn axle(&self) -> Vector3<f32> {
        Vector3::from(self.axle_local)
    }
}

/// Where the four wheels attach, relative to the chassis origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelLayout {
    pub half_track: f32,
    pub front_axle: f32,
    pub rear_axle: f32,
    pub height: f32,
}

impl Default for WheelLayout {
    fn default() -> Self {
        Self {
            half_track: 0.8,
            front_axle: 1.2,
            rear_axle: -1.2,
            height: -0.3,
        }
    }
}

impl WheelLayout {
    /// Connection points in wheel index order: FL, FR, RL, RR.
    pub fn connection_points(&self) -> [Point3<f32>; 4] {
        let (x, y) = (self.half_track, self.height);
        [
            Point3::new(x, y, self.front_axle),
            Point3::new(-x, y, self.front_axle),
            Point3::new(x, y, self.rear_axle),
            Point3::new(-x, y, self.rear_axle),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Radians.
    pub max_steer: f32,
    pub max_engine_force: f32,
    pub brake_force: f32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            max_steer: 0.5,
            max_engine_force: 1000.0,
            brake_force: 1_000_000.0,
        }
    }
}

/// Friction/restitution pair for contacts against the ground.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    pub friction: f32,
    pub restitution: f32,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            friction: 0.3,
            restitution: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub initial_position: [f32; 3],
    /// Chassis-local offset the camera chases.
    pub chase_offset: [f32; 3],
    /// Fraction of the remaining distance covered per frame.
    pub lerp_factor: f32,
    pub look_height: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 75.0,
            z_near: 0.1,
            z_far: 1000.0,
            initial_position: [0.0, 5.0, 10.0],
            chase_offset: [0.0, 5.0, 12.0],
            lerp_factor: 0.1,
            look_height: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub ambient_color: u32,
    pub ambient_intensity: f32,
    pub sun_color: u32,
    pub sun_intensity: f32,
    pub sun_position: [f32; 3],
    pub sun_target: [f32; 3],
    pub shadow_map_size: u32,
    pub shadow_near: f32,
    pub shadow_far: f32,
    pub shadow_left: f32,
    pub shadow_right: f32,
    pub shadow_top: f32,
    pub shadow_bottom: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            ambient_color: 0xffffff,
            ambient_intensity: 0.5,
            sun_color: 0xffffff,
            sun_intensity: 1.0,
            sun_position: [50.0, 50.0, 50.0],
            sun_target: [0.0, 0.0, 0.0],
            shadow_map_size: 2048,
            shadow_near: 0.5,
            shadow_far: 500.0,
            shadow_left: -100.0,
            shadow_right: 100.0,
            shadow_top: 100.0,
            shadow_bottom: -100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub background: u32,
    pub fog_near: f32,
    pub fog_far: f32,
    pub ground_size: [f32; 2],
    pub ground_color: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            background: 0xa0a0a0,
            fog_near: 20.0,
            fog_far: 100.0,
            ground_size: [500.0, 500.0],
            ground_color: 0x444444,
        }
    }
}

/// `0xRRGGBB` to linear-ish 0..1 floats.
pub fn rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

pub fn rgba(hex: u32) -> [f32; 4] {
    let [r, g, b] = rgb(hex);
    [r, g, b, 1.0]
}
