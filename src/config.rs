use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Per-frame rotation applied to 3D demos around the y axis, in radians.
pub const DEFAULT_ROTATION_SPEED: f32 = 0.003;
/// Frames without interaction before the render loop parks itself.
pub const MAX_IDLE_FRAMES: u32 = 1000;
pub const MAX_SUPPORTED_MATERIALS: usize = 3;
/// Side length of the square shadow-map target.
pub const DEPTH_MAP_SIZE: u32 = 1024;
/// Texture units beyond this count are required for shadow mapping.
pub const MIN_DEPTH_TEXTURE_UNITS: i32 = 8;

pub const FEEDBACK_TEXTURE_UNIT: u32 = 0;
pub const DEPTH_MAP_TEXTURE_UNIT: u32 = 4;
pub const OUTLINE_TEXTURE_UNIT: u32 = 4;
pub const SOURCE_TEXTURE_UNIT: u32 = 5;

/// Camera projection constants for 3D demos.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSettings {
    pub field_of_view_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub eye: Vec3,
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        Self {
            field_of_view_degrees: 40.0,
            near: 0.01,
            far: 100.0,
            eye: Vec3::new(0.0, 0.0, 6.0),
        }
    }
}

/// Projection used for the light's view in the shadow pass.
pub fn light_projection() -> ProjectionSettings {
    ProjectionSettings {
        field_of_view_degrees: 90.0,
        near: 0.1,
        far: 50.0,
        eye: Vec3::ZERO,
    }
}
