//! Damped rotation driven by device orientation and drags, plus the pointer
//! mappings used by mouse-follow demos.

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::{
    add_vectors, apply_matrix_to_vector3, clamp, degrees_to_radians, interpolate_vectors,
    invert_matrix, look_at,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InteractionSettings {
    pub beta_mouse_weight: f32,
    pub gamma_mouse_weight: f32,
    pub beta_device_weight: f32,
    pub gamma_device_weight: f32,
    pub beta_offset_degrees: f32,
    /// Per-frame increment of the accelerate/decelerate timers.
    pub friction: f32,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            beta_mouse_weight: 0.05,
            gamma_mouse_weight: 0.075,
            beta_device_weight: 0.025,
            gamma_device_weight: 0.05,
            beta_offset_degrees: -30.0,
            friction: 0.001,
        }
    }
}

/// Latest device orientation, already normalized and weighted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GyroscopeData {
    pub beta: f32,
    pub gamma: f32,
    pub enabled: bool,
}

/// Target velocity of an in-progress drag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DragData {
    pub beta: f32,
    pub gamma: f32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub velocity: Vec3,
    pub accelerate_timer: f32,
    pub decelerate_timer: f32,
    /// Accumulated rotation offset in radians.
    pub rotation: Vec3,
    pub gyroscope: GyroscopeData,
    pub drag: DragData,
}

impl Default for Interaction {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            accelerate_timer: 0.0,
            decelerate_timer: 1.0,
            rotation: Vec3::ZERO,
            gyroscope: GyroscopeData::default(),
            drag: DragData::default(),
        }
    }
}

impl Interaction {
    pub fn is_active(&self) -> bool {
        self.gyroscope.enabled || self.drag.enabled
    }

    fn target_velocity(&self) -> Vec3 {
        if self.gyroscope.enabled {
            Vec3::new(self.gyroscope.beta, self.gyroscope.gamma, 0.0)
        } else if self.drag.enabled {
            Vec3::new(self.drag.beta, self.drag.gamma, 0.0)
        } else {
            Vec3::ZERO
        }
    }
}

fn update_timer(timer: f32, friction: f32) -> f32 {
    if timer < 1.0 {
        clamp(timer + friction, 0.0, 1.0)
    } else {
        timer
    }
}

/// Advances the interaction by one frame.
///
/// The velocity eases toward the active input's target using the accelerate
/// timer, or back toward zero using the decelerate timer once input stops.
pub fn update_interaction(interaction: &Interaction, settings: &InteractionSettings) -> Interaction {
    let timer = if interaction.is_active() {
        interaction.accelerate_timer
    } else {
        interaction.decelerate_timer
    };
    let velocity = interpolate_vectors(interaction.velocity, interaction.target_velocity(), timer);
    Interaction {
        velocity,
        accelerate_timer: update_timer(interaction.accelerate_timer, settings.friction),
        decelerate_timer: update_timer(interaction.decelerate_timer, settings.friction),
        rotation: add_vectors(interaction.rotation, velocity),
        ..*interaction
    }
}

/// Restarts the ease-in when an input source becomes active.
pub fn start_interaction(interaction: &mut Interaction) {
    interaction.accelerate_timer = 0.0;
}

/// Disables every input source and restarts the ease-out.
pub fn stop_interaction(interaction: &mut Interaction) {
    interaction.gyroscope.enabled = false;
    interaction.drag.enabled = false;
    interaction.decelerate_timer = 0.0;
}

/// Flattens device tilt near the extremes and weights it into a velocity.
pub fn normalize_orientation(beta: f32, gamma: f32, settings: &InteractionSettings) -> GyroscopeData {
    GyroscopeData {
        beta: degrees_to_radians(beta + settings.beta_offset_degrees).sin()
            * settings.beta_device_weight,
        gamma: degrees_to_radians(2.0 * gamma).sin() * settings.gamma_mouse_weight,
        enabled: true,
    }
}

/// Client-space bounding box of the canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Position inside `rect` as `[0, 1]` fractions of its size.
pub fn normalize_drag_position(client: Vec2, rect: &ClientRect) -> Vec2 {
    Vec2::new(
        (client.x - rect.left) / rect.width,
        (client.y - rect.top) / rect.height,
    )
}

/// Target velocity for a drag at `normalized` box coordinates.
pub fn drag_velocity(normalized: Vec2, settings: &InteractionSettings) -> DragData {
    let x = normalized.x * 2.0 - 1.0;
    let y = normalized.y * 2.0 - 1.0;
    DragData {
        beta: y * -1.0 * settings.beta_mouse_weight,
        gamma: x * settings.gamma_mouse_weight,
        enabled: true,
    }
}

/// Canvas-local pointer position with y growing upward.
pub fn pointer_to_canvas(client: Vec2, rect: &ClientRect) -> Vec2 {
    Vec2::new(client.x - rect.left, (client.y - rect.top) * -1.0)
}

/// Maps a canvas-local pointer (see [`pointer_to_canvas`]) into clip space.
pub fn map_mouse_to_screen_space(mouse: Vec2, size: Vec2) -> Vec2 {
    Vec2::new(1.0 - 2.0 * (mouse.x / size.x), (mouse.y / size.y) * 2.0 + 1.0)
}

/// Projects a clip-space point back into the scene, just in front of the
/// object.
pub fn unproject_coordinate(screen: Vec2, projection: Mat4) -> Vec3 {
    let inverse = invert_matrix(projection);
    let point = apply_matrix_to_vector3(Vec3::new(screen.x, screen.y, -1.0), inverse);
    Vec3::new(point.x, point.y, 0.5)
}

/// Turns `model_view` to face the point under the pointer.
pub fn look_at_mouse(mouse: Vec2, size: Vec2, projection: Mat4, model_view: Mat4) -> Mat4 {
    let screen = map_mouse_to_screen_space(mouse, size);
    let target = unproject_coordinate(screen, projection);
    look_at(model_view, target, Vec3::ZERO, Vec3::Y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_interaction_stays_still() {
        let settings = InteractionSettings::default();
        let mut interaction = Interaction::default();
        for _ in 0..10 {
            interaction = update_interaction(&interaction, &settings);
        }
        assert_eq!(interaction.velocity, Vec3::ZERO);
        assert_eq!(interaction.rotation, Vec3::ZERO);
    }

    #[test]
    fn gyroscope_accelerates_toward_target() {
        let settings = InteractionSettings::default();
        let mut interaction = Interaction {
            gyroscope: GyroscopeData {
                beta: 0.02,
                gamma: -0.04,
                enabled: true,
            },
            ..Interaction::default()
        };
        start_interaction(&mut interaction);
        let first = update_interaction(&interaction, &settings);
        // The first frame uses a zero accelerate timer.
        assert_eq!(first.velocity, Vec3::ZERO);
        assert!((first.accelerate_timer - settings.friction).abs() < 1e-7);

        let second = update_interaction(&first, &settings);
        assert!(second.velocity.x > 0.0);
        assert!(second.velocity.y < 0.0);
        assert_eq!(second.rotation, first.rotation + second.velocity);
    }

    #[test]
    fn timers_saturate_at_one() {
        let settings = InteractionSettings {
            friction: 0.4,
            ..InteractionSettings::default()
        };
        let mut interaction = Interaction::default();
        for _ in 0..5 {
            interaction = update_interaction(&interaction, &settings);
        }
        assert_eq!(interaction.accelerate_timer, 1.0);
        assert_eq!(interaction.decelerate_timer, 1.0);
    }

    #[test]
    fn stopping_decelerates_with_reset_timer() {
        let mut interaction = Interaction {
            velocity: Vec3::new(0.1, 0.1, 0.0),
            drag: DragData {
                beta: 0.1,
                gamma: 0.1,
                enabled: true,
            },
            ..Interaction::default()
        };
        stop_interaction(&mut interaction);
        assert!(!interaction.is_active());
        assert_eq!(interaction.decelerate_timer, 0.0);
        let next = update_interaction(&interaction, &InteractionSettings::default());
        assert_eq!(next.velocity, Vec3::new(0.1, 0.1, 0.0));
    }

    #[test]
    fn orientation_is_offset_and_weighted() {
        let settings = InteractionSettings::default();
        let level = normalize_orientation(30.0, 0.0, &settings);
        assert!(level.beta.abs() < 1e-6);
        assert!(level.gamma.abs() < 1e-6);
        let tilted = normalize_orientation(120.0, 45.0, &settings);
        assert!((tilted.beta - settings.beta_device_weight).abs() < 1e-6);
        assert!((tilted.gamma - settings.gamma_mouse_weight).abs() < 1e-6);
    }

    #[test]
    fn pointer_is_flipped_into_canvas_space() {
        let rect = ClientRect {
            left: 10.0,
            top: 20.0,
            width: 200.0,
            height: 100.0,
        };
        assert_eq!(
            pointer_to_canvas(Vec2::new(60.0, 70.0), &rect),
            Vec2::new(50.0, -50.0)
        );
        assert_eq!(
            normalize_drag_position(Vec2::new(110.0, 70.0), &rect),
            Vec2::new(0.5, 0.5)
        );
    }

    #[test]
    fn drag_maps_box_edges_to_weighted_range() {
        let settings = InteractionSettings::default();
        let corner = drag_velocity(Vec2::new(1.0, 0.0), &settings);
        assert_eq!(corner.gamma, settings.gamma_mouse_weight);
        assert_eq!(corner.beta, settings.beta_mouse_weight);
        let center = drag_velocity(Vec2::new(0.5, 0.5), &settings);
        assert_eq!(center.beta, 0.0);
        assert_eq!(center.gamma, 0.0);
    }

    #[test]
    fn screen_space_covers_clip_range() {
        let size = Vec2::new(400.0, 400.0);
        assert_eq!(map_mouse_to_screen_space(Vec2::new(0.0, 0.0), size), Vec2::new(1.0, 1.0));
        assert_eq!(
            map_mouse_to_screen_space(Vec2::new(400.0, -400.0), size),
            Vec2::new(-1.0, -1.0)
        );
    }

    #[test]
    fn unprojected_point_sits_in_front_of_object() {
        let projection = Mat4::perspective_rh_gl(0.7, 1.0, 0.01, 100.0);
        let point = unproject_coordinate(Vec2::ZERO, projection);
        assert_eq!(point.z, 0.5);
        assert!(point.x.abs() < 1e-4 && point.y.abs() < 1e-4);
    }
}
