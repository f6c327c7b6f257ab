use glam::{Mat4, Vec2};

use crate::config::ProjectionSettings;
use crate::gl::GraphicsContext;
use crate::interaction::look_at_mouse;
use crate::math::{apply_transformation, create_mat4, normal_matrix, Transformation};
use crate::pipeline::{projection_matrix, CanvasSize};
use crate::uniforms::UniformLocations;

pub const PROJECTION_MATRIX: &str = "uProjectionMatrix";
pub const MODEL_VIEW_MATRIX: &str = "uModelViewMatrix";
pub const NORMAL_MATRIX: &str = "uNormalMatrix";

/// Camera matrices of one 3D frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMatrices {
    pub projection: Mat4,
    pub model_view: Mat4,
    pub normal: Mat4,
}

impl FrameMatrices {
    /// `follow_mouse` carries the canvas-local pointer when the model should
    /// turn toward it.
    pub fn compute(
        settings: &ProjectionSettings,
        canvas: &CanvasSize,
        transformation: &Transformation,
        follow_mouse: Option<Vec2>,
    ) -> Self {
        let projection = projection_matrix(settings, canvas.aspect());
        let mut model_view = apply_transformation(create_mat4(), transformation);
        if let Some(mouse) = follow_mouse {
            let size = Vec2::new(canvas.css_width, canvas.css_height);
            model_view = look_at_mouse(mouse, size, projection, model_view);
        }
        Self {
            projection,
            model_view,
            normal: normal_matrix(model_view),
        }
    }

    pub fn assign<C>(&self, ctx: &mut C, locations: &UniformLocations)
    where
        C: GraphicsContext + ?Sized,
    {
        let matrices = [
            (PROJECTION_MATRIX, &self.projection),
            (MODEL_VIEW_MATRIX, &self.model_view),
            (NORMAL_MATRIX, &self.normal),
        ];
        for (name, matrix) in matrices {
            if let Some(location) = locations.get(name) {
                ctx.set_uniform_matrix(location, matrix);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn normal_matrix_matches_model_view() {
        let transformation = Transformation {
            translation: Vec3::new(0.0, 1.0, 0.0),
            rotation: Vec3::new(0.0, 0.5, 0.0),
            scale: 2.0,
        };
        let matrices = FrameMatrices::compute(
            &ProjectionSettings::default(),
            &CanvasSize::from_css(400.0, 400.0, 2.0),
            &transformation,
            None,
        );
        assert_eq!(matrices.normal, normal_matrix(matrices.model_view));
        assert!(matrices
            .model_view
            .abs_diff_eq(apply_transformation(Mat4::IDENTITY, &transformation), 1e-6));
    }

    #[test]
    fn following_the_mouse_rebuilds_the_model_view() {
        let canvas = CanvasSize::from_css(400.0, 400.0, 1.0);
        let still = FrameMatrices::compute(
            &ProjectionSettings::default(),
            &canvas,
            &Transformation::default(),
            None,
        );
        let following = FrameMatrices::compute(
            &ProjectionSettings::default(),
            &canvas,
            &Transformation::default(),
            Some(Vec2::new(50.0, -50.0)),
        );
        assert_ne!(still.model_view, following.model_view);
        assert_eq!(still.projection, following.projection);
    }
}
