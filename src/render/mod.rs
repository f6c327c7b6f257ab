//! Per-frame state machine. One call to [`Scene::render_frame`] issues every
//! pass the demo's [`RenderMode`] needs.

mod common;

pub use common::{FrameMatrices, MODEL_VIEW_MATRIX, NORMAL_MATRIX, PROJECTION_MATRIX};

use glam::{Mat4, Vec3};
use log::trace;
use serde::{Deserialize, Serialize};

use crate::config::{DEPTH_MAP_TEXTURE_UNIT, FEEDBACK_TEXTURE_UNIT, OUTLINE_TEXTURE_UNIT, SOURCE_TEXTURE_UNIT};
use crate::gl::{BufferTarget, FboAttachment, GlError, GraphicsContext};
use crate::interaction::update_interaction;
use crate::manifest::RenderMode;
use crate::math::{add_vectors, Transformation};
use crate::mesh::{
    bind_attribute, bind_mesh_attributes, MeshBuffers, BASE_POSITION_ATTRIBUTE, POSITION_ATTRIBUTE,
};
use crate::pipeline::{init_frame_buffer_object, Fbo, FEEDBACK_SAMPLER};
use crate::scene::{MeshState, Scene};
use crate::uniforms::{
    assign_uniform, assign_uniforms, FrameInputs, UniformValue, UniformWrite, RESOLUTION_UNIFORM,
    TIME_UNIFORM,
};

const TRANSLATION_UNIFORM: &str = "uTranslation";
const ROTATION_UNIFORM: &str = "uRotation";
const SCALE_UNIFORM: &str = "uScale";

/// What a call to [`Scene::render_frame`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameOutcome {
    Drawn { draw_calls: usize },
    /// The mesh or its textures are still loading; only the canvas was
    /// cleared.
    Waiting,
    /// The idle timer expired; nothing was issued.
    Idle,
}

/// Feedback targets. Each frame writes `targets[index]` and samples the
/// other one, then flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPong {
    targets: [Fbo; 2],
    index: usize,
}

impl PingPong {
    pub fn new(a: Fbo, b: Fbo) -> Self {
        Self {
            targets: [a, b],
            index: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn write(&self) -> Fbo {
        self.targets[self.index]
    }

    pub fn read(&self) -> Fbo {
        self.targets[1 - self.index]
    }

    pub fn toggle(&mut self) {
        self.index = 1 - self.index;
    }

    pub fn reallocate<C>(&mut self, ctx: &mut C, width: u32, height: u32) -> Result<(), GlError>
    where
        C: GraphicsContext + ?Sized,
    {
        for target in &mut self.targets {
            *target = init_frame_buffer_object(ctx, width, height, FboAttachment::Color)?;
        }
        Ok(())
    }
}

/// Counts frames without interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleTimer {
    frames: u32,
    max_frames: u32,
}

impl IdleTimer {
    pub fn new(max_frames: u32) -> Self {
        Self {
            frames: 0,
            max_frames,
        }
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn is_expired(&self) -> bool {
        self.frames > self.max_frames
    }

    /// Counts one frame; `false` once the timer has expired.
    pub fn tick(&mut self) -> bool {
        if self.is_expired() {
            return false;
        }
        self.frames += 1;
        true
    }

    pub fn touch(&mut self) {
        self.frames = 0;
    }
}

/// Extra uniforms of one pass on top of the demo's own writes.
#[derive(Default)]
struct PassUniforms<'a> {
    writes: &'a [UniformWrite],
    extra: Vec<(&'static str, UniformValue)>,
    matrices: Option<&'a FrameMatrices>,
    light_matrix: Option<Mat4>,
}

impl Scene {
    /// Renders one frame.
    pub fn render_frame<C>(&mut self, ctx: &mut C, inputs: &FrameInputs) -> Result<FrameOutcome, GlError>
    where
        C: GraphicsContext + ?Sized,
    {
        if self.is_3d && !self.idle.tick() {
            return Ok(FrameOutcome::Idle);
        }
        self.frame += 1;

        if !self.poll_mesh(ctx)? || self.pending_textures.is_some() {
            ctx.clear();
            return Ok(FrameOutcome::Waiting);
        }
        let MeshState::Ready(mesh) = &self.mesh else {
            ctx.clear();
            return Ok(FrameOutcome::Waiting);
        };
        let mesh = *mesh;

        self.interaction = update_interaction(&self.interaction, &self.interaction_settings);
        self.spin = add_vectors(self.spin, self.rotation_delta);
        let matrices = self.is_3d.then(|| {
            FrameMatrices::compute(
                &self.projection,
                &self.canvas,
                &self.frame_transformation(),
                self.follow_mouse.then_some(inputs.mouse),
            )
        });

        let mut writes = self.uniforms.writes(inputs);
        if self.uniforms.get(TIME_UNIFORM).is_none() {
            writes.push(UniformWrite {
                name: TIME_UNIFORM.to_string(),
                value: UniformValue::Float(inputs.time),
            });
        }

        let draw_calls = match self.mode {
            RenderMode::Single => self.draw_single_pass(ctx, &mesh, &writes, matrices.as_ref()),
            RenderMode::Feedback => self.draw_feedback_pass(ctx, &mesh, &writes, matrices.as_ref()),
            RenderMode::Shadow => self.draw_shadow_pass(ctx, &mesh, &writes, matrices.as_ref()),
            RenderMode::Outline => self.draw_outline_pass(ctx, &mesh, &writes, matrices.as_ref()),
        };
        trace!("{}: frame {} issued {draw_calls} draws", self.name, self.frame);
        Ok(FrameOutcome::Drawn { draw_calls })
    }

    /// Pose of this frame: the mounted transformation, overridden by the
    /// demo's transform uniforms, plus the accumulated rotation.
    fn frame_transformation(&self) -> Transformation {
        let mut transformation = self.transformation;
        if let Some(UniformValue::Vec3(translation)) = self.uniforms.value(TRANSLATION_UNIFORM) {
            transformation.translation = translation;
        }
        if let Some(UniformValue::Vec3(rotation)) = self.uniforms.value(ROTATION_UNIFORM) {
            transformation.rotation = rotation;
        }
        if let Some(UniformValue::Float(scale)) = self.uniforms.value(SCALE_UNIFORM) {
            transformation.scale = scale;
        }
        let offset: Vec3 = add_vectors(self.spin, self.interaction.rotation);
        transformation.rotation = add_vectors(transformation.rotation, offset);
        transformation
    }

    fn draw_main<C>(&self, ctx: &mut C, mesh: &MeshBuffers, uniforms: PassUniforms<'_>)
    where
        C: GraphicsContext + ?Sized,
    {
        let locations = &self.main.uniforms;
        ctx.use_program(self.main.program);
        bind_mesh_attributes(ctx, &self.main.attributes, &mesh.buffers);
        if let Some(matrices) = uniforms.matrices {
            matrices.assign(ctx, locations);
        }
        if let Some(light_matrix) = uniforms.light_matrix {
            if let Some(location) = locations.get("uLeftLightMatrix") {
                ctx.set_uniform_matrix(location, &light_matrix);
            }
        }
        assign_uniforms(ctx, locations, uniforms.writes);
        for (name, value) in uniforms.extra {
            assign_uniform(ctx, locations, name, value);
        }
        mesh.draw.issue(ctx);
    }

    fn bind_canvas<C>(&self, ctx: &mut C)
    where
        C: GraphicsContext + ?Sized,
    {
        ctx.bind_framebuffer(None);
        ctx.viewport(0, 0, self.canvas.width, self.canvas.height);
    }

    fn bind_target<C>(ctx: &mut C, fbo: &Fbo)
    where
        C: GraphicsContext + ?Sized,
    {
        ctx.bind_framebuffer(Some(fbo.framebuffer));
        ctx.viewport(0, 0, fbo.width, fbo.height);
        ctx.clear();
    }

    fn draw_single_pass<C>(
        &self,
        ctx: &mut C,
        mesh: &MeshBuffers,
        writes: &[UniformWrite],
        matrices: Option<&FrameMatrices>,
    ) -> usize
    where
        C: GraphicsContext + ?Sized,
    {
        ctx.clear();
        self.draw_main(
            ctx,
            mesh,
            PassUniforms {
                writes,
                matrices,
                ..PassUniforms::default()
            },
        );
        1
    }

    fn draw_feedback_pass<C>(
        &mut self,
        ctx: &mut C,
        mesh: &MeshBuffers,
        writes: &[UniformWrite],
        matrices: Option<&FrameMatrices>,
    ) -> usize
    where
        C: GraphicsContext + ?Sized,
    {
        let Some(ping_pong) = self.ping_pong else {
            return self.draw_single_pass(ctx, mesh, writes, matrices);
        };
        let (write, read) = (ping_pong.write(), ping_pong.read());
        let sampler = || vec![(FEEDBACK_SAMPLER, UniformValue::Int(FEEDBACK_TEXTURE_UNIT as i32))];

        ctx.active_texture(FEEDBACK_TEXTURE_UNIT);
        ctx.bind_texture(read.target_texture);

        Self::bind_target(ctx, &write);
        self.draw_main(
            ctx,
            mesh,
            PassUniforms {
                writes,
                extra: sampler(),
                matrices,
                ..PassUniforms::default()
            },
        );

        self.bind_canvas(ctx);
        ctx.clear();
        self.draw_main(
            ctx,
            mesh,
            PassUniforms {
                writes,
                extra: sampler(),
                matrices,
                ..PassUniforms::default()
            },
        );

        if let Some(ping_pong) = self.ping_pong.as_mut() {
            ping_pong.toggle();
        }
        2
    }

    fn draw_shadow_pass<C>(
        &self,
        ctx: &mut C,
        mesh: &MeshBuffers,
        writes: &[UniformWrite],
        matrices: Option<&FrameMatrices>,
    ) -> usize
    where
        C: GraphicsContext + ?Sized,
    {
        let Some(depth) = self.depth.as_ref() else {
            return self.draw_single_pass(ctx, mesh, writes, matrices);
        };
        let model_view = matrices.map(|m| m.model_view).unwrap_or(Mat4::IDENTITY);

        Self::bind_target(ctx, &depth.fbo);
        ctx.use_program(depth.program.program);
        bind_attribute(ctx, &depth.program.attributes, POSITION_ATTRIBUTE, &mesh.buffers.vertex);
        if let Some(index) = mesh.buffers.index {
            ctx.bind_buffer(BufferTarget::ElementArray, index.id);
        }
        let shadow = FrameMatrices {
            projection: depth.light_matrix,
            model_view,
            normal: Mat4::IDENTITY,
        };
        shadow.assign(ctx, &depth.program.uniforms);
        mesh.draw.issue(ctx);

        self.bind_canvas(ctx);
        ctx.clear();
        ctx.active_texture(DEPTH_MAP_TEXTURE_UNIT);
        ctx.bind_texture(depth.fbo.target_texture);
        self.draw_main(
            ctx,
            mesh,
            PassUniforms {
                writes,
                extra: vec![("uDepthMap", UniformValue::Int(DEPTH_MAP_TEXTURE_UNIT as i32))],
                matrices,
                light_matrix: Some(depth.light_matrix),
            },
        );
        2
    }

    fn draw_outline_pass<C>(
        &self,
        ctx: &mut C,
        mesh: &MeshBuffers,
        writes: &[UniformWrite],
        matrices: Option<&FrameMatrices>,
    ) -> usize
    where
        C: GraphicsContext + ?Sized,
    {
        let Some(outline) = self.outline.as_ref() else {
            return self.draw_single_pass(ctx, mesh, writes, matrices);
        };

        for (target, flag) in [(&outline.silhouette, 1.0), (&outline.shading, 0.0)] {
            Self::bind_target(ctx, target);
            self.draw_main(
                ctx,
                mesh,
                PassUniforms {
                    writes,
                    extra: vec![("uOutlinePass", UniformValue::Float(flag))],
                    matrices,
                    ..PassUniforms::default()
                },
            );
        }

        self.bind_canvas(ctx);
        ctx.clear();
        let program = &outline.program;
        ctx.use_program(program.program);
        bind_attribute(
            ctx,
            &program.attributes,
            BASE_POSITION_ATTRIBUTE,
            &outline.quad.buffers.vertex,
        );
        ctx.active_texture(OUTLINE_TEXTURE_UNIT);
        ctx.bind_texture(outline.silhouette.target_texture);
        assign_uniform(ctx, &program.uniforms, "uOutline", UniformValue::Int(OUTLINE_TEXTURE_UNIT as i32));
        ctx.active_texture(SOURCE_TEXTURE_UNIT);
        ctx.bind_texture(outline.shading.target_texture);
        assign_uniform(ctx, &program.uniforms, "uSource", UniformValue::Int(SOURCE_TEXTURE_UNIT as i32));
        assign_uniform(
            ctx,
            &program.uniforms,
            RESOLUTION_UNIFORM,
            UniformValue::Vec2(self.canvas.as_vec2()),
        );
        outline.quad.draw.issue(ctx);
        3
    }
}
