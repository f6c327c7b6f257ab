//! Program, frame buffer and canvas setup shared by every demo.

use glam::{Mat4, Vec2, Vec3};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::config::{ProjectionSettings, MIN_DEPTH_TEXTURE_UNITS};
use crate::gl::{
    FboAttachment, FramebufferId, GlError, GraphicsContext, ProgramId, ShaderStage, TextureId,
    TextureSource, DEPTH_TEXTURE_EXTENSION,
};
use crate::math::{apply_perspective, create_mat4, degrees_to_radians, look_at};
use crate::mesh::{AttributeLocations, MESH_ATTRIBUTES};
use crate::uniforms::UniformLocations;

/// Uniforms every main program is queried for, on top of the demo's own.
pub const WELL_KNOWN_UNIFORMS: &[&str] = &[
    "uProjectionMatrix",
    "uModelViewMatrix",
    "uNormalMatrix",
    "uDisplacement",
    "uOutlinePass",
    "uDiffuse0",
    "uDiffuse1",
    "uHasTexture",
    "uSampler0",
    "uSampler1",
    "uSampler2",
    "uDiffuseColor0",
    "uDiffuseColor1",
    "uDiffuseColor2",
    "uEmissiveColor0",
    "uEmissiveColor1",
    "uEmissiveColor2",
    "uSpecularColor0",
    "uSpecularColor1",
    "uSpecularColor2",
    "uReflectivity0",
    "uReflectivity1",
    "uReflectivity2",
    "uOpacity0",
    "uOpacity1",
    "uOpacity2",
    "uCustomShininess",
    "uShadowStrength",
    "uAmbientLightColor",
    "uLeftLightColor",
    "uRightLightColor",
    "uTopLightColor",
    "uBottomLightColor",
    "uBackgroundA",
    "uBackgroundB",
    "uAmbientLightIntensity",
    "uLeftLightIntensity",
    "uRightLightIntensity",
    "uTopLightIntensity",
    "uBottomLightIntensity",
    "uLeftLightPosition",
    "uRightLightPosition",
    "uTopLightPosition",
    "uBottomLightPosition",
    "uDepthEnabled",
    "uDepthMap",
    "uLeftLightMatrix",
    "uTime",
];

/// Sampler of the previous frame in feedback demos.
pub const FEEDBACK_SAMPLER: &str = "frameBufferTexture0";

pub const OUTLINE_UNIFORMS: &[&str] = &["uSource", "uOutline", "uResolution"];
pub const DEPTH_UNIFORMS: &[&str] = &["uProjectionMatrix", "uModelViewMatrix"];

/// Canvas dimensions: CSS box and the backing store in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub css_width: f32,
    pub css_height: f32,
    pub device_pixel_ratio: f32,
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn from_css(css_width: f32, css_height: f32, device_pixel_ratio: f32) -> Self {
        Self {
            css_width,
            css_height,
            device_pixel_ratio,
            width: (css_width * device_pixel_ratio).round().max(0.0) as u32,
            height: (css_height * device_pixel_ratio).round().max(0.0) as u32,
        }
    }

    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    pub fn aspect(&self) -> f32 {
        if self.css_height > 0.0 {
            self.css_width / self.css_height
        } else {
            1.0
        }
    }
}

/// Host facts that decide optional passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub touch_only: bool,
}

/// Compiles and links a program. Failures are logged with the driver's info
/// log and returned; no handle is produced.
pub fn init_shader_program<C>(ctx: &mut C, vertex_source: &str, fragment_source: &str) -> Result<ProgramId, GlError>
where
    C: GraphicsContext + ?Sized,
{
    let compile = |ctx: &mut C, stage: ShaderStage, source: &str| {
        ctx.compile_shader(stage, source).map_err(|err| {
            warn!("An error occurred compiling the shaders: {err}");
            err
        })
    };
    let vertex = compile(ctx, ShaderStage::Vertex, vertex_source)?;
    let fragment = compile(ctx, ShaderStage::Fragment, fragment_source)?;
    let program = ctx.link_program(vertex, fragment).map_err(|err| {
        warn!("Unable to initialize the shader program: {err}");
        err
    })?;
    debug!("linked program {program:?}");
    Ok(program)
}

/// A linked program with its resolved locations.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramInfo {
    pub program: ProgramId,
    pub uniforms: UniformLocations,
    pub attributes: AttributeLocations,
}

impl ProgramInfo {
    pub fn new<'a, C, I>(ctx: &mut C, program: ProgramId, uniform_names: I) -> Self
    where
        C: GraphicsContext + ?Sized,
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            program,
            uniforms: UniformLocations::resolve(ctx, program, uniform_names),
            attributes: AttributeLocations::resolve(ctx, program, &MESH_ATTRIBUTES),
        }
    }

    pub fn build<'a, C, I>(ctx: &mut C, vertex_source: &str, fragment_source: &str, uniform_names: I) -> Result<Self, GlError>
    where
        C: GraphicsContext + ?Sized,
        I: IntoIterator<Item = &'a str>,
    {
        let program = init_shader_program(ctx, vertex_source, fragment_source)?;
        Ok(Self::new(ctx, program, uniform_names))
    }
}

/// Off-screen render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fbo {
    pub framebuffer: FramebufferId,
    pub target_texture: TextureId,
    pub width: u32,
    pub height: u32,
}

pub fn init_frame_buffer_object<C>(
    ctx: &mut C,
    width: u32,
    height: u32,
    attachment: FboAttachment,
) -> Result<Fbo, GlError>
where
    C: GraphicsContext + ?Sized,
{
    let target_texture = ctx.create_texture(TextureSource::Target {
        width,
        height,
        attachment,
    })?;
    let framebuffer = ctx
        .create_framebuffer(target_texture, width, height, attachment)
        .map_err(|err| {
            error!("{err}");
            err
        })?;
    Ok(Fbo {
        framebuffer,
        target_texture,
        width,
        height,
    })
}

/// Shadow maps need depth textures, a pointer device and more than
/// [`MIN_DEPTH_TEXTURE_UNITS`] texture units.
pub fn supports_depth<C>(ctx: &mut C, environment: &Environment) -> bool
where
    C: GraphicsContext + ?Sized,
{
    let has_extension = ctx.has_extension(DEPTH_TEXTURE_EXTENSION);
    let max_textures = ctx.max_texture_image_units();
    has_extension && !environment.touch_only && max_textures > MIN_DEPTH_TEXTURE_UNITS
}

/// Camera projection composed with the fixed view toward the origin.
pub fn projection_matrix(settings: &ProjectionSettings, aspect: f32) -> Mat4 {
    let projection = apply_perspective(
        create_mat4(),
        degrees_to_radians(settings.field_of_view_degrees),
        aspect,
        settings.near,
        settings.far,
    );
    look_at(projection, Vec3::ZERO, settings.eye, Vec3::Y)
}

/// View-projection of a light looking at `target`.
pub fn light_view_projection(settings: &ProjectionSettings, light: Vec3, target: Vec3) -> Mat4 {
    let projection = apply_perspective(
        create_mat4(),
        degrees_to_radians(settings.field_of_view_degrees),
        1.0,
        settings.near,
        settings.far,
    );
    look_at(projection, target, light, Vec3::Y)
}
