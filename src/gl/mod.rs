//! The GPU seam. Everything above this module talks to a
//! [`GraphicsContext`]; the WebGL backend lives in `crate::web` and the
//! headless [`RecordingContext`] backs tests and the CLI.

mod recording;

pub use recording::{BufferRecord, GlCommand, RecordedUniform, RecordingContext};

use glam::Mat4;
use thiserror::Error;

use crate::uniforms::UniformValue;

pub const DEPTH_TEXTURE_EXTENSION: &str = "WEBGL_depth_texture";

macro_rules! handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);
        )*
    };
}

handle!(
    ShaderId,
    ProgramId,
    BufferId,
    TextureId,
    FramebufferId,
    /// Location of a uniform inside one specific program.
    UniformLocation,
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attributes (`ARRAY_BUFFER`).
    Array,
    /// Indices (`ELEMENT_ARRAY_BUFFER`).
    ElementArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Triangles,
    TriangleStrip,
}

impl std::fmt::Display for Primitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Triangles => f.write_str("TRIANGLES"),
            Self::TriangleStrip => f.write_str("TRIANGLE_STRIP"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    DepthTest,
    SampleAlphaToCoverage,
}

/// What a frame buffer's target texture stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FboAttachment {
    Color,
    Depth,
}

/// Data uploaded into a new buffer object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BufferData<'a> {
    Float(&'a [f32]),
    Index(&'a [u16]),
}

impl BufferData<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::Float(data) => data.len(),
            Self::Index(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn target(&self) -> BufferTarget {
        match self {
            Self::Float(_) => BufferTarget::Array,
            Self::Index(_) => BufferTarget::ElementArray,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Float(data) => bytemuck::cast_slice(data),
            Self::Index(data) => bytemuck::cast_slice(data),
        }
    }
}

/// Contents of a new 2D texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureSource<'a> {
    /// 1×1 transparent black, shown while real images load.
    Placeholder,
    /// Tightly packed RGBA8 pixels. Mipmaps are generated only when both
    /// sides are powers of two; other sizes clamp to edge with linear
    /// filtering.
    Rgba {
        width: u32,
        height: u32,
        pixels: &'a [u8],
    },
    /// Uninitialised render target.
    Target {
        width: u32,
        height: u32,
        attachment: FboAttachment,
    },
}

#[derive(Debug, Error)]
pub enum GlError {
    #[error("WebGL is not supported on this device")]
    ContextUnavailable,
    #[error("failed to compile {stage} shader: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },
    #[error("failed to link shader program: {0}")]
    ProgramLink(String),
    #[error("failed to allocate {0}")]
    Allocation(&'static str),
    #[error("frame buffer incomplete (status {0:#x})")]
    FramebufferIncomplete(u32),
    #[error("buffer of {len} values is not a multiple of item size {item_size}")]
    BufferShape { len: usize, item_size: usize },
    #[error("{0}")]
    Backend(String),
}

pub fn is_power_of_two(value: u32) -> bool {
    value != 0 && value & (value - 1) == 0
}

/// Minimal WebGL 1 surface used by the render pipeline.
///
/// Handles are opaque; a backend hands out fresh ids and resolves them
/// internally. Creation calls return `Result` so a failed compile or an
/// incomplete frame buffer never yields a handle.
pub trait GraphicsContext {
    fn clear_color(&mut self, rgba: [f32; 4]);
    fn clear_depth(&mut self, depth: f32);
    fn enable(&mut self, capability: Capability);
    /// Depth comparison `LEQUAL`.
    fn depth_func_less_equal(&mut self);
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    /// Clears both color and depth.
    fn clear(&mut self);

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, GlError>;
    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, GlError>;
    fn use_program(&mut self, program: ProgramId);

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    fn attribute_location(&mut self, program: ProgramId, name: &str) -> Option<u32>;

    fn create_buffer(&mut self, data: BufferData<'_>) -> Result<BufferId, GlError>;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferId);
    /// Points `location` at the bound array buffer (tightly packed floats)
    /// and enables it.
    fn vertex_attrib_pointer(&mut self, location: u32, item_size: usize);

    fn create_texture(&mut self, source: TextureSource<'_>) -> Result<TextureId, GlError>;
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, texture: TextureId);

    /// Creates a frame buffer rendering into `target` and checks its
    /// completeness.
    fn create_framebuffer(
        &mut self,
        target: TextureId,
        width: u32,
        height: u32,
        attachment: FboAttachment,
    ) -> Result<FramebufferId, GlError>;
    /// `None` binds the visible canvas.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);

    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue);
    fn set_uniform_vec4(&mut self, location: UniformLocation, value: [f32; 4]);
    fn set_uniform_matrix(&mut self, location: UniformLocation, value: &Mat4);

    fn draw_arrays(&mut self, primitive: Primitive, first: i32, count: i32);
    /// Draws `count` unsigned-short indices from the bound element buffer.
    fn draw_elements(&mut self, primitive: Primitive, count: i32);

    fn has_extension(&mut self, name: &str) -> bool;
    fn max_texture_image_units(&mut self) -> i32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_of_two_detection() {
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(256));
        assert!(!is_power_of_two(0));
        assert!(!is_power_of_two(300));
    }

    #[test]
    fn buffer_data_exposes_bytes() {
        let data = [1.0f32, 2.0];
        assert_eq!(BufferData::Float(&data).as_bytes().len(), 8);
        let indices = [0u16, 1, 2];
        let index = BufferData::Index(&indices);
        assert_eq!(index.as_bytes().len(), 6);
        assert_eq!(index.target(), BufferTarget::ElementArray);
    }
}
