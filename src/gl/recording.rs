use std::collections::{HashMap, HashSet};

use glam::Mat4;

use super::{
    BufferData, BufferId, BufferTarget, Capability, FboAttachment, FramebufferId, GlError,
    GraphicsContext, Primitive, ProgramId, ShaderId, ShaderStage, TextureId, TextureSource,
    UniformLocation, DEPTH_TEXTURE_EXTENSION,
};
use crate::uniforms::UniformValue;

/// Status reported for frame buffers when incompleteness is simulated
/// (`FRAMEBUFFER_INCOMPLETE_ATTACHMENT`).
const INCOMPLETE_ATTACHMENT: u32 = 0x8cd6;

/// One call made against a [`RecordingContext`].
#[derive(Debug, Clone, PartialEq)]
pub enum GlCommand {
    ClearColor([f32; 4]),
    ClearDepth(f32),
    Enable(Capability),
    DepthFuncLessEqual,
    Viewport { x: i32, y: i32, width: u32, height: u32 },
    Clear,
    CompileShader { id: ShaderId, stage: ShaderStage },
    LinkProgram { id: ProgramId },
    UseProgram(ProgramId),
    CreateBuffer { id: BufferId, target: BufferTarget, len: usize },
    BindBuffer { target: BufferTarget, buffer: BufferId },
    VertexAttribPointer { location: u32, item_size: usize },
    CreateTexture { id: TextureId, width: u32, height: u32, mipmaps: bool },
    ActiveTexture(u32),
    BindTexture(TextureId),
    CreateFramebuffer { id: FramebufferId, target: TextureId, attachment: FboAttachment },
    BindFramebuffer(Option<FramebufferId>),
    Uniform { location: UniformLocation, value: UniformValue },
    Uniform4 { location: UniformLocation, value: [f32; 4] },
    UniformMatrix { location: UniformLocation, value: [f32; 16] },
    DrawArrays { primitive: Primitive, first: i32, count: i32 },
    DrawElements { primitive: Primitive, count: i32 },
}

/// A buffer upload as seen by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferRecord {
    pub id: BufferId,
    pub target: BufferTarget,
    /// Number of values (not bytes) uploaded.
    pub len: usize,
    pub bytes: Vec<u8>,
}

/// A uniform write resolved back to the uniform's name.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedUniform {
    Value(UniformValue),
    Vec4([f32; 4]),
    Matrix([f32; 16]),
}

/// Headless [`GraphicsContext`] that records every call.
///
/// Uniform and attribute lookups succeed for every name unless the name was
/// hidden with [`RecordingContext::hide_uniform`]. Failures can be injected
/// to exercise the error paths of the pipeline.
#[derive(Debug)]
pub struct RecordingContext {
    commands: Vec<GlCommand>,
    next_id: u32,
    programs: Vec<ProgramId>,
    buffers: Vec<BufferRecord>,
    locations: HashMap<(ProgramId, String), UniformLocation>,
    location_names: HashMap<UniformLocation, String>,
    attributes: HashMap<(ProgramId, String), u32>,
    hidden_uniforms: HashSet<String>,
    fail_compile: Option<ShaderStage>,
    fail_link: bool,
    fail_buffers: bool,
    incomplete_framebuffers: bool,
    depth_texture: bool,
    texture_units: i32,
}

impl Default for RecordingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingContext {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            next_id: 1,
            programs: Vec::new(),
            buffers: Vec::new(),
            locations: HashMap::new(),
            location_names: HashMap::new(),
            attributes: HashMap::new(),
            hidden_uniforms: HashSet::new(),
            fail_compile: None,
            fail_link: false,
            fail_buffers: false,
            incomplete_framebuffers: false,
            depth_texture: true,
            texture_units: 16,
        }
    }

    pub fn fail_compile(mut self, stage: ShaderStage) -> Self {
        self.fail_compile = Some(stage);
        self
    }

    pub fn fail_link(mut self) -> Self {
        self.fail_link = true;
        self
    }

    /// Makes every later `create_buffer` call fail. Can be flipped after a
    /// scene is mounted to hit buffer uploads that happen mid-flight.
    pub fn set_buffer_failure(&mut self, fail: bool) {
        self.fail_buffers = fail;
    }

    pub fn incomplete_framebuffers(mut self) -> Self {
        self.incomplete_framebuffers = true;
        self
    }

    pub fn without_depth_texture(mut self) -> Self {
        self.depth_texture = false;
        self
    }

    pub fn with_texture_units(mut self, units: i32) -> Self {
        self.texture_units = units;
        self
    }

    pub fn hide_uniform(mut self, name: &str) -> Self {
        self.hidden_uniforms.insert(name.to_string());
        self
    }

    pub fn commands(&self) -> &[GlCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn programs(&self) -> &[ProgramId] {
        &self.programs
    }

    pub fn buffers(&self) -> &[BufferRecord] {
        &self.buffers
    }

    pub fn draw_calls(&self) -> Vec<&GlCommand> {
        self.commands
            .iter()
            .filter(|command| {
                matches!(
                    command,
                    GlCommand::DrawArrays { .. } | GlCommand::DrawElements { .. }
                )
            })
            .collect()
    }

    /// Frame buffer binds in order, including `None` binds of the canvas.
    pub fn framebuffer_binds(&self) -> Vec<Option<FramebufferId>> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                GlCommand::BindFramebuffer(target) => Some(*target),
                _ => None,
            })
            .collect()
    }

    /// Every write made to `name`, in order, across all programs.
    pub fn uniform_history(&self, name: &str) -> Vec<RecordedUniform> {
        self.commands
            .iter()
            .filter_map(|command| {
                let (location, value) = match command {
                    GlCommand::Uniform { location, value } => {
                        (location, RecordedUniform::Value(*value))
                    }
                    GlCommand::Uniform4 { location, value } => {
                        (location, RecordedUniform::Vec4(*value))
                    }
                    GlCommand::UniformMatrix { location, value } => {
                        (location, RecordedUniform::Matrix(*value))
                    }
                    _ => return None,
                };
                (self.location_names.get(location)? == name).then_some(value)
            })
            .collect()
    }

    pub fn last_uniform(&self, name: &str) -> Option<RecordedUniform> {
        self.uniform_history(name).pop()
    }

    pub fn uniform_name(&self, location: UniformLocation) -> Option<&str> {
        self.location_names.get(&location).map(String::as_str)
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record(&mut self, command: GlCommand) {
        self.commands.push(command);
    }
}

impl GraphicsContext for RecordingContext {
    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.record(GlCommand::ClearColor(rgba));
    }

    fn clear_depth(&mut self, depth: f32) {
        self.record(GlCommand::ClearDepth(depth));
    }

    fn enable(&mut self, capability: Capability) {
        self.record(GlCommand::Enable(capability));
    }

    fn depth_func_less_equal(&mut self) {
        self.record(GlCommand::DepthFuncLessEqual);
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.record(GlCommand::Viewport { x, y, width, height });
    }

    fn clear(&mut self) {
        self.record(GlCommand::Clear);
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, GlError> {
        if self.fail_compile == Some(stage) || source.trim().is_empty() {
            return Err(GlError::ShaderCompile {
                stage,
                log: "ERROR: 0:1: syntax error".to_string(),
            });
        }
        let id = ShaderId(self.allocate());
        self.record(GlCommand::CompileShader { id, stage });
        Ok(id)
    }

    fn link_program(&mut self, _vertex: ShaderId, _fragment: ShaderId) -> Result<ProgramId, GlError> {
        if self.fail_link {
            return Err(GlError::ProgramLink(
                "varyings do not match between stages".to_string(),
            ));
        }
        let id = ProgramId(self.allocate());
        self.programs.push(id);
        self.record(GlCommand::LinkProgram { id });
        Ok(id)
    }

    fn use_program(&mut self, program: ProgramId) {
        self.record(GlCommand::UseProgram(program));
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        if self.hidden_uniforms.contains(name) {
            return None;
        }
        let key = (program, name.to_string());
        if let Some(location) = self.locations.get(&key) {
            return Some(*location);
        }
        let location = UniformLocation(self.allocate());
        self.locations.insert(key, location);
        self.location_names.insert(location, name.to_string());
        Some(location)
    }

    fn attribute_location(&mut self, program: ProgramId, name: &str) -> Option<u32> {
        let next = self
            .attributes
            .keys()
            .filter(|(owner, _)| *owner == program)
            .count() as u32;
        Some(*self.attributes.entry((program, name.to_string())).or_insert(next))
    }

    fn create_buffer(&mut self, data: BufferData<'_>) -> Result<BufferId, GlError> {
        if self.fail_buffers {
            return Err(GlError::Allocation("buffer"));
        }
        let id = BufferId(self.allocate());
        let target = data.target();
        self.buffers.push(BufferRecord {
            id,
            target,
            len: data.len(),
            bytes: data.as_bytes().to_vec(),
        });
        self.record(GlCommand::CreateBuffer {
            id,
            target,
            len: data.len(),
        });
        Ok(id)
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferId) {
        self.record(GlCommand::BindBuffer { target, buffer });
    }

    fn vertex_attrib_pointer(&mut self, location: u32, item_size: usize) {
        self.record(GlCommand::VertexAttribPointer {
            location,
            item_size,
        });
    }

    fn create_texture(&mut self, source: TextureSource<'_>) -> Result<TextureId, GlError> {
        let (width, height, mipmaps) = match source {
            TextureSource::Placeholder => (1, 1, false),
            TextureSource::Rgba { width, height, .. } => (
                width,
                height,
                super::is_power_of_two(width) && super::is_power_of_two(height),
            ),
            TextureSource::Target { width, height, .. } => (width, height, false),
        };
        let id = TextureId(self.allocate());
        self.record(GlCommand::CreateTexture {
            id,
            width,
            height,
            mipmaps,
        });
        Ok(id)
    }

    fn active_texture(&mut self, unit: u32) {
        self.record(GlCommand::ActiveTexture(unit));
    }

    fn bind_texture(&mut self, texture: TextureId) {
        self.record(GlCommand::BindTexture(texture));
    }

    fn create_framebuffer(
        &mut self,
        target: TextureId,
        _width: u32,
        _height: u32,
        attachment: FboAttachment,
    ) -> Result<FramebufferId, GlError> {
        if self.incomplete_framebuffers {
            return Err(GlError::FramebufferIncomplete(INCOMPLETE_ATTACHMENT));
        }
        let id = FramebufferId(self.allocate());
        self.record(GlCommand::CreateFramebuffer {
            id,
            target,
            attachment,
        });
        Ok(id)
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.record(GlCommand::BindFramebuffer(framebuffer));
    }

    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue) {
        self.record(GlCommand::Uniform {
            location,
            value: *value,
        });
    }

    fn set_uniform_vec4(&mut self, location: UniformLocation, value: [f32; 4]) {
        self.record(GlCommand::Uniform4 { location, value });
    }

    fn set_uniform_matrix(&mut self, location: UniformLocation, value: &Mat4) {
        self.record(GlCommand::UniformMatrix {
            location,
            value: value.to_cols_array(),
        });
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: i32, count: i32) {
        self.record(GlCommand::DrawArrays {
            primitive,
            first,
            count,
        });
    }

    fn draw_elements(&mut self, primitive: Primitive, count: i32) {
        self.record(GlCommand::DrawElements { primitive, count });
    }

    fn has_extension(&mut self, name: &str) -> bool {
        name == DEPTH_TEXTURE_EXTENSION && self.depth_texture
    }

    fn max_texture_image_units(&mut self) -> i32 {
        self.texture_units
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_locations_are_stable_per_program() {
        let mut ctx = RecordingContext::new();
        let program = ProgramId(10);
        let first = ctx.uniform_location(program, "uTime");
        assert_eq!(ctx.uniform_location(program, "uTime"), first);
        assert_ne!(ctx.uniform_location(ProgramId(11), "uTime"), first);
    }

    #[test]
    fn hidden_uniforms_have_no_location() {
        let mut ctx = RecordingContext::new().hide_uniform("uMouse");
        assert!(ctx.uniform_location(ProgramId(1), "uMouse").is_none());
    }

    #[test]
    fn uniform_history_resolves_names() {
        let mut ctx = RecordingContext::new();
        let location = ctx.uniform_location(ProgramId(1), "uTime").unwrap();
        ctx.set_uniform(location, &UniformValue::Float(1.0));
        ctx.set_uniform(location, &UniformValue::Float(2.0));
        assert_eq!(
            ctx.uniform_history("uTime"),
            vec![
                RecordedUniform::Value(UniformValue::Float(1.0)),
                RecordedUniform::Value(UniformValue::Float(2.0)),
            ]
        );
    }

    #[test]
    fn injected_failures_surface_as_errors() {
        let mut ctx = RecordingContext::new().fail_compile(ShaderStage::Fragment);
        assert!(ctx.compile_shader(ShaderStage::Vertex, "void main() {}").is_ok());
        assert!(matches!(
            ctx.compile_shader(ShaderStage::Fragment, "void main() {}"),
            Err(GlError::ShaderCompile { stage: ShaderStage::Fragment, .. })
        ));

        let mut ctx = RecordingContext::new().incomplete_framebuffers();
        let texture = ctx.create_texture(TextureSource::Placeholder).unwrap();
        assert!(matches!(
            ctx.create_framebuffer(texture, 1, 1, FboAttachment::Color),
            Err(GlError::FramebufferIncomplete(_))
        ));
    }

    #[test]
    fn attribute_locations_are_sequential_per_program() {
        let mut ctx = RecordingContext::new();
        let program = ProgramId(3);
        assert_eq!(ctx.attribute_location(program, "aVertexPosition"), Some(0));
        assert_eq!(ctx.attribute_location(program, "aVertexNormal"), Some(1));
        assert_eq!(ctx.attribute_location(program, "aVertexPosition"), Some(0));
    }
}
