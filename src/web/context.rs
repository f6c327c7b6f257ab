use std::collections::HashMap;

use glam::Mat4;
use log::{debug, warn};
use wasm_bindgen::JsCast;
use web_sys::{
    HtmlCanvasElement, WebGlBuffer, WebGlFramebuffer, WebGlProgram, WebGlRenderingContext as Gl,
    WebGlShader, WebGlTexture, WebGlUniformLocation,
};

use crate::gl::{
    is_power_of_two, BufferData, BufferId, BufferTarget, Capability, FboAttachment, FramebufferId,
    GlError, GraphicsContext, Primitive, ProgramId, ShaderId, ShaderStage, TextureId,
    TextureSource, UniformLocation,
};
use crate::uniforms::UniformValue;

/// Context names tried in order.
const CONTEXT_NAMES: [&str; 2] = ["experimental-webgl", "webgl"];

/// WebGL 1 backend. Hands out integer handles and keeps the JS objects
/// behind them.
pub struct WebGlContext {
    gl: Gl,
    next_id: u32,
    shaders: HashMap<ShaderId, WebGlShader>,
    programs: HashMap<ProgramId, WebGlProgram>,
    buffers: HashMap<BufferId, WebGlBuffer>,
    textures: HashMap<TextureId, WebGlTexture>,
    framebuffers: HashMap<FramebufferId, WebGlFramebuffer>,
    uniforms: HashMap<UniformLocation, WebGlUniformLocation>,
}

impl WebGlContext {
    pub fn from_canvas(canvas: &HtmlCanvasElement) -> Result<Self, GlError> {
        let context = CONTEXT_NAMES
            .iter()
            .find_map(|name| canvas.get_context(name).ok().flatten())
            .ok_or(GlError::ContextUnavailable)?;
        let gl = context
            .dyn_into::<Gl>()
            .map_err(|_| GlError::ContextUnavailable)?;
        Ok(Self {
            gl,
            next_id: 1,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            uniforms: HashMap::new(),
        })
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn buffer_target(target: BufferTarget) -> u32 {
        match target {
            BufferTarget::Array => Gl::ARRAY_BUFFER,
            BufferTarget::ElementArray => Gl::ELEMENT_ARRAY_BUFFER,
        }
    }

    fn primitive(primitive: Primitive) -> u32 {
        match primitive {
            Primitive::Triangles => Gl::TRIANGLES,
            Primitive::TriangleStrip => Gl::TRIANGLE_STRIP,
        }
    }

    fn tex_image(
        &self,
        width: u32,
        height: u32,
        format: u32,
        kind: u32,
        pixels: Option<&[u8]>,
    ) -> Result<(), GlError> {
        self.gl
            .tex_image_2d_with_i32_and_i32_and_i32_and_format_and_type_and_opt_u8_array(
                Gl::TEXTURE_2D,
                0,
                format as i32,
                width as i32,
                height as i32,
                0,
                format,
                kind,
                pixels,
            )
            .map_err(|err| GlError::Backend(format!("texImage2D failed: {err:?}")))
    }

    fn clamp_linear(&self, filter: u32) {
        let gl = &self.gl;
        gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_WRAP_S, Gl::CLAMP_TO_EDGE as i32);
        gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_WRAP_T, Gl::CLAMP_TO_EDGE as i32);
        gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_MIN_FILTER, filter as i32);
        gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_MAG_FILTER, filter as i32);
    }
}

impl GraphicsContext for WebGlContext {
    fn clear_color(&mut self, [r, g, b, a]: [f32; 4]) {
        self.gl.clear_color(r, g, b, a);
    }

    fn clear_depth(&mut self, depth: f32) {
        self.gl.clear_depth(depth);
    }

    fn enable(&mut self, capability: Capability) {
        self.gl.enable(match capability {
            Capability::DepthTest => Gl::DEPTH_TEST,
            Capability::SampleAlphaToCoverage => Gl::SAMPLE_ALPHA_TO_COVERAGE,
        });
    }

    fn depth_func_less_equal(&mut self) {
        self.gl.depth_func(Gl::LEQUAL);
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.gl.viewport(x, y, width as i32, height as i32);
    }

    fn clear(&mut self) {
        self.gl.clear(Gl::COLOR_BUFFER_BIT | Gl::DEPTH_BUFFER_BIT);
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, GlError> {
        let kind = match stage {
            ShaderStage::Vertex => Gl::VERTEX_SHADER,
            ShaderStage::Fragment => Gl::FRAGMENT_SHADER,
        };
        let shader = self
            .gl
            .create_shader(kind)
            .ok_or(GlError::Allocation("shader"))?;
        self.gl.shader_source(&shader, source);
        self.gl.compile_shader(&shader);
        let compiled = self
            .gl
            .get_shader_parameter(&shader, Gl::COMPILE_STATUS)
            .as_bool()
            .unwrap_or(false);
        if !compiled {
            let log = self.gl.get_shader_info_log(&shader).unwrap_or_default();
            self.gl.delete_shader(Some(&shader));
            return Err(GlError::ShaderCompile { stage, log });
        }
        let id = ShaderId(self.allocate());
        self.shaders.insert(id, shader);
        Ok(id)
    }

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, GlError> {
        let (Some(vertex), Some(fragment)) = (self.shaders.get(&vertex), self.shaders.get(&fragment))
        else {
            return Err(GlError::Backend("unknown shader handle".to_string()));
        };
        let program = self
            .gl
            .create_program()
            .ok_or(GlError::Allocation("program"))?;
        self.gl.attach_shader(&program, vertex);
        self.gl.attach_shader(&program, fragment);
        self.gl.link_program(&program);
        let linked = self
            .gl
            .get_program_parameter(&program, Gl::LINK_STATUS)
            .as_bool()
            .unwrap_or(false);
        if !linked {
            let log = self.gl.get_program_info_log(&program).unwrap_or_default();
            self.gl.delete_program(Some(&program));
            return Err(GlError::ProgramLink(log));
        }
        let id = ProgramId(self.allocate());
        self.programs.insert(id, program);
        Ok(id)
    }

    fn use_program(&mut self, program: ProgramId) {
        self.gl.use_program(self.programs.get(&program));
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let location = self
            .gl
            .get_uniform_location(self.programs.get(&program)?, name)?;
        let id = UniformLocation(self.allocate());
        self.uniforms.insert(id, location);
        Some(id)
    }

    fn attribute_location(&mut self, program: ProgramId, name: &str) -> Option<u32> {
        let location = self.gl.get_attrib_location(self.programs.get(&program)?, name);
        u32::try_from(location).ok()
    }

    fn create_buffer(&mut self, data: BufferData<'_>) -> Result<BufferId, GlError> {
        let buffer = self
            .gl
            .create_buffer()
            .ok_or(GlError::Allocation("buffer"))?;
        let target = Self::buffer_target(data.target());
        self.gl.bind_buffer(target, Some(&buffer));
        self.gl
            .buffer_data_with_u8_array(target, data.as_bytes(), Gl::STATIC_DRAW);
        let id = BufferId(self.allocate());
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferId) {
        self.gl
            .bind_buffer(Self::buffer_target(target), self.buffers.get(&buffer));
    }

    fn vertex_attrib_pointer(&mut self, location: u32, item_size: usize) {
        self.gl
            .vertex_attrib_pointer_with_i32(location, item_size as i32, Gl::FLOAT, false, 0, 0);
        self.gl.enable_vertex_attrib_array(location);
    }

    fn create_texture(&mut self, source: TextureSource<'_>) -> Result<TextureId, GlError> {
        let texture = self
            .gl
            .create_texture()
            .ok_or(GlError::Allocation("texture"))?;
        self.gl.bind_texture(Gl::TEXTURE_2D, Some(&texture));
        match source {
            TextureSource::Placeholder => {
                self.tex_image(1, 1, Gl::RGBA, Gl::UNSIGNED_BYTE, Some(&[0, 0, 0, 0]))?;
            }
            TextureSource::Rgba {
                width,
                height,
                pixels,
            } => {
                self.tex_image(width, height, Gl::RGBA, Gl::UNSIGNED_BYTE, Some(pixels))?;
                if is_power_of_two(width) && is_power_of_two(height) {
                    self.gl.generate_mipmap(Gl::TEXTURE_2D);
                } else {
                    self.clamp_linear(Gl::LINEAR);
                }
            }
            TextureSource::Target {
                width,
                height,
                attachment: FboAttachment::Color,
            } => {
                self.tex_image(width, height, Gl::RGBA, Gl::UNSIGNED_BYTE, None)?;
                self.clamp_linear(Gl::LINEAR);
            }
            TextureSource::Target {
                width,
                height,
                attachment: FboAttachment::Depth,
            } => {
                self.tex_image(width, height, Gl::DEPTH_COMPONENT, Gl::UNSIGNED_INT, None)?;
                self.clamp_linear(Gl::NEAREST);
            }
        }
        let id = TextureId(self.allocate());
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn active_texture(&mut self, unit: u32) {
        self.gl.active_texture(Gl::TEXTURE0 + unit);
    }

    fn bind_texture(&mut self, texture: TextureId) {
        self.gl.bind_texture(Gl::TEXTURE_2D, self.textures.get(&texture));
    }

    fn create_framebuffer(
        &mut self,
        target: TextureId,
        width: u32,
        height: u32,
        attachment: FboAttachment,
    ) -> Result<FramebufferId, GlError> {
        let texture = self
            .textures
            .get(&target)
            .ok_or_else(|| GlError::Backend(format!("unknown texture {target:?}")))?;
        let framebuffer = self
            .gl
            .create_framebuffer()
            .ok_or(GlError::Allocation("frame buffer"))?;
        self.gl.bind_framebuffer(Gl::FRAMEBUFFER, Some(&framebuffer));
        match attachment {
            FboAttachment::Color => {
                self.gl.framebuffer_texture_2d(
                    Gl::FRAMEBUFFER,
                    Gl::COLOR_ATTACHMENT0,
                    Gl::TEXTURE_2D,
                    Some(texture),
                    0,
                );
                let depth = self
                    .gl
                    .create_renderbuffer()
                    .ok_or(GlError::Allocation("render buffer"))?;
                self.gl.bind_renderbuffer(Gl::RENDERBUFFER, Some(&depth));
                self.gl.renderbuffer_storage(
                    Gl::RENDERBUFFER,
                    Gl::DEPTH_COMPONENT16,
                    width as i32,
                    height as i32,
                );
                self.gl.framebuffer_renderbuffer(
                    Gl::FRAMEBUFFER,
                    Gl::DEPTH_ATTACHMENT,
                    Gl::RENDERBUFFER,
                    Some(&depth),
                );
            }
            FboAttachment::Depth => {
                self.gl.framebuffer_texture_2d(
                    Gl::FRAMEBUFFER,
                    Gl::DEPTH_ATTACHMENT,
                    Gl::TEXTURE_2D,
                    Some(texture),
                    0,
                );
            }
        }
        let status = self.gl.check_framebuffer_status(Gl::FRAMEBUFFER);
        self.gl.bind_framebuffer(Gl::FRAMEBUFFER, None);
        if status != Gl::FRAMEBUFFER_COMPLETE {
            self.gl.delete_framebuffer(Some(&framebuffer));
            return Err(GlError::FramebufferIncomplete(status));
        }
        let id = FramebufferId(self.allocate());
        debug!("frame buffer {id:?} {width}x{height} ({attachment:?})");
        self.framebuffers.insert(id, framebuffer);
        Ok(id)
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        let target = framebuffer.and_then(|id| self.framebuffers.get(&id));
        self.gl.bind_framebuffer(Gl::FRAMEBUFFER, target);
    }

    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue) {
        let Some(location) = self.uniforms.get(&location) else {
            return;
        };
        match *value {
            UniformValue::Float(v) => self.gl.uniform1f(Some(location), v),
            UniformValue::Int(v) => self.gl.uniform1i(Some(location), v),
            UniformValue::Vec2(v) => self.gl.uniform2f(Some(location), v.x, v.y),
            UniformValue::Vec3(v) => self.gl.uniform3f(Some(location), v.x, v.y, v.z),
        }
    }

    fn set_uniform_vec4(&mut self, location: UniformLocation, [x, y, z, w]: [f32; 4]) {
        if let Some(location) = self.uniforms.get(&location) {
            self.gl.uniform4f(Some(location), x, y, z, w);
        }
    }

    fn set_uniform_matrix(&mut self, location: UniformLocation, value: &Mat4) {
        if let Some(location) = self.uniforms.get(&location) {
            self.gl
                .uniform_matrix4fv_with_f32_array(Some(location), false, &value.to_cols_array());
        }
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: i32, count: i32) {
        self.gl.draw_arrays(Self::primitive(primitive), first, count);
    }

    fn draw_elements(&mut self, primitive: Primitive, count: i32) {
        self.gl
            .draw_elements_with_i32(Self::primitive(primitive), count, Gl::UNSIGNED_SHORT, 0);
    }

    fn has_extension(&mut self, name: &str) -> bool {
        match self.gl.get_extension(name) {
            Ok(extension) => extension.is_some(),
            Err(err) => {
                warn!("extension query for {name} failed: {err:?}");
                false
            }
        }
    }

    fn max_texture_image_units(&mut self) -> i32 {
        self.gl
            .get_parameter(Gl::MAX_TEXTURE_IMAGE_UNITS)
            .ok()
            .and_then(|value| value.as_f64())
            .unwrap_or(0.0) as i32
    }
}
