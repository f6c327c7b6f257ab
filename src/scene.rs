//! A mounted demo: every GL resource it owns plus the state its render loop
//! advances frame by frame.

use std::collections::HashMap;

use glam::{Mat4, Vec3};
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::color::Palette;
use crate::config::{light_projection, ProjectionSettings, DEPTH_MAP_SIZE, MAX_IDLE_FRAMES};
use crate::gl::{Capability, FboAttachment, GlError, GraphicsContext, TextureId};
use crate::input::PointerSnapshot;
use crate::interaction::{start_interaction, stop_interaction, Interaction, InteractionSettings};
use crate::lighting::{palette_background, palette_writes, LightOverrides, LightSettings};
use crate::loader::{LoadHandle, MeshLoadError, MeshLoader, MeshResponse};
use crate::manifest::{DemoConfig, MeshConfig, RenderMode};
use crate::math::Transformation;
use crate::mesh::{build_mesh_buffers, init_base_mesh_buffers, MeshBuffers, MeshSource};
use crate::obj::{LoadedMesh, Material};
use crate::pipeline::{
    init_frame_buffer_object, light_view_projection, supports_depth, CanvasSize, Environment, Fbo,
    ProgramInfo, DEPTH_UNIFORMS, FEEDBACK_SAMPLER, OUTLINE_UNIFORMS, WELL_KNOWN_UNIFORMS,
};
use crate::render::{IdleTimer, PingPong};
use crate::shaders::{BASE_VERTEX_SHADER, DEPTH_FRAGMENT_SHADER, DEPTH_VERTEX_SHADER, OUTLINE_FRAGMENT_SHADER};
use crate::texture::{
    bind_materials, init_placeholder_texture, remove_materials, texture_requests, upload_images,
    DecodedImage, JoinOutcome, TextureJoin, TextureRequest,
};
use crate::uniforms::{
    assign_uniform, assign_uniforms, UniformEditError, UniformSettings, UniformValue,
};

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to initialize {stage}: {source}")]
    Gl {
        stage: &'static str,
        #[source]
        source: GlError,
    },
}

trait GlContext<T> {
    fn during(self, stage: &'static str) -> Result<T, SceneError>;
}

impl<T> GlContext<T> for Result<T, GlError> {
    fn during(self, stage: &'static str) -> Result<T, SceneError> {
        self.map_err(|source| SceneError::Gl { stage, source })
    }
}

/// Geometry readiness. OBJ meshes stay `Loading` until the loader responds.
#[derive(Debug)]
pub enum MeshState {
    Ready(MeshBuffers),
    Loading(LoadHandle),
    Failed(MeshLoadError),
}

/// Depth-only pass rendering the mesh from the left light.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthPass {
    pub program: ProgramInfo,
    pub fbo: Fbo,
    /// Light view-projection, computed once at mount.
    pub light_matrix: Mat4,
}

/// Silhouette and shading targets plus the program that composites them.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlinePass {
    pub program: ProgramInfo,
    pub silhouette: Fbo,
    pub shading: Fbo,
    pub quad: MeshBuffers,
}

#[derive(Debug)]
pub struct Scene {
    pub(crate) name: String,
    pub(crate) mode: RenderMode,
    pub(crate) canvas: CanvasSize,
    pub(crate) uniforms: UniformSettings,
    pub(crate) lights: LightSettings,
    pub(crate) palette: Palette,
    pub(crate) projection: ProjectionSettings,
    pub(crate) main: ProgramInfo,
    pub(crate) depth: Option<DepthPass>,
    pub(crate) depth_supported: bool,
    pub(crate) ping_pong: Option<PingPong>,
    pub(crate) outline: Option<OutlinePass>,
    pub(crate) placeholder: TextureId,
    pub(crate) mesh: MeshState,
    pub(crate) is_3d: bool,
    pub(crate) materials: Vec<Material>,
    pub(crate) textures: HashMap<usize, TextureId>,
    pub(crate) pending_textures: Option<TextureJoin>,
    pub(crate) transformation: Transformation,
    pub(crate) rotation_delta: Vec3,
    /// Rotation accumulated from `rotation_delta`.
    pub(crate) spin: Vec3,
    pub(crate) follow_mouse: bool,
    pub(crate) interaction: Interaction,
    pub(crate) interaction_settings: InteractionSettings,
    pub(crate) idle: IdleTimer,
    pub(crate) pointer_activity: u64,
    pub(crate) hovering: bool,
    pub(crate) frame: u64,
}

impl Scene {
    /// Mounts `config` on `ctx`.
    ///
    /// Every program and frame buffer the demo's mode needs is created here;
    /// any failure aborts the mount with no partially usable scene. OBJ
    /// meshes are handed to the [`MeshLoader`] and finish mounting on a
    /// later frame.
    pub fn initialize<C>(
        ctx: &mut C,
        config: DemoConfig,
        canvas: CanvasSize,
        environment: Environment,
    ) -> Result<Self, SceneError>
    where
        C: GraphicsContext + ?Sized,
    {
        info!(
            "mounting demo {:?} ({:?}, {}x{})",
            config.name, config.mode, canvas.width, canvas.height
        );
        ctx.clear_color([0.0, 0.0, 0.0, 0.0]);
        ctx.clear_depth(1.0);
        ctx.enable(Capability::DepthTest);
        ctx.depth_func_less_equal();
        ctx.clear();
        ctx.viewport(0, 0, canvas.width, canvas.height);
        ctx.enable(Capability::SampleAlphaToCoverage);

        let uniforms = UniformSettings::new(config.uniforms, canvas.as_vec2());
        let mut uniform_names: Vec<&str> = WELL_KNOWN_UNIFORMS.to_vec();
        uniform_names.extend(uniforms.names());
        if config.mode == RenderMode::Feedback {
            uniform_names.push(FEEDBACK_SAMPLER);
        }
        let main = ProgramInfo::build(
            ctx,
            &config.vertex_source,
            &config.fragment_source,
            uniform_names.iter().copied(),
        )
        .during("main program")?;

        let ping_pong = match config.mode {
            RenderMode::Feedback => Some(PingPong::new(
                init_frame_buffer_object(ctx, canvas.width, canvas.height, FboAttachment::Color)
                    .during("feedback frame buffer A")?,
                init_frame_buffer_object(ctx, canvas.width, canvas.height, FboAttachment::Color)
                    .during("feedback frame buffer B")?,
            )),
            _ => None,
        };

        let lights = LightSettings::from_overrides(&config.lights);
        let depth_supported = config.mode == RenderMode::Shadow && supports_depth(ctx, &environment);
        let depth = if depth_supported {
            let vertex = config.depth_vertex_source.as_deref().unwrap_or(DEPTH_VERTEX_SHADER);
            let fragment = config.depth_fragment_source.as_deref().unwrap_or(DEPTH_FRAGMENT_SHADER);
            let program = ProgramInfo::build(ctx, vertex, fragment, DEPTH_UNIFORMS.iter().copied())
                .during("depth program")?;
            let fbo = init_frame_buffer_object(ctx, DEPTH_MAP_SIZE, DEPTH_MAP_SIZE, FboAttachment::Depth)
                .during("depth frame buffer")?;
            let light_matrix = light_view_projection(
                &light_projection(),
                lights.positions.left,
                config.transformation.translation,
            );
            Some(DepthPass {
                program,
                fbo,
                light_matrix,
            })
        } else {
            if config.mode == RenderMode::Shadow {
                info!("depth textures unavailable; shadows disabled");
            }
            None
        };

        let outline = match config.mode {
            RenderMode::Outline => Some(init_outline_pass(ctx, canvas)?),
            _ => None,
        };

        let placeholder = init_placeholder_texture(ctx).during("placeholder texture")?;

        let is_3d = config.mesh.is_3d();
        let mesh = match config.mesh {
            MeshConfig::BaseTriangles => MeshState::Ready(
                build_mesh_buffers(ctx, &MeshSource::BaseTriangles).during("mesh buffers")?,
            ),
            MeshConfig::FaceArray(faces) => MeshState::Ready(
                build_mesh_buffers(ctx, &MeshSource::FaceArray(faces)).during("mesh buffers")?,
            ),
            MeshConfig::Obj(request) => MeshState::Loading(MeshLoader::spawn(request)),
        };

        let mut scene = Self {
            name: config.name,
            mode: config.mode,
            canvas,
            uniforms,
            lights,
            palette: config.palette,
            projection: config.projection,
            main,
            depth,
            depth_supported,
            ping_pong,
            outline,
            placeholder,
            mesh,
            is_3d,
            materials: Vec::new(),
            textures: HashMap::new(),
            pending_textures: None,
            transformation: config.transformation,
            rotation_delta: config.rotation_delta,
            spin: Vec3::ZERO,
            follow_mouse: config.follow_mouse,
            interaction: Interaction::default(),
            interaction_settings: InteractionSettings::default(),
            idle: IdleTimer::new(MAX_IDLE_FRAMES),
            pointer_activity: 0,
            hovering: false,
            frame: 0,
        };
        scene.assign_static_uniforms(ctx);
        Ok(scene)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    pub fn uniforms(&self) -> &UniformSettings {
        &self.uniforms
    }

    pub fn lights(&self) -> &LightSettings {
        &self.lights
    }

    pub fn main_program(&self) -> &ProgramInfo {
        &self.main
    }

    pub fn depth_pass(&self) -> Option<&DepthPass> {
        self.depth.as_ref()
    }

    /// Whether the shadow pass runs; `false` for every non-shadow mode.
    pub fn depth_supported(&self) -> bool {
        self.depth_supported
    }

    pub fn outline_pass(&self) -> Option<&OutlinePass> {
        self.outline.as_ref()
    }

    pub fn ping_pong(&self) -> Option<&PingPong> {
        self.ping_pong.as_ref()
    }

    pub fn mesh_state(&self) -> &MeshState {
        &self.mesh
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn interaction_mut(&mut self) -> &mut Interaction {
        &mut self.interaction
    }

    pub fn interaction_settings(&self) -> &InteractionSettings {
        &self.interaction_settings
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn is_idle(&self) -> bool {
        self.is_3d && self.idle.is_expired()
    }

    /// Restarts the idle countdown; called on every interaction event.
    pub fn touch(&mut self) {
        self.idle.touch();
    }

    /// Folds the latest pointer and orientation readings into the
    /// interaction model. Any new activity restarts the idle timer.
    pub fn apply_pointer(&mut self, pointer: &PointerSnapshot) {
        if pointer.activity != self.pointer_activity {
            self.pointer_activity = pointer.activity;
            self.idle.touch();
        }

        let was_active = self.interaction.is_active();
        if pointer.hovering != self.hovering {
            self.hovering = pointer.hovering;
            if pointer.hovering {
                start_interaction(&mut self.interaction);
            } else {
                stop_interaction(&mut self.interaction);
            }
        }
        self.interaction.gyroscope = pointer.gyroscope.unwrap_or_default();
        self.interaction.drag = pointer.drag.unwrap_or_default();
        let is_active = self.interaction.is_active();
        if is_active && !was_active {
            start_interaction(&mut self.interaction);
        } else if was_active && !is_active {
            stop_interaction(&mut self.interaction);
        }
    }

    /// Textures still being fetched, if any.
    pub fn pending_textures(&self) -> &[TextureRequest] {
        self.pending_textures
            .as_ref()
            .map(TextureJoin::requests)
            .unwrap_or_default()
    }

    /// Resizes the drawing buffer: viewport, uniform index 0 and every
    /// canvas-sized frame buffer.
    pub fn resize<C>(&mut self, ctx: &mut C, canvas: CanvasSize) -> Result<(), GlError>
    where
        C: GraphicsContext + ?Sized,
    {
        if canvas == self.canvas {
            return Ok(());
        }
        debug!("resizing {} to {}x{}", self.name, canvas.width, canvas.height);
        self.canvas = canvas;
        ctx.viewport(0, 0, canvas.width, canvas.height);
        self.uniforms.set_resolution(canvas.as_vec2());
        if let Some(ping_pong) = self.ping_pong.as_mut() {
            ping_pong.reallocate(ctx, canvas.width, canvas.height)?;
        }
        if let Some(outline) = self.outline.as_mut() {
            outline.silhouette =
                init_frame_buffer_object(ctx, canvas.width, canvas.height, FboAttachment::Color)?;
            outline.shading =
                init_frame_buffer_object(ctx, canvas.width, canvas.height, FboAttachment::Color)?;
        }
        Ok(())
    }

    /// Merges new lighting overrides and pushes the result.
    pub fn update_lights<C>(&mut self, ctx: &mut C, overrides: &LightOverrides)
    where
        C: GraphicsContext + ?Sized,
    {
        self.lights.merge(overrides);
        self.assign_static_uniforms(ctx);
    }

    pub fn update_palette<C>(&mut self, ctx: &mut C, palette: Palette)
    where
        C: GraphicsContext + ?Sized,
    {
        self.palette = palette;
        self.assign_static_uniforms(ctx);
    }

    /// Applies a user edit; the new value reaches the GPU on the next frame.
    pub fn set_uniform(&mut self, name: &str, value: UniformValue) -> Result<(), UniformEditError> {
        self.uniforms.set_value(name, value)?;
        self.idle.touch();
        Ok(())
    }

    /// Feeds one texture completion into the pending join and applies the
    /// join's outcome once it settles.
    pub fn complete_texture<C>(
        &mut self,
        ctx: &mut C,
        index: usize,
        result: Result<DecodedImage, String>,
    ) -> Result<JoinOutcome, GlError>
    where
        C: GraphicsContext + ?Sized,
    {
        let outcome = match self.pending_textures.as_mut() {
            Some(join) => join.complete(index, result),
            None => return Ok(JoinOutcome::Pending),
        };
        self.apply_textures(ctx, outcome.clone())?;
        Ok(outcome)
    }

    /// Fails every pending texture, which selects the untextured path.
    /// Used by hosts that cannot fetch images.
    pub fn fail_pending_textures<C>(&mut self, ctx: &mut C, reason: &str) -> Result<(), GlError>
    where
        C: GraphicsContext + ?Sized,
    {
        if self.pending_textures.is_some() {
            self.complete_texture(ctx, 0, Err(reason.to_string()))?;
        }
        Ok(())
    }

    /// Binds loaded textures, or restores the untextured materials when the
    /// join failed.
    pub fn apply_textures<C>(&mut self, ctx: &mut C, outcome: JoinOutcome) -> Result<(), GlError>
    where
        C: GraphicsContext + ?Sized,
    {
        match outcome {
            JoinOutcome::Pending => return Ok(()),
            JoinOutcome::Ready(images) => {
                self.textures = upload_images(ctx, &images)?;
                ctx.use_program(self.main.program);
                bind_materials(ctx, &self.main.uniforms, &self.materials, &self.textures);
                info!("{}: {} textures bound", self.name, self.textures.len());
            }
            JoinOutcome::Failed(err) => {
                warn!("{err}; rendering without textures");
                ctx.use_program(self.main.program);
                remove_materials(ctx, &self.main.uniforms, &self.materials, self.placeholder);
            }
        }
        self.pending_textures = None;
        Ok(())
    }

    /// Polls the mesh loader. Returns `true` once buffers are ready.
    pub(crate) fn poll_mesh<C>(&mut self, ctx: &mut C) -> Result<bool, GlError>
    where
        C: GraphicsContext + ?Sized,
    {
        let response = match &mut self.mesh {
            MeshState::Ready(_) => return Ok(true),
            MeshState::Failed(_) => return Ok(false),
            MeshState::Loading(handle) => match handle.try_take() {
                Some(response) => response,
                None => return Ok(false),
            },
        };
        self.receive_mesh(ctx, response)
    }

    /// Blocks until an in-flight mesh load responds. Returns `true` once
    /// buffers are ready.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn wait_for_mesh<C>(&mut self, ctx: &mut C) -> Result<bool, GlError>
    where
        C: GraphicsContext + ?Sized,
    {
        match &mut self.mesh {
            MeshState::Ready(_) => Ok(true),
            MeshState::Failed(_) => Ok(false),
            MeshState::Loading(handle) => {
                let response = handle.wait();
                self.receive_mesh(ctx, response)
            }
        }
    }

    /// Settles `self.mesh` from a loader response. A failed upload leaves
    /// the mesh `Failed` and surfaces the error once.
    fn receive_mesh<C>(&mut self, ctx: &mut C, response: MeshResponse) -> Result<bool, GlError>
    where
        C: GraphicsContext + ?Sized,
    {
        let result = match response {
            Ok(mesh) => self.mount_obj(ctx, mesh).map_err(|err| {
                let cause = MeshLoadError::Upload(err.to_string());
                (cause, Some(err))
            }),
            Err(err) => Err((err, None)),
        };
        match result {
            Ok(()) => Ok(true),
            Err((cause, gl_error)) => {
                error!("{}: {cause}", self.name);
                self.mesh = MeshState::Failed(cause);
                gl_error.map_or(Ok(false), Err)
            }
        }
    }

    fn mount_obj<C>(&mut self, ctx: &mut C, mut mesh: LoadedMesh) -> Result<(), GlError>
    where
        C: GraphicsContext + ?Sized,
    {
        info!(
            "{}: mesh loaded ({} vertices, {} materials)",
            self.name,
            mesh.vertex_count(),
            mesh.materials.len()
        );
        let materials = std::mem::take(&mut mesh.materials);
        let buffers = build_mesh_buffers(ctx, &MeshSource::Obj(mesh))?;
        self.materials = materials;
        self.mesh = MeshState::Ready(buffers);

        let requests = texture_requests(&self.materials);
        if requests.is_empty() {
            ctx.use_program(self.main.program);
            bind_materials(ctx, &self.main.uniforms, &self.materials, &HashMap::new());
        } else {
            debug!("{}: waiting for {} textures", self.name, requests.len());
            self.pending_textures = Some(TextureJoin::new(requests));
        }
        Ok(())
    }

    /// Uniforms that only change on explicit updates: lights, palette and
    /// the shadow toggle.
    fn assign_static_uniforms<C>(&mut self, ctx: &mut C)
    where
        C: GraphicsContext + ?Sized,
    {
        let locations = &self.main.uniforms;
        ctx.use_program(self.main.program);
        assign_uniforms(ctx, locations, &self.lights.uniform_writes());
        assign_uniforms(ctx, locations, &palette_writes(&self.palette));
        for (name, rgba) in palette_background(&self.palette) {
            if let Some(location) = locations.get(name) {
                ctx.set_uniform_vec4(location, rgba);
            }
        }
        assign_uniform(
            ctx,
            locations,
            "uDepthEnabled",
            UniformValue::Float(if self.depth.is_some() { 1.0 } else { 0.0 }),
        );
    }
}

fn init_outline_pass<C>(ctx: &mut C, canvas: CanvasSize) -> Result<OutlinePass, SceneError>
where
    C: GraphicsContext + ?Sized,
{
    let program = ProgramInfo::build(
        ctx,
        BASE_VERTEX_SHADER,
        OUTLINE_FRAGMENT_SHADER,
        OUTLINE_UNIFORMS.iter().copied(),
    )
    .during("outline program")?;
    let silhouette = init_frame_buffer_object(ctx, canvas.width, canvas.height, FboAttachment::Color)
        .during("outline frame buffer")?;
    let shading = init_frame_buffer_object(ctx, canvas.width, canvas.height, FboAttachment::Color)
        .during("shading frame buffer")?;
    let quad = init_base_mesh_buffers(ctx).during("outline quad")?;
    Ok(OutlinePass {
        program,
        silhouette,
        shading,
        quad,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{GlCommand, RecordedUniform, RecordingContext, ShaderStage};
    use crate::interaction::GyroscopeData;
    use crate::lighting::DEFAULT_BRIGHTNESS;
    use crate::loader::MeshRequest;
    use crate::render::FrameOutcome;
    use crate::uniforms::FrameInputs;

    fn config(mode: RenderMode, mesh: MeshConfig) -> DemoConfig {
        let mut config = DemoConfig::new("test", mesh, "void main() {}", "void main() {}");
        config.mode = mode;
        config
    }

    fn canvas() -> CanvasSize {
        CanvasSize::from_css(400.0, 400.0, 1.0)
    }

    #[test]
    fn baseline_state_precedes_program_creation() {
        let mut ctx = RecordingContext::new();
        Scene::initialize(
            &mut ctx,
            config(RenderMode::Single, MeshConfig::BaseTriangles),
            canvas(),
            Environment::default(),
        )
        .unwrap();
        let commands = ctx.commands();
        assert_eq!(commands[0], GlCommand::ClearColor([0.0; 4]));
        assert_eq!(commands[1], GlCommand::ClearDepth(1.0));
        assert_eq!(commands[2], GlCommand::Enable(Capability::DepthTest));
        assert_eq!(commands[3], GlCommand::DepthFuncLessEqual);
        assert!(commands.contains(&GlCommand::Enable(Capability::SampleAlphaToCoverage)));
    }

    #[test]
    fn compile_failure_aborts_mount() {
        let mut ctx = RecordingContext::new().fail_compile(ShaderStage::Fragment);
        let err = Scene::initialize(
            &mut ctx,
            config(RenderMode::Single, MeshConfig::BaseTriangles),
            canvas(),
            Environment::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SceneError::Gl {
                stage: "main program",
                source: GlError::ShaderCompile { .. }
            }
        ));
        assert!(ctx.draw_calls().is_empty());
    }

    #[test]
    fn shadow_mode_without_depth_support_skips_depth_pass() {
        let mut ctx = RecordingContext::new().without_depth_texture();
        let scene = Scene::initialize(
            &mut ctx,
            config(RenderMode::Shadow, MeshConfig::BaseTriangles),
            canvas(),
            Environment::default(),
        )
        .unwrap();
        assert!(scene.depth_pass().is_none());
        assert_eq!(ctx.programs().len(), 1);
        assert_eq!(
            ctx.last_uniform("uDepthEnabled"),
            Some(RecordedUniform::Value(UniformValue::Float(0.0)))
        );
    }

    #[test]
    fn shadow_mode_builds_depth_resources() {
        let mut ctx = RecordingContext::new();
        let scene = Scene::initialize(
            &mut ctx,
            config(RenderMode::Shadow, MeshConfig::BaseTriangles),
            canvas(),
            Environment::default(),
        )
        .unwrap();
        let depth = scene.depth_pass().unwrap();
        assert_eq!((depth.fbo.width, depth.fbo.height), (DEPTH_MAP_SIZE, DEPTH_MAP_SIZE));
        assert_eq!(ctx.programs().len(), 2);
        assert_eq!(
            ctx.last_uniform("uDepthEnabled"),
            Some(RecordedUniform::Value(UniformValue::Float(1.0)))
        );
    }

    #[test]
    fn touch_devices_never_get_shadows() {
        let mut ctx = RecordingContext::new();
        let scene = Scene::initialize(
            &mut ctx,
            config(RenderMode::Shadow, MeshConfig::BaseTriangles),
            canvas(),
            Environment { touch_only: true },
        )
        .unwrap();
        assert!(scene.depth_pass().is_none());
    }

    #[test]
    fn incomplete_outline_target_aborts_mount() {
        let mut ctx = RecordingContext::new().incomplete_framebuffers();
        let err = Scene::initialize(
            &mut ctx,
            config(RenderMode::Outline, MeshConfig::BaseTriangles),
            canvas(),
            Environment::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("outline frame buffer"));
    }

    #[test]
    fn light_updates_are_merged_and_pushed() {
        let mut ctx = RecordingContext::new();
        let mut scene = Scene::initialize(
            &mut ctx,
            config(RenderMode::Single, MeshConfig::BaseTriangles),
            canvas(),
            Environment::default(),
        )
        .unwrap();
        assert_eq!(scene.lights().brightness, DEFAULT_BRIGHTNESS);
        scene.update_lights(
            &mut ctx,
            &LightOverrides {
                brightness: Some(1.0),
                ..LightOverrides::default()
            },
        );
        assert_eq!(
            ctx.last_uniform("uLeftLightIntensity"),
            Some(RecordedUniform::Value(UniformValue::Float(0.1)))
        );
    }

    #[test]
    fn background_colors_keep_alpha() {
        let mut ctx = RecordingContext::new();
        let mut scene = Scene::initialize(
            &mut ctx,
            config(RenderMode::Single, MeshConfig::BaseTriangles),
            canvas(),
            Environment::default(),
        )
        .unwrap();
        scene.update_palette(
            &mut ctx,
            Palette {
                background_a: "rgba(255, 0, 0, 0.5)".to_string(),
                ..Palette::default()
            },
        );
        assert_eq!(
            ctx.last_uniform("uBackgroundA"),
            Some(RecordedUniform::Vec4([1.0, 0.0, 0.0, 0.5]))
        );
    }

    #[test]
    fn pointer_activity_drives_interaction_and_idle() {
        let mut ctx = RecordingContext::new();
        let mut scene = Scene::initialize(
            &mut ctx,
            config(RenderMode::Single, MeshConfig::BaseTriangles),
            canvas(),
            Environment::default(),
        )
        .unwrap();
        for _ in 0..5 {
            scene.idle.tick();
        }
        let gyroscope = GyroscopeData {
            beta: 0.01,
            gamma: 0.02,
            enabled: true,
        };
        scene.apply_pointer(&PointerSnapshot {
            gyroscope: Some(gyroscope),
            activity: 1,
            ..PointerSnapshot::default()
        });
        assert_eq!(scene.idle.frames(), 0);
        assert!(scene.interaction().is_active());
        assert_eq!(scene.interaction().accelerate_timer, 0.0);

        scene.apply_pointer(&PointerSnapshot {
            activity: 2,
            ..PointerSnapshot::default()
        });
        assert!(!scene.interaction().is_active());
        assert_eq!(scene.interaction().decelerate_timer, 0.0);
    }

    #[test]
    fn obj_without_textures_binds_default_materials() {
        let mut ctx = RecordingContext::new();
        let request = MeshRequest {
            obj_source: "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n".to_string(),
            mtl_source: Some("newmtl plain\nKd 0.5 0.5 0.5\n".to_string()),
            ..MeshRequest::default()
        };
        let mut scene = Scene::initialize(
            &mut ctx,
            config(RenderMode::Single, MeshConfig::Obj(request)),
            canvas(),
            Environment::default(),
        )
        .unwrap();
        let mut ready = false;
        for _ in 0..1000 {
            if scene.poll_mesh(&mut ctx).unwrap() {
                ready = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert!(ready);
        assert!(scene.pending_textures().is_empty());
        assert_eq!(
            ctx.last_uniform("uDiffuseColor0"),
            Some(RecordedUniform::Value(UniformValue::Vec3(Vec3::splat(0.5))))
        );
    }

    fn triangle_obj() -> MeshConfig {
        MeshConfig::Obj(MeshRequest {
            obj_source: "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n".to_string(),
            ..MeshRequest::default()
        })
    }

    #[test]
    fn failed_mesh_upload_is_reported_once_then_waits() {
        let mut ctx = RecordingContext::new();
        let mut scene = Scene::initialize(
            &mut ctx,
            config(RenderMode::Single, triangle_obj()),
            canvas(),
            Environment::default(),
        )
        .unwrap();
        ctx.set_buffer_failure(true);

        let mut failure = None;
        for _ in 0..500 {
            match scene.render_frame(&mut ctx, &FrameInputs::default()) {
                Ok(FrameOutcome::Waiting) => std::thread::sleep(std::time::Duration::from_millis(1)),
                Ok(other) => panic!("unexpected outcome {other:?}"),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        assert!(matches!(failure, Some(GlError::Allocation("buffer"))));
        assert!(matches!(
            scene.mesh_state(),
            MeshState::Failed(MeshLoadError::Upload(_))
        ));
        assert_eq!(
            scene.render_frame(&mut ctx, &FrameInputs::default()).unwrap(),
            FrameOutcome::Waiting
        );
    }

    #[test]
    fn waiting_on_a_failed_upload_keeps_the_cause() {
        let mut ctx = RecordingContext::new();
        let mut scene = Scene::initialize(
            &mut ctx,
            config(RenderMode::Single, triangle_obj()),
            canvas(),
            Environment::default(),
        )
        .unwrap();
        ctx.set_buffer_failure(true);

        assert!(scene.wait_for_mesh(&mut ctx).is_err());
        match scene.mesh_state() {
            MeshState::Failed(MeshLoadError::Upload(cause)) => {
                assert!(cause.contains("buffer"), "{cause}")
            }
            other => panic!("unexpected mesh state {other:?}"),
        }
        assert!(!scene.wait_for_mesh(&mut ctx).unwrap());
    }

    #[test]
    fn failed_texture_join_falls_back_to_placeholder() {
        let mut ctx = RecordingContext::new();
        let request = MeshRequest {
            obj_source: "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nf 1/1 2/1 3/1\n".to_string(),
            mtl_source: Some("newmtl wood\nmap_Kd crate.png\n".to_string()),
            textures: HashMap::from([("crate.png".to_string(), "/crate.png".to_string())]),
        };
        let mut scene = Scene::initialize(
            &mut ctx,
            config(RenderMode::Single, MeshConfig::Obj(request)),
            canvas(),
            Environment::default(),
        )
        .unwrap();
        assert!(scene.wait_for_mesh(&mut ctx).unwrap());
        assert_eq!(scene.pending_textures().len(), 1);
        assert_eq!(scene.pending_textures()[0].url, "/crate.png");

        scene.fail_pending_textures(&mut ctx, "offline").unwrap();
        assert!(scene.pending_textures().is_empty());
        assert!(ctx.commands().contains(&GlCommand::BindTexture(scene.placeholder)));
        assert_eq!(
            ctx.last_uniform("uHasTexture"),
            Some(RecordedUniform::Value(UniformValue::Float(0.0)))
        );
    }
}
