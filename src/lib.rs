//! Render pipeline of an interactive shader-education playground.
//!
//! A demo is described by an XML manifest: shader sources, editable
//! uniforms, a mesh and a render mode. The crate mounts demos on any
//! [`GraphicsContext`], animates them frame by frame and feeds pointer and
//! orientation input into a small rotation model. The WebGL backend and its
//! DOM glue live in `web` (wasm32 only); everything else runs headless so
//! the pipeline can be driven from tests and the command line.

pub mod app;
pub mod color;
pub mod config;
pub mod gl;
pub mod input;
pub mod interaction;
pub mod lighting;
pub mod loader;
pub mod manifest;
pub mod math;
pub mod mesh;
pub mod obj;
pub mod pipeline;
pub mod render;
pub mod scene;
pub mod shaders;
pub mod texture;
pub mod uniforms;
pub mod viewport;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use app::{run_headless, DrawSummary, FrameReport, FrameSummary, HeadlessOptions};
pub use gl::{GlCommand, GlError, GraphicsContext, RecordedUniform, RecordingContext};
pub use input::{PointerSnapshot, PointerState};
pub use manifest::{DemoConfig, MeshConfig, RenderMode};
pub use pipeline::{CanvasSize, Environment};
pub use render::{FrameOutcome, IdleTimer, PingPong};
pub use scene::{MeshState, Scene, SceneError};
pub use uniforms::{FrameInputs, UniformSetting, UniformValue};
pub use viewport::{SharedViewport, StaticViewport, ViewportProvider};
