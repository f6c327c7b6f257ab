//! Headless driver: mounts a demo on a [`RecordingContext`] and renders a
//! fixed number of frames, reporting what the pipeline issued.

use std::fmt;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::gl::{BufferTarget, GlCommand, Primitive, RecordingContext};
use crate::input::PointerState;
use crate::manifest::{DemoConfig, RenderMode};
use crate::pipeline::{CanvasSize, Environment};
use crate::render::FrameOutcome;
use crate::scene::Scene;
use crate::uniforms::FrameInputs;
use crate::viewport::{StaticViewport, ViewportProvider};

/// Knobs of a headless run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadlessOptions {
    pub frames: u32,
    pub device_pixel_ratio: f32,
    /// Canvas-local pointer position held for the whole run.
    pub mouse: Option<Vec2>,
    pub environment: Environment,
}

impl Default for HeadlessOptions {
    fn default() -> Self {
        Self {
            frames: 1,
            device_pixel_ratio: 1.0,
            mouse: None,
            environment: Environment::default(),
        }
    }
}

/// A draw call as issued, in GL terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawSummary {
    Arrays { primitive: Primitive, first: i32, count: i32 },
    Elements { primitive: Primitive, count: i32 },
}

impl fmt::Display for DrawSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arrays {
                primitive,
                first,
                count,
            } => write!(f, "drawArrays({primitive}, {first}, {count})"),
            Self::Elements { primitive, count } => write!(f, "drawElements({primitive}, {count})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub outcome: FrameOutcome,
    pub draws: Vec<DrawSummary>,
    /// Off-screen binds (frame buffer targets other than the canvas).
    pub offscreen_binds: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferSummary {
    pub indices: bool,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameSummary {
    pub name: String,
    pub mode: RenderMode,
    pub canvas: CanvasSize,
    pub programs: usize,
    pub buffers: Vec<BufferSummary>,
    pub textured_materials: usize,
    pub frames: Vec<FrameReport>,
}

impl FrameSummary {
    pub fn draw_calls(&self) -> usize {
        self.frames.iter().map(|frame| frame.draws.len()).sum()
    }
}

impl fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Mounted demo {:?} ({:?}) at {}x{}",
            self.name, self.mode, self.canvas.width, self.canvas.height
        )?;
        writeln!(f, "Programs: {}", self.programs)?;
        for (index, buffer) in self.buffers.iter().enumerate() {
            let kind = if buffer.indices { "index" } else { "vertex" };
            writeln!(f, " - buffer {index}: {} {kind} values", buffer.len)?;
        }
        if self.textured_materials > 0 {
            writeln!(f, "Textured materials: {}", self.textured_materials)?;
        }
        for (index, frame) in self.frames.iter().enumerate() {
            match frame.outcome {
                FrameOutcome::Drawn { draw_calls } => writeln!(
                    f,
                    "Frame {}: {draw_calls} draw(s), {} offscreen bind(s)",
                    index + 1,
                    frame.offscreen_binds
                )?,
                FrameOutcome::Waiting => writeln!(f, "Frame {}: waiting", index + 1)?,
                FrameOutcome::Idle => writeln!(f, "Frame {}: idle", index + 1)?,
            }
            for draw in &frame.draws {
                writeln!(f, "   {draw}")?;
            }
        }
        write!(f, "Total draw calls: {}", self.draw_calls())
    }
}

/// Mounts `config` and renders `options.frames` frames with `uTime` set to
/// the frame index.
///
/// OBJ meshes are parsed before the first frame. Texture images cannot be
/// fetched headless, so textured materials take the untextured path.
pub fn run_headless(config: DemoConfig, options: &HeadlessOptions) -> Result<FrameSummary> {
    let viewport = StaticViewport::new(CanvasSize::from_css(
        config.canvas.x,
        config.canvas.y,
        options.device_pixel_ratio,
    ));
    let pointer = PointerState::new();
    if let Some(mouse) = options.mouse {
        pointer.set_hovering(true);
        pointer.set_mouse_position(mouse);
    }

    let mut ctx = RecordingContext::new();
    let mut scene = Scene::initialize(&mut ctx, config, viewport.canvas_size(), options.environment)
        .context("failed to mount demo")?;

    if !scene.wait_for_mesh(&mut ctx)? {
        return Err(anyhow!("mesh for {} failed to load", scene.name()));
    }
    let textured_materials = scene.pending_textures().len();
    if textured_materials > 0 {
        info!("{textured_materials} texture(s) cannot be fetched headless");
    }
    scene.fail_pending_textures(&mut ctx, "no image source in headless mode")?;

    let mut frames = Vec::with_capacity(options.frames as usize);
    for frame in 0..options.frames {
        ctx.clear_commands();
        scene.resize(&mut ctx, viewport.canvas_size())?;
        let snapshot = pointer.snapshot();
        scene.apply_pointer(&snapshot);
        let inputs = FrameInputs {
            time: frame as f32,
            mouse: snapshot.mouse,
        };
        let outcome = scene.render_frame(&mut ctx, &inputs)?;
        debug!("frame {frame}: {outcome:?}");
        frames.push(report(&ctx, outcome));
    }

    Ok(FrameSummary {
        name: scene.name().to_string(),
        mode: scene.mode(),
        canvas: scene.canvas(),
        programs: ctx.programs().len(),
        buffers: ctx
            .buffers()
            .iter()
            .map(|buffer| BufferSummary {
                indices: buffer.target == BufferTarget::ElementArray,
                len: buffer.len,
            })
            .collect(),
        textured_materials,
        frames,
    })
}

fn report(ctx: &RecordingContext, outcome: FrameOutcome) -> FrameReport {
    let draws = ctx
        .draw_calls()
        .into_iter()
        .filter_map(|command| match *command {
            GlCommand::DrawArrays {
                primitive,
                first,
                count,
            } => Some(DrawSummary::Arrays {
                primitive,
                first,
                count,
            }),
            GlCommand::DrawElements { primitive, count } => {
                Some(DrawSummary::Elements { primitive, count })
            }
            _ => None,
        })
        .collect();
    FrameReport {
        outcome,
        draws,
        offscreen_binds: ctx.framebuffer_binds().iter().flatten().count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::MeshConfig;
    use crate::shaders::BASE_VERTEX_SHADER;

    const FRAGMENT: &str = "precision mediump float; void main() { gl_FragColor = vec4(1.0); }";

    #[test]
    fn base_quad_draws_one_strip_per_frame() {
        let config = DemoConfig::new("quad", MeshConfig::BaseTriangles, BASE_VERTEX_SHADER, FRAGMENT);
        let options = HeadlessOptions {
            frames: 3,
            device_pixel_ratio: 2.0,
            ..HeadlessOptions::default()
        };
        let summary = run_headless(config, &options).unwrap();
        assert_eq!((summary.canvas.width, summary.canvas.height), (800, 800));
        assert_eq!(summary.programs, 1);
        assert_eq!(summary.draw_calls(), 3);
        for frame in &summary.frames {
            assert_eq!(
                frame.draws,
                vec![DrawSummary::Arrays {
                    primitive: Primitive::TriangleStrip,
                    first: 0,
                    count: 4
                }]
            );
        }
    }

    #[test]
    fn summary_lists_frames() {
        let config = DemoConfig::new("quad", MeshConfig::BaseTriangles, BASE_VERTEX_SHADER, FRAGMENT);
        let summary = run_headless(config, &HeadlessOptions::default()).unwrap();
        let text = summary.to_string();
        assert!(text.contains("Mounted demo \"quad\" (Single) at 400x400"));
        assert!(text.contains("drawArrays(TRIANGLE_STRIP, 0, 4)"));
        assert!(text.ends_with("Total draw calls: 1"));
    }
}
