use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use glam::{Vec2, Vec3};
use js_sys::Promise;
use log::{error, info, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{window, CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

use super::context::WebGlContext;
use super::input::WebInputHandler;
use crate::input::PointerState;
use crate::lighting::LightOverrides;
use crate::manifest::DemoConfig;
use crate::pipeline::{CanvasSize, Environment};
use crate::render::FrameOutcome;
use crate::scene::Scene;
use crate::texture::{DecodedImage, TextureRequest};
use crate::uniforms::{FrameInputs, UniformValue};
use crate::viewport::{SharedViewport, ViewportProvider};

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// One mounted demo driven by `requestAnimationFrame`.
#[wasm_bindgen]
pub struct PlaygroundApp {
    inner: Rc<RefCell<AppState>>,
}

#[wasm_bindgen]
impl PlaygroundApp {
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_id: String, manifest_xml: String) -> Result<PlaygroundApp, JsValue> {
        let config = DemoConfig::from_xml(&manifest_xml)
            .map_err(|err| JsValue::from_str(&format!("failed to parse demo manifest: {err:#}")))?;

        let window = window().ok_or_else(|| JsValue::from_str("window not available"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("document not available"))?;
        let canvas = document
            .get_element_by_id(&canvas_id)
            .ok_or_else(|| JsValue::from_str("canvas element not found"))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| JsValue::from_str("element is not a canvas"))?;

        let css = match (canvas.client_width(), canvas.client_height()) {
            (w, h) if w > 0 && h > 0 => Vec2::new(w as f32, h as f32),
            _ => config.canvas,
        };
        let size = CanvasSize::from_css(css.x, css.y, window.device_pixel_ratio() as f32);
        canvas.set_width(size.width);
        canvas.set_height(size.height);
        let viewport = Arc::new(SharedViewport::new(size));

        let environment = Environment {
            touch_only: window
                .match_media("(pointer: coarse)")
                .ok()
                .flatten()
                .map(|query| query.matches())
                .unwrap_or(false),
        };

        let mut ctx = WebGlContext::from_canvas(&canvas).map_err(js_error)?;
        let scene = Scene::initialize(&mut ctx, config, size, environment).map_err(js_error)?;

        let pointer = Arc::new(PointerState::new());
        let input = WebInputHandler::attach(
            &canvas,
            Arc::clone(&pointer),
            Arc::clone(&viewport),
            *scene.interaction_settings(),
        )
        .map_err(js_error)?;

        let start_time = window
            .performance()
            .map(|performance| performance.now())
            .unwrap_or(0.0);

        Ok(Self {
            inner: Rc::new(RefCell::new(AppState {
                ctx,
                scene,
                canvas,
                pointer,
                viewport,
                _input: input,
                start_time,
                running: false,
                textures_requested: false,
                animation_closure: None,
            })),
        })
    }

    pub fn start(&self) -> Result<(), JsValue> {
        {
            let mut state = self.inner.borrow_mut();
            if state.running {
                return Ok(());
            }
            state.running = true;
        }
        schedule_animation_loop(Rc::clone(&self.inner)).map_err(js_error)
    }

    /// The pending frame callback sees the flag and does not reschedule.
    pub fn stop(&self) {
        self.inner.borrow_mut().running = false;
    }

    pub fn set_uniform_float(&self, name: &str, value: f32) -> Result<(), JsValue> {
        self.set_uniform(name, UniformValue::Float(value))
    }

    pub fn set_uniform_vec2(&self, name: &str, x: f32, y: f32) -> Result<(), JsValue> {
        self.set_uniform(name, UniformValue::Vec2(Vec2::new(x, y)))
    }

    pub fn set_uniform_vec3(&self, name: &str, x: f32, y: f32, z: f32) -> Result<(), JsValue> {
        self.set_uniform(name, UniformValue::Vec3(Vec3::new(x, y, z)))
    }

    pub fn set_brightness(&self, brightness: f32) {
        let mut guard = self.inner.borrow_mut();
        let state = &mut *guard;
        state.scene.update_lights(
            &mut state.ctx,
            &LightOverrides {
                brightness: Some(brightness),
                ..LightOverrides::default()
            },
        );
    }
}

impl PlaygroundApp {
    fn set_uniform(&self, name: &str, value: UniformValue) -> Result<(), JsValue> {
        self.inner
            .borrow_mut()
            .scene
            .set_uniform(name, value)
            .map_err(js_error)
    }
}

struct AppState {
    ctx: WebGlContext,
    scene: Scene,
    canvas: HtmlCanvasElement,
    pointer: Arc<PointerState>,
    viewport: Arc<SharedViewport>,
    _input: WebInputHandler,
    start_time: f64,
    running: bool,
    textures_requested: bool,
    animation_closure: Option<Closure<dyn FnMut()>>,
}

impl AppState {
    fn render_frame(&mut self, now: f64) -> Result<FrameOutcome> {
        let size = self.viewport.canvas_size();
        if size != self.scene.canvas() {
            self.canvas.set_width(size.width);
            self.canvas.set_height(size.height);
            self.scene.resize(&mut self.ctx, size)?;
        }
        let snapshot = self.pointer.snapshot();
        self.scene.apply_pointer(&snapshot);
        let inputs = FrameInputs {
            time: ((now - self.start_time) / 1000.0) as f32,
            mouse: snapshot.mouse,
        };
        Ok(self.scene.render_frame(&mut self.ctx, &inputs)?)
    }

    /// Texture requests to start, at most once per mount.
    fn take_texture_requests(&mut self) -> Vec<TextureRequest> {
        if self.textures_requested || self.scene.pending_textures().is_empty() {
            return Vec::new();
        }
        self.textures_requested = true;
        self.scene.pending_textures().to_vec()
    }

    fn complete_texture(&mut self, index: usize, result: Result<DecodedImage, String>) {
        if let Err(err) = self.scene.complete_texture(&mut self.ctx, index, result) {
            error!("texture upload failed: {err}");
        }
    }
}

fn schedule_animation_loop(app: Rc<RefCell<AppState>>) -> Result<()> {
    let window = window().ok_or_else(|| anyhow!("window not available"))?;
    let mut state = app.borrow_mut();
    let app_clone = Rc::clone(&app);

    let closure = Closure::wrap(Box::new(move || {
        if !app_clone.borrow().running {
            return;
        }
        let now = web_sys::window()
            .and_then(|window| window.performance())
            .map(|performance| performance.now())
            .unwrap_or(0.0);
        let requests = {
            let mut state = app_clone.borrow_mut();
            if let Err(err) = state.render_frame(now) {
                error!("render failed: {err:#}");
            }
            state.take_texture_requests()
        };
        if !requests.is_empty() {
            info!("fetching {} texture(s)", requests.len());
            fetch_textures(&app_clone, requests);
        }
        if let Err(err) = schedule_animation_loop(Rc::clone(&app_clone)) {
            error!("{err:#}");
        }
    }) as Box<dyn FnMut()>);

    window
        .request_animation_frame(closure.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("requestAnimationFrame failed: {err:?}"))?;

    state.animation_closure = Some(closure);
    Ok(())
}

/// Starts one image load per request. Each completion is fed back into the
/// scene's join by index.
fn fetch_textures(app: &Rc<RefCell<AppState>>, requests: Vec<TextureRequest>) {
    for (index, request) in requests.into_iter().enumerate() {
        let app = Rc::clone(app);
        spawn_local(async move {
            let result = match load_image(&request.url).await {
                Ok(image) => decode_image(&image),
                Err(err) => Err(err),
            }
            .map_err(|err| {
                warn!("{}: {err:#}", request.url);
                format!("{err:#}")
            });
            app.borrow_mut().complete_texture(index, result);
        });
    }
}

async fn load_image(url: &str) -> Result<HtmlImageElement> {
    let image = HtmlImageElement::new().map_err(|err| anyhow!("cannot create image: {err:?}"))?;
    image.set_cross_origin(Some("anonymous"));
    image.set_src(url);
    let decoded: Promise = image.decode();
    JsFuture::from(decoded)
        .await
        .map_err(|err| anyhow!("failed to load {url}: {err:?}"))?;
    Ok(image)
}

/// Reads an image back as RGBA8 through an offscreen 2D canvas.
fn decode_image(image: &HtmlImageElement) -> Result<DecodedImage> {
    let document = window()
        .and_then(|window| window.document())
        .ok_or_else(|| anyhow!("document not available"))?;
    let (width, height) = (image.natural_width(), image.natural_height());
    let canvas = document
        .create_element("canvas")
        .map_err(|err| anyhow!("cannot create canvas: {err:?}"))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| anyhow!("created element is not a canvas"))?;
    canvas.set_width(width);
    canvas.set_height(height);
    let context = canvas
        .get_context("2d")
        .map_err(|err| anyhow!("2d context failed: {err:?}"))?
        .ok_or_else(|| anyhow!("2d context unavailable"))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| anyhow!("unexpected 2d context type"))?;
    context
        .draw_image_with_html_image_element(image, 0.0, 0.0)
        .map_err(|err| anyhow!("drawImage failed: {err:?}"))?;
    let data = context
        .get_image_data(0.0, 0.0, width as f64, height as f64)
        .map_err(|err| anyhow!("getImageData failed: {err:?}"))?;
    Ok(DecodedImage {
        width,
        height,
        pixels: data.data().0,
    })
}
