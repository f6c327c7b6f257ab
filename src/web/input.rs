use std::sync::Arc;

use anyhow::{anyhow, Result};
use glam::Vec2;
use gloo_events::{EventListener, EventListenerOptions};
use wasm_bindgen::JsCast;
use web_sys::{window, DeviceOrientationEvent, HtmlCanvasElement, MouseEvent, TouchEvent};

use crate::input::PointerState;
use crate::interaction::{ClientRect, InteractionSettings};
use crate::viewport::SharedViewport;

/// DOM listeners feeding the shared [`PointerState`] and viewport. Dropping
/// the handler detaches every listener.
pub struct WebInputHandler {
    listeners: Vec<EventListener>,
}

fn client_rect(canvas: &HtmlCanvasElement) -> ClientRect {
    let rect = canvas.get_bounding_client_rect();
    ClientRect {
        left: rect.left() as f32,
        top: rect.top() as f32,
        width: rect.width() as f32,
        height: rect.height() as f32,
    }
}

fn first_touch(event: &TouchEvent) -> Option<Vec2> {
    let touch = event.touches().get(0)?;
    Some(Vec2::new(touch.client_x() as f32, touch.client_y() as f32))
}

impl WebInputHandler {
    pub fn attach(
        canvas: &HtmlCanvasElement,
        pointer: Arc<PointerState>,
        viewport: Arc<SharedViewport>,
        settings: InteractionSettings,
    ) -> Result<Self> {
        let window = window().ok_or_else(|| anyhow!("window not available"))?;
        let mut listeners = Vec::new();

        {
            let pointer = Arc::clone(&pointer);
            let target = canvas.clone();
            listeners.push(EventListener::new(canvas, "mousemove", move |event| {
                let Some(event) = event.dyn_ref::<MouseEvent>() else {
                    return;
                };
                let client = Vec2::new(event.client_x() as f32, event.client_y() as f32);
                pointer.move_to(client, &client_rect(&target));
            }));
        }

        for (name, hovering) in [("mouseenter", true), ("mouseleave", false)] {
            let pointer = Arc::clone(&pointer);
            listeners.push(EventListener::new(canvas, name, move |_| {
                pointer.set_hovering(hovering);
                if !hovering {
                    pointer.set_pressed(false);
                }
            }));
        }

        for (name, pressed) in [("mousedown", true), ("mouseup", false)] {
            let pointer = Arc::clone(&pointer);
            listeners.push(EventListener::new(canvas, name, move |_| {
                pointer.set_pressed(pressed);
            }));
        }

        // Touch moves must not scroll the page while dragging the model.
        for name in ["touchstart", "touchmove"] {
            let pointer = Arc::clone(&pointer);
            let target = canvas.clone();
            listeners.push(EventListener::new_with_options(
                canvas,
                name,
                EventListenerOptions::enable_prevent_default(),
                move |event| {
                    let Some(event) = event.dyn_ref::<TouchEvent>() else {
                        return;
                    };
                    if let Some(client) = first_touch(event) {
                        event.prevent_default();
                        pointer.drag_to(client, &client_rect(&target), &settings);
                    }
                },
            ));
        }

        for name in ["touchend", "touchcancel"] {
            let pointer = Arc::clone(&pointer);
            listeners.push(EventListener::new(canvas, name, move |_| {
                pointer.end_drag();
            }));
        }

        {
            let pointer = Arc::clone(&pointer);
            listeners.push(EventListener::new(&window, "deviceorientation", move |event| {
                let Some(event) = event.dyn_ref::<DeviceOrientationEvent>() else {
                    return;
                };
                if let (Some(beta), Some(gamma)) = (event.beta(), event.gamma()) {
                    pointer.set_orientation(beta as f32, gamma as f32, &settings);
                }
            }));
        }

        {
            let target = canvas.clone();
            let host = window.clone();
            listeners.push(EventListener::new(&window, "resize", move |_| {
                viewport.update(
                    target.client_width() as f32,
                    target.client_height() as f32,
                    host.device_pixel_ratio() as f32,
                );
            }));
        }

        Ok(Self { listeners })
    }
}

impl Drop for WebInputHandler {
    fn drop(&mut self) {
        self.listeners.clear();
    }
}
