use std::sync::Arc;

use parking_lot::RwLock;

use crate::pipeline::CanvasSize;

/// Reports the canvas size the render loop should draw at.
pub trait ViewportProvider: Send + Sync {
    fn canvas_size(&self) -> CanvasSize;
}

/// Viewport that never changes size.
#[derive(Debug, Clone, Copy)]
pub struct StaticViewport {
    pub size: CanvasSize,
}

impl StaticViewport {
    pub const fn new(size: CanvasSize) -> Self {
        Self { size }
    }
}

impl ViewportProvider for StaticViewport {
    fn canvas_size(&self) -> CanvasSize {
        self.size
    }
}

/// Viewport updated by a resize listener and read by the render loop.
#[derive(Debug)]
pub struct SharedViewport {
    size: RwLock<CanvasSize>,
}

impl SharedViewport {
    pub fn new(size: CanvasSize) -> Self {
        Self {
            size: RwLock::new(size),
        }
    }

    /// Recomputes the pixel size from a CSS box and pixel ratio.
    pub fn update(&self, css_width: f32, css_height: f32, device_pixel_ratio: f32) {
        *self.size.write() = CanvasSize::from_css(css_width, css_height, device_pixel_ratio);
    }
}

impl ViewportProvider for SharedViewport {
    fn canvas_size(&self) -> CanvasSize {
        *self.size.read()
    }
}

impl<T> ViewportProvider for Arc<T>
where
    T: ViewportProvider + ?Sized,
{
    fn canvas_size(&self) -> CanvasSize {
        (**self).canvas_size()
    }
}
