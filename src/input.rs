use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec2;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::interaction::{
    drag_velocity, normalize_drag_position, normalize_orientation, pointer_to_canvas, ClientRect,
    DragData, GyroscopeData, InteractionSettings,
};

/// Pointer and orientation snapshot shared between DOM listeners and the
/// render loop.
///
/// Every setter bumps an activity counter, which the render loop compares
/// between frames to restart its idle timer.
#[derive(Debug, Default)]
pub struct PointerState {
    mouse_position: RwLock<Vec2>,
    hovering: RwLock<bool>,
    pressed: RwLock<bool>,
    drag: RwLock<Option<DragData>>,
    gyroscope: RwLock<Option<GyroscopeData>>,
    activity: AtomicU64,
}

/// Copy of a [`PointerState`] taken once per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointerSnapshot {
    /// Canvas-local position, Y flipped.
    pub mouse: Vec2,
    pub hovering: bool,
    pub pressed: bool,
    pub drag: Option<DragData>,
    pub gyroscope: Option<GyroscopeData>,
    pub activity: u64,
}

impl PointerState {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) {
        self.activity.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_mouse_position(&self, position: Vec2) {
        *self.mouse_position.write() = position;
        self.bump();
    }

    /// Records a mouse move in client coordinates.
    pub fn move_to(&self, client: Vec2, rect: &ClientRect) {
        self.set_mouse_position(pointer_to_canvas(client, rect));
    }

    pub fn set_hovering(&self, hovering: bool) {
        *self.hovering.write() = hovering;
        self.bump();
    }

    pub fn set_pressed(&self, pressed: bool) {
        *self.pressed.write() = pressed;
        self.bump();
    }

    /// Updates the drag target from a touch at `client`.
    pub fn drag_to(&self, client: Vec2, rect: &ClientRect, settings: &InteractionSettings) {
        let normalized = normalize_drag_position(client, rect);
        *self.drag.write() = Some(drag_velocity(normalized, settings));
        self.bump();
    }

    pub fn end_drag(&self) {
        *self.drag.write() = None;
        self.bump();
    }

    /// Records a device orientation reading in degrees.
    pub fn set_orientation(&self, beta: f32, gamma: f32, settings: &InteractionSettings) {
        *self.gyroscope.write() = Some(normalize_orientation(beta, gamma, settings));
        self.bump();
    }

    pub fn mouse_position(&self) -> Vec2 {
        *self.mouse_position.read()
    }

    pub fn is_pressed(&self) -> bool {
        *self.pressed.read()
    }

    pub fn activity(&self) -> u64 {
        self.activity.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> PointerSnapshot {
        PointerSnapshot {
            mouse: *self.mouse_position.read(),
            hovering: *self.hovering.read(),
            pressed: *self.pressed.read(),
            drag: *self.drag.read(),
            gyroscope: *self.gyroscope.read(),
            activity: self.activity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn rect() -> ClientRect {
        ClientRect {
            left: 0.0,
            top: 0.0,
            width: 200.0,
            height: 200.0,
        }
    }

    #[test]
    fn moves_are_flipped_into_canvas_space() {
        let state = PointerState::new();
        state.move_to(Vec2::new(20.0, 30.0), &rect());
        assert_eq!(state.mouse_position(), Vec2::new(20.0, -30.0));
        assert_eq!(state.activity(), 1);
    }

    #[test]
    fn drags_produce_weighted_targets() {
        let state = PointerState::new();
        let settings = InteractionSettings::default();
        state.drag_to(Vec2::new(200.0, 100.0), &rect(), &settings);
        let drag = state.snapshot().drag.unwrap();
        assert!(drag.enabled);
        assert_eq!(drag.gamma, settings.gamma_mouse_weight);
        state.end_drag();
        assert!(state.snapshot().drag.is_none());
    }

    #[test]
    fn listeners_on_other_threads_share_state() {
        let state = Arc::new(PointerState::new());
        let writer = Arc::clone(&state);
        thread::spawn(move || {
            writer.set_pressed(true);
            writer.set_orientation(30.0, 0.0, &InteractionSettings::default());
        })
        .join()
        .unwrap();
        let snapshot = state.snapshot();
        assert!(snapshot.pressed);
        assert!(snapshot.gyroscope.unwrap().enabled);
        assert_eq!(snapshot.activity, 2);
    }
}
