//! Routes mouse/touch pointer events into canvas strokes.

use pennote_shared::Point;

use crate::surface::CanvasSurface;

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerKind {
    Down,
    Move,
    Up,
    Cancel,
    Leave,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub pointer_id: i32,
    pub kind: PointerKind,
    pub point: Point,
}

impl PointerEvent {
    pub fn new(pointer_id: i32, kind: PointerKind, x: f32, y: f32) -> Self {
        Self {
            pointer_id,
            kind,
            point: Point::new(x, y),
        }
    }
}

/// Only one pointer draws at a time; the rest are ignored until it lifts.
#[derive(Debug, Default)]
pub struct PointerInput {
    active_draw_pointer: Option<i32>,
}

impl PointerInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_pointer(&self) -> Option<i32> {
        self.active_draw_pointer
    }

    /// Applies one event. Returns `true` when it reached the canvas.
    pub fn handle(&mut self, canvas: &mut CanvasSurface, event: PointerEvent) -> bool {
        match event.kind {
            PointerKind::Down => {
                if self.active_draw_pointer.is_some() || canvas.is_drawing() {
                    return false;
                }
                canvas.begin_stroke(event.point);
                if !canvas.is_drawing() {
                    return false;
                }
                self.active_draw_pointer = Some(event.pointer_id);
                true
            }
            PointerKind::Move => {
                if self.active_draw_pointer != Some(event.pointer_id) {
                    return false;
                }
                canvas.extend_stroke(event.point);
                true
            }
            PointerKind::Up | PointerKind::Cancel | PointerKind::Leave => {
                if self.active_draw_pointer != Some(event.pointer_id) {
                    return false;
                }
                self.active_draw_pointer = None;
                canvas.end_stroke();
                true
            }
        }
    }
}
