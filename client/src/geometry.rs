use pennote_shared::pen::{DEVICE_RANGE, MAX_PRESSURE};
use pennote_shared::{Point, Sample};

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

/// Largest dot diameter a full-pressure sample produces.
pub const MAX_DOT_DIAMETER: f32 = 5.0;

pub fn normalize_point(point: Point) -> Option<Point> {
    if !point.is_finite() {
        return None;
    }
    Some(point)
}

/// Linear map from device units onto a `width` x `height` surface.
pub fn device_to_surface(sample: &Sample, width: u32, height: u32) -> Point {
    Point {
        x: f32::from(sample.x) / DEVICE_RANGE * width as f32,
        y: f32::from(sample.y) / DEVICE_RANGE * height as f32,
    }
}

/// Dot radius for a pen sample; never below half a pixel.
pub fn pressure_radius(pressure: u8) -> f32 {
    (f32::from(pressure) / MAX_PRESSURE * MAX_DOT_DIAMETER).max(1.0) / 2.0
}
