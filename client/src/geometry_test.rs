use chrono::Utc;

use super::*;

fn sample(x: u16, y: u16, pressure: u8) -> Sample {
    Sample {
        x,
        y,
        pressure,
        timestamp: Utc::now(),
    }
}

#[test]
fn device_origin_maps_to_surface_origin() {
    assert_eq!(device_to_surface(&sample(0, 0, 0), 800, 600), Point::new(0.0, 0.0));
}

#[test]
fn device_full_range_maps_to_bottom_right_corner() {
    assert_eq!(
        device_to_surface(&sample(4096, 4096, 0), 800, 600),
        Point::new(800.0, 600.0)
    );
}

#[test]
fn device_midpoint_maps_to_surface_center() {
    assert_eq!(
        device_to_surface(&sample(2048, 2048, 0), 1000, 500),
        Point::new(500.0, 250.0)
    );
}

#[test]
fn pressure_radius_has_floor_of_half_pixel() {
    assert_eq!(pressure_radius(0), 0.5);
    assert_eq!(pressure_radius(50), 0.5);
}

#[test]
fn pressure_radius_grows_to_two_and_a_half() {
    assert_eq!(pressure_radius(255), 2.5);
    assert!(pressure_radius(100) > pressure_radius(50));
    assert!(pressure_radius(255) > pressure_radius(100));
}

#[test]
fn normalize_point_rejects_non_finite() {
    assert!(normalize_point(Point::new(f32::NAN, 1.0)).is_none());
    assert!(normalize_point(Point::new(1.0, f32::INFINITY)).is_none());
    assert_eq!(normalize_point(Point::new(3.0, 4.0)), Some(Point::new(3.0, 4.0)));
}
