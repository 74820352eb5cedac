use serde::{Deserialize, Serialize};

pub mod notes;
pub mod pen;

pub use notes::{
    ErrorBody, HealthStatus, LoginRequest, Note, NotePayload, RegisterRequest, TokenResponse,
    UploadAck, UploadRequest,
};
pub use pen::{decode, decode_at, DecodeError, Sample};

/// Surface-space position, in raster pixels.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One pressure-sized dot painted for a pen sample.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Dot {
    pub center: Point,
    pub radius: f32,
}

/// One continuous contact, from pen-down (or pointer-down) to lift.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Stroke {
    Pointer { width: f32, points: Vec<Point> },
    Pen { dots: Vec<Dot> },
}

impl Stroke {
    pub fn pointer(width: f32, first: Point) -> Self {
        Stroke::Pointer {
            width,
            points: vec![first],
        }
    }

    pub fn pen() -> Self {
        Stroke::Pen { dots: Vec::new() }
    }

    pub fn len(&self) -> usize {
        match self {
            Stroke::Pointer { points, .. } => points.len(),
            Stroke::Pen { dots } => dots.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_point(&self) -> Option<Point> {
        match self {
            Stroke::Pointer { points, .. } => points.last().copied(),
            Stroke::Pen { dots } => dots.last().map(|dot| dot.center),
        }
    }
}
