//! The drawing surface: a raster plus the strokes that produced it.
//!
//! Invariant: the raster always equals the background fill, then the base
//! layer (if any), then every retained stroke in order, then the strokes
//! still open. Incremental painting goes through the same primitives as
//! [`redraw`], so replaying after an undo is pixel-exact. Committing a stroke
//! while the other input source has ink on the raster repaints, since the
//! live paint order then differs from history order.

use std::sync::Arc;

use tiny_skia::{Color, Pixmap};
use tokio::sync::{watch, Mutex};

use pennote_shared::{Dot, Point, Sample, Stroke};

use crate::config::Settings;
use crate::geometry::{device_to_surface, normalize_point, pressure_radius};
use crate::render::{self, parse_hex_color, redraw};
use crate::snapshot::{self, Snapshot, SnapshotError};

#[cfg(test)]
#[path = "surface_test.rs"]
mod surface_test;

pub const MAX_STROKES: usize = 2000;
pub const MAX_POINTS_PER_STROKE: usize = 5000;

pub type SharedCanvas = Arc<Mutex<CanvasSurface>>;

#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("invalid canvas size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasStyle {
    pub background: Color,
    pub ink: Color,
    pub stroke_width: f32,
}

impl CanvasStyle {
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        Self {
            background: parse_hex_color(&settings.canvas_background)
                .unwrap_or(defaults.background),
            ink: defaults.ink,
            stroke_width: settings.stroke_thickness,
        }
    }
}

impl Default for CanvasStyle {
    fn default() -> Self {
        Self {
            background: Color::WHITE,
            // #1e293b
            ink: Color::from_rgba8(0x1e, 0x29, 0x3b, 0xff),
            stroke_width: crate::config::DEFAULT_STROKE_THICKNESS,
        }
    }
}

pub struct CanvasSurface {
    pixmap: Pixmap,
    style: CanvasStyle,
    base: Option<Pixmap>,
    history: Vec<Stroke>,
    /// Open pointer stroke; `Some` while drawing.
    current: Option<Stroke>,
    /// Open pen stroke, fed by device samples until the pen lifts.
    pen: Option<Stroke>,
    snapshots: watch::Sender<Option<Snapshot>>,
}

impl CanvasSurface {
    pub fn new(width: u32, height: u32, style: CanvasStyle) -> Result<Self, CanvasError> {
        let mut pixmap =
            Pixmap::new(width, height).ok_or(CanvasError::InvalidSize { width, height })?;
        pixmap.fill(style.background);
        let (snapshots, _) = watch::channel(None);
        Ok(Self {
            pixmap,
            style,
            base: None,
            history: Vec::new(),
            current: None,
            pen: None,
            snapshots,
        })
    }

    pub fn into_shared(self) -> SharedCanvas {
        Arc::new(Mutex::new(self))
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn style(&self) -> CanvasStyle {
        self.style
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn history(&self) -> &[Stroke] {
        &self.history
    }

    pub fn is_drawing(&self) -> bool {
        self.current.is_some()
    }

    pub fn has_base(&self) -> bool {
        self.base.is_some()
    }

    /// Receives a fresh snapshot after every committed change.
    pub fn subscribe(&self) -> watch::Receiver<Option<Snapshot>> {
        self.snapshots.subscribe()
    }

    pub fn begin_stroke(&mut self, point: Point) {
        if self.current.is_some() {
            return;
        }
        let Some(point) = normalize_point(point) else {
            return;
        };
        self.current = Some(Stroke::pointer(self.style.stroke_width, point));
    }

    pub fn extend_stroke(&mut self, point: Point) {
        let Some(Stroke::Pointer { width, points }) = self.current.as_mut() else {
            return;
        };
        let Some(point) = normalize_point(point) else {
            return;
        };
        if points.len() >= MAX_POINTS_PER_STROKE {
            return;
        }
        let Some(&previous) = points.last() else {
            return;
        };
        points.push(point);
        render::draw_segment(&mut self.pixmap, previous, point, *width, self.style.ink);
    }

    pub fn end_stroke(&mut self) {
        let Some(stroke) = self.current.take() else {
            return;
        };
        if stroke.is_empty() {
            return;
        }
        if let Stroke::Pointer { width, points } = &stroke {
            if let [only] = points.as_slice() {
                render::draw_dot(&mut self.pixmap, *only, width / 2.0, self.style.ink);
            }
        }
        let overlapped = self.pen_open();
        self.commit(stroke);
        if overlapped {
            self.repaint();
        }
        self.publish();
    }

    /// Paints one pen sample as a pressure-sized dot and adds it to the open
    /// pen stroke. Snapshots are published when the pen stroke ends.
    pub fn ingest_device_sample(&mut self, sample: &Sample) {
        let dot = Dot {
            center: device_to_surface(sample, self.width(), self.height()),
            radius: pressure_radius(sample.pressure),
        };
        if self
            .pen
            .as_ref()
            .is_some_and(|stroke| stroke.len() >= MAX_POINTS_PER_STROKE)
        {
            if let Some(full) = self.pen.take() {
                let overlapped = self.pointer_open();
                self.commit(full);
                if overlapped {
                    self.repaint();
                }
            }
        }
        if let Stroke::Pen { dots } = self.pen.get_or_insert_with(Stroke::pen) {
            dots.push(dot);
        }
        render::draw_dot(&mut self.pixmap, dot.center, dot.radius, self.style.ink);
    }

    /// Commits the open pen stroke. Returns whether there was one.
    pub fn end_device_stroke(&mut self) -> bool {
        let Some(stroke) = self.pen.take() else {
            return false;
        };
        if stroke.is_empty() {
            return false;
        }
        let overlapped = self.pointer_open();
        self.commit(stroke);
        if overlapped {
            self.repaint();
        }
        self.publish();
        true
    }

    /// Drops the most recent stroke and replays the rest. No-op when the
    /// history is empty.
    pub fn undo(&mut self) -> bool {
        if self.history.pop().is_none() {
            return false;
        }
        self.repaint();
        self.publish();
        true
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.base = None;
        self.current = None;
        self.pen = None;
        self.pixmap.fill(self.style.background);
        self.publish();
    }

    /// Replaces the surface content with a PNG image painted at the origin.
    /// The image becomes the base layer; history and open strokes are reset.
    pub fn load_snapshot(&mut self, png: &[u8]) -> Result<(), CanvasError> {
        let image = snapshot::decode_png(png)?;
        self.history.clear();
        self.current = None;
        self.pen = None;
        self.base = Some(image);
        self.repaint();
        self.publish();
        Ok(())
    }

    pub fn load_data_url(&mut self, url: &str) -> Result<(), CanvasError> {
        let bytes = snapshot::data_url_bytes(url)?;
        self.load_snapshot(&bytes)
    }

    pub fn export_snapshot(&self) -> Result<Snapshot, CanvasError> {
        Ok(Snapshot::encode(&self.pixmap)?)
    }

    fn pen_open(&self) -> bool {
        self.pen.as_ref().is_some_and(|stroke| !stroke.is_empty())
    }

    /// An open pointer stroke has ink on the raster once it has a segment.
    fn pointer_open(&self) -> bool {
        self.current.as_ref().is_some_and(|stroke| stroke.len() > 1)
    }

    fn commit(&mut self, stroke: Stroke) {
        self.history.push(stroke);
        if self.history.len() > MAX_STROKES {
            let oldest = self.history.remove(0);
            self.fold_into_base(&oldest);
        }
    }

    /// Flattens `stroke` into the base layer so it survives without a
    /// history entry.
    fn fold_into_base(&mut self, stroke: &Stroke) {
        let Some(mut flat) = Pixmap::new(self.width(), self.height()) else {
            return;
        };
        redraw(
            &mut flat,
            self.style.background,
            self.base.as_ref(),
            [stroke],
            self.style.ink,
        );
        self.base = Some(flat);
    }

    fn repaint(&mut self) {
        // A lone open pointer point is only painted once the stroke ends.
        let open_pointer = self.current.iter().filter(|stroke| stroke.len() > 1);
        let open = self.pen.iter().chain(open_pointer);
        redraw(
            &mut self.pixmap,
            self.style.background,
            self.base.as_ref(),
            self.history.iter().chain(open),
            self.style.ink,
        );
    }

    fn publish(&self) {
        match Snapshot::encode(&self.pixmap) {
            Ok(snapshot) => {
                self.snapshots.send_replace(Some(snapshot));
            }
            Err(error) => tracing::warn!(error = %error, "failed to encode canvas snapshot"),
        }
    }
}
