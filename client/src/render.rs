use tiny_skia::{
    Color, FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint,
    Stroke as LineStyle, Transform,
};

use pennote_shared::{Point, Stroke};

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

/// `#rrggbb` to an opaque color.
pub fn parse_hex_color(value: &str) -> Option<Color> {
    let hex = value.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |index: usize| u8::from_str_radix(&hex[index..index + 2], 16).ok();
    Some(Color::from_rgba8(channel(0)?, channel(2)?, channel(4)?, 255))
}

fn ink_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    paint
}

pub fn draw_dot(pixmap: &mut Pixmap, center: Point, radius: f32, color: Color) {
    let Some(path) = PathBuilder::from_circle(center.x, center.y, radius) else {
        return;
    };
    pixmap.fill_path(
        &path,
        &ink_paint(color),
        FillRule::Winding,
        Transform::identity(),
        None,
    );
}

pub fn draw_segment(pixmap: &mut Pixmap, from: Point, to: Point, width: f32, color: Color) {
    if from == to {
        draw_dot(pixmap, to, width / 2.0, color);
        return;
    }
    let mut builder = PathBuilder::new();
    builder.move_to(from.x, from.y);
    builder.line_to(to.x, to.y);
    let Some(path) = builder.finish() else {
        return;
    };
    let style = LineStyle {
        width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..LineStyle::default()
    };
    pixmap.stroke_path(&path, &ink_paint(color), &style, Transform::identity(), None);
}

/// Paints a whole stroke with the same primitives the incremental path uses.
pub fn draw_stroke(pixmap: &mut Pixmap, stroke: &Stroke, color: Color) {
    match stroke {
        Stroke::Pointer { width, points } => {
            if let [only] = points.as_slice() {
                draw_dot(pixmap, *only, width / 2.0, color);
                return;
            }
            for window in points.windows(2) {
                draw_segment(pixmap, window[0], window[1], *width, color);
            }
        }
        Stroke::Pen { dots } => {
            for dot in dots {
                draw_dot(pixmap, dot.center, dot.radius, color);
            }
        }
    }
}

pub fn draw_base(pixmap: &mut Pixmap, base: &Pixmap) {
    pixmap.draw_pixmap(
        0,
        0,
        base.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
}

/// Background, then the base layer, then every stroke in order.
pub fn redraw<'a>(
    pixmap: &mut Pixmap,
    background: Color,
    base: Option<&Pixmap>,
    strokes: impl IntoIterator<Item = &'a Stroke>,
    ink: Color,
) {
    pixmap.fill(background);
    if let Some(base) = base {
        draw_base(pixmap, base);
    }
    for stroke in strokes {
        draw_stroke(pixmap, stroke, ink);
    }
}
