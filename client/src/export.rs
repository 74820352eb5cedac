//! Local PNG and PDF exports of a note.

use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};

use crate::snapshot::{Snapshot, SnapshotError};

#[cfg(test)]
#[path = "export_test.rs"]
mod export_test;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const TITLE_SIZE: i64 = 18;
const BODY_SIZE: i64 = 11;
const LEADING: i64 = 14;
const MAX_IMAGE_HEIGHT: f32 = 480.0;
const WRAP_COLUMNS: usize = 90;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Pdf => "pdf",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to build PDF: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// File name stem for a note title. Path separators and control characters
/// are replaced; an empty title becomes `note`.
pub fn file_stem(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_matches(|c| c == '.' || c == '_');
    if stem.is_empty() {
        "note".to_string()
    } else {
        stem.to_string()
    }
}

pub async fn export_png(
    snapshot: &Snapshot,
    title: &str,
    dir: &Path,
) -> Result<PathBuf, ExportError> {
    let path = target_path(dir, title, ExportFormat::Png);
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&path, snapshot.png()).await?;
    tracing::info!(path = %path.display(), "exported PNG");
    Ok(path)
}

pub async fn export_pdf(
    snapshot: &Snapshot,
    title: &str,
    text: Option<&str>,
    dir: &Path,
) -> Result<PathBuf, ExportError> {
    let path = target_path(dir, title, ExportFormat::Pdf);
    let bytes = render_pdf(snapshot, title, text)?;
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&path, bytes).await?;
    tracing::info!(path = %path.display(), "exported PDF");
    Ok(path)
}

fn target_path(dir: &Path, title: &str, format: ExportFormat) -> PathBuf {
    dir.join(format!("{}.{}", file_stem(title), format.extension()))
}

/// Russian passport romanization, lower case.
const CYRILLIC: [(char, &str); 33] = [
    ('а', "a"),
    ('б', "b"),
    ('в', "v"),
    ('г', "g"),
    ('д', "d"),
    ('е', "e"),
    ('ё', "e"),
    ('ж', "zh"),
    ('з', "z"),
    ('и', "i"),
    ('й', "i"),
    ('к', "k"),
    ('л', "l"),
    ('м', "m"),
    ('н', "n"),
    ('о', "o"),
    ('п', "p"),
    ('р', "r"),
    ('с', "s"),
    ('т', "t"),
    ('у', "u"),
    ('ф', "f"),
    ('х', "kh"),
    ('ц', "ts"),
    ('ч', "ch"),
    ('ш', "sh"),
    ('щ', "shch"),
    ('ъ', "ie"),
    ('ы', "y"),
    ('ь', ""),
    ('э', "e"),
    ('ю', "iu"),
    ('я', "ia"),
];

fn push_transliterated(c: char, out: &mut Vec<u8>) -> bool {
    let lower = c.to_lowercase().next().unwrap_or(c);
    let Some(&(_, latin)) = CYRILLIC.iter().find(|(letter, _)| *letter == lower) else {
        return false;
    };
    let mut bytes = latin.bytes();
    if c != lower {
        if let Some(first) = bytes.next() {
            out.push(first.to_ascii_uppercase());
        }
    }
    out.extend(bytes);
    true
}

/// Encodes `text` for the standard WinAnsi font, which only covers Latin-1.
/// Cyrillic is transliterated and anything else is printed as `?`. The count
/// is the number of characters that could not be printed as written.
fn latin1(text: &str) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(text.len());
    let mut lossy = 0;
    for c in text.chars() {
        if let Ok(byte) = u8::try_from(u32::from(c)) {
            out.push(byte);
            continue;
        }
        lossy += 1;
        if !push_transliterated(c, &mut out) {
            out.push(b'?');
        }
    }
    (out, lossy)
}

fn wrap(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let needed = line.chars().count() + 1 + word.chars().count();
            if !line.is_empty() && needed > WRAP_COLUMNS {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }
    lines
}

fn text_line(x: i64, y: i64, size: i64, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), Object::Integer(size)]),
        Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]),
        Operation::new("Tj", vec![Object::string_literal(latin1(text).0)]),
        Operation::new("ET", vec![]),
    ]
}

fn image_xobject(snapshot: &Snapshot) -> Result<Stream, ExportError> {
    let pixmap = snapshot.decode()?;
    let mut rgb = Vec::with_capacity(pixmap.pixels().len() * 3);
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        rgb.extend_from_slice(&[color.red(), color.green(), color.blue()]);
    }
    Ok(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(pixmap.width()),
            "Height" => i64::from(pixmap.height()),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        rgb,
    ))
}

/// One A4 page with the title and the drawing, followed by the recognized
/// text, continued on further pages when it does not fit.
pub fn render_pdf(
    snapshot: &Snapshot,
    title: &str,
    text: Option<&str>,
) -> Result<Vec<u8>, ExportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let image_id = doc.add_object(image_xobject(snapshot)?);
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
        "XObject" => dictionary! { "Im1" => image_id },
    });

    let heading = if title.trim().is_empty() { "note" } else { title };
    let lossy = latin1(heading).1 + text.map_or(0, |text| latin1(text).1);
    if lossy > 0 {
        tracing::warn!(
            characters = lossy,
            "PDF text outside Latin-1 was transliterated or replaced"
        );
    }
    let mut y = PAGE_HEIGHT - MARGIN - TITLE_SIZE;
    let mut operations = text_line(MARGIN, y, TITLE_SIZE, heading);

    let available = (PAGE_WIDTH - 2 * MARGIN) as f32;
    let scale =
        (available / snapshot.width() as f32).min(MAX_IMAGE_HEIGHT / snapshot.height() as f32);
    let draw_width = (snapshot.width() as f32 * scale).round() as i64;
    let draw_height = (snapshot.height() as f32 * scale).round() as i64;
    y -= LEADING + draw_height;
    operations.extend([
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                Object::Integer(draw_width),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(draw_height),
                Object::Integer(MARGIN),
                Object::Integer(y),
            ],
        ),
        Operation::new("Do", vec!["Im1".into()]),
        Operation::new("Q", vec![]),
    ]);

    let mut pages = Vec::new();
    if let Some(text) = text.map(str::trim).filter(|text| !text.is_empty()) {
        y -= 2 * LEADING;
        operations.extend(text_line(MARGIN, y, BODY_SIZE + 1, "Recognized text:"));
        for line in wrap(text) {
            y -= LEADING;
            if y < MARGIN {
                pages.push(std::mem::take(&mut operations));
                y = PAGE_HEIGHT - MARGIN - BODY_SIZE;
            }
            operations.extend(text_line(MARGIN, y, BODY_SIZE, &line));
        }
    }
    pages.push(operations);

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        kids.push(add_page(&mut doc, pages_id, Content { operations })?.into());
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn add_page(
    doc: &mut Document,
    parent: ObjectId,
    content: Content,
) -> Result<ObjectId, ExportError> {
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => parent,
        "Contents" => content_id,
    }))
}
