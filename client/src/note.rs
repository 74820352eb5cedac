//! Working copy of one note bound to the canvas.

use std::path::{Path, PathBuf};

use tokio::sync::watch;

use pennote_shared::{Note, NotePayload};

use crate::export::{self, ExportError, ExportFormat};
use crate::ocr::{OcrEngine, OcrError, OcrLanguage};
use crate::snapshot::{is_image_data_url, Snapshot};
use crate::store::{NotesStore, StoreError};
use crate::surface::{CanvasError, SharedCanvas};
use crate::sync::{CloudSync, SyncError};

#[cfg(test)]
#[path = "note_test.rs"]
mod note_test;

pub const DEFAULT_NOTE_TITLE: &str = "Новая заметка";

#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Canvas(#[from] CanvasError),
    #[error("text recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

pub struct NoteSession {
    note: Note,
    canvas: SharedCanvas,
    snapshots: watch::Receiver<Option<Snapshot>>,
    title: String,
    extracted_text: Option<String>,
    /// Edits since the last successful save that the snapshot receiver no
    /// longer reports.
    dirty: bool,
}

impl NoteSession {
    /// Loads `note_id` from the store and paints its content onto `canvas`.
    pub async fn open(
        store: &dyn NotesStore,
        canvas: SharedCanvas,
        note_id: &str,
    ) -> Result<Self, NoteError> {
        let note = store
            .list(None)
            .await?
            .into_iter()
            .find(|note| note.id == note_id)
            .ok_or_else(|| StoreError::NotFound(note_id.to_string()))?;
        Ok(Self::attach(canvas, note).await)
    }

    /// Creates an empty note and opens it.
    pub async fn create(
        store: &dyn NotesStore,
        canvas: SharedCanvas,
        title: Option<&str>,
    ) -> Result<Self, NoteError> {
        let payload = NotePayload {
            title: title.unwrap_or(DEFAULT_NOTE_TITLE).to_string(),
            content: String::new(),
            text_content: Some(String::new()),
        };
        let note = store.create(&payload).await?;
        tracing::info!(note = %note.id, "created note");
        Ok(Self::attach(canvas, note).await)
    }

    async fn attach(canvas: SharedCanvas, note: Note) -> Self {
        let snapshots = {
            let mut surface = canvas.lock().await;
            if is_image_data_url(&note.content) {
                if let Err(error) = surface.load_data_url(&note.content) {
                    tracing::warn!(
                        note = %note.id,
                        error = %error,
                        "note content unreadable, starting blank"
                    );
                    surface.clear();
                }
            } else {
                surface.clear();
            }
            surface.subscribe()
        };
        Self {
            title: note.title.clone(),
            extracted_text: note.text_content.clone().filter(|text| !text.is_empty()),
            note,
            canvas,
            snapshots,
            dirty: false,
        }
    }

    pub fn note(&self) -> &Note {
        &self.note
    }

    pub fn id(&self) -> &str {
        &self.note.id
    }

    pub fn canvas(&self) -> &SharedCanvas {
        &self.canvas
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if title != self.title {
            self.title = title;
            self.dirty = true;
        }
    }

    pub fn extracted_text(&self) -> Option<&str> {
        self.extracted_text.as_deref()
    }

    pub fn set_extracted_text(&mut self, text: Option<String>) {
        if text != self.extracted_text {
            self.extracted_text = text;
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty || self.snapshots.has_changed().unwrap_or(false)
    }

    async fn snapshot(&self) -> Result<Snapshot, NoteError> {
        Ok(self.canvas.lock().await.export_snapshot()?)
    }

    /// Writes title, raster and recognized text back to the store. The
    /// working copy is kept as is when the store rejects it.
    pub async fn save(&mut self, store: &dyn NotesStore) -> Result<&Note, NoteError> {
        if self.snapshots.has_changed().unwrap_or(false) {
            self.dirty = true;
        }
        let _ = self.snapshots.borrow_and_update();
        let snapshot = self.snapshot().await?;
        let payload = NotePayload {
            title: self.title.clone(),
            content: snapshot.to_data_url(),
            text_content: self.extracted_text.clone(),
        };
        let saved = store.update(&self.note.id, &payload).await?;
        tracing::info!(note = %saved.id, "saved note");
        self.note = saved;
        self.dirty = false;
        Ok(&self.note)
    }

    /// Runs OCR over the current raster. Prior text survives a failure.
    pub async fn recognize_text(
        &mut self,
        ocr: &dyn OcrEngine,
        language: OcrLanguage,
    ) -> Result<&str, NoteError> {
        let snapshot = self.snapshot().await?;
        let text = ocr.recognize(snapshot.png(), language).await?;
        self.dirty = true;
        Ok(self.extracted_text.insert(text).as_str())
    }

    pub async fn export(&self, format: ExportFormat, dir: &Path) -> Result<PathBuf, NoteError> {
        let snapshot = self.snapshot().await?;
        let path = match format {
            ExportFormat::Png => export::export_png(&snapshot, &self.title, dir).await?,
            ExportFormat::Pdf => {
                export::export_pdf(&snapshot, &self.title, self.extracted_text(), dir).await?
            }
        };
        Ok(path)
    }

    pub async fn sync_to_cloud(&mut self, sync: &dyn CloudSync) -> Result<&str, NoteError> {
        let remote_id = sync.push(&self.note).await?;
        Ok(self.note.sync_id.insert(remote_id).as_str())
    }

    pub async fn delete(self, store: &dyn NotesStore) -> Result<(), NoteError> {
        store.delete(&self.note.id).await?;
        tracing::info!(note = %self.note.id, "deleted note");
        Ok(())
    }
}
