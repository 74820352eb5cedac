use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use pennote_shared::{Point, Sample, UploadAck};

use super::*;
use crate::store::StrokeUploader;
use crate::surface::{CanvasStyle, CanvasSurface};
use crate::sync::GoogleDriveSync;

#[derive(Default)]
struct MemoryStore {
    notes: StdMutex<Vec<Note>>,
    reject_updates: AtomicBool,
    last_update: StdMutex<Option<NotePayload>>,
}

impl MemoryStore {
    fn with(notes: Vec<Note>) -> Self {
        Self {
            notes: StdMutex::new(notes),
            ..Self::default()
        }
    }
}

fn saved_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn note(id: &str, title: &str, content: &str) -> Note {
    Note {
        id: id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        text_content: None,
        created_at: None,
        updated_at: None,
        sync_id: None,
    }
}

#[async_trait]
impl StrokeUploader for MemoryStore {
    async fn upload_strokes(&self, _: &str, _: &[Sample]) -> Result<UploadAck, StoreError> {
        Ok(UploadAck::default())
    }
}

#[async_trait]
impl NotesStore for MemoryStore {
    async fn list(&self, search: Option<&str>) -> Result<Vec<Note>, StoreError> {
        let notes = self.notes.lock().unwrap().clone();
        Ok(match search {
            Some(query) => notes.into_iter().filter(|note| note.matches(query)).collect(),
            None => notes,
        })
    }

    async fn create(&self, payload: &NotePayload) -> Result<Note, StoreError> {
        let mut notes = self.notes.lock().unwrap();
        let mut created = note(&format!("n{}", notes.len() + 1), &payload.title, &payload.content);
        created.text_content = payload.text_content.clone();
        notes.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: &str, payload: &NotePayload) -> Result<Note, StoreError> {
        if self.reject_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Api {
                status: 500,
                message: "database unavailable".into(),
            });
        }
        *self.last_update.lock().unwrap() = Some(payload.clone());
        let mut notes = self.notes.lock().unwrap();
        let stored = notes
            .iter_mut()
            .find(|note| note.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        stored.title = payload.title.clone();
        stored.content = payload.content.clone();
        stored.text_content = payload.text_content.clone();
        stored.updated_at = Some(saved_at());
        Ok(stored.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.notes.lock().unwrap().retain(|note| note.id != id);
        Ok(())
    }
}

struct FixedOcr(Result<&'static str, ()>);

#[async_trait]
impl OcrEngine for FixedOcr {
    async fn recognize(&self, png: &[u8], language: OcrLanguage) -> Result<String, OcrError> {
        assert!(png.starts_with(b"\x89PNG"));
        assert_eq!(language, OcrLanguage::RusEng);
        match self.0 {
            Ok(text) => Ok(text.to_string()),
            Err(()) => Err(OcrError::Engine {
                status: "exit status: 1".into(),
                stderr: "no text".into(),
            }),
        }
    }
}

fn canvas() -> SharedCanvas {
    CanvasSurface::new(60, 40, CanvasStyle::default())
        .unwrap()
        .into_shared()
}

async fn scribble(canvas: &SharedCanvas) {
    let mut surface = canvas.lock().await;
    surface.begin_stroke(Point::new(5.0, 5.0));
    surface.extend_stroke(Point::new(50.0, 30.0));
    surface.end_stroke();
}

#[tokio::test]
async fn create_opens_a_blank_note_with_default_title() {
    let store = MemoryStore::default();
    let canvas = canvas();
    scribble(&canvas).await;

    let session = NoteSession::create(&store, canvas.clone(), None).await.unwrap();
    assert_eq!(session.title(), DEFAULT_NOTE_TITLE);
    assert_eq!(session.id(), "n1");
    assert!(!session.is_dirty());
    assert!(canvas.lock().await.history().is_empty());
    assert_eq!(store.notes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn open_of_unknown_note_is_not_found() {
    let store = MemoryStore::default();
    let result = NoteSession::open(&store, canvas(), "missing").await;
    assert!(matches!(
        result,
        Err(NoteError::Store(StoreError::NotFound(id))) if id == "missing"
    ));
}

#[tokio::test]
async fn open_paints_stored_raster() {
    let source = canvas();
    scribble(&source).await;
    let url = source.lock().await.export_snapshot().unwrap().to_data_url();
    let store = MemoryStore::with(vec![note("a", "Sketch", &url)]);

    let target = canvas();
    let session = NoteSession::open(&store, target.clone(), "a").await.unwrap();
    assert_eq!(session.title(), "Sketch");
    assert!(!session.is_dirty());
    assert_eq!(
        target.lock().await.pixmap().data(),
        source.lock().await.pixmap().data()
    );
}

#[tokio::test]
async fn unreadable_content_opens_blank() {
    let store = MemoryStore::with(vec![note("a", "Broken", "data:image/png;base64,AAAA")]);
    let target = canvas();
    scribble(&target).await;
    NoteSession::open(&store, target.clone(), "a").await.unwrap();
    assert!(target.lock().await.history().is_empty());
}

#[tokio::test]
async fn drawing_marks_dirty_and_save_clears_it() {
    let store = MemoryStore::with(vec![note("a", "Draft", "")]);
    let canvas = canvas();
    let mut session = NoteSession::open(&store, canvas.clone(), "a").await.unwrap();

    scribble(&canvas).await;
    assert!(session.is_dirty());

    let saved = session.save(&store).await.unwrap();
    assert_eq!(saved.updated_at, Some(saved_at()));
    assert!(!session.is_dirty());

    let sent = store.last_update.lock().unwrap().clone().unwrap();
    let expected = canvas.lock().await.export_snapshot().unwrap().to_data_url();
    assert_eq!(sent.content, expected);
    assert_eq!(sent.title, "Draft");
}

#[tokio::test]
async fn failed_save_keeps_working_copy_dirty() {
    let store = MemoryStore::with(vec![note("a", "Draft", "")]);
    let canvas = canvas();
    let mut session = NoteSession::open(&store, canvas.clone(), "a").await.unwrap();
    session.set_title("Renamed");
    scribble(&canvas).await;
    store.reject_updates.store(true, Ordering::SeqCst);

    let error = session.save(&store).await.unwrap_err();
    assert!(matches!(error, NoteError::Store(StoreError::Api { status: 500, .. })));
    assert!(session.is_dirty());
    assert_eq!(session.title(), "Renamed");
    assert_eq!(canvas.lock().await.history().len(), 1);
}

#[tokio::test]
async fn setting_the_same_title_is_not_an_edit() {
    let store = MemoryStore::with(vec![note("a", "Same", "")]);
    let mut session = NoteSession::open(&store, canvas(), "a").await.unwrap();
    session.set_title("Same");
    assert!(!session.is_dirty());
    session.set_title("Other");
    assert!(session.is_dirty());
}

#[tokio::test]
async fn recognized_text_replaces_previous_text() {
    let store = MemoryStore::with(vec![note("a", "Lecture", "")]);
    let mut session = NoteSession::open(&store, canvas(), "a").await.unwrap();
    let text = session
        .recognize_text(&FixedOcr(Ok("привет мир")), OcrLanguage::RusEng)
        .await
        .unwrap();
    assert_eq!(text, "привет мир");
    assert!(session.is_dirty());

    let error = session
        .recognize_text(&FixedOcr(Err(())), OcrLanguage::RusEng)
        .await
        .unwrap_err();
    assert!(matches!(error, NoteError::Ocr(OcrError::Engine { .. })));
    assert_eq!(session.extracted_text(), Some("привет мир"));
}

#[tokio::test]
async fn export_writes_named_files() {
    let store = MemoryStore::with(vec![note("a", "Week 1", "")]);
    let mut session = NoteSession::open(&store, canvas(), "a").await.unwrap();
    session.set_extracted_text(Some("summary".into()));
    let dir = tempfile::tempdir().unwrap();

    let png = session.export(ExportFormat::Png, dir.path()).await.unwrap();
    let pdf = session.export(ExportFormat::Pdf, dir.path()).await.unwrap();
    assert_eq!(png, dir.path().join("Week_1.png"));
    assert_eq!(pdf, dir.path().join("Week_1.pdf"));
    assert!(std::fs::read(pdf).unwrap().starts_with(b"%PDF"));
}

#[tokio::test]
async fn cloud_sync_is_not_implemented() {
    let store = MemoryStore::with(vec![note("a", "Any", "")]);
    let mut session = NoteSession::open(&store, canvas(), "a").await.unwrap();
    let error = session.sync_to_cloud(&GoogleDriveSync).await.unwrap_err();
    assert!(matches!(error, NoteError::Sync(SyncError::NotImplemented { .. })));
    assert_eq!(session.note().sync_id, None);
}

#[tokio::test]
async fn delete_removes_the_note() {
    let store = MemoryStore::with(vec![note("a", "Bye", ""), note("b", "Stay", "")]);
    let session = NoteSession::open(&store, canvas(), "a").await.unwrap();
    session.delete(&store).await.unwrap();
    let remaining: Vec<String> = store
        .list(None)
        .await
        .unwrap()
        .into_iter()
        .map(|note| note.id)
        .collect();
    assert_eq!(remaining, ["b"]);
}
