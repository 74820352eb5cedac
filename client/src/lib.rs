pub mod auth;
pub mod config;
pub mod device;
pub mod export;
pub mod feed;
mod geometry;
pub mod input;
pub mod note;
pub mod ocr;
mod render;
pub mod snapshot;
pub mod store;
pub mod surface;
pub mod sync;
pub mod transport;

pub use auth::AuthClient;
pub use config::{ClientConfig, ConfigError, DeviceConfig, Settings};
pub use device::{ConnectOutcome, ConnectionState, DeviceError, DeviceEvent, DeviceSession};
pub use export::{ExportError, ExportFormat};
pub use feed::spawn_device_feed;
pub use input::{PointerEvent, PointerInput, PointerKind};
pub use note::{NoteError, NoteSession};
pub use ocr::{OcrEngine, OcrError, OcrLanguage, TesseractOcr};
pub use snapshot::{Snapshot, SnapshotError};
pub use store::{HttpNotesStore, NotesStore, StoreError, StrokeUploader};
pub use surface::{CanvasError, CanvasStyle, CanvasSurface, SharedCanvas};
pub use sync::{CloudSync, GoogleDriveSync, SyncError};
pub use transport::{BluetoothHost, PenDevice, PenEvent, TransportError};
