//! Cloud backup providers for notes.

use async_trait::async_trait;

use pennote_shared::Note;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{provider} sync is not implemented")]
    NotImplemented { provider: &'static str },
}

#[async_trait]
pub trait CloudSync: Send + Sync {
    fn provider(&self) -> &'static str;

    /// Uploads `note` and returns the provider's id for it.
    async fn push(&self, note: &Note) -> Result<String, SyncError>;
}

/// Placeholder provider; the settings page can enable it but nothing is
/// uploaded yet.
#[derive(Clone, Debug, Default)]
pub struct GoogleDriveSync;

#[async_trait]
impl CloudSync for GoogleDriveSync {
    fn provider(&self) -> &'static str {
        "google_drive"
    }

    async fn push(&self, note: &Note) -> Result<String, SyncError> {
        tracing::info!(note = %note.id, provider = self.provider(), "cloud sync requested");
        Err(SyncError::NotImplemented {
            provider: self.provider(),
        })
    }
}
