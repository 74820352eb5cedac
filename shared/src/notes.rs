//! JSON wire types for the notes and auth backend.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::Sample;

#[cfg(test)]
#[path = "notes_test.rs"]
mod notes_test;

/// A persisted note as the backend returns it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Note {
    pub id: String,
    pub title: String,
    /// Raster snapshot as a `data:image/png;base64,...` URL, or empty.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default, deserialize_with = "lenient_utc")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_utc")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "google_drive_id")]
    pub sync_id: Option<String>,
}

impl Note {
    /// Case-insensitive match on title or recognized text.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.title.to_lowercase().contains(&query)
            || self
                .text_content
                .as_deref()
                .is_some_and(|text| text.to_lowercase().contains(&query))
    }
}

/// Body of `POST /api/notes` and `PUT /api/notes/{id}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NotePayload {
    pub title: String,
    pub content: String,
    pub text_content: Option<String>,
}

/// Body of `POST /api/bluetooth/connect`.
#[derive(Serialize, Debug)]
pub struct UploadRequest<'a> {
    pub device_id: &'a str,
    pub stroke_data: &'a [Sample],
    pub timestamp: DateTime<Utc>,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct UploadAck {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize, Debug)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct TokenResponse {
    #[serde(alias = "access_token")]
    pub token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct HealthStatus {
    pub status: String,
}

/// Error envelope; the backend reports failures as `{"detail": "..."}`.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}

/// The backend emits naive UTC timestamps (no offset); accept both forms.
fn lenient_utc<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}
