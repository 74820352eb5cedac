//! HTTP clients for the notes backend.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use pennote_shared::{ErrorBody, Note, NotePayload, Sample, UploadAck, UploadRequest};

use crate::config::ClientConfig;

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not authorized; log in again")]
    Unauthorized,
    #[error("note {0} not found")]
    NotFound(String),
    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Sink for raw pen samples collected by a device session.
#[async_trait]
pub trait StrokeUploader: Send + Sync {
    async fn upload_strokes(
        &self,
        device_id: &str,
        samples: &[Sample],
    ) -> Result<UploadAck, StoreError>;
}

/// Persistence for notes.
#[async_trait]
pub trait NotesStore: StrokeUploader {
    /// Lists notes, narrowed to those matching `search` when given.
    async fn list(&self, search: Option<&str>) -> Result<Vec<Note>, StoreError>;
    async fn create(&self, note: &NotePayload) -> Result<Note, StoreError>;
    async fn update(&self, id: &str, note: &NotePayload) -> Result<Note, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Base URL plus a configured reqwest client, shared by the store and auth
/// clients.
#[derive(Clone, Debug)]
pub(crate) struct Backend {
    http: reqwest::Client,
    base_url: String,
}

impl Backend {
    pub(crate) fn new(config: &ClientConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }
}

/// Maps non-success responses onto [`StoreError`], preferring the backend's
/// `detail` message over `fallback`.
pub(crate) async fn check(response: Response, fallback: &str) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(StoreError::Unauthorized);
    }
    let body: ErrorBody = response.json().await.unwrap_or_default();
    let message = body.detail.unwrap_or_else(|| fallback.to_string());
    tracing::debug!(status = status.as_u16(), %message, "backend request failed");
    Err(StoreError::Api {
        status: status.as_u16(),
        message,
    })
}

pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|error| StoreError::Decode(error.to_string()))
}

#[derive(Clone, Debug)]
pub struct HttpNotesStore {
    backend: Backend,
    token: String,
}

impl HttpNotesStore {
    pub fn new(config: &ClientConfig, token: impl Into<String>) -> Result<Self, StoreError> {
        Ok(Self {
            backend: Backend::new(config)?,
            token: token.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.backend.request(method, path).bearer_auth(&self.token)
    }
}

fn not_found_as(id: &str, error: StoreError) -> StoreError {
    match error {
        StoreError::Api { status: 404, .. } => StoreError::NotFound(id.to_string()),
        other => other,
    }
}

#[async_trait]
impl StrokeUploader for HttpNotesStore {
    async fn upload_strokes(
        &self,
        device_id: &str,
        samples: &[Sample],
    ) -> Result<UploadAck, StoreError> {
        let body = UploadRequest {
            device_id,
            stroke_data: samples,
            timestamp: Utc::now(),
        };
        let response = self
            .request(Method::POST, "/api/bluetooth/connect")
            .json(&body)
            .send()
            .await?;
        let response = check(response, "failed to upload pen data").await?;
        read_json(response).await
    }
}

#[async_trait]
impl NotesStore for HttpNotesStore {
    async fn list(&self, search: Option<&str>) -> Result<Vec<Note>, StoreError> {
        let search = search.map(str::trim).filter(|query| !query.is_empty());
        let mut request = self.request(Method::GET, "/api/notes");
        if let Some(query) = search {
            request = request.query(&[("search", query)]);
        }
        let response = check(request.send().await?, "failed to load notes").await?;
        let notes: Vec<Note> = read_json(response).await?;
        // The backend may ignore `search`; filter here as well.
        Ok(match search {
            Some(query) => notes.into_iter().filter(|note| note.matches(query)).collect(),
            None => notes,
        })
    }

    async fn create(&self, note: &NotePayload) -> Result<Note, StoreError> {
        let response = self
            .request(Method::POST, "/api/notes")
            .json(note)
            .send()
            .await?;
        let response = check(response, "failed to create note").await?;
        read_json(response).await
    }

    async fn update(&self, id: &str, note: &NotePayload) -> Result<Note, StoreError> {
        let response = self
            .request(Method::PUT, &format!("/api/notes/{id}"))
            .json(note)
            .send()
            .await?;
        let response = check(response, "failed to update note")
            .await
            .map_err(|error| not_found_as(id, error))?;
        read_json(response).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let response = self
            .request(Method::DELETE, &format!("/api/notes/{id}"))
            .send()
            .await?;
        check(response, "failed to delete note")
            .await
            .map_err(|error| not_found_as(id, error))?;
        Ok(())
    }
}
