use chrono::TimeZone;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

fn note_json(id: &str, title: &str, text: Option<&str>) -> serde_json::Value {
    json!({
        "id": id,
        "title": title,
        "content": "",
        "text_content": text,
        "created_at": "2024-05-01T10:00:00.123456",
        "updated_at": "2024-05-01T10:00:00.123456",
        "google_drive_id": null,
    })
}

fn store(server: &MockServer) -> HttpNotesStore {
    HttpNotesStore::new(&ClientConfig::new(server.uri()), "secret-token").unwrap()
}

#[tokio::test]
async fn list_sends_bearer_token_and_decodes_notes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notes"))
        .and(header("Authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            note_json("a", "Groceries", None),
            note_json("b", "Lecture", Some("matrices")),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let notes = store(&server).list(None).await.unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[1].text_content.as_deref(), Some("matrices"));
}

#[tokio::test]
async fn list_with_search_filters_client_side() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notes"))
        .and(query_param("search", "matr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            note_json("a", "Groceries", None),
            note_json("b", "Lecture", Some("Matrices and vectors")),
            note_json("c", "MATRIX notes", None),
        ])))
        .mount(&server)
        .await;

    let ids: Vec<String> = store(&server)
        .list(Some("matr"))
        .await
        .unwrap()
        .into_iter()
        .map(|note| note.id)
        .collect();
    assert_eq!(ids, ["b", "c"]);
}

#[tokio::test]
async fn unauthorized_maps_to_dedicated_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notes"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "bad token"})))
        .mount(&server)
        .await;

    let error = store(&server).list(None).await.unwrap_err();
    assert!(matches!(error, StoreError::Unauthorized));
}

#[tokio::test]
async fn api_errors_carry_backend_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/notes"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"detail": "title too long"})),
        )
        .mount(&server)
        .await;

    let payload = NotePayload {
        title: "x".repeat(10),
        content: String::new(),
        text_content: None,
    };
    match store(&server).create(&payload).await.unwrap_err() {
        StoreError::Api { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "title too long");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn api_errors_without_detail_use_fallback_message() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/notes/n1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    match store(&server).delete("n1").await.unwrap_err() {
        StoreError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "failed to delete note");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn update_of_missing_note_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/notes/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Note not found"})))
        .mount(&server)
        .await;

    let payload = NotePayload {
        title: "t".into(),
        content: String::new(),
        text_content: None,
    };
    let error = store(&server).update("gone", &payload).await.unwrap_err();
    assert!(matches!(error, StoreError::NotFound(id) if id == "gone"));
}

#[tokio::test]
async fn update_puts_payload_and_returns_saved_note() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/notes/n1"))
        .and(body_partial_json(json!({"title": "Renamed", "text_content": "hi"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(note_json("n1", "Renamed", Some("hi"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let payload = NotePayload {
        title: "Renamed".into(),
        content: "data:image/png;base64,AAAA".into(),
        text_content: Some("hi".into()),
    };
    let saved = store(&server).update("n1", &payload).await.unwrap();
    let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
        + chrono::Duration::microseconds(123_456);
    assert_eq!(saved.updated_at, Some(expected));
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notes"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let error = store(&server).list(None).await.unwrap_err();
    assert!(matches!(error, StoreError::Decode(_)));
}

#[tokio::test]
async fn upload_posts_device_id_and_samples() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/bluetooth/connect"))
        .and(header("Authorization", "Bearer secret-token"))
        .and(body_partial_json(json!({
            "device_id": "pen-1",
            "stroke_data": [{"x": 10, "y": 20, "pressure": 30, "timestamp": 1_700_000_000_000i64}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Bluetooth data received successfully",
            "id": "upload-7",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sample = Sample {
        x: 10,
        y: 20,
        pressure: 30,
        timestamp: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
    };
    let ack = store(&server).upload_strokes("pen-1", &[sample]).await.unwrap();
    assert_eq!(ack.id.as_deref(), Some("upload-7"));
}
