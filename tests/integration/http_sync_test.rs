//! Full passes against a mocked HTTP API

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fieldsync::app::SyncApp;
use fieldsync::notify::Notifier;
use fieldsync::remote::HttpRemoteApi;
use fieldsync::shared::{AppConfig, RecordStatus};
use fieldsync::sync::NetworkMonitor;

use crate::assert_ok;
use crate::common::*;

async fn app_for(server: &MockServer) -> SyncApp {
    let config = AppConfig::builder()
        .server_url(server.uri())
        .api_token("field-token")
        .build()
        .unwrap();
    let remote = Arc::new(HttpRemoteApi::new(&config).unwrap());
    assert_ok!(
        SyncApp::from_parts(
            config,
            memory_store(),
            remote,
            Arc::new(NetworkMonitor::new(true)),
            Notifier::default(),
        )
        .await
    )
}

#[tokio::test]
async fn test_pass_resolves_server_ids_over_http() {
    let server = MockServer::start().await;
    let app = app_for(&server).await;

    let assessment_id = assert_ok!(app.capture().save_assessment(assessment("bldg-4")).await);
    let deficiency_id = assert_ok!(app.capture().save_deficiency(deficiency(&assessment_id)).await);
    let payload = recording(&assessment_id);
    let recording_id = assert_ok!(
        app.recordings()
            .queue_recording(payload.audio, &payload.mime_type, &payload.context)
            .await
    );

    Mock::given(method("POST"))
        .and(path("/api/assessments"))
        .and(header("authorization", "Bearer field-token"))
        .and(body_partial_json(json!({ "clientId": assessment_id, "assetId": "bldg-4" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 101 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/deficiencies"))
        .and(body_partial_json(json!({ "clientId": deficiency_id, "assessmentId": "101" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "def-9" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "url": format!("https://cdn.test/{}.webm", recording_id) })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "Cracked lintel" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/transcriptions"))
        .and(body_partial_json(json!({ "clientId": recording_id, "text": "Cracked lintel" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7 })))
        .expect(1)
        .mount(&server)
        .await;

    let result = assert_ok!(app.sync_now().await);
    assert_eq!(result.synced, 3);
    assert_eq!(result.failed, 0);
    assert_eq!(app.store().stats().await.unwrap().total, 0);
    assert_eq!(
        app.store().resolve_remote_id(&assessment_id).await.unwrap().as_deref(),
        Some("101")
    );

    assert_ok!(app.shutdown().await);
}

#[tokio::test]
async fn test_server_errors_mark_items_failed() {
    let server = MockServer::start().await;
    let app = app_for(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/assessments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&server)
        .await;

    let id = assert_ok!(app.capture().save_assessment(assessment("bldg-5")).await);
    let result = assert_ok!(app.sync_now().await);
    assert_eq!(result.failed, 1);
    assert!(!result.success);

    let record = app.store().get(&id).await.unwrap().unwrap();
    assert_eq!(record.status, RecordStatus::Failed);
    let message = record.error_message.unwrap();
    assert!(message.contains("500"), "{}", message);
    assert!(message.contains("database unavailable"), "{}", message);

    assert_ok!(app.shutdown().await);
}
