use std::{io::Cursor, sync::Arc, time::Duration};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header::CONTENT_TYPE},
    response::Response,
};
use fileforge_api::{AppState, RouterSettings, Toolbox, api_router};
use fileforge_jobs::{ArchiveStore, BatchRunner, RunnerSettings};
use fileforge_notify::{DeliveryMode, EventKind, ProgressHub, ProgressSink};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

struct Harness {
    _output: TempDir,
    hub: Arc<ProgressHub>,
    app: Router,
}

fn harness() -> Harness {
    let output = tempfile::tempdir().unwrap();
    let hub = Arc::new(ProgressHub::new(DeliveryMode::RoomAndBroadcast));
    let sink: Arc<dyn ProgressSink> = hub.clone();
    let runner = BatchRunner::new(
        sink,
        ArchiveStore::new(output.path()),
        RunnerSettings::default(),
    )
    .unwrap();
    let state = AppState::new(runner, Arc::clone(&hub), Toolbox::default());
    Harness {
        _output: output,
        hub,
        app: api_router(state, RouterSettings::default()),
    }
}

async fn post_json(app: &Router, uri: &str, body: Value) -> Response {
    app.clone()
        .oneshot(
            Request::post(uri)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn wait_for_terminal(hub: &ProgressHub, job_id: &str) -> EventKind {
    for _ in 0..500 {
        if let Some(event) = hub.last_event(job_id)
            && event.kind().is_terminal()
        {
            return event.kind();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never finished");
}

#[tokio::test]
async fn health_is_live() {
    let harness = harness();
    let response = get(&harness.app, "/health/live").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn bulk_submit_answers_before_work_and_archive_downloads() {
    let harness = harness();
    let response = post_json(
        &harness.app,
        "/api/password/bulk",
        json!({
            "items": [{"label": "alice"}, {"label": "bob"}, {"label": "  "}],
            "config": {"length": 20}
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let ticket = body_json(response).await;
    let job_id = ticket["jobId"].as_str().unwrap().to_string();
    assert!(job_id.starts_with("password-bulk-"));

    assert_eq!(wait_for_terminal(&harness.hub, &job_id).await, EventKind::Complete);

    let last = body_json(get(&harness.app, &format!("/api/jobs/{job_id}/last-event")).await).await;
    assert_eq!(last["event"], "password-bulk:complete");
    assert_eq!(last["data"]["succeeded"], 2);
    assert_eq!(last["data"]["skipped"], 1);
    assert_eq!(
        last["data"]["downloadUrl"],
        format!("/api/password/download/{job_id}")
    );

    let first = get(&harness.app, &format!("/api/password/download/{job_id}")).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()[CONTENT_TYPE], "application/zip");
    let first = body_bytes(first).await;
    let second = body_bytes(get(&harness.app, &format!("/api/password/download/{job_id}")).await).await;
    assert_eq!(first, second);

    let mut archive = zip::ZipArchive::new(Cursor::new(first)).unwrap();
    let mut names: Vec<String> = (0..archive.len())
        .map(|index| archive.by_index(index).unwrap().name().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["alice.txt", "bob.txt"]);
}

#[tokio::test]
async fn caller_supplied_job_id_is_used() {
    let harness = harness();
    let response = post_json(
        &harness.app,
        "/api/qr/bulk",
        json!({"jobId": "batch_42", "items": [{"content": "hello"}], "config": null}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await["jobId"], "batch_42");
    assert_eq!(wait_for_terminal(&harness.hub, "batch_42").await, EventKind::Complete);

    let response = get(&harness.app, "/api/qr/download/batch_42").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json(
        &harness.app,
        "/api/qr/bulk",
        json!({"jobId": "batch_42", "items": [{"content": "again"}]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "JobAlreadyExists");
}

#[tokio::test]
async fn setup_failures_are_rejected_without_events() {
    let harness = harness();
    let response = post_json(
        &harness.app,
        "/api/password/bulk",
        json!({"jobId": "bad-config", "items": [{}], "config": {"length": 2}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "InvalidConfig");
    assert!(harness.hub.last_event("bad-config").is_none());

    let response = post_json(
        &harness.app,
        "/api/password/bulk",
        json!({"jobId": "../escape", "items": [{}]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "InvalidArgument");
}

#[tokio::test]
async fn unknown_archive_and_job_are_not_found() {
    let harness = harness();
    let response = get(&harness.app, "/api/convert/download/nothing-here").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NoSuchArchive");

    let response = get(&harness.app, "/api/jobs/nothing-here/last-event").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn single_item_returns_the_artifact() {
    let harness = harness();
    let response = post_json(
        &harness.app,
        "/api/qr",
        json!({"input": {"label": "site", "content": "https://example.com"}, "config": {"size": 128}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
    let bytes = body_bytes(response).await;
    assert_eq!(&bytes[1..4], b"PNG");
}

#[tokio::test]
async fn single_item_skip_and_failure_map_to_client_errors() {
    let harness = harness();
    let skipped = post_json(&harness.app, "/api/qr", json!({"input": {"content": ""}})).await;
    assert_eq!(skipped.status(), StatusCode::BAD_REQUEST);

    let failed = post_json(
        &harness.app,
        "/api/fetch",
        json!({"input": {"url": "ftp://example.com/file.txt"}}),
    )
    .await;
    assert_eq!(failed.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(failed).await["code"], "WorkFailed");
}
