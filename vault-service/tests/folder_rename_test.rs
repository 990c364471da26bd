//! Atomic folder rename: all secrets move or none do.

mod common;

use axum::{body::Body, http::Request, http::StatusCode};
use common::{body_json, TestApp};
use serde_json::json;

async fn rename(
    app: &TestApp,
    token: &str,
    environment: &str,
    old_folder: &str,
    new_folder: &str,
) -> axum::response::Response {
    app.send(
        Request::builder()
            .method("POST")
            .uri("/v1/projects/proj-1/folders/rename")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::from(
                json!({
                    "environment": environment,
                    "old_folder": old_folder,
                    "new_folder": new_folder,
                })
                .to_string(),
            ))
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn test_rename_moves_every_secret() {
    let app = TestApp::spawn().await;
    let (token, _) = app.issue_token("proj-1", &["read", "write"], None, None).await;

    app.create_secret(&token, "proj-1", "production", "backend", "A", "va")
        .await;
    app.create_secret(&token, "proj-1", "production", "backend", "B", "vb")
        .await;
    // A bystander in another folder stays put
    app.create_secret(&token, "proj-1", "production", "frontend", "C", "vc")
        .await;

    let response = rename(&app, &token, "production", "backend", "backend-services").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["renamed"], 2);
    assert_eq!(body["new_folder"], "backend-services");

    // Old folder is empty, new folder has both, values survived
    let gone = app
        .get_secret(&token, "proj-1", "production", "backend", "A", false)
        .await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    let moved = app
        .get_secret(&token, "proj-1", "production", "backend-services", "A", true)
        .await;
    assert_eq!(moved.status(), StatusCode::OK);
    assert_eq!(body_json(moved).await["value"], "va");

    let bystander = app
        .get_secret(&token, "proj-1", "production", "frontend", "C", false)
        .await;
    assert_eq!(bystander.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_collision_rolls_back_the_whole_rename() {
    let app = TestApp::spawn().await;
    let (token, _) = app.issue_token("proj-1", &["read", "write"], None, None).await;

    app.create_secret(&token, "proj-1", "production", "old", "A", "v")
        .await;
    app.create_secret(&token, "proj-1", "production", "old", "B", "v")
        .await;
    // Target already holds a secret named A
    app.create_secret(&token, "proj-1", "production", "new", "A", "v")
        .await;

    let response = rename(&app, &token, "production", "old", "new").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Nothing moved, including the non-colliding B
    for name in ["A", "B"] {
        let still_there = app
            .get_secret(&token, "proj-1", "production", "old", name, false)
            .await;
        assert_eq!(still_there.status(), StatusCode::OK, "secret {name}");
    }
}

#[tokio::test]
async fn test_identical_names_rejected() {
    let app = TestApp::spawn().await;
    let (token, _) = app.issue_token("proj-1", &["read", "write"], None, None).await;

    let response = rename(&app, &token, "production", "backend", "Backend!").await;
    // Slugified forms collide: "Backend!" normalizes to "backend"
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rename_requires_write_scope_and_is_audited_once() {
    let app = TestApp::spawn().await;
    let (writer, _) = app.issue_token("proj-1", &["read", "write"], None, None).await;
    let (reader, _) = app.issue_token("proj-1", &["read"], None, None).await;

    app.create_secret(&writer, "proj-1", "production", "backend", "A", "v")
        .await;
    app.create_secret(&writer, "proj-1", "production", "backend", "B", "v")
        .await;

    let denied = rename(&app, &reader, "production", "backend", "renamed").await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let response = rename(&app, &writer, "production", "backend", "renamed").await;
    assert_eq!(response.status(), StatusCode::OK);

    // One folder_rename event, not one per secret
    let events = app
        .session_get("/audit/events?project_id=proj-1&environment=production&folder=renamed")
        .await;
    let events = body_json(events).await;
    let renames: Vec<_> = events["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["event_type"] == "folder_rename")
        .collect();
    assert_eq!(renames.len(), 1);
}

#[tokio::test]
async fn test_folder_scoped_token_cannot_rename_into_another_folder() {
    let app = TestApp::spawn().await;
    let (admin_token, _) = app.issue_token("proj-1", &["read", "write"], None, None).await;

    app.create_secret(&admin_token, "proj-1", "production", "backend", "A", "va")
        .await;

    // Renaming writes into the target folder, which this token cannot reach
    let (scoped, _) = app
        .issue_token("proj-1", &["read", "write"], Some("production"), Some("backend"))
        .await;
    let denied = rename(&app, &scoped, "production", "backend", "elsewhere").await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    // Nothing moved
    let untouched = app
        .get_secret(&admin_token, "proj-1", "production", "backend", "A", false)
        .await;
    assert_eq!(untouched.status(), StatusCode::OK);
    let target = app
        .get_secret(&admin_token, "proj-1", "production", "elsewhere", "A", false)
        .await;
    assert_eq!(target.status(), StatusCode::NOT_FOUND);
}
