//! Secret lifecycle through the token API: create, list, reveal, update,
//! delete, and the masking rules along the way.

mod common;

use axum::{body::Body, http::Request, http::StatusCode};
use common::{body_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn test_create_returns_masked_value() {
    let app = TestApp::spawn().await;
    let (token, _) = app.issue_token("proj-1", &["read", "write"], None, None).await;

    let response = app
        .create_secret(&token, "proj-1", "production", "backend", "DB_URL", "postgres://real")
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["name"], "DB_URL");
    assert_eq!(body["environment"], "production");
    assert_eq!(body["folder"], "backend");
    assert_eq!(body["value"], "********");
}

#[tokio::test]
async fn test_duplicate_create_conflicts() {
    let app = TestApp::spawn().await;
    let (token, _) = app.issue_token("proj-1", &["read", "write"], None, None).await;

    let first = app
        .create_secret(&token, "proj-1", "production", "backend", "DB_URL", "v1")
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .create_secret(&token, "proj-1", "production", "backend", "DB_URL", "v2")
        .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_same_name_in_different_folders_is_allowed() {
    let app = TestApp::spawn().await;
    let (token, _) = app.issue_token("proj-1", &["read", "write"], None, None).await;

    let a = app
        .create_secret(&token, "proj-1", "production", "backend", "API_KEY", "a")
        .await;
    let b = app
        .create_secret(&token, "proj-1", "production", "frontend", "API_KEY", "b")
        .await;
    let c = app
        .create_secret(&token, "proj-1", "staging", "backend", "API_KEY", "c")
        .await;

    assert_eq!(a.status(), StatusCode::CREATED);
    assert_eq!(b.status(), StatusCode::CREATED);
    assert_eq!(c.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_list_is_always_masked() {
    let app = TestApp::spawn().await;
    let (token, _) = app.issue_token("proj-1", &["read", "write"], None, None).await;

    app.create_secret(&token, "proj-1", "production", "backend", "A", "secret-a")
        .await;
    app.create_secret(&token, "proj-1", "production", "backend", "B", "secret-b")
        .await;

    let response = app
        .send(
            Request::builder()
                .method("GET")
                .uri("/v1/projects/proj-1/secrets?environment=production&folder=backend")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let secrets = body.as_array().unwrap();
    assert_eq!(secrets.len(), 2);
    for secret in secrets {
        assert_eq!(secret["value"], "********");
    }
}

#[tokio::test]
async fn test_reveal_round_trips_plaintext_and_audits() {
    let app = TestApp::spawn().await;
    let (token, _) = app.issue_token("proj-1", &["read", "write"], None, None).await;

    app.create_secret(&token, "proj-1", "production", "backend", "DB_URL", "postgres://real")
        .await;

    let masked = app
        .get_secret(&token, "proj-1", "production", "backend", "DB_URL", false)
        .await;
    assert_eq!(masked.status(), StatusCode::OK);
    assert_eq!(body_json(masked).await["value"], "********");

    let revealed = app
        .get_secret(&token, "proj-1", "production", "backend", "DB_URL", true)
        .await;
    assert_eq!(revealed.status(), StatusCode::OK);
    assert_eq!(body_json(revealed).await["value"], "postgres://real");

    // The reveal (and only the reveal) produced a secret_access event
    let events = app
        .session_get("/audit/events?project_id=proj-1&environment=production&folder=backend")
        .await;
    let events = body_json(events).await;
    let access_events: Vec<_> = events["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["event_type"] == "secret_access")
        .collect();
    assert_eq!(access_events.len(), 1);
}

#[tokio::test]
async fn test_update_value_and_type() {
    let app = TestApp::spawn().await;
    let (token, _) = app.issue_token("proj-1", &["read", "write"], None, None).await;

    app.create_secret(&token, "proj-1", "production", "backend", "KEY", "old-value")
        .await;

    let response = app
        .send(
            Request::builder()
                .method("PUT")
                .uri("/v1/projects/proj-1/secrets/KEY?environment=production&folder=backend")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::from(
                    json!({ "value": "new-value", "type": "PASSWORD" }).to_string(),
                ))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["type"], "PASSWORD");
    assert_eq!(body["value"], "********");

    let revealed = app
        .get_secret(&token, "proj-1", "production", "backend", "KEY", true)
        .await;
    assert_eq!(body_json(revealed).await["value"], "new-value");
}

#[tokio::test]
async fn test_delete_then_fetch_is_404_but_audit_survives() {
    let app = TestApp::spawn().await;
    let (token, _) = app.issue_token("proj-1", &["read", "write"], None, None).await;

    app.create_secret(&token, "proj-1", "production", "backend", "DOOMED", "v")
        .await;

    let response = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri("/v1/projects/proj-1/secrets/DOOMED?environment=production&folder=backend")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let gone = app
        .get_secret(&token, "proj-1", "production", "backend", "DOOMED", false)
        .await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    // Create and delete events remain queryable after the hard delete
    let events = app
        .session_get("/audit/events?project_id=proj-1&environment=production&folder=backend")
        .await;
    let events = body_json(events).await;
    let types: Vec<&str> = events["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event_type"].as_str().unwrap())
        .collect();
    assert!(types.contains(&"secret_create"));
    assert!(types.contains(&"secret_delete"));
}

#[tokio::test]
async fn test_environment_and_folder_are_normalized() {
    let app = TestApp::spawn().await;
    let (token, _) = app.issue_token("proj-1", &["read", "write"], None, None).await;

    let response = app
        .create_secret(&token, "proj-1", "  Production ", "My Folder", "KEY", "v")
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["environment"], "production");
    assert_eq!(body["folder"], "my-folder");

    // Fetchable under the canonical form
    let fetched = app
        .get_secret(&token, "proj-1", "PRODUCTION", "my-folder", "KEY", false)
        .await;
    assert_eq!(fetched.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_bearer_token_is_unauthorized() {
    let app = TestApp::spawn().await;

    let response = app
        .send(
            Request::builder()
                .method("GET")
                .uri("/v1/projects/proj-1/secrets?environment=production")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
