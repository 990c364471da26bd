//! Scope enforcement end to end: a narrowly scoped token can do exactly
//! what its scope says and nothing else, and every denial looks the same
//! from the outside while being precisely recorded in the audit trail.

mod common;

use axum::{body::Body, http::Request, http::StatusCode};
use common::{body_json, TestApp};

#[tokio::test]
async fn test_read_token_scoped_to_env_and_folder() {
    let app = TestApp::spawn().await;

    // Seed secrets in several locations with a broad token
    let (admin_token, _) = app.issue_token("proj-1", &["read", "write"], None, None).await;
    for (env, folder, name) in [
        ("production", "api-keys", "STRIPE_KEY"),
        ("production", "certs", "TLS_CERT"),
        ("staging", "api-keys", "STRIPE_KEY"),
    ] {
        let r = app
            .create_secret(&admin_token, "proj-1", env, folder, name, "value")
            .await;
        assert_eq!(r.status(), StatusCode::CREATED);
    }

    // Narrow token: read-only, production/api-keys
    let (token, _) = app
        .issue_token("proj-1", &["read"], Some("production"), Some("api-keys"))
        .await;

    // In-scope read succeeds
    let ok = app
        .get_secret(&token, "proj-1", "production", "api-keys", "STRIPE_KEY", true)
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(body_json(ok).await["value"], "value");

    // Write in scope: denied (missing scope)
    let write = app
        .create_secret(&token, "proj-1", "production", "api-keys", "NEW", "v")
        .await;
    assert_eq!(write.status(), StatusCode::FORBIDDEN);

    // Read outside the folder: denied
    let folder = app
        .get_secret(&token, "proj-1", "production", "certs", "TLS_CERT", false)
        .await;
    assert_eq!(folder.status(), StatusCode::FORBIDDEN);

    // Read outside the environment: denied
    let env = app
        .get_secret(&token, "proj-1", "staging", "api-keys", "STRIPE_KEY", false)
        .await;
    assert_eq!(env.status(), StatusCode::FORBIDDEN);

    // Wrong project: denied
    let project = app
        .get_secret(&token, "proj-2", "production", "api-keys", "STRIPE_KEY", false)
        .await;
    assert_eq!(project.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_denials_are_indistinguishable() {
    let app = TestApp::spawn().await;
    let (token, _) = app
        .issue_token("proj-1", &["read"], Some("production"), Some("api-keys"))
        .await;

    // Wrong scope, wrong folder, wrong environment, wrong project: the
    // response body must not reveal which rule failed.
    let mut bodies = Vec::new();
    for (project, env, folder) in [
        ("proj-1", "production", "certs"),
        ("proj-1", "staging", "api-keys"),
        ("proj-2", "production", "api-keys"),
    ] {
        let response = app
            .get_secret(&token, project, env, folder, "ANY", false)
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        bodies.push(body_json(response).await);
    }

    let write_denied = app
        .create_secret(&token, "proj-1", "production", "api-keys", "NEW", "v")
        .await;
    assert_eq!(write_denied.status(), StatusCode::FORBIDDEN);
    bodies.push(body_json(write_denied).await);

    for body in &bodies[1..] {
        assert_eq!(body, &bodies[0]);
    }
}

#[tokio::test]
async fn test_denials_are_audited_with_reason() {
    let app = TestApp::spawn().await;
    let (token, token_id) = app
        .issue_token("proj-1", &["read"], Some("production"), None)
        .await;

    let denied = app
        .get_secret(&token, "proj-1", "staging", "default", "ANY", false)
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let response = app.session_get("/audit/security?limit=10").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let events = body["events"].as_array().unwrap();

    let denial = events
        .iter()
        .find(|e| e["event_type"] == "unauthorized_access")
        .expect("denial must be audited");
    assert_eq!(denial["severity"], "CRITICAL");
    assert_eq!(denial["token_id"], token_id.as_str());
    assert!(denial["metadata"]
        .as_str()
        .unwrap()
        .contains("environment_mismatch"));
}

#[tokio::test]
async fn test_unrestricted_token_narrows_listing_to_filters() {
    let app = TestApp::spawn().await;
    let (admin_token, _) = app.issue_token("proj-1", &["read", "write"], None, None).await;

    app.create_secret(&admin_token, "proj-1", "production", "backend", "A", "v")
        .await;
    app.create_secret(&admin_token, "proj-1", "staging", "backend", "B", "v")
        .await;

    // A folder-scoped token sees only its folder even with no filter
    let (scoped, _) = app
        .issue_token("proj-1", &["read"], Some("production"), Some("backend"))
        .await;
    let response = app
        .send(
            Request::builder()
                .method("GET")
                .uri("/v1/projects/proj-1/secrets")
                .header("authorization", format!("Bearer {}", scoped))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["A"]);

    // An explicit filter outside the token's restriction is a denial
    let response = app
        .send(
            Request::builder()
                .method("GET")
                .uri("/v1/projects/proj-1/secrets?environment=staging")
                .header("authorization", format!("Bearer {}", scoped))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_folder_scoped_token_cannot_move_a_secret_out_of_its_folder() {
    let app = TestApp::spawn().await;

    let (admin_token, _) = app.issue_token("proj-1", &["read", "write"], None, None).await;
    let created = app
        .create_secret(&admin_token, "proj-1", "production", "api-keys", "STRIPE_KEY", "sk_live")
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);

    let (scoped, _) = app
        .issue_token("proj-1", &["read", "write"], Some("production"), Some("api-keys"))
        .await;

    let update = |body: serde_json::Value| {
        Request::builder()
            .method("PUT")
            .uri("/v1/projects/proj-1/secrets/STRIPE_KEY?environment=production&folder=api-keys")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", scoped))
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    // Updating in place is within scope
    let in_place = app.send(update(serde_json::json!({ "value": "sk_live_2" }))).await;
    assert_eq!(in_place.status(), StatusCode::OK);

    // Moving it targets a folder the token cannot write
    let moved = app.send(update(serde_json::json!({ "folder": "certs" }))).await;
    assert_eq!(moved.status(), StatusCode::FORBIDDEN);

    // The secret stayed where it was
    let source = app
        .get_secret(&admin_token, "proj-1", "production", "api-keys", "STRIPE_KEY", false)
        .await;
    assert_eq!(source.status(), StatusCode::OK);
    let target = app
        .get_secret(&admin_token, "proj-1", "production", "certs", "STRIPE_KEY", false)
        .await;
    assert_eq!(target.status(), StatusCode::NOT_FOUND);

    // The blocked move is in the audit trail with its reason
    let events = body_json(app.session_get("/audit/security?limit=10").await).await;
    let denied = events["events"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| {
            e["event_type"] == "unauthorized_access"
                && e["metadata"].as_str().unwrap_or("").contains("folder_mismatch")
        });
    assert!(denied, "expected a folder_mismatch denial event");
}
