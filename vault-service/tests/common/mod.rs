//! Test helper module for vault-service integration tests.
//!
//! Builds the full router over a fresh in-memory SQLite database, so tests
//! exercise the real middleware, handlers, and services with no external
//! dependencies.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

use service_core::config as core_config;
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use vault_service::{
    build_router,
    config::{
        AuditConfig, DatabaseConfig, EncryptionConfig, Environment, RateLimitConfig,
        SecurityConfig, SwaggerConfig, SwaggerMode, VaultConfig,
    },
    db::Database,
    services::{AccessGateway, AuditLedger, SecretCipher, SecretStore, TokenAuthority},
    AppState,
};

pub const TEST_ADMIN_API_KEY: &str = "test-admin-key-12345";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

fn test_config(audit_fail_open: bool) -> VaultConfig {
    VaultConfig {
        common: core_config::Config { port: 8080 },
        environment: Environment::Dev,
        service_name: "vault-service-test".to_string(),
        service_version: "0.0.0-test".to_string(),
        log_level: "error".to_string(),
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        encryption: EncryptionConfig {
            master_key: "ab".repeat(32),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            admin_api_key: TEST_ADMIN_API_KEY.to_string(),
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        },
        rate_limit: RateLimitConfig {
            device_code_attempts: 1000,
            device_code_window_seconds: 60,
            global_ip_limit: 10_000,
            global_ip_window_seconds: 60,
        },
        audit: AuditConfig {
            fail_open: audit_fail_open,
        },
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::with_config(test_config(false)).await
    }

    pub async fn spawn_with_audit_policy(audit_fail_open: bool) -> Self {
        Self::with_config(test_config(audit_fail_open)).await
    }

    /// A file-backed database with a multi-connection pool, for tests that
    /// need genuinely concurrent statements. The TempDir guard must outlive
    /// the app.
    pub async fn spawn_file_backed() -> (Self, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = test_config(false);
        config.database.url = format!("sqlite://{}", dir.path().join("vault.db").display());
        config.database.max_connections = 5;
        (Self::with_config(config).await, dir)
    }

    async fn with_config(config: VaultConfig) -> Self {
        let db = Database::connect(&config.database.url, config.database.max_connections)
            .await
            .expect("Failed to open test database");

        let cipher = Arc::new(
            SecretCipher::from_master_key(&config.encryption.master_key)
                .expect("Failed to build cipher"),
        );

        let ledger = AuditLedger::new(db.clone(), config.audit.fail_open);
        let store = SecretStore::new(db.clone(), cipher);
        let gateway = AccessGateway::new(store, ledger.clone());
        let authority = Arc::new(TokenAuthority::new(db.clone(), ledger.clone()));

        let state = AppState {
            config: config.clone(),
            db,
            gateway,
            authority,
            ledger,
            device_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.device_code_attempts,
                config.rate_limit.device_code_window_seconds,
            ),
            ip_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.global_ip_limit,
                config.rate_limit.global_ip_window_seconds,
            ),
        };

        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        TestApp { router, state }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request")
    }

    /// Issue a token through the session API. Returns (plaintext, token_id).
    pub async fn issue_token(
        &self,
        project_id: &str,
        scopes: &[&str],
        environment: Option<&str>,
        folder: Option<&str>,
    ) -> (String, String) {
        let body = json!({
            "name": "test-token",
            "scopes": scopes,
            "environment": environment,
            "folder": folder,
        });

        let response = self
            .send(
                Request::builder()
                    .method("POST")
                    .uri(format!("/projects/{}/tokens", project_id))
                    .header("content-type", "application/json")
                    .header("x-admin-api-key", TEST_ADMIN_API_KEY)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        (
            body["token"].as_str().unwrap().to_string(),
            body["id"].as_str().unwrap().to_string(),
        )
    }

    /// Create a secret through the token API.
    pub async fn create_secret(
        &self,
        token: &str,
        project_id: &str,
        environment: &str,
        folder: &str,
        name: &str,
        value: &str,
    ) -> Response {
        let body = json!({
            "name": name,
            "environment": environment,
            "folder": folder,
            "type": "API_KEY",
            "value": value,
        });

        self.send(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/projects/{}/secrets", project_id))
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn get_secret(
        &self,
        token: &str,
        project_id: &str,
        environment: &str,
        folder: &str,
        name: &str,
        include_value: bool,
    ) -> Response {
        self.send(
            Request::builder()
                .method("GET")
                .uri(format!(
                    "/v1/projects/{}/secrets/{}?environment={}&folder={}&include_value={}",
                    project_id, name, environment, folder, include_value
                ))
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Session-authenticated GET, for audit queries.
    pub async fn session_get(&self, uri: &str) -> Response {
        self.send(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("x-admin-api-key", TEST_ADMIN_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

pub async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");
    serde_json::from_slice(&body).expect("Response body was not valid JSON")
}
