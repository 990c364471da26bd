pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use service_core::middleware::{
    metrics::metrics_middleware, rate_limit::ip_rate_limit_middleware,
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::VaultConfig;
use crate::db::Database;
use crate::services::{AccessGateway, AuditLedger, TokenAuthority};
use service_core::error::AppError;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::secrets::create_secret,
        handlers::secrets::list_secrets,
        handlers::secrets::get_secret,
        handlers::secrets::update_secret,
        handlers::secrets::delete_secret,
        handlers::secrets::rename_folder,
        handlers::tokens::issue_token,
        handlers::tokens::list_tokens,
        handlers::tokens::revoke_token,
        handlers::audit::folder_events,
        handlers::audit::recent_events,
        handlers::audit::security_events,
        handlers::device::start_device_flow,
        handlers::device::poll_device_flow,
        handlers::device::authorize_device,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::secrets::CreateSecretRequest,
            dtos::secrets::UpdateSecretRequest,
            dtos::secrets::RenameFolderRequest,
            dtos::secrets::RenameFolderResponse,
            dtos::secrets::DeleteSecretResponse,
            dtos::tokens::IssueTokenRequest,
            dtos::tokens::IssueTokenResponse,
            dtos::tokens::TokenListResponse,
            dtos::tokens::RevokeTokenResponse,
            dtos::device::StartDeviceFlowResponse,
            dtos::device::PollDeviceFlowResponse,
            dtos::device::AuthorizeDeviceRequest,
            dtos::device::AuthorizeDeviceResponse,
            dtos::audit::AuditEventsResponse,
            models::SecretResponse,
            models::SecretType,
            models::TokenScope,
            models::AccessTokenResponse,
            models::AuditEventResponse,
            models::Severity,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Secrets", description = "Token-scoped secret storage"),
        (name = "Tokens", description = "Access token issuance and revocation"),
        (name = "Audit", description = "Append-only audit trail queries"),
        (name = "CLI", description = "Device-code authorization for the CLI"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .build(),
                ),
            );
            components.add_security_scheme(
                "admin_api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-admin-api-key"))),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: VaultConfig,
    pub db: Database,
    pub gateway: AccessGateway,
    pub authority: Arc<TokenAuthority>,
    pub ledger: AuditLedger,
    pub device_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub ip_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Token-scoped secret API
    let secret_routes = Router::new()
        .route(
            "/v1/projects/:project_id/secrets",
            post(handlers::secrets::create_secret).get(handlers::secrets::list_secrets),
        )
        .route(
            "/v1/projects/:project_id/secrets/:name",
            get(handlers::secrets::get_secret)
                .put(handlers::secrets::update_secret)
                .delete(handlers::secrets::delete_secret),
        )
        .route(
            "/v1/projects/:project_id/folders/rename",
            post(handlers::secrets::rename_folder),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::token_auth_middleware,
        ));

    // Session API: token management, audit queries, device approval
    let session_routes = Router::new()
        .route(
            "/projects/:project_id/tokens",
            post(handlers::tokens::issue_token).get(handlers::tokens::list_tokens),
        )
        .route("/tokens/:token_id", delete(handlers::tokens::revoke_token))
        .route("/audit/events", get(handlers::audit::folder_events))
        .route("/audit/recent", get(handlers::audit::recent_events))
        .route("/audit/security", get(handlers::audit::security_events))
        .route(
            "/cli/device-code/:user_code/authorize",
            post(handlers::device::authorize_device),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::session_auth_middleware,
        ));

    // Public device-code endpoints, rate limited per IP
    let device_limiter = state.device_rate_limiter.clone();
    let device_routes = Router::new()
        .route("/cli/device-code", post(handlers::device::start_device_flow))
        .route(
            "/cli/device-code/:device_code",
            get(handlers::device::poll_device_flow),
        )
        .layer(from_fn_with_state(device_limiter, ip_rate_limit_middleware));

    let ip_limiter = state.ip_rate_limiter.clone();

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics));

    // Only add Swagger UI if enabled in config
    let swagger_enabled = match state.config.environment {
        crate::config::Environment::Dev => true,
        crate::config::Environment::Prod => match state.config.swagger.enabled {
            crate::config::SwaggerMode::Public | crate::config::SwaggerMode::Authenticated => true,
            crate::config::SwaggerMode::Disabled => false,
        },
    };

    if swagger_enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        // Still provide the OpenAPI JSON for programmatic access
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { service_core::axum::Json(ApiDoc::openapi()) }),
        );
    }

    let app = app
        .merge(secret_routes)
        .merge(session_routes)
        .merge(device_routes)
        .with_state(state.clone())
        // Global IP rate limiting
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        // Add metrics middleware
        .layer(from_fn(metrics_middleware))
        // Add tracing layer
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        // Add security headers middleware
        .layer(from_fn(security_headers_middleware))
        // Add CORS layer
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .map(|o| {
                            o.parse::<service_core::axum::http::HeaderValue>()
                                .unwrap_or_else(|e| {
                                    tracing::error!(
                                        "Invalid CORS origin '{}': {}. Using fallback.",
                                        o,
                                        e
                                    );
                                    service_core::axum::http::HeaderValue::from_static("*")
                                })
                        })
                        .collect::<Vec<service_core::axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    service_core::axum::http::Method::GET,
                    service_core::axum::http::Method::POST,
                    service_core::axum::http::Method::PUT,
                    service_core::axum::http::Method::DELETE,
                    service_core::axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    service_core::axum::http::header::AUTHORIZATION,
                    service_core::axum::http::header::CONTENT_TYPE,
                    service_core::axum::http::header::HeaderName::from_static("x-admin-api-key"),
                    service_core::axum::http::header::HeaderName::from_static("x-actor-id"),
                    service_core::axum::http::header::HeaderName::from_static(
                        "x-organization-id",
                    ),
                ]),
        );

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    service_core::axum::extract::State(state): service_core::axum::extract::State<AppState>,
) -> Result<service_core::axum::Json<serde_json::Value>, AppError> {
    state.db.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Database health check failed");
        AppError::from(e)
    })?;

    Ok(service_core::axum::Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
    })))
}
