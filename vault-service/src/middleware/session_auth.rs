use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::middleware::token_auth::request_meta;
use crate::services::{Issuer, RequestMeta};
use crate::AppState;

/// Identity of the session boundary caller: the upstream web app
/// authenticates end users and forwards who they are.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub actor_id: Option<String>,
    pub organization_id: Option<String>,
    pub meta: RequestMeta,
}

impl SessionContext {
    /// Attribution for audit events written on this caller's behalf.
    pub fn issuer(&self) -> Issuer {
        Issuer {
            user_id: self.actor_id.clone(),
            organization_id: self.organization_id.clone(),
            meta: self.meta.clone(),
        }
    }
}

/// Middleware for the session-facing API (token management, audit queries,
/// device approval). Requires the shared admin API key.
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let api_key = headers
        .get("x-admin-api-key")
        .and_then(|value| value.to_str().ok());

    // Constant-time comparison; the key is a long-lived shared credential.
    let authorized = api_key.is_some_and(|key| {
        key.as_bytes()
            .ct_eq(state.config.security.admin_api_key.as_bytes())
            .into()
    });

    if !authorized {
        tracing::warn!("Failed session authentication attempt");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized: Invalid or missing admin API key" })),
        )
            .into_response();
    }

    let actor_id = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let organization_id = headers
        .get("x-organization-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let meta = request_meta(&request);
    request.extensions_mut().insert(SessionContext {
        actor_id,
        organization_id,
        meta,
    });

    next.run(request).await
}
