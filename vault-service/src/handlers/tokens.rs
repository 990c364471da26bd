//! Session-facing token management.
//!
//! These endpoints sit behind the admin API key; the upstream dashboard
//! authenticates end users and forwards the acting user in x-actor-id.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use crate::dtos::tokens::{
    IssueTokenRequest, IssueTokenResponse, RevokeTokenResponse, TokenListResponse,
};
use crate::dtos::ErrorResponse;
use crate::middleware::SessionContext;
use crate::models::AccessTokenResponse;
use crate::services::{TokenGrant, PAT_PREFIX};
use crate::utils::ValidatedJson;
use crate::AppState;
use service_core::error::AppError;

/// Issue an access token for a project
#[utoipa::path(
    post,
    path = "/projects/{project_id}/tokens",
    request_body = IssueTokenRequest,
    params(("project_id" = String, Path, description = "Project to pin the token to")),
    responses(
        (status = 201, description = "Token issued; plaintext shown once", body = IssueTokenResponse),
        (status = 401, description = "Missing admin API key", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Tokens"
)]
pub async fn issue_token(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Extension(session): Extension<SessionContext>,
    ValidatedJson(req): ValidatedJson<IssueTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (token, plaintext) = state
        .authority
        .mint(
            TokenGrant {
                name: req.name,
                project_id,
                environment: req.environment,
                folder: req.folder,
                scopes: req.scopes,
                ttl_minutes: req.expires_in_minutes,
            },
            PAT_PREFIX,
            &session.issuer(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(IssueTokenResponse {
            token: plaintext,
            metadata: AccessTokenResponse::from(token),
        }),
    ))
}

/// List a project's tokens (metadata only)
#[utoipa::path(
    get,
    path = "/projects/{project_id}/tokens",
    params(("project_id" = String, Path, description = "Project")),
    responses(
        (status = 200, description = "Token metadata", body = TokenListResponse),
        (status = 401, description = "Missing admin API key", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Tokens"
)]
pub async fn list_tokens(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<TokenListResponse>, AppError> {
    let tokens = state.authority.list(&project_id).await?;

    Ok(Json(TokenListResponse {
        tokens: tokens.into_iter().map(AccessTokenResponse::from).collect(),
    }))
}

/// Revoke a token (idempotent)
#[utoipa::path(
    delete,
    path = "/tokens/{token_id}",
    params(("token_id" = String, Path, description = "Token id")),
    responses(
        (status = 200, description = "Token revoked", body = RevokeTokenResponse),
        (status = 401, description = "Missing admin API key", body = ErrorResponse),
        (status = 404, description = "Token not found", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Tokens"
)]
pub async fn revoke_token(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<RevokeTokenResponse>, AppError> {
    let token = state.authority.revoke(&token_id, &session.issuer()).await?;

    Ok(Json(RevokeTokenResponse {
        message: "Token revoked".to_string(),
        token: AccessTokenResponse::from(token),
    }))
}
