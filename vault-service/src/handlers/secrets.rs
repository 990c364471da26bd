//! Token-scoped secret endpoints.
//!
//! Every handler pulls the validated TokenContext from extensions and defers
//! scope decisions to the gateway. Values come back masked unless the caller
//! explicitly asked for a reveal.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use crate::dtos::secrets::{
    CreateSecretRequest, DeleteSecretResponse, GetSecretQuery, ListSecretsQuery,
    RenameFolderRequest, RenameFolderResponse, SecretLocationQuery, UpdateSecretRequest,
};
use crate::dtos::ErrorResponse;
use crate::middleware::TokenContext;
use crate::models::SecretResponse;
use crate::services::{NewSecret, SecretUpdate};
use crate::utils::ValidatedJson;
use crate::AppState;
use service_core::error::AppError;

/// Create a secret
#[utoipa::path(
    post,
    path = "/v1/projects/{project_id}/secrets",
    request_body = CreateSecretRequest,
    params(("project_id" = String, Path, description = "Project the token is scoped to")),
    responses(
        (status = 201, description = "Secret created", body = SecretResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 409, description = "Secret already exists", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Secrets"
)]
pub async fn create_secret(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Extension(ctx): Extension<TokenContext>,
    ValidatedJson(req): ValidatedJson<CreateSecretRequest>,
) -> Result<impl IntoResponse, AppError> {
    let folder = req.folder.as_deref().unwrap_or("default");

    let secret = state
        .gateway
        .create_secret(
            &ctx.token,
            &project_id,
            &req.environment,
            folder,
            NewSecret {
                name: req.name,
                secret_type: req.secret_type,
                value: req.value,
                description: req.description,
                created_by: None,
            },
            &ctx.meta,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(SecretResponse::masked(&secret))))
}

/// List secrets, always masked
#[utoipa::path(
    get,
    path = "/v1/projects/{project_id}/secrets",
    params(
        ("project_id" = String, Path, description = "Project the token is scoped to"),
        ListSecretsQuery
    ),
    responses(
        (status = 200, description = "Masked secrets", body = [SecretResponse]),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Secrets"
)]
pub async fn list_secrets(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Extension(ctx): Extension<TokenContext>,
    Query(query): Query<ListSecretsQuery>,
) -> Result<Json<Vec<SecretResponse>>, AppError> {
    let secrets = state
        .gateway
        .list_secrets(
            &ctx.token,
            &project_id,
            query.environment.as_deref(),
            query.folder.as_deref(),
            &ctx.meta,
        )
        .await?;

    Ok(Json(secrets.iter().map(SecretResponse::masked).collect()))
}

/// Fetch one secret; `include_value=true` reveals and audits
#[utoipa::path(
    get,
    path = "/v1/projects/{project_id}/secrets/{name}",
    params(
        ("project_id" = String, Path, description = "Project the token is scoped to"),
        ("name" = String, Path, description = "Secret name"),
        GetSecretQuery
    ),
    responses(
        (status = 200, description = "The secret, masked or revealed", body = SecretResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Secret not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Secrets"
)]
pub async fn get_secret(
    State(state): State<AppState>,
    Path((project_id, name)): Path<(String, String)>,
    Extension(ctx): Extension<TokenContext>,
    Query(query): Query<GetSecretQuery>,
) -> Result<Json<SecretResponse>, AppError> {
    let folder = query.folder.as_deref().unwrap_or("default");

    if query.include_value {
        let (secret, plaintext) = state
            .gateway
            .reveal_secret(
                &ctx.token,
                &project_id,
                &query.environment,
                folder,
                &name,
                &ctx.meta,
            )
            .await?;
        Ok(Json(SecretResponse::revealed(&secret, plaintext)))
    } else {
        let secret = state
            .gateway
            .get_secret(
                &ctx.token,
                &project_id,
                &query.environment,
                folder,
                &name,
                &ctx.meta,
            )
            .await?;
        Ok(Json(SecretResponse::masked(&secret)))
    }
}

/// Update a secret
#[utoipa::path(
    put,
    path = "/v1/projects/{project_id}/secrets/{name}",
    request_body = UpdateSecretRequest,
    params(
        ("project_id" = String, Path, description = "Project the token is scoped to"),
        ("name" = String, Path, description = "Secret name"),
        SecretLocationQuery
    ),
    responses(
        (status = 200, description = "Secret updated", body = SecretResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Secret not found", body = ErrorResponse),
        (status = 409, description = "Secret already exists at target", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Secrets"
)]
pub async fn update_secret(
    State(state): State<AppState>,
    Path((project_id, name)): Path<(String, String)>,
    Extension(ctx): Extension<TokenContext>,
    Query(query): Query<SecretLocationQuery>,
    ValidatedJson(req): ValidatedJson<UpdateSecretRequest>,
) -> Result<Json<SecretResponse>, AppError> {
    let folder = query.folder.as_deref().unwrap_or("default");

    let secret = state
        .gateway
        .update_secret(
            &ctx.token,
            &project_id,
            &query.environment,
            folder,
            &name,
            SecretUpdate {
                name: req.name,
                folder: req.folder,
                value: req.value,
                secret_type: req.secret_type,
                description: req.description,
            },
            &ctx.meta,
        )
        .await?;

    Ok(Json(SecretResponse::masked(&secret)))
}

/// Delete a secret
#[utoipa::path(
    delete,
    path = "/v1/projects/{project_id}/secrets/{name}",
    params(
        ("project_id" = String, Path, description = "Project the token is scoped to"),
        ("name" = String, Path, description = "Secret name"),
        SecretLocationQuery
    ),
    responses(
        (status = 200, description = "Secret deleted", body = DeleteSecretResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Secret not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Secrets"
)]
pub async fn delete_secret(
    State(state): State<AppState>,
    Path((project_id, name)): Path<(String, String)>,
    Extension(ctx): Extension<TokenContext>,
    Query(query): Query<SecretLocationQuery>,
) -> Result<Json<DeleteSecretResponse>, AppError> {
    let folder = query.folder.as_deref().unwrap_or("default");

    state
        .gateway
        .delete_secret(
            &ctx.token,
            &project_id,
            &query.environment,
            folder,
            &name,
            &ctx.meta,
        )
        .await?;

    Ok(Json(DeleteSecretResponse {
        message: "Secret deleted".to_string(),
    }))
}

/// Rename a folder, moving its secrets atomically
#[utoipa::path(
    post,
    path = "/v1/projects/{project_id}/folders/rename",
    request_body = RenameFolderRequest,
    params(("project_id" = String, Path, description = "Project the token is scoped to")),
    responses(
        (status = 200, description = "Folder renamed", body = RenameFolderResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 409, description = "Name collision in target folder", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Secrets"
)]
pub async fn rename_folder(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Extension(ctx): Extension<TokenContext>,
    ValidatedJson(req): ValidatedJson<RenameFolderRequest>,
) -> Result<Json<RenameFolderResponse>, AppError> {
    let renamed = state
        .gateway
        .rename_folder(
            &ctx.token,
            &project_id,
            &req.environment,
            &req.old_folder,
            &req.new_folder,
            &ctx.meta,
        )
        .await?;

    Ok(Json(RenameFolderResponse {
        renamed,
        new_folder: crate::models::normalize_folder(&req.new_folder),
    }))
}
