//! CLI device-code flow.
//!
//! Start and poll are public (IP rate limited); authorize requires the
//! session boundary. The minted token crosses the wire exactly once, on the
//! first poll after approval.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use crate::dtos::device::{
    AuthorizeDeviceRequest, AuthorizeDeviceResponse, PollDeviceFlowResponse,
    StartDeviceFlowResponse,
};
use crate::dtos::ErrorResponse;
use crate::middleware::SessionContext;
use crate::models::device_code::{DEVICE_CODE_POLL_INTERVAL_SECS, DEVICE_CODE_TTL_MINUTES};
use crate::models::TokenScope;
use crate::services::{DevicePoll, TokenGrant};
use crate::utils::ValidatedJson;
use crate::AppState;
use service_core::error::AppError;

/// Start a device authorization
#[utoipa::path(
    post,
    path = "/cli/device-code",
    responses(
        (status = 201, description = "Device flow started", body = StartDeviceFlowResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    tag = "CLI"
)]
pub async fn start_device_flow(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let code = state.authority.start_device_flow().await?;

    let verification_url = format!(
        "{}/cli/authorize",
        state
            .config
            .security
            .allowed_origins
            .first()
            .map(String::as_str)
            .unwrap_or("http://localhost:3000")
    );

    Ok((
        StatusCode::CREATED,
        Json(StartDeviceFlowResponse {
            device_code: code.device_code,
            user_code: code.user_code,
            verification_url,
            expires_in: DEVICE_CODE_TTL_MINUTES * 60,
            interval: DEVICE_CODE_POLL_INTERVAL_SECS,
        }),
    ))
}

/// Poll for the approval result
#[utoipa::path(
    get,
    path = "/cli/device-code/{device_code}",
    params(("device_code" = String, Path, description = "Code returned at flow start")),
    responses(
        (status = 200, description = "Pending, or approved with the token", body = PollDeviceFlowResponse),
        (status = 400, description = "Expired or already redeemed", body = ErrorResponse),
        (status = 404, description = "Unknown device code", body = ErrorResponse)
    ),
    tag = "CLI"
)]
pub async fn poll_device_flow(
    State(state): State<AppState>,
    Path(device_code): Path<String>,
) -> Result<Json<PollDeviceFlowResponse>, AppError> {
    match state.authority.poll_device(&device_code).await? {
        DevicePoll::Pending => Ok(Json(PollDeviceFlowResponse::Pending)),
        DevicePoll::Ready { token_id, token } => {
            Ok(Json(PollDeviceFlowResponse::Approved { token, token_id }))
        }
    }
}

/// Approve a user code from an authenticated session
#[utoipa::path(
    post,
    path = "/cli/device-code/{user_code}/authorize",
    request_body = AuthorizeDeviceRequest,
    params(("user_code" = String, Path, description = "Code the user read off the CLI")),
    responses(
        (status = 200, description = "Device authorized", body = AuthorizeDeviceResponse),
        (status = 400, description = "Expired or already approved", body = ErrorResponse),
        (status = 401, description = "Missing admin API key", body = ErrorResponse),
        (status = 404, description = "Unknown user code", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "CLI"
)]
pub async fn authorize_device(
    State(state): State<AppState>,
    Path(user_code): Path<String>,
    Extension(session): Extension<SessionContext>,
    ValidatedJson(req): ValidatedJson<AuthorizeDeviceRequest>,
) -> Result<Json<AuthorizeDeviceResponse>, AppError> {
    let scopes = req.scopes.unwrap_or_else(|| vec![TokenScope::Read]);

    let code = state
        .authority
        .approve_device(
            &user_code,
            &session.issuer(),
            TokenGrant {
                name: req.name,
                project_id: req.project_id,
                environment: req.environment,
                folder: req.folder,
                scopes,
                ttl_minutes: None,
            },
        )
        .await?;

    Ok(Json(AuthorizeDeviceResponse {
        message: "Device authorized".to_string(),
        user_code: code.user_code,
    }))
}
