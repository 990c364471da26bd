//! Audit query endpoints, session-authenticated.

use axum::{
    extract::{Query, State},
    Json,
};

use crate::dtos::audit::{AuditEventsResponse, FolderAuditQuery, RecentAuditQuery};
use crate::dtos::ErrorResponse;
use crate::models::AuditEventResponse;
use crate::AppState;
use service_core::error::AppError;

/// Events for one folder, newest first
#[utoipa::path(
    get,
    path = "/audit/events",
    params(FolderAuditQuery),
    responses(
        (status = 200, description = "Audit events", body = AuditEventsResponse),
        (status = 401, description = "Missing admin API key", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Audit"
)]
pub async fn folder_events(
    State(state): State<AppState>,
    Query(query): Query<FolderAuditQuery>,
) -> Result<Json<AuditEventsResponse>, AppError> {
    let environment = crate::models::normalize_environment(&query.environment);
    let folder = crate::models::normalize_folder(query.folder.as_deref().unwrap_or("default"));

    let events = state
        .ledger
        .query_by_folder(
            &query.project_id,
            &environment,
            &folder,
            query.limit,
            query.offset,
        )
        .await?;

    Ok(Json(AuditEventsResponse {
        events: events.into_iter().map(AuditEventResponse::from).collect(),
    }))
}

/// Most recent events across the organization
#[utoipa::path(
    get,
    path = "/audit/recent",
    params(RecentAuditQuery),
    responses(
        (status = 200, description = "Recent audit events", body = AuditEventsResponse),
        (status = 401, description = "Missing admin API key", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Audit"
)]
pub async fn recent_events(
    State(state): State<AppState>,
    Query(query): Query<RecentAuditQuery>,
) -> Result<Json<AuditEventsResponse>, AppError> {
    let events = state
        .ledger
        .query_recent(query.organization_id.as_deref(), query.limit)
        .await?;

    Ok(Json(AuditEventsResponse {
        events: events.into_iter().map(AuditEventResponse::from).collect(),
    }))
}

/// Security-relevant events with severity annotations
#[utoipa::path(
    get,
    path = "/audit/security",
    params(RecentAuditQuery),
    responses(
        (status = 200, description = "Security events", body = AuditEventsResponse),
        (status = 401, description = "Missing admin API key", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Audit"
)]
pub async fn security_events(
    State(state): State<AppState>,
    Query(query): Query<RecentAuditQuery>,
) -> Result<Json<AuditEventsResponse>, AppError> {
    let events = state
        .ledger
        .query_security(query.organization_id.as_deref(), query.limit)
        .await?;

    Ok(Json(AuditEventsResponse {
        events: events.into_iter().map(AuditEventResponse::from).collect(),
    }))
}
