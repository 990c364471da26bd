use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::AuditEventResponse;

#[derive(Debug, Deserialize, IntoParams)]
pub struct FolderAuditQuery {
    #[param(example = "proj-1")]
    pub project_id: String,
    #[param(example = "production")]
    pub environment: String,
    #[param(example = "backend")]
    pub folder: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RecentAuditQuery {
    pub organization_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditEventsResponse {
    pub events: Vec<AuditEventResponse>,
}
