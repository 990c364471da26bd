use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::TokenScope;

#[derive(Debug, Serialize, ToSchema)]
pub struct StartDeviceFlowResponse {
    #[schema(example = "kv_dc_9f2e...")]
    pub device_code: String,
    #[schema(example = "ABCD-2345")]
    pub user_code: String,
    #[schema(example = "http://localhost:3000/cli/authorize")]
    pub verification_url: String,
    /// Seconds until the code expires.
    #[schema(example = 600)]
    pub expires_in: i64,
    /// Suggested polling interval, seconds.
    #[schema(example = 2)]
    pub interval: u64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PollDeviceFlowResponse {
    Pending,
    Approved {
        /// CLI access token, handed out exactly once.
        token: String,
        token_id: String,
    },
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AuthorizeDeviceRequest {
    #[validate(length(min = 1, message = "Project is required"))]
    #[schema(example = "proj-1")]
    pub project_id: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    #[schema(example = "cli-laptop")]
    pub name: Option<String>,

    /// Defaults to read-only.
    pub scopes: Option<Vec<TokenScope>>,

    #[validate(length(max = 50, message = "Environment must be at most 50 characters"))]
    pub environment: Option<String>,

    #[validate(length(max = 50, message = "Folder must be at most 50 characters"))]
    pub folder: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthorizeDeviceResponse {
    #[schema(example = "Device authorized")]
    pub message: String,
    #[schema(example = "ABCD-2345")]
    pub user_code: String,
}
