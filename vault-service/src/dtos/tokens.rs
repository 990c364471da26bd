use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{AccessTokenResponse, TokenScope};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct IssueTokenRequest {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    #[schema(example = "ci-deploy")]
    pub name: Option<String>,

    /// At least one of "read", "write".
    #[schema(example = json!(["read"]))]
    pub scopes: Vec<TokenScope>,

    #[validate(length(max = 50, message = "Environment must be at most 50 characters"))]
    #[schema(example = "production")]
    pub environment: Option<String>,

    #[validate(length(max = 50, message = "Folder must be at most 50 characters"))]
    #[schema(example = "backend")]
    pub folder: Option<String>,

    /// Omit for a non-expiring token.
    #[validate(range(min = 1, message = "Expiry must be positive"))]
    #[schema(example = 10080)]
    pub expires_in_minutes: Option<i64>,
}

/// The one and only response that carries the plaintext token.
#[derive(Debug, Serialize, ToSchema)]
pub struct IssueTokenResponse {
    /// Shown exactly once; store it now.
    #[schema(example = "kv_pat_6b3f...")]
    pub token: String,
    #[serde(flatten)]
    pub metadata: AccessTokenResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenListResponse {
    pub tokens: Vec<AccessTokenResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevokeTokenResponse {
    #[schema(example = "Token revoked")]
    pub message: String,
    pub token: AccessTokenResponse,
}
