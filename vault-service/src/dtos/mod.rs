pub mod audit;
pub mod device;
pub mod secrets;
pub mod tokens;

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Access denied")]
    pub error: String,
}
