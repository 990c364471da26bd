use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::models::AccessToken;
use crate::services::RequestMeta;
use crate::AppState;

/// The validated token plus request context, stashed in extensions for the
/// secret handlers.
#[derive(Clone)]
pub struct TokenContext {
    pub token: AccessToken,
    pub meta: RequestMeta,
}

/// Middleware for the token-facing API: resolves the Bearer token and
/// attaches a TokenContext. Unknown, expired, and revoked tokens all get
/// the same response.
pub async fn token_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let token = match token {
        Some(token) => token,
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Missing or invalid Authorization header".to_string(),
                }),
            ));
        }
    };

    let token = match state.authority.validate(token).await {
        Ok(token) => token,
        Err(_) => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or expired token".to_string(),
                }),
            ));
        }
    };

    let meta = request_meta(&req);
    req.extensions_mut().insert(TokenContext { token, meta });

    Ok(next.run(req).await)
}

/// Pull the caller's address and agent out of the request for audit
/// attribution.
pub fn request_meta(req: &Request) -> RequestMeta {
    let ip_address = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string());

    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    RequestMeta {
        ip_address,
        user_agent,
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
