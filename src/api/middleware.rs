/// Authentication middleware
use crate::{auth::AuthenticatedAdmin, context::AppContext, error::ApiError};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty() && !token.contains(' '))
        .map(str::to_string)
}

/// Require a live access token; no handler runs otherwise
///
/// On success the admin identity is added to request extensions.
pub async fn require_access_token(
    State(ctx): State<AppContext>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(req.headers())
        .ok_or_else(|| ApiError::Unauthorized("missing authorization token".to_string()))?;

    let claims = ctx.tokens.authenticate(&token).await.map_err(|e| {
        debug!("Access token rejected: {}", e);
        ApiError::from(e)
    })?;

    req.extensions_mut().insert(AuthenticatedAdmin {
        username: claims.sub,
        token_id: claims.jti,
    });

    Ok(next.run(req).await)
}
