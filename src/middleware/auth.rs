use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::error::{AppError, Result};
use crate::models::{CurrentUser, OptionalUser};
use crate::services::AuthService;
use crate::AppState;

/// Require a valid bearer token; injects `CurrentUser`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let user = authenticate(&state, &req)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Viewer-scoped routes work logged-out; injects `OptionalUser`.
/// A present-but-invalid token is treated as anonymous, not rejected.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let viewer = OptionalUser(authenticate(&state, &req).ok());
    req.extensions_mut().insert(viewer);
    next.run(req).await
}

fn authenticate(state: &AppState, req: &Request) -> Result<CurrentUser> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header".to_string()))?;

    AuthService::validate_token(&state.config.jwt, token)
}
