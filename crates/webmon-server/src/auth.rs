use std::sync::Arc;

use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use webmon_db::token_hash;

use crate::dto::ErrorResponse;
use crate::state::AppState;

/// The authenticated caller, inserted into request extensions by
/// [`require_user`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

/// Middleware that resolves `Authorization: Bearer <token>` to a user.
///
/// Only the SHA-256 digest of the token is compared against storage, so a
/// leaked database dump does not leak tokens.
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "));

    let Some(token) = token else {
        return unauthorized();
    };

    match state.db.user_repo().get_by_token_hash(&token_hash(token)).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(AuthUser {
                id: user.id,
                username: user.username,
            });
            next.run(request).await
        }
        Ok(None) => unauthorized(),
        Err(e) => {
            tracing::error!(error = %e, "Token lookup failed");
            let body = ErrorResponse {
                error: "internal_error".to_string(),
                message: "Authentication backend unavailable".to_string(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
        }
    }
}

fn unauthorized() -> Response {
    let body = ErrorResponse {
        error: "unauthorized".to_string(),
        message: "Missing or invalid Authorization header. Expected: Bearer <token>".to_string(),
    };
    (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
}
