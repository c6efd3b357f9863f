use super::claims::subject_from_token;
use super::identity::{IdentityError, IdentityService};
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use convoy_core::constants::BEARER_PREFIX;
use convoy_core::{AppError, Identity};
use std::sync::Arc;

/// Resolve the caller behind an `Authorization` header value.
///
/// Fails closed: a verifier that cannot be reached is treated the same as one
/// that rejects the token.
pub async fn authenticate(
    auth_header: Option<&str>,
    identity: &dyn IdentityService,
) -> Result<Identity, AppError> {
    let auth_header = auth_header
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix(BEARER_PREFIX)
        .ok_or_else(|| {
            AppError::Unauthorized("Invalid authorization header format".to_string())
        })?
        .trim();

    if token.is_empty() {
        return Err(AppError::Unauthorized("Missing bearer token".to_string()));
    }

    match identity.verify(token).await {
        Ok(Some(subject)) => Ok(Identity::new(subject)),
        Ok(None) => Ok(Identity::new(
            subject_from_token(token).unwrap_or_default(),
        )),
        Err(IdentityError::Rejected(reason)) => {
            tracing::debug!(reason = %reason, "Token rejected by identity service");
            Err(AppError::Unauthorized("Invalid or expired token".to_string()))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Token verification failed; denying request");
            Err(AppError::Unauthorized(
                "Unable to verify token".to_string(),
            ))
        }
    }
}

/// Authenticates the request before its body is touched and stores the
/// resulting `Identity` in the request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match authenticate(auth_header, state.identity.as_ref()).await {
        Ok(identity) => {
            tracing::debug!(subject = %identity.subject, "Request authenticated");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}
