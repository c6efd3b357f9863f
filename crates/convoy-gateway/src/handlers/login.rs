use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{body::Bytes, extract::State, response::IntoResponse, Json};
use convoy_core::AppError;
use std::sync::Arc;

/// Proxy credentials to the identity service and hand back its token.
#[tracing::instrument(skip(state, body), fields(size_bytes = body.len()))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("Request body is empty".to_string()).into());
    }

    let reply = state.identity.login(body).await?;
    Ok(Json(reply))
}
