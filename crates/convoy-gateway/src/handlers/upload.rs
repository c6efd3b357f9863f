use crate::error::HttpAppError;
use crate::services::UploadService;
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
    Extension, Json,
};
use convoy_core::Identity;
use std::sync::Arc;

/// Accept an MP4 upload and schedule its conversion.
///
/// Runs behind `auth_middleware`, which has already resolved the caller.
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let accepted = UploadService::new(&state)
        .handle_upload(&identity, multipart)
        .await?;
    Ok(Json(accepted))
}
