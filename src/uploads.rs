use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::instrument;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct FileUrlResponse {
    pub filename: String,
    pub url: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_file))
        .route("/:filename", get(get_file_url))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// Stores the uploaded file under its own name and returns the public URL.
#[instrument(skip(state, _actor, mp))]
async fn upload_file(
    State(state): State<AppState>,
    AuthUser(_actor): AuthUser,
    mut mp: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("file must have a filename".into()))?;
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".into());
        let body = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let url = state.storage.put_object(&filename, body, &content_type).await?;
        return Ok(Json(UploadResponse {
            message: "File uploaded successfully".into(),
            filename,
            url,
        }));
    }

    Err(ApiError::BadRequest("file is required".into()))
}

#[instrument(skip(state, _actor))]
async fn get_file_url(
    State(state): State<AppState>,
    AuthUser(_actor): AuthUser,
    Path(filename): Path<String>,
) -> ApiResult<Json<FileUrlResponse>> {
    let url = state.storage.public_url(&filename);
    Ok(Json(FileUrlResponse { filename, url }))
}
