//! Upload and storage-quota handlers.
//!
//! - POST /api/gallery/uploads -> multipart batch upload into the gallery
//! - GET  /api/me/storage      -> the caller's storage summary

use crate::{
    auth::{CurrentUser, MaybeUser},
    errors::AppError,
    models::image::{GalleryImage, ImageMetadata},
    models::upload::StorageInfo,
    services::upload_service::UploadedFile,
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Serialize;
use tracing::{debug, warn};

/// Per-file outcome for files that did not make it into the gallery.
#[derive(Debug, Serialize)]
pub struct RejectedUpload {
    pub filename: String,
    pub reason: String,
}

/// Response body for the batch upload endpoint.
#[derive(Debug, Serialize)]
pub struct UploadBatchResponse {
    pub uploaded: Vec<GalleryImage>,
    pub rejected: Vec<RejectedUpload>,
}

/// `POST /api/gallery/uploads` — multipart batch upload.
///
/// Files are processed sequentially; a failed file lands in `rejected` and
/// does not abort the rest of the batch. The metadata fields apply to every
/// file in the batch.
pub async fn upload_gallery_images(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<UploadBatchResponse>, AppError> {
    let mut files: Vec<UploadedFile> = Vec::new();
    let mut meta = ImageMetadata::default();
    let mut album_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "file" | "files" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;
                files.push(UploadedFile {
                    filename,
                    content_type,
                    bytes,
                });
            }
            "title" => meta.title = non_empty(field.text().await?),
            "description" => meta.description = non_empty(field.text().await?),
            "category" => meta.category = non_empty(field.text().await?),
            "tags" => meta.tags = split_tags(&field.text().await?),
            "album_id" => album_id = non_empty(field.text().await?),
            other => debug!("ignoring unknown multipart field `{}`", other),
        }
    }

    if files.is_empty() {
        return Err(AppError::bad_request("no files provided"));
    }

    let mut uploaded = Vec::new();
    let mut rejected = Vec::new();
    for file in files {
        let filename = file.filename.clone();
        match state
            .uploads
            .store_gallery_image(&user.id, &user.name, file, meta.clone(), album_id.as_deref())
            .await
        {
            Ok(image) => uploaded.push(image),
            Err(err) => {
                warn!("upload `{}` rejected: {}", filename, err);
                rejected.push(RejectedUpload {
                    filename,
                    reason: err.to_string(),
                });
            }
        }
    }

    Ok(Json(UploadBatchResponse { uploaded, rejected }))
}

/// `GET /api/me/storage` — the caller's storage summary. Anonymous callers
/// get the zero-usage summary.
pub async fn storage_info(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Json<StorageInfo> {
    let info = state
        .quota
        .storage_info(user.as_ref().map(|u| u.id.as_str()))
        .await;
    Json(info)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Comma-separated tags; blanks dropped, whitespace trimmed.
fn split_tags(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
