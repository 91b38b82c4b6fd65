//! Gallery image handlers: listing, metadata patches, likes and favorites.
//! Upload itself lives in `upload_handlers`.

use crate::{
    auth::CurrentUser,
    errors::AppError,
    models::image::{GalleryImage, UpdateGalleryImage},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

/// Query params accepted by the image listing.
#[derive(Debug, Deserialize)]
pub struct ListImagesQuery {
    pub category: Option<String>,
    pub tag: Option<String>,
}

/// Request body for the like endpoint.
#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    pub delta: i64,
}

/// `GET /api/gallery/images` — newest first, supports ?category=&tag=
pub async fn list_images(
    State(state): State<AppState>,
    Query(q): Query<ListImagesQuery>,
) -> Result<Json<Vec<GalleryImage>>, AppError> {
    let images = state
        .gallery
        .list_images(q.category.as_deref(), q.tag.as_deref())
        .await?;
    Ok(Json(images))
}

/// `GET /api/gallery/images/{id}`
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GalleryImage>, AppError> {
    let image = state
        .gallery
        .get_image(&id)
        .await?
        .ok_or_else(|| AppError::not_found("image not found"))?;
    Ok(Json(image))
}

/// `PATCH /api/gallery/images/{id}` — owner-scoped metadata patch.
pub async fn update_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
    Json(patch): Json<UpdateGalleryImage>,
) -> Result<Json<GalleryImage>, AppError> {
    let image = state.gallery.update_image(&id, &user.id, patch).await?;
    Ok(Json(image))
}

/// `DELETE /api/gallery/images/{id}` — owner-scoped.
pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
) -> Result<StatusCode, AppError> {
    state.gallery.delete_image(&id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/gallery/images/{id}/likes` — adjust the like counter by ±1.
/// No session required; the counter never goes below zero.
pub async fn change_likes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LikeRequest>,
) -> Result<Json<GalleryImage>, AppError> {
    if req.delta != 1 && req.delta != -1 {
        return Err(AppError::bad_request("delta must be 1 or -1"));
    }
    let image = state.gallery.adjust_likes(&id, req.delta).await?;
    Ok(Json(image))
}

/// `PUT /api/gallery/images/{id}/favorite` — idempotent.
pub async fn set_favorite(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
) -> Result<StatusCode, AppError> {
    state.gallery.set_favorite(&user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/gallery/images/{id}/favorite` — idempotent.
pub async fn unset_favorite(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
) -> Result<StatusCode, AppError> {
    state.gallery.unset_favorite(&user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/me/favorites` — the caller's favorites, most recently marked
/// first.
pub async fn list_favorites(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<GalleryImage>>, AppError> {
    let images = state.gallery.list_favorites(&user.id).await?;
    Ok(Json(images))
}
