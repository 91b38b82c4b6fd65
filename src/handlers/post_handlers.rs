//! Blog post handlers: CRUD, tag listing and the featured-image slot.

use crate::{
    auth::CurrentUser,
    errors::AppError,
    models::post::{BlogPost, NewBlogPost, Tag, UpdateBlogPost},
    services::upload_service::UploadedFile,
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use tracing::debug;

/// `POST /api/posts`
pub async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(mut new): Json<NewBlogPost>,
) -> Result<(StatusCode, Json<BlogPost>), AppError> {
    new.title = new.title.trim().to_string();
    new.content = new.content.trim().to_string();
    if new.title.is_empty() {
        return Err(AppError::bad_request("post title must not be empty"));
    }
    if new.content.is_empty() {
        return Err(AppError::bad_request("post content must not be empty"));
    }
    let post = state.posts.create_post(&user.id, &user.name, new).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// `GET /api/posts` — newest first.
pub async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<BlogPost>>, AppError> {
    Ok(Json(state.posts.list_posts().await?))
}

/// `GET /api/posts/{id}`
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BlogPost>, AppError> {
    let post = state
        .posts
        .get_post(&id)
        .await?
        .ok_or_else(|| AppError::not_found("post not found"))?;
    Ok(Json(post))
}

/// `PATCH /api/posts/{id}` — owner-scoped.
pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
    Json(patch): Json<UpdateBlogPost>,
) -> Result<Json<BlogPost>, AppError> {
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::bad_request("post title must not be empty"));
    }
    if patch.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
        return Err(AppError::bad_request("post content must not be empty"));
    }
    let post = state.posts.update_post(&id, &user.id, patch).await?;
    Ok(Json(post))
}

/// `DELETE /api/posts/{id}` — owner-scoped; the featured image goes with it.
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
) -> Result<StatusCode, AppError> {
    state.posts.delete_post(&id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /api/posts/{id}/featured-image` — single-file multipart; replaces
/// the current featured image if one exists.
pub async fn set_featured_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<BlogPost>, AppError> {
    let mut file: Option<UploadedFile> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            debug!("ignoring unknown multipart field on featured-image upload");
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await?;
        file = Some(UploadedFile {
            filename,
            content_type,
            bytes,
        });
    }
    let file = file.ok_or_else(|| AppError::bad_request("no file provided"))?;
    let post = state.uploads.set_featured_image(&id, &user.id, file).await?;
    Ok(Json(post))
}

/// `GET /api/tags` — aggregated tag counters, most used first.
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, AppError> {
    Ok(Json(state.posts.list_tags().await?))
}
