//! Comment handlers for gallery images and blog posts. The two target kinds
//! share one table and one service; only the routes differ.

use crate::{
    auth::CurrentUser,
    errors::AppError,
    models::comment::{Comment, CommentTarget, NewComment},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// `POST /api/gallery/images/{id}/comments`
pub async fn add_image_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
    Json(new): Json<NewComment>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    add_comment(&state, CommentTarget::Image, &id, &user, new).await
}

/// `POST /api/posts/{id}/comments`
pub async fn add_post_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
    Json(new): Json<NewComment>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    add_comment(&state, CommentTarget::Post, &id, &user, new).await
}

/// `GET /api/gallery/images/{id}/comments` — oldest first.
pub async fn list_image_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let comments = state
        .comments
        .list_comments(CommentTarget::Image, &id)
        .await?;
    Ok(Json(comments))
}

/// `GET /api/posts/{id}/comments` — oldest first.
pub async fn list_post_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let comments = state
        .comments
        .list_comments(CommentTarget::Post, &id)
        .await?;
    Ok(Json(comments))
}

/// `DELETE /api/comments/{id}` — author-scoped.
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
) -> Result<StatusCode, AppError> {
    state.comments.delete_comment(&id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_comment(
    state: &AppState,
    target: CommentTarget,
    target_id: &str,
    user: &CurrentUser,
    new: NewComment,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let body = new.body.trim();
    if body.is_empty() {
        return Err(AppError::bad_request("comment body must not be empty"));
    }
    let comment = state
        .comments
        .add_comment(target, target_id, &user.id, &user.name, body)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
