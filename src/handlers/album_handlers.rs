//! Album handlers: CRUD plus membership management.
//!
//! Private albums are filtered here at the HTTP edge: list and single-album
//! reads share one visibility rule (public, or owned by the caller), and a
//! non-owner fetching a private album gets the same 404 as a missing id.

use crate::{
    auth::{CurrentUser, MaybeUser},
    errors::AppError,
    models::album::{Album, AlbumWithImages, CreateAlbum, UpdateAlbum},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ListAlbumsQuery {
    #[serde(default)]
    pub include_private: bool,
}

/// Request body for the membership endpoint.
#[derive(Debug, Deserialize)]
pub struct AddImagesRequest {
    pub image_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AddImagesResponse {
    pub added: usize,
}

/// `POST /api/albums`
pub async fn create_album(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(mut new): Json<CreateAlbum>,
) -> Result<(StatusCode, Json<Album>), AppError> {
    new.name = new.name.trim().to_string();
    if new.name.is_empty() {
        return Err(AppError::bad_request("album name must not be empty"));
    }
    let album = state.albums.create_album(&user.id, &user.name, new).await?;
    Ok((StatusCode::CREATED, Json(album)))
}

/// `GET /api/albums` — ?include_private=true additionally lists the
/// caller's own private albums; other users' private albums never appear.
pub async fn list_albums(
    State(state): State<AppState>,
    Query(q): Query<ListAlbumsQuery>,
    MaybeUser(user): MaybeUser,
) -> Result<Json<Vec<Album>>, AppError> {
    let viewer = user.as_ref().map(|u| u.id.as_str());
    let include_private = q.include_private && viewer.is_some();
    let mut albums = state.albums.list_albums(include_private).await?;
    albums.retain(|album| visible_to(album, viewer));
    Ok(Json(albums))
}

/// `GET /api/albums/{id}` — a private album is visible only to its owner;
/// everyone else gets the same 404 as for a missing id.
pub async fn get_album(
    State(state): State<AppState>,
    Path(id): Path<String>,
    MaybeUser(user): MaybeUser,
) -> Result<Json<AlbumWithImages>, AppError> {
    let fetched = state
        .albums
        .get_album(&id)
        .await?
        .ok_or_else(|| AppError::not_found("album not found"))?;
    if !visible_to(&fetched.album, user.as_ref().map(|u| u.id.as_str())) {
        return Err(AppError::not_found("album not found"));
    }
    Ok(Json(fetched))
}

/// `PATCH /api/albums/{id}` — owner-scoped.
pub async fn update_album(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
    Json(patch): Json<UpdateAlbum>,
) -> Result<Json<Album>, AppError> {
    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::bad_request("album name must not be empty"));
    }
    let album = state.albums.update_album(&id, &user.id, patch).await?;
    Ok(Json(album))
}

/// `DELETE /api/albums/{id}` — owner-scoped; member images stay.
pub async fn delete_album(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
) -> Result<StatusCode, AppError> {
    state.albums.delete_album(&id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/albums/{id}/images` — append images in the order given;
/// duplicates are skipped and reported through the `added` count.
pub async fn add_images(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
    Json(req): Json<AddImagesRequest>,
) -> Result<Json<AddImagesResponse>, AppError> {
    let added = state
        .albums
        .add_images(&id, &user.id, &req.image_ids)
        .await?;
    Ok(Json(AddImagesResponse { added }))
}

/// `DELETE /api/albums/{id}/images/{image_id}` — removing a non-member is a
/// no-op.
pub async fn remove_image(
    State(state): State<AppState>,
    Path((id, image_id)): Path<(String, String)>,
    user: CurrentUser,
) -> Result<StatusCode, AppError> {
    state.albums.remove_image(&id, &user.id, &image_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// One visibility rule for every read path: public albums are for everyone,
/// private albums for their owner only.
fn visible_to(album: &Album, viewer: Option<&str>) -> bool {
    album.is_public || viewer == Some(album.author_id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn album(author_id: &str, is_public: bool) -> Album {
        Album {
            id: "a1".to_string(),
            name: "Trip".to_string(),
            description: None,
            cover_image: None,
            author_id: author_id.to_string(),
            author_name: "Avery".to_string(),
            is_public,
            image_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn private_albums_are_visible_to_their_owner_only() {
        let private = album("u1", false);
        assert!(visible_to(&private, Some("u1")));
        assert!(!visible_to(&private, Some("u2")));
        assert!(!visible_to(&private, None));
    }

    #[test]
    fn public_albums_are_visible_to_everyone() {
        let public = album("u1", true);
        assert!(visible_to(&public, Some("u2")));
        assert!(visible_to(&public, None));
    }
}
