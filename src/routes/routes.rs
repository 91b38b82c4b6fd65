//! Defines routes for the gallery, album, blog and media endpoints.
//!
//! ## Structure
//! - **Health endpoints**
//!   - `GET    /healthz` — liveness
//!   - `GET    /readyz`  — DB + media store readiness
//!
//! - **Media**
//!   - `GET    /media/{*key}` — stream stored bytes
//!
//! - **Gallery**
//!   - `POST   /api/gallery/uploads` — multipart batch upload
//!   - `GET    /api/gallery/images` — list (supports category, tag)
//!   - `GET/PATCH/DELETE /api/gallery/images/{id}`
//!   - `POST   /api/gallery/images/{id}/likes`
//!   - `PUT/DELETE /api/gallery/images/{id}/favorite`
//!   - `POST/GET /api/gallery/images/{id}/comments`
//!
//! - **Albums**
//!   - `GET/POST /api/albums`, `GET/PATCH/DELETE /api/albums/{id}`
//!   - `POST   /api/albums/{id}/images`, `DELETE /api/albums/{id}/images/{image_id}`
//!
//! - **Blog**
//!   - `GET/POST /api/posts`, `GET/PATCH/DELETE /api/posts/{id}`
//!   - `PUT    /api/posts/{id}/featured-image` — single-file multipart
//!   - `POST/GET /api/posts/{id}/comments`
//!   - `GET    /api/tags`
//!
//! - **Account**
//!   - `GET    /api/me/storage`, `GET /api/me/favorites`
//!   - `DELETE /api/comments/{id}`
//!
//! The wildcard `*key` allows nested media keys like `gallery/abc.jpg`.

use crate::{
    handlers::{
        album_handlers::{
            add_images, create_album, delete_album, get_album, list_albums, remove_image,
            update_album,
        },
        comment_handlers::{
            add_image_comment, add_post_comment, delete_comment, list_image_comments,
            list_post_comments,
        },
        gallery_handlers::{
            change_likes, delete_image, get_image, list_favorites, list_images, set_favorite,
            unset_favorite, update_image,
        },
        health_handlers::{healthz, readyz},
        media_handlers::get_media,
        post_handlers::{
            create_post, delete_post, get_post, list_posts, list_tags, set_featured_image,
            update_post,
        },
        upload_handlers::{storage_info, upload_gallery_images},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

/// Request bodies above this are rejected before any handler runs. Sized for
/// a full batch of per-file-capped uploads plus multipart overhead.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Build and return the router for the whole HTTP surface.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // public media streaming
        .route("/media/{*key}", get(get_media))
        // gallery
        .route("/api/gallery/uploads", post(upload_gallery_images))
        .route("/api/gallery/images", get(list_images))
        .route(
            "/api/gallery/images/{id}",
            get(get_image).patch(update_image).delete(delete_image),
        )
        .route("/api/gallery/images/{id}/likes", post(change_likes))
        .route(
            "/api/gallery/images/{id}/favorite",
            put(set_favorite).delete(unset_favorite),
        )
        .route(
            "/api/gallery/images/{id}/comments",
            post(add_image_comment).get(list_image_comments),
        )
        // albums
        .route("/api/albums", get(list_albums).post(create_album))
        .route(
            "/api/albums/{id}",
            get(get_album).patch(update_album).delete(delete_album),
        )
        .route("/api/albums/{id}/images", post(add_images))
        .route("/api/albums/{id}/images/{image_id}", delete(remove_image))
        // blog
        .route("/api/posts", get(list_posts).post(create_post))
        .route(
            "/api/posts/{id}",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .route("/api/posts/{id}/featured-image", put(set_featured_image))
        .route(
            "/api/posts/{id}/comments",
            post(add_post_comment).get(list_post_comments),
        )
        .route("/api/tags", get(list_tags))
        // account
        .route("/api/me/storage", get(storage_info))
        .route("/api/me/favorites", get(list_favorites))
        .route("/api/comments/{id}", delete(delete_comment))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
