//! Shared handler state: one instance of every service plus the auth client,
//! cloned per request by axum.

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::AuthClient;
use crate::services::album_service::AlbumService;
use crate::services::comment_service::CommentService;
use crate::services::gallery_service::GalleryService;
use crate::services::media_store::MediaStore;
use crate::services::post_service::PostService;
use crate::services::quota_service::QuotaService;
use crate::services::upload_service::UploadService;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub quota: QuotaService,
    pub gallery: GalleryService,
    pub albums: AlbumService,
    pub posts: PostService,
    pub comments: CommentService,
    pub uploads: UploadService,
    pub media: Arc<dyn MediaStore>,
    pub auth: AuthClient,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>, media: Arc<dyn MediaStore>, auth: AuthClient) -> Self {
        let quota = QuotaService::new(Arc::clone(&db));
        let gallery = GalleryService::new(Arc::clone(&db), Arc::clone(&media), quota.clone());
        let albums = AlbumService::new(Arc::clone(&db));
        let posts = PostService::new(Arc::clone(&db), Arc::clone(&media), quota.clone());
        let comments = CommentService::new(Arc::clone(&db));
        let uploads = UploadService::new(
            quota.clone(),
            gallery.clone(),
            albums.clone(),
            posts.clone(),
            Arc::clone(&media),
        );
        Self {
            db,
            quota,
            gallery,
            albums,
            posts,
            comments,
            uploads,
            media,
            auth,
        }
    }
}
