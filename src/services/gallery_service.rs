//! src/services/gallery_service.rs
//!
//! GalleryService — published gallery images and the engagement attached to
//! them (likes, favorites). Image rows reference bytes in the media store;
//! deleting an image also releases those bytes and the owner's ledger rows,
//! best-effort, after the row itself is gone.

use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite, types::Json};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::image::{GalleryImage, NewStoredImage, UpdateGalleryImage};
use crate::services::media_store::MediaStore;
use crate::services::quota_service::QuotaService;
use crate::services::{ServiceError, ServiceResult, is_fk_violation};

#[derive(Clone)]
pub struct GalleryService {
    /// Shared SQLite connection pool used for image metadata.
    pub db: Arc<SqlitePool>,

    media: Arc<dyn MediaStore>,
    quota: QuotaService,
}

impl GalleryService {
    pub fn new(db: Arc<SqlitePool>, media: Arc<dyn MediaStore>, quota: QuotaService) -> Self {
        Self { db, media, quota }
    }

    /// Insert a fully resolved image row. The bytes must already be in the
    /// media store; this is the final step of the upload pipeline.
    pub async fn create_image(&self, new: NewStoredImage) -> ServiceResult<GalleryImage> {
        let image = sqlx::query_as::<_, GalleryImage>(
            r#"
            INSERT INTO gallery_images (
                id, url, title, description, category, tags, likes,
                author_id, author_name, size, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)
            RETURNING id, url, title, description, category, tags, likes,
                      author_id, author_name, size, created_at
            "#,
        )
        .bind(&new.id)
        .bind(&new.url)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.category)
        .bind(Json(&new.tags))
        .bind(&new.author_id)
        .bind(&new.author_name)
        .bind(new.size)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;
        Ok(image)
    }

    pub async fn get_image(&self, id: &str) -> ServiceResult<Option<GalleryImage>> {
        let image = sqlx::query_as::<_, GalleryImage>(
            "SELECT id, url, title, description, category, tags, likes,
                    author_id, author_name, size, created_at
             FROM gallery_images WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(image)
    }

    /// List images, newest first, optionally narrowed to a category and/or
    /// a tag. The tag filter matches against the JSON tags array.
    pub async fn list_images(
        &self,
        category: Option<&str>,
        tag: Option<&str>,
    ) -> ServiceResult<Vec<GalleryImage>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, url, title, description, category, tags, likes, \
             author_id, author_name, size, created_at \
             FROM gallery_images WHERE 1 = 1",
        );
        if let Some(category) = category {
            builder.push(" AND category = ");
            builder.push_bind(category);
        }
        if let Some(tag) = tag {
            builder.push(
                " AND EXISTS (SELECT 1 FROM json_each(gallery_images.tags) \
                 WHERE json_each.value = ",
            );
            builder.push_bind(tag);
            builder.push(")");
        }
        builder.push(" ORDER BY created_at DESC");

        let images: Vec<GalleryImage> = builder.build_query_as().fetch_all(&*self.db).await?;
        Ok(images)
    }

    /// Apply a partial metadata update, scoped to the owner. A non-owner
    /// gets the same answer as a missing id.
    pub async fn update_image(
        &self,
        id: &str,
        author_id: &str,
        patch: UpdateGalleryImage,
    ) -> ServiceResult<GalleryImage> {
        // leading no-op assignment keeps the SET clause valid for an empty patch
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE gallery_images SET id = id");
        if let Some(title) = patch.title {
            builder.push(", title = ");
            builder.push_bind(title);
        }
        if let Some(description) = patch.description {
            builder.push(", description = ");
            builder.push_bind(description);
        }
        if let Some(category) = patch.category {
            builder.push(", category = ");
            builder.push_bind(category);
        }
        if let Some(tags) = patch.tags {
            builder.push(", tags = ");
            builder.push_bind(Json(tags));
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" AND author_id = ");
        builder.push_bind(author_id);
        builder.push(
            " RETURNING id, url, title, description, category, tags, likes, \
             author_id, author_name, size, created_at",
        );

        let updated: Option<GalleryImage> =
            builder.build_query_as().fetch_optional(&*self.db).await?;
        updated.ok_or(ServiceError::NotFoundOrForbidden("image"))
    }

    /// Adjust the like counter by `delta` in a single statement. The floor
    /// at zero is applied in SQL so concurrent adjustments cannot undershoot.
    pub async fn adjust_likes(&self, id: &str, delta: i64) -> ServiceResult<GalleryImage> {
        let updated = sqlx::query_as::<_, GalleryImage>(
            "UPDATE gallery_images SET likes = MAX(likes + ?, 0) WHERE id = ?
             RETURNING id, url, title, description, category, tags, likes,
                       author_id, author_name, size, created_at",
        )
        .bind(delta)
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        updated.ok_or(ServiceError::NotFoundOrForbidden("image"))
    }

    /// Delete an image, scoped to the owner.
    ///
    /// Membership and favorite rows go with it via ON DELETE CASCADE. The
    /// stored bytes, the ledger rows and any comments are cleaned up
    /// afterwards, best-effort: failures are logged and the delete still
    /// succeeds.
    pub async fn delete_image(&self, id: &str, author_id: &str) -> ServiceResult<()> {
        let url = sqlx::query_scalar::<_, String>(
            "DELETE FROM gallery_images WHERE id = ? AND author_id = ? RETURNING url",
        )
        .bind(id)
        .bind(author_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(ServiceError::NotFoundOrForbidden("image"))?;

        match self.media.delete_by_url(&url).await {
            Ok(true) => {}
            Ok(false) => debug!("media object for {} was already gone", url),
            Err(err) => warn!("failed to delete media object for {}: {}", url, err),
        }
        if !self.quota.remove_upload(author_id, &url).await {
            warn!("ledger rows for {} could not be released", url);
        }
        if let Err(err) =
            sqlx::query("DELETE FROM comments WHERE target_kind = 'image' AND target_id = ?")
                .bind(id)
                .execute(&*self.db)
                .await
        {
            warn!("failed to delete comments for image {}: {}", id, err);
        }
        Ok(())
    }

    /// Mark an image as a favorite of `user_id`. Marking twice is a no-op;
    /// marking a missing image reports it as not found.
    pub async fn set_favorite(&self, user_id: &str, image_id: &str) -> ServiceResult<()> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO favorites (user_id, image_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(image_id)
        .bind(Utc::now())
        .execute(&*self.db)
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(err) if is_fk_violation(&err) => Err(ServiceError::NotFoundOrForbidden("image")),
            Err(err) => Err(ServiceError::Sqlx(err)),
        }
    }

    /// Remove a favorite mark. Unmarking something never marked is a no-op.
    pub async fn unset_favorite(&self, user_id: &str, image_id: &str) -> ServiceResult<()> {
        sqlx::query("DELETE FROM favorites WHERE user_id = ? AND image_id = ?")
            .bind(user_id)
            .bind(image_id)
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    /// The caller's favorite images, most recently marked first.
    pub async fn list_favorites(&self, user_id: &str) -> ServiceResult<Vec<GalleryImage>> {
        let images = sqlx::query_as::<_, GalleryImage>(
            "SELECT gi.id, gi.url, gi.title, gi.description, gi.category, gi.tags, gi.likes,
                    gi.author_id, gi.author_name, gi.size, gi.created_at
             FROM favorites f
             JOIN gallery_images gi ON gi.id = f.image_id
             WHERE f.user_id = ?
             ORDER BY f.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(images)
    }
}
