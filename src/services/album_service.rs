//! src/services/album_service.rs
//!
//! AlbumService — user-curated collections over gallery images. Membership
//! rows carry an explicit position; `image_count` and `cover_image` on the
//! album are maintained by the database triggers, so every write path that
//! touches membership keeps them consistent for free.

use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::album::{Album, AlbumWithImages, CreateAlbum, UpdateAlbum};
use crate::models::image::GalleryImage;
use crate::services::{ServiceError, ServiceResult, is_fk_violation};

#[derive(Clone)]
pub struct AlbumService {
    /// Shared SQLite connection pool used for albums and membership.
    pub db: Arc<SqlitePool>,
}

impl AlbumService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Create an empty album. Albums are public unless asked otherwise.
    pub async fn create_album(
        &self,
        author_id: &str,
        author_name: &str,
        new: CreateAlbum,
    ) -> ServiceResult<Album> {
        let now = Utc::now();
        let album = Album {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            description: new.description,
            cover_image: None,
            author_id: author_id.to_string(),
            author_name: author_name.to_string(),
            is_public: new.is_public.unwrap_or(true),
            image_count: 0,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO albums (id, name, description, cover_image, author_id, author_name,
                                 is_public, image_count, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(&album.id)
        .bind(&album.name)
        .bind(&album.description)
        .bind(&album.cover_image)
        .bind(&album.author_id)
        .bind(&album.author_name)
        .bind(album.is_public)
        .bind(album.created_at)
        .bind(album.updated_at)
        .execute(&*self.db)
        .await?;

        Ok(album)
    }

    /// Fetch an album with its member images in position order.
    pub async fn get_album(&self, id: &str) -> ServiceResult<Option<AlbumWithImages>> {
        let Some(album) = sqlx::query_as::<_, Album>(
            "SELECT id, name, description, cover_image, author_id, author_name,
                    is_public, image_count, created_at, updated_at
             FROM albums WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        else {
            return Ok(None);
        };

        let images = sqlx::query_as::<_, GalleryImage>(
            "SELECT gi.id, gi.url, gi.title, gi.description, gi.category, gi.tags, gi.likes,
                    gi.author_id, gi.author_name, gi.size, gi.created_at
             FROM album_images ai
             JOIN gallery_images gi ON gi.id = ai.image_id
             WHERE ai.album_id = ?
             ORDER BY ai.position ASC, ai.created_at ASC",
        )
        .bind(id)
        .fetch_all(&*self.db)
        .await?;

        Ok(Some(AlbumWithImages { album, images }))
    }

    /// List albums, newest first. Private albums are included only when the
    /// caller has been allowed to see them.
    pub async fn list_albums(&self, include_private: bool) -> ServiceResult<Vec<Album>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, name, description, cover_image, author_id, author_name, \
             is_public, image_count, created_at, updated_at FROM albums",
        );
        if !include_private {
            builder.push(" WHERE is_public = 1");
        }
        builder.push(" ORDER BY created_at DESC");

        let albums: Vec<Album> = builder.build_query_as().fetch_all(&*self.db).await?;
        Ok(albums)
    }

    /// Apply a partial metadata update, scoped to the owner. `updated_at`
    /// is always bumped, so an empty patch is a touch.
    pub async fn update_album(
        &self,
        id: &str,
        author_id: &str,
        patch: UpdateAlbum,
    ) -> ServiceResult<Album> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE albums SET updated_at = ");
        builder.push_bind(Utc::now());
        if let Some(name) = patch.name {
            builder.push(", name = ");
            builder.push_bind(name);
        }
        if let Some(description) = patch.description {
            builder.push(", description = ");
            builder.push_bind(description);
        }
        if let Some(is_public) = patch.is_public {
            builder.push(", is_public = ");
            builder.push_bind(is_public);
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" AND author_id = ");
        builder.push_bind(author_id);
        builder.push(
            " RETURNING id, name, description, cover_image, author_id, author_name, \
             is_public, image_count, created_at, updated_at",
        );

        let updated: Option<Album> = builder.build_query_as().fetch_optional(&*self.db).await?;
        updated.ok_or(ServiceError::NotFoundOrForbidden("album"))
    }

    /// Delete an album, scoped to the owner. Membership rows cascade away;
    /// the member images themselves are untouched.
    pub async fn delete_album(&self, id: &str, author_id: &str) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM albums WHERE id = ? AND author_id = ?")
            .bind(id)
            .bind(author_id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFoundOrForbidden("album"));
        }
        Ok(())
    }

    /// Append images to an album in the order given, scoped to the owner.
    ///
    /// Positions continue from the current maximum. An image already in the
    /// album is skipped, though it still consumes its slot in the position
    /// sequence; position gaps are expected and harmless. Returns how many
    /// memberships were actually added.
    pub async fn add_images(
        &self,
        album_id: &str,
        author_id: &str,
        image_ids: &[String],
    ) -> ServiceResult<usize> {
        self.ensure_owner(album_id, author_id).await?;

        let base: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), 0) FROM album_images WHERE album_id = ?",
        )
        .bind(album_id)
        .fetch_one(&*self.db)
        .await?;

        let mut added = 0usize;
        for (offset, image_id) in image_ids.iter().enumerate() {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO album_images (album_id, image_id, position, created_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(album_id)
            .bind(image_id)
            .bind(base + offset as i64 + 1)
            .bind(Utc::now())
            .execute(&*self.db)
            .await;
            match result {
                Ok(done) => added += done.rows_affected() as usize,
                Err(err) if is_fk_violation(&err) => {
                    return Err(ServiceError::NotFoundOrForbidden("image"));
                }
                Err(err) => return Err(ServiceError::Sqlx(err)),
            }
        }
        Ok(added)
    }

    /// Remove one image from an album, scoped to the owner. Removing a
    /// non-member is a no-op.
    pub async fn remove_image(
        &self,
        album_id: &str,
        author_id: &str,
        image_id: &str,
    ) -> ServiceResult<()> {
        self.ensure_owner(album_id, author_id).await?;
        sqlx::query("DELETE FROM album_images WHERE album_id = ? AND image_id = ?")
            .bind(album_id)
            .bind(image_id)
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    /// Verify the album exists and belongs to `author_id` before a
    /// membership write. Both failures look the same to the caller.
    async fn ensure_owner(&self, album_id: &str, author_id: &str) -> ServiceResult<()> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT id FROM albums WHERE id = ? AND author_id = ?")
                .bind(album_id)
                .bind(author_id)
                .fetch_optional(&*self.db)
                .await?;
        found
            .map(|_| ())
            .ok_or(ServiceError::NotFoundOrForbidden("album"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::album::AlbumImage;
    use crate::services::gallery_service::GalleryService;
    use crate::services::media_store::MediaStore;
    use crate::services::quota_service::QuotaService;
    use crate::services::testing::{MemoryMediaStore, memory_pool, new_image};

    async fn setup() -> (AlbumService, GalleryService) {
        let pool = memory_pool().await;
        let quota = QuotaService::new(Arc::clone(&pool));
        let gallery = GalleryService::new(
            Arc::clone(&pool),
            MemoryMediaStore::new() as Arc<dyn MediaStore>,
            quota,
        );
        (AlbumService::new(pool), gallery)
    }

    fn make_album(name: &str) -> CreateAlbum {
        CreateAlbum {
            name: name.to_string(),
            description: None,
            is_public: None,
        }
    }

    async fn members_of(albums: &AlbumService, album_id: &str) -> Vec<AlbumImage> {
        sqlx::query_as(
            "SELECT album_id, image_id, position, created_at
             FROM album_images WHERE album_id = ? ORDER BY position ASC",
        )
        .bind(album_id)
        .fetch_all(&*albums.db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn new_albums_are_public_and_empty() {
        let (albums, _) = setup().await;
        let album = albums
            .create_album("u1", "Avery", make_album("Summer"))
            .await
            .unwrap();
        assert!(album.is_public);
        assert_eq!(album.image_count, 0);
        assert!(album.cover_image.is_none());

        let fetched = albums.get_album(&album.id).await.unwrap().unwrap();
        assert_eq!(fetched.album.name, "Summer");
        assert!(fetched.images.is_empty());
    }

    #[tokio::test]
    async fn adding_images_assigns_positions_and_derives_the_cover() {
        let (albums, gallery) = setup().await;
        for id in ["a", "b", "c"] {
            gallery.create_image(new_image(id, "u1")).await.unwrap();
        }
        let album = albums
            .create_album("u1", "Avery", make_album("Trip"))
            .await
            .unwrap();

        let added = albums
            .add_images(
                &album.id,
                "u1",
                &["a".to_string(), "b".to_string(), "c".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(added, 3);

        let members = members_of(&albums, &album.id).await;
        let positions: Vec<(String, i64)> = members
            .iter()
            .map(|m| (m.image_id.clone(), m.position))
            .collect();
        assert_eq!(
            positions,
            vec![
                ("a".to_string(), 1),
                ("b".to_string(), 2),
                ("c".to_string(), 3)
            ]
        );

        let fetched = albums.get_album(&album.id).await.unwrap().unwrap();
        assert_eq!(fetched.album.image_count, 3);
        assert_eq!(
            fetched.album.cover_image.as_deref(),
            Some("/media/gallery/a.jpg")
        );
        let order: Vec<_> = fetched.images.iter().map(|img| img.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn duplicate_members_are_skipped_and_leave_position_gaps() {
        let (albums, gallery) = setup().await;
        for id in ["a", "b", "d"] {
            gallery.create_image(new_image(id, "u1")).await.unwrap();
        }
        let album = albums
            .create_album("u1", "Avery", make_album("Trip"))
            .await
            .unwrap();
        albums
            .add_images(&album.id, "u1", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        // re-adding an existing member adds nothing
        let added = albums
            .add_images(&album.id, "u1", &["a".to_string()])
            .await
            .unwrap();
        assert_eq!(added, 0);

        // a duplicate mixed into a batch still burns its position slot
        let added = albums
            .add_images(&album.id, "u1", &["a".to_string(), "d".to_string()])
            .await
            .unwrap();
        assert_eq!(added, 1);

        let members = members_of(&albums, &album.id).await;
        let positions: Vec<(String, i64)> = members
            .iter()
            .map(|m| (m.image_id.clone(), m.position))
            .collect();
        assert_eq!(
            positions,
            vec![
                ("a".to_string(), 1),
                ("b".to_string(), 2),
                ("d".to_string(), 4)
            ]
        );

        let count = albums
            .get_album(&album.id)
            .await
            .unwrap()
            .unwrap()
            .album
            .image_count;
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn removal_recomputes_cover_and_count() {
        let (albums, gallery) = setup().await;
        for id in ["a", "b", "c"] {
            gallery.create_image(new_image(id, "u1")).await.unwrap();
        }
        let album = albums
            .create_album("u1", "Avery", make_album("Trip"))
            .await
            .unwrap();
        albums
            .add_images(
                &album.id,
                "u1",
                &["a".to_string(), "b".to_string(), "c".to_string()],
            )
            .await
            .unwrap();

        albums.remove_image(&album.id, "u1", "a").await.unwrap();
        let fetched = albums.get_album(&album.id).await.unwrap().unwrap();
        assert_eq!(fetched.album.image_count, 2);
        assert_eq!(
            fetched.album.cover_image.as_deref(),
            Some("/media/gallery/b.jpg")
        );

        // removing a non-member is a no-op
        albums.remove_image(&album.id, "u1", "a").await.unwrap();

        albums.remove_image(&album.id, "u1", "b").await.unwrap();
        albums.remove_image(&album.id, "u1", "c").await.unwrap();
        let fetched = albums.get_album(&album.id).await.unwrap().unwrap();
        assert_eq!(fetched.album.image_count, 0);
        assert!(fetched.album.cover_image.is_none());
    }

    #[tokio::test]
    async fn deleting_an_image_updates_every_album_it_was_in() {
        let (albums, gallery) = setup().await;
        for id in ["a", "b"] {
            gallery.create_image(new_image(id, "u1")).await.unwrap();
        }
        let album = albums
            .create_album("u1", "Avery", make_album("Trip"))
            .await
            .unwrap();
        albums
            .add_images(&album.id, "u1", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        gallery.delete_image("a", "u1").await.unwrap();

        let fetched = albums.get_album(&album.id).await.unwrap().unwrap();
        assert_eq!(fetched.album.image_count, 1);
        assert_eq!(
            fetched.album.cover_image.as_deref(),
            Some("/media/gallery/b.jpg")
        );
        assert_eq!(fetched.images.len(), 1);
    }

    #[tokio::test]
    async fn membership_writes_are_owner_scoped() {
        let (albums, gallery) = setup().await;
        gallery.create_image(new_image("a", "u1")).await.unwrap();
        let album = albums
            .create_album("u1", "Avery", make_album("Trip"))
            .await
            .unwrap();

        let err = albums
            .add_images(&album.id, "u2", &["a".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFoundOrForbidden("album")));

        let err = albums
            .remove_image(&album.id, "u2", "a")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFoundOrForbidden("album")));

        let patch = UpdateAlbum {
            name: Some("Hijacked".to_string()),
            ..UpdateAlbum::default()
        };
        let err = albums
            .update_album(&album.id, "u2", patch)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFoundOrForbidden("album")));

        let err = albums.delete_album(&album.id, "u2").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFoundOrForbidden("album")));

        let unchanged = albums.get_album(&album.id).await.unwrap().unwrap();
        assert_eq!(unchanged.album.name, "Trip");

        // adding an unknown image reports the image, not the album
        let err = albums
            .add_images(&album.id, "u1", &["missing".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFoundOrForbidden("image")));
    }

    #[tokio::test]
    async fn deleting_an_album_leaves_its_images_alone() {
        let (albums, gallery) = setup().await;
        gallery.create_image(new_image("a", "u1")).await.unwrap();
        let album = albums
            .create_album("u1", "Avery", make_album("Trip"))
            .await
            .unwrap();
        albums
            .add_images(&album.id, "u1", &["a".to_string()])
            .await
            .unwrap();

        albums.delete_album(&album.id, "u1").await.unwrap();
        assert!(albums.get_album(&album.id).await.unwrap().is_none());
        assert!(gallery.get_image("a").await.unwrap().is_some());

        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM album_images")
            .fetch_one(&*albums.db)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn private_albums_are_hidden_from_public_listings() {
        let (albums, _) = setup().await;
        albums
            .create_album("u1", "Avery", make_album("Public"))
            .await
            .unwrap();
        albums
            .create_album(
                "u1",
                "Avery",
                CreateAlbum {
                    name: "Hidden".to_string(),
                    description: None,
                    is_public: Some(false),
                },
            )
            .await
            .unwrap();

        let public = albums.list_albums(false).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].name, "Public");

        let all = albums.list_albums(true).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn update_bumps_updated_at_and_patches_fields() {
        let (albums, _) = setup().await;
        let album = albums
            .create_album("u1", "Avery", make_album("Trip"))
            .await
            .unwrap();

        let patch = UpdateAlbum {
            name: Some("Road Trip".to_string()),
            is_public: Some(false),
            ..Default::default()
        };
        let updated = albums.update_album(&album.id, "u1", patch).await.unwrap();
        assert_eq!(updated.name, "Road Trip");
        assert!(!updated.is_public);
        assert!(updated.updated_at >= album.updated_at);
    }
}
