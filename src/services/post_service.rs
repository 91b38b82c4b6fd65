//! src/services/post_service.rs
//!
//! PostService — blog posts, their featured images and the aggregated tag
//! counters. The counters are a derived view over `blog_posts.tags` and are
//! rebuilt wholesale after every post mutation rather than adjusted
//! incrementally.

use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite, types::Json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::post::{BlogPost, NewBlogPost, Tag, UpdateBlogPost};
use crate::services::media_store::MediaStore;
use crate::services::quota_service::QuotaService;
use crate::services::{ServiceError, ServiceResult};

#[derive(Clone)]
pub struct PostService {
    /// Shared SQLite connection pool used for posts and tag counters.
    pub db: Arc<SqlitePool>,

    media: Arc<dyn MediaStore>,
    quota: QuotaService,
}

impl PostService {
    pub fn new(db: Arc<SqlitePool>, media: Arc<dyn MediaStore>, quota: QuotaService) -> Self {
        Self { db, media, quota }
    }

    pub async fn create_post(
        &self,
        author_id: &str,
        author_name: &str,
        new: NewBlogPost,
    ) -> ServiceResult<BlogPost> {
        let now = Utc::now();
        let post = sqlx::query_as::<_, BlogPost>(
            r#"
            INSERT INTO blog_posts (
                id, title, content, featured_image, tags,
                author_id, author_name, created_at, updated_at
            ) VALUES (?, ?, ?, NULL, ?, ?, ?, ?, ?)
            RETURNING id, title, content, featured_image, tags,
                      author_id, author_name, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&new.title)
        .bind(&new.content)
        .bind(Json(&new.tags))
        .bind(author_id)
        .bind(author_name)
        .bind(now)
        .bind(now)
        .fetch_one(&*self.db)
        .await?;

        self.rebuild_tag_counts().await;
        Ok(post)
    }

    pub async fn get_post(&self, id: &str) -> ServiceResult<Option<BlogPost>> {
        let post = sqlx::query_as::<_, BlogPost>(
            "SELECT id, title, content, featured_image, tags,
                    author_id, author_name, created_at, updated_at
             FROM blog_posts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(post)
    }

    /// Owner-scoped fetch used before a featured-image replace; a missing
    /// post and someone else's post are indistinguishable.
    pub(crate) async fn get_post_for_author(
        &self,
        id: &str,
        author_id: &str,
    ) -> ServiceResult<Option<BlogPost>> {
        let post = sqlx::query_as::<_, BlogPost>(
            "SELECT id, title, content, featured_image, tags,
                    author_id, author_name, created_at, updated_at
             FROM blog_posts WHERE id = ? AND author_id = ?",
        )
        .bind(id)
        .bind(author_id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(post)
    }

    /// List posts, newest first.
    pub async fn list_posts(&self) -> ServiceResult<Vec<BlogPost>> {
        let posts = sqlx::query_as::<_, BlogPost>(
            "SELECT id, title, content, featured_image, tags,
                    author_id, author_name, created_at, updated_at
             FROM blog_posts ORDER BY created_at DESC",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(posts)
    }

    /// Apply a partial update, scoped to the author. `updated_at` is always
    /// bumped; the tag counters are rebuilt only when the tags changed.
    pub async fn update_post(
        &self,
        id: &str,
        author_id: &str,
        patch: UpdateBlogPost,
    ) -> ServiceResult<BlogPost> {
        let tags_touched = patch.tags.is_some();
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE blog_posts SET updated_at = ");
        builder.push_bind(Utc::now());
        if let Some(title) = patch.title {
            builder.push(", title = ");
            builder.push_bind(title);
        }
        if let Some(content) = patch.content {
            builder.push(", content = ");
            builder.push_bind(content);
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
            " RETURNING id, title, content, featured_image, tags, \
             author_id, author_name, created_at, updated_at",
        );

        let updated: Option<BlogPost> = builder.build_query_as().fetch_optional(&*self.db).await?;
        let post = updated.ok_or(ServiceError::NotFoundOrForbidden("post"))?;
        if tags_touched {
            self.rebuild_tag_counts().await;
        }
        Ok(post)
    }

    /// Point the post at a freshly stored featured image, scoped to the
    /// author. The upload pipeline owns the surrounding replace sequence.
    pub(crate) async fn update_featured_image(
        &self,
        id: &str,
        author_id: &str,
        url: &str,
    ) -> ServiceResult<BlogPost> {
        let updated = sqlx::query_as::<_, BlogPost>(
            "UPDATE blog_posts SET featured_image = ?, updated_at = ?
             WHERE id = ? AND author_id = ?
             RETURNING id, title, content, featured_image, tags,
                       author_id, author_name, created_at, updated_at",
        )
        .bind(url)
        .bind(Utc::now())
        .bind(id)
        .bind(author_id)
        .fetch_optional(&*self.db)
        .await?;
        updated.ok_or(ServiceError::NotFoundOrForbidden("post"))
    }

    /// Delete a post, scoped to the author.
    ///
    /// The featured image's bytes, ledger rows and the post's comments are
    /// cleaned up afterwards, best-effort: failures are logged and the
    /// delete still succeeds.
    pub async fn delete_post(&self, id: &str, author_id: &str) -> ServiceResult<()> {
        let deleted: Option<Option<String>> = sqlx::query_scalar(
            "DELETE FROM blog_posts WHERE id = ? AND author_id = ? RETURNING featured_image",
        )
        .bind(id)
        .bind(author_id)
        .fetch_optional(&*self.db)
        .await?;
        let Some(featured_image) = deleted else {
            return Err(ServiceError::NotFoundOrForbidden("post"));
        };

        if let Some(url) = featured_image {
            match self.media.delete_by_url(&url).await {
                Ok(true) => {}
                Ok(false) => debug!("featured image for post {} was already gone", id),
                Err(err) => warn!("failed to delete featured image {}: {}", url, err),
            }
            if !self.quota.remove_upload(author_id, &url).await {
                warn!("ledger rows for {} could not be released", url);
            }
        }
        if let Err(err) =
            sqlx::query("DELETE FROM comments WHERE target_kind = 'post' AND target_id = ?")
                .bind(id)
                .execute(&*self.db)
                .await
        {
            warn!("failed to delete comments for post {}: {}", id, err);
        }

        self.rebuild_tag_counts().await;
        Ok(())
    }

    /// Aggregated tag counters, most used first.
    pub async fn list_tags(&self) -> ServiceResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            "SELECT name, post_count FROM tags ORDER BY post_count DESC, name ASC",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(tags)
    }

    /// Rebuild the tag counters from the posts table.
    ///
    /// Failures are logged and the triggering mutation stands; the counters
    /// are a derived view and the next rebuild heals them.
    async fn rebuild_tag_counts(&self) {
        if let Err(err) = self.try_rebuild_tag_counts().await {
            warn!("tag counter rebuild failed: {}", err);
        }
    }

    async fn try_rebuild_tag_counts(&self) -> ServiceResult<()> {
        let tag_rows: Vec<Json<Vec<String>>> = sqlx::query_scalar("SELECT tags FROM blog_posts")
            .fetch_all(&*self.db)
            .await?;
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for Json(tags) in tag_rows {
            for tag in tags {
                *counts.entry(tag).or_insert(0) += 1;
            }
        }

        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM tags").execute(&mut *tx).await?;
        for (name, count) in counts {
            sqlx::query("INSERT INTO tags (name, post_count) VALUES (?, ?)")
                .bind(name)
                .bind(count)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::upload::UploadKind;
    use crate::services::testing::{MemoryMediaStore, memory_pool};

    async fn service_with_media() -> (PostService, Arc<MemoryMediaStore>, QuotaService) {
        let pool = memory_pool().await;
        let media = MemoryMediaStore::new();
        let quota = QuotaService::new(Arc::clone(&pool));
        let posts = PostService::new(
            pool,
            Arc::clone(&media) as Arc<dyn MediaStore>,
            quota.clone(),
        );
        (posts, media, quota)
    }

    fn draft(title: &str, tags: &[&str]) -> NewBlogPost {
        NewBlogPost {
            title: title.to_string(),
            content: "words".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn creates_fetches_and_lists_posts() {
        let (posts, _, _) = service_with_media().await;
        let first = posts
            .create_post("u1", "Avery", draft("First", &[]))
            .await
            .unwrap();
        assert!(first.featured_image.is_none());

        let fetched = posts.get_post(&first.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "First");
        assert!(posts.get_post("missing").await.unwrap().is_none());

        posts
            .create_post("u1", "Avery", draft("Second", &[]))
            .await
            .unwrap();
        assert_eq!(posts.list_posts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn tag_counters_follow_post_mutations() {
        let (posts, _, _) = service_with_media().await;
        let first = posts
            .create_post("u1", "Avery", draft("First", &["rust", "photos"]))
            .await
            .unwrap();
        let second = posts
            .create_post("u1", "Avery", draft("Second", &["rust"]))
            .await
            .unwrap();

        let tags = posts.list_tags().await.unwrap();
        let counts: Vec<(String, i64)> =
            tags.iter().map(|t| (t.name.clone(), t.post_count)).collect();
        assert_eq!(
            counts,
            vec![("rust".to_string(), 2), ("photos".to_string(), 1)]
        );

        let patch = UpdateBlogPost {
            tags: Some(vec!["travel".to_string()]),
            ..Default::default()
        };
        posts.update_post(&first.id, "u1", patch).await.unwrap();
        let tags = posts.list_tags().await.unwrap();
        let counts: Vec<(String, i64)> =
            tags.iter().map(|t| (t.name.clone(), t.post_count)).collect();
        assert_eq!(
            counts,
            vec![("rust".to_string(), 1), ("travel".to_string(), 1)]
        );

        posts.delete_post(&second.id, "u1").await.unwrap();
        let tags = posts.list_tags().await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "travel");
    }

    #[tokio::test]
    async fn updates_are_author_scoped() {
        let (posts, _, _) = service_with_media().await;
        let post = posts
            .create_post("u1", "Avery", draft("First", &[]))
            .await
            .unwrap();

        let patch = UpdateBlogPost {
            title: Some("Stolen".to_string()),
            ..Default::default()
        };
        let err = posts.update_post(&post.id, "u2", patch).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFoundOrForbidden("post")));

        let err = posts
            .update_featured_image(&post.id, "u2", "/media/blog/x.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFoundOrForbidden("post")));

        let err = posts.delete_post(&post.id, "u2").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFoundOrForbidden("post")));

        let patch = UpdateBlogPost {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        let updated = posts.update_post(&post.id, "u1", patch).await.unwrap();
        assert_eq!(updated.title, "Renamed");
        assert!(updated.updated_at >= post.updated_at);
    }

    #[tokio::test]
    async fn delete_releases_the_featured_image() {
        let (posts, media, quota) = service_with_media().await;
        let post = posts
            .create_post("u1", "Avery", draft("First", &[]))
            .await
            .unwrap();

        media
            .objects
            .lock()
            .unwrap()
            .insert("blog/cover.jpg".to_string(), b"bytes".to_vec());
        quota
            .record_upload(
                "u1",
                "/media/blog/cover.jpg",
                "cover.jpg",
                2048,
                UploadKind::Blog,
                Some(&post.id),
            )
            .await;
        posts
            .update_featured_image(&post.id, "u1", "/media/blog/cover.jpg")
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO comments (id, target_kind, target_id, user_id, user_name, body, created_at)
             VALUES ('c1', 'post', ?, 'u2', 'Other', 'great post', ?)",
        )
        .bind(&post.id)
        .bind(Utc::now())
        .execute(&*posts.db)
        .await
        .unwrap();

        posts.delete_post(&post.id, "u1").await.unwrap();
        assert!(posts.get_post(&post.id).await.unwrap().is_none());
        assert!(media.objects.lock().unwrap().is_empty());
        assert_eq!(quota.storage_info(Some("u1")).await.used, 0);

        let comments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
            .fetch_one(&*posts.db)
            .await
            .unwrap();
        assert_eq!(comments, 0);
    }
}
