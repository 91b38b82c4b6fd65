//! src/services/comment_service.rs
//!
//! CommentService — comments attached to gallery images or blog posts. The
//! target is verified to exist at posting time; when a target is deleted
//! later, the owning service sweeps its comments.

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::comment::{Comment, CommentTarget};
use crate::services::{ServiceError, ServiceResult};

#[derive(Clone)]
pub struct CommentService {
    /// Shared SQLite connection pool used for comments.
    pub db: Arc<SqlitePool>,
}

impl CommentService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Post a comment on an existing image or post.
    pub async fn add_comment(
        &self,
        target: CommentTarget,
        target_id: &str,
        user_id: &str,
        user_name: &str,
        body: &str,
    ) -> ServiceResult<Comment> {
        if !self.target_exists(target, target_id).await? {
            return Err(ServiceError::NotFoundOrForbidden(target_label(target)));
        }

        let comment = sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (id, target_kind, target_id, user_id, user_name, body, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id, target_kind, target_id, user_id, user_name, body, created_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(target)
        .bind(target_id)
        .bind(user_id)
        .bind(user_name)
        .bind(body)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;
        Ok(comment)
    }

    /// Comments on one target, oldest first.
    pub async fn list_comments(
        &self,
        target: CommentTarget,
        target_id: &str,
    ) -> ServiceResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT id, target_kind, target_id, user_id, user_name, body, created_at
             FROM comments WHERE target_kind = ? AND target_id = ?
             ORDER BY created_at ASC",
        )
        .bind(target)
        .bind(target_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(comments)
    }

    /// Delete a comment, scoped to its author.
    pub async fn delete_comment(&self, id: &str, user_id: &str) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFoundOrForbidden("comment"));
        }
        Ok(())
    }

    async fn target_exists(&self, target: CommentTarget, target_id: &str) -> ServiceResult<bool> {
        let sql = match target {
            CommentTarget::Image => "SELECT 1 FROM gallery_images WHERE id = ?",
            CommentTarget::Post => "SELECT 1 FROM blog_posts WHERE id = ?",
        };
        let found: Option<i64> = sqlx::query_scalar(sql)
            .bind(target_id)
            .fetch_optional(&*self.db)
            .await?;
        Ok(found.is_some())
    }
}

fn target_label(target: CommentTarget) -> &'static str {
    match target {
        CommentTarget::Image => "image",
        CommentTarget::Post => "post",
    }
}
