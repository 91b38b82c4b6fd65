//! Comments, attachable to gallery images and blog posts alike.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// What a comment is attached to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CommentTarget {
    Image,
    Post,
}

#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Comment {
    /// Internal UUID for DB indexing.
    pub id: String,

    /// Kind of record the comment is attached to.
    pub target_kind: CommentTarget,

    /// Id of the image or post commented on.
    pub target_id: String,

    /// Commenter.
    pub user_id: String,

    /// Display name of the commenter at posting time.
    pub user_name: String,

    /// Comment text.
    pub body: String,

    /// Timestamp when the comment was posted.
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub struct NewComment {
    pub body: String,
}
