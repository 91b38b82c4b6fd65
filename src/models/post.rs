//! Blog posts and the aggregated tag counters derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct BlogPost {
    /// Internal UUID for DB indexing.
    pub id: String,

    pub title: String,

    /// Post body, stored as-is.
    pub content: String,

    /// URL of the post's featured image, if one has been uploaded.
    pub featured_image: Option<String>,

    /// Free-form tags, stored as a JSON array.
    pub tags: Json<Vec<String>>,

    /// Author of the post.
    pub author_id: String,

    /// Display name of the author at creation time.
    pub author_name: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub struct NewBlogPost {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update; absent fields are left untouched.
#[derive(Deserialize, Debug, Default)]
pub struct UpdateBlogPost {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Aggregated usage count for one tag across all posts. Rebuilt from the
/// posts table after every post mutation.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Tag {
    pub name: String,
    pub post_count: i64,
}
