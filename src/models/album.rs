//! Albums and their membership rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::image::GalleryImage;

/// A user-curated collection of gallery images.
///
/// `image_count` and `cover_image` are denormalized from the membership
/// table and maintained by database triggers, never by application writes.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Album {
    /// Internal UUID for DB indexing.
    pub id: String,

    /// Display name; callers must send a non-empty one.
    pub name: String,

    /// Optional description.
    pub description: Option<String>,

    /// URL of the lowest-positioned member image, if any.
    pub cover_image: Option<String>,

    /// Owner of the album.
    pub author_id: String,

    /// Display name of the owner at creation time.
    pub author_name: String,

    /// Private albums are visible to their owner only.
    pub is_public: bool,

    /// Number of member images.
    pub image_count: i64,

    /// Timestamp when the album was created.
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last metadata update.
    pub updated_at: DateTime<Utc>,
}

/// One image's membership in one album. `position` orders the album's
/// contents; duplicates of the (album, image) pair are rejected by the
/// primary key.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct AlbumImage {
    pub album_id: String,
    pub image_id: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// An album together with its member images in position order.
#[derive(Serialize, Debug)]
pub struct AlbumWithImages {
    #[serde(flatten)]
    pub album: Album,
    pub images: Vec<GalleryImage>,
}

#[derive(Deserialize, Debug)]
pub struct CreateAlbum {
    pub name: String,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

/// Partial update; absent fields are left untouched.
#[derive(Deserialize, Debug, Default)]
pub struct UpdateAlbum {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}
