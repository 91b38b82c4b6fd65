//! Gallery image rows and the payloads that create or patch them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// A published gallery image. The bytes live in the media store; this row
/// holds the URL and presentation metadata.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct GalleryImage {
    /// Internal UUID for DB indexing.
    pub id: String,

    /// Public URL of the stored bytes.
    pub url: String,

    /// Display title; defaults to the upload's filename stem.
    pub title: String,

    /// Optional caption.
    pub description: Option<String>,

    /// Optional category used for list filtering.
    pub category: Option<String>,

    /// Free-form tags, stored as a JSON array.
    pub tags: Json<Vec<String>>,

    /// Like counter; never drops below zero.
    pub likes: i64,

    /// Uploader.
    pub author_id: String,

    /// Display name of the uploader at upload time.
    pub author_name: String,

    /// Size in bytes of the stored file.
    pub size: i64,

    /// Timestamp when the image was published.
    pub created_at: DateTime<Utc>,
}

/// Caption fields accompanying an upload. All optional; a missing title
/// falls back to the filename.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ImageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Fully resolved insert payload, produced by the upload pipeline once the
/// bytes are stored and the defaults are applied.
#[derive(Clone, Debug)]
pub struct NewStoredImage {
    pub id: String,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub author_id: String,
    pub author_name: String,
    pub size: i64,
}

/// Partial update; absent fields are left untouched.
#[derive(Deserialize, Debug, Default)]
pub struct UpdateGalleryImage {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}
