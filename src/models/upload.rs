//! Quota ledger rows and the storage summary derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Which side of the application an upload belongs to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UploadKind {
    Gallery,
    Blog,
}

/// One ledger entry per stored file. The sum of `size` over a user's rows
/// is that user's storage usage; nothing else is consulted.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct UploadRecord {
    /// Internal UUID for DB indexing.
    pub id: String,

    /// Public URL the media store returned for the stored bytes.
    pub url: String,

    /// Original filename of the uploaded file.
    pub filename: String,

    /// Size in bytes, as counted against the owner's quota.
    pub size: i64,

    /// Owner of the upload.
    pub user_id: String,

    /// Gallery upload or blog (featured image) upload.
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: UploadKind,

    /// Optional back-reference to the domain record this upload serves.
    pub associated_id: Option<String>,

    /// Timestamp when the upload was recorded.
    pub uploaded_at: DateTime<Utc>,
}

/// Point-in-time storage summary for one user. Derived, never persisted.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct StorageInfo {
    /// Bytes currently counted against the quota.
    pub used: i64,

    /// Total bytes the user may store.
    pub limit: i64,

    /// `limit - used`; negative once a user is over quota.
    pub remaining: i64,

    /// Usage as a percentage of the limit, rounded to one decimal place.
    pub percentage: f64,
}

impl StorageInfo {
    pub fn from_used(used: i64, limit: i64) -> Self {
        let percentage = (used as f64 / limit as f64 * 1000.0).round() / 10.0;
        Self {
            used,
            limit,
            remaining: limit - used,
            percentage,
        }
    }

    /// The zero-usage summary reported for anonymous callers and when the
    /// ledger cannot be read.
    pub fn empty(limit: i64) -> Self {
        Self::from_used(0, limit)
    }
}
