//! src/services/quota_service.rs
//!
//! QuotaService — the per-user storage ledger. Usage is always the sum of a
//! user's `upload_records` rows; no running counter exists anywhere. Reads
//! fail open (a broken ledger reports zero usage) and writes fail soft (a
//! lost ledger row is logged, never fatal), so quota accounting can degrade
//! without taking uploads down with it.

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::models::upload::{StorageInfo, UploadKind};

/// Total bytes each user may store across gallery and blog uploads.
pub const STORAGE_LIMIT: i64 = 1024 * 1024 * 1024;

/// Hard cap for a single uploaded file.
pub const MAX_FILE_SIZE: i64 = 5 * 1024 * 1024;

/// Return true if a single file of `size` bytes is within the per-file cap.
pub fn is_file_size_valid(size: i64) -> bool {
    size <= MAX_FILE_SIZE
}

#[derive(Clone)]
pub struct QuotaService {
    /// Shared SQLite connection pool holding the ledger.
    pub db: Arc<SqlitePool>,
}

impl QuotaService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Point-in-time storage summary for a user.
    ///
    /// Anonymous callers get the zero-usage summary. A ledger read failure
    /// also reports zero usage rather than an error; the UI treats the
    /// summary as advisory and enforcement happens at upload time.
    pub async fn storage_info(&self, user_id: Option<&str>) -> StorageInfo {
        let Some(user_id) = user_id else {
            return StorageInfo::empty(STORAGE_LIMIT);
        };
        let used = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(size), 0) FROM upload_records WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&*self.db)
        .await;
        match used {
            Ok(used) => StorageInfo::from_used(used, STORAGE_LIMIT),
            Err(err) => {
                warn!("ledger read for user {} failed: {}", user_id, err);
                StorageInfo::empty(STORAGE_LIMIT)
            }
        }
    }

    /// Whether `bytes` more can be stored without passing the quota.
    pub async fn has_space(&self, user_id: &str, bytes: i64) -> bool {
        self.storage_info(Some(user_id)).await.remaining >= bytes
    }

    /// Append a ledger row for a completed upload.
    ///
    /// Returns false instead of an error when the insert fails; by then the
    /// bytes are already stored and the upload must not be rolled back over
    /// bookkeeping.
    pub async fn record_upload(
        &self,
        user_id: &str,
        url: &str,
        filename: &str,
        size: i64,
        kind: UploadKind,
        associated_id: Option<&str>,
    ) -> bool {
        let result = sqlx::query(
            "INSERT INTO upload_records (id, url, filename, size, user_id, type, associated_id, uploaded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(url)
        .bind(filename)
        .bind(size)
        .bind(user_id)
        .bind(kind)
        .bind(associated_id)
        .bind(Utc::now())
        .execute(&*self.db)
        .await;
        match result {
            Ok(_) => true,
            Err(err) => {
                warn!("ledger write for {} failed: {}", url, err);
                false
            }
        }
    }

    /// Drop the ledger rows for a deleted upload, releasing its bytes.
    ///
    /// Owner-scoped: other users' rows for the same URL are untouched.
    /// Deleting zero rows is still success; only a failed statement returns
    /// false.
    pub async fn remove_upload(&self, user_id: &str, url: &str) -> bool {
        let result = sqlx::query("DELETE FROM upload_records WHERE url = ? AND user_id = ?")
            .bind(url)
            .bind(user_id)
            .execute(&*self.db)
            .await;
        match result {
            Ok(_) => true,
            Err(err) => {
                warn!("ledger delete for {} failed: {}", url, err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::memory_pool;

    const MIB: i64 = 1024 * 1024;

    #[tokio::test]
    async fn usage_is_the_sum_of_ledger_rows() {
        let quota = QuotaService::new(memory_pool().await);

        assert!(
            quota
                .record_upload("u1", "/media/gallery/a.jpg", "a.jpg", 3 * MIB, UploadKind::Gallery, None)
                .await
        );
        assert!(
            quota
                .record_upload("u1", "/media/blog/b.png", "b.png", 2 * MIB, UploadKind::Blog, None)
                .await
        );
        assert!(
            quota
                .record_upload("u2", "/media/gallery/c.jpg", "c.jpg", 7 * MIB, UploadKind::Gallery, None)
                .await
        );

        let info = quota.storage_info(Some("u1")).await;
        assert_eq!(info.used, 5 * MIB);
        assert_eq!(info.remaining, STORAGE_LIMIT - 5 * MIB);
        assert_eq!(info.percentage, 0.5);
    }

    #[tokio::test]
    async fn anonymous_callers_get_the_zero_summary() {
        let quota = QuotaService::new(memory_pool().await);
        let info = quota.storage_info(None).await;
        assert_eq!(info.used, 0);
        assert_eq!(info.remaining, STORAGE_LIMIT);
    }

    #[tokio::test]
    async fn ledger_read_failure_reports_zero_usage() {
        let pool = memory_pool().await;
        let quota = QuotaService::new(Arc::clone(&pool));
        sqlx::query("DROP TABLE upload_records")
            .execute(&*pool)
            .await
            .unwrap();

        let info = quota.storage_info(Some("u1")).await;
        assert_eq!(info.used, 0);
        assert_eq!(info.remaining, STORAGE_LIMIT);
    }

    #[tokio::test]
    async fn remove_upload_is_owner_scoped() {
        let quota = QuotaService::new(memory_pool().await);
        quota
            .record_upload("u1", "/media/gallery/a.jpg", "a.jpg", MIB, UploadKind::Gallery, None)
            .await;
        quota
            .record_upload("u2", "/media/gallery/a.jpg", "a.jpg", MIB, UploadKind::Gallery, None)
            .await;

        assert!(quota.remove_upload("u1", "/media/gallery/a.jpg").await);
        assert_eq!(quota.storage_info(Some("u1")).await.used, 0);
        assert_eq!(quota.storage_info(Some("u2")).await.used, MIB);

        // a second removal of the same url is a no-op success
        assert!(quota.remove_upload("u1", "/media/gallery/a.jpg").await);
        assert_eq!(quota.storage_info(Some("u1")).await.used, 0);
        assert!(quota.remove_upload("u1", "/media/gallery/missing.jpg").await);
    }

    #[tokio::test]
    async fn has_space_tracks_the_remaining_budget() {
        let quota = QuotaService::new(memory_pool().await);
        quota
            .record_upload(
                "u1",
                "/media/gallery/big.jpg",
                "big.jpg",
                STORAGE_LIMIT - 5 * MIB,
                UploadKind::Gallery,
                None,
            )
            .await;

        assert!(quota.has_space("u1", 5 * MIB).await);
        assert!(!quota.has_space("u1", 5 * MIB + 1).await);
    }

    #[test]
    fn per_file_cap_is_inclusive() {
        assert!(is_file_size_valid(MAX_FILE_SIZE));
        assert!(!is_file_size_valid(MAX_FILE_SIZE + 1));
    }
}
