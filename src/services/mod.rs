//! src/services/mod.rs
//!
//! Service layer: quota accounting, gallery, albums, blog posts, comments
//! and the upload pipeline that ties them to the media store. Handlers talk
//! to these services only; no SQL or filesystem access happens above them.

use thiserror::Error;

pub mod album_service;
pub mod comment_service;
pub mod gallery_service;
pub mod media_store;
pub mod post_service;
pub mod quota_service;
pub mod upload_service;

use media_store::MediaError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The uploaded file was rejected before any bytes were stored.
    #[error("invalid file: {0}")]
    InvalidFile(String),

    /// Storing the file would push the owner past their quota.
    #[error("storage quota exceeded: {needed} bytes requested, {remaining} bytes remaining")]
    QuotaExceeded { needed: i64, remaining: i64 },

    /// The media store rejected or lost the bytes mid-transfer.
    #[error("media upload failed: {0}")]
    UploadFailed(#[source] MediaError),

    /// The record does not exist, or it belongs to someone else. The two
    /// cases are deliberately indistinguishable to callers.
    #[error("{0} not found")]
    NotFoundOrForbidden(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Return true if the SQLx error indicates a foreign key violation, which
/// surfaces when a membership or favorite references a missing image.
pub(crate) fn is_fk_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("foreign key")
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt;
    use futures::stream::BoxStream;
    use sqlx::SqlitePool;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::collections::HashMap;
    use std::io;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::models::image::NewStoredImage;
    use crate::services::media_store::{
        MediaError, MediaMeta, MediaReader, MediaStore, ProgressFn, StoredMedia,
    };

    /// Fresh in-memory database with the full schema applied. A single
    /// connection keeps every query on the same in-memory instance.
    pub async fn memory_pool() -> Arc<SqlitePool> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();
        Arc::new(pool)
    }

    pub fn new_image(id: &str, author_id: &str) -> NewStoredImage {
        NewStoredImage {
            id: id.to_string(),
            url: format!("/media/gallery/{id}.jpg"),
            title: format!("image {id}"),
            description: None,
            category: None,
            tags: Vec::new(),
            author_id: author_id.to_string(),
            author_name: "Tester".to_string(),
            size: 1024,
        }
    }

    /// Media store double backed by a HashMap, counting `store` calls.
    #[derive(Default)]
    pub struct MemoryMediaStore {
        pub objects: Mutex<HashMap<String, Vec<u8>>>,
        pub store_calls: AtomicUsize,
    }

    impl MemoryMediaStore {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }
    }

    #[async_trait]
    impl MediaStore for MemoryMediaStore {
        async fn store(
            &self,
            key: &str,
            mut stream: BoxStream<'static, io::Result<Bytes>>,
            expected_len: u64,
            progress: Option<ProgressFn>,
        ) -> Result<StoredMedia, MediaError> {
            self.store_calls.fetch_add(1, Ordering::SeqCst);
            let mut collected: Vec<u8> = Vec::new();
            while let Some(chunk) = stream.next().await {
                collected.extend_from_slice(&chunk?);
            }
            if let Some(progress) = progress {
                progress(collected.len() as u64, expected_len);
            }
            let stored = StoredMedia {
                url: format!("/media/{key}"),
                key: key.to_string(),
                size: collected.len() as i64,
                etag: format!("{:x}", md5::compute(&collected)),
            };
            self.objects.lock().unwrap().insert(key.to_string(), collected);
            Ok(stored)
        }

        async fn delete_by_url(&self, url: &str) -> Result<bool, MediaError> {
            let Some(key) = self.key_of(url) else {
                return Ok(false);
            };
            Ok(self.objects.lock().unwrap().remove(&key).is_some())
        }

        async fn reader(&self, key: &str) -> Result<(MediaMeta, MediaReader), MediaError> {
            let bytes = self
                .objects
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| MediaError::NotFound(key.to_string()))?;
            let meta = MediaMeta {
                size: bytes.len() as u64,
                modified: None,
            };
            Ok((meta, Box::new(std::io::Cursor::new(bytes))))
        }

        fn key_of(&self, url: &str) -> Option<String> {
            url.strip_prefix("/media/")
                .filter(|key| !key.is_empty())
                .map(str::to_string)
        }
    }

    /// Media store double whose writes always fail.
    pub struct FailingMediaStore;

    #[async_trait]
    impl MediaStore for FailingMediaStore {
        async fn store(
            &self,
            _key: &str,
            _stream: BoxStream<'static, io::Result<Bytes>>,
            _expected_len: u64,
            _progress: Option<ProgressFn>,
        ) -> Result<StoredMedia, MediaError> {
            Err(MediaError::Io(io::Error::other("simulated outage")))
        }

        async fn delete_by_url(&self, _url: &str) -> Result<bool, MediaError> {
            Ok(false)
        }

        async fn reader(&self, key: &str) -> Result<(MediaMeta, MediaReader), MediaError> {
            Err(MediaError::NotFound(key.to_string()))
        }

        fn key_of(&self, _url: &str) -> Option<String> {
            None
        }
    }
}
