//! src/services/media_store.rs
//!
//! MediaStore — the boundary behind which image bytes live. The rest of the
//! service only sees the trait: store a byte stream under a key and get back
//! a stable public URL, delete by URL, open a key for reading. The bundled
//! `DiskMediaStore` keeps payloads on local disk, sharded beneath
//! `base_path/{shard}/{shard}/{key}`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;
use md5::Context;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid media key")]
    InvalidKey,
    #[error("media object `{0}` not found")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result of a completed store call.
#[derive(Debug, Clone)]
pub struct StoredMedia {
    /// Public URL under which the bytes can be fetched back.
    pub url: String,

    /// Key the bytes were stored under.
    pub key: String,

    /// Number of bytes written.
    pub size: i64,

    /// MD5 of the stored bytes.
    pub etag: String,
}

/// Metadata read back alongside a stored object when serving it.
#[derive(Debug, Clone)]
pub struct MediaMeta {
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Opened handle for streaming a stored object out.
pub type MediaReader = Box<dyn AsyncRead + Send + Unpin>;

/// Best-effort progress callback, invoked after each chunk lands with
/// (bytes written so far, expected total).
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Where image bytes live. Implementations must overwrite on key collision
/// so a replace can reuse its predecessor's key and keep the URL stable.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store a byte stream under `key`, replacing any existing object at the
    /// same key.
    async fn store(
        &self,
        key: &str,
        stream: BoxStream<'static, io::Result<Bytes>>,
        expected_len: u64,
        progress: Option<ProgressFn>,
    ) -> Result<StoredMedia, MediaError>;

    /// Delete the object a previously returned URL points at. `Ok(false)`
    /// when the URL does not reference an object in this store.
    async fn delete_by_url(&self, url: &str) -> Result<bool, MediaError>;

    /// Open a stored object for reading.
    async fn reader(&self, key: &str) -> Result<(MediaMeta, MediaReader), MediaError>;

    /// Map a URL previously returned by `store` back to its key, if the URL
    /// belongs to this store.
    fn key_of(&self, url: &str) -> Option<String>;
}

/// Split an in-memory payload into a chunked stream suitable for `store`.
pub fn byte_chunks(bytes: Bytes) -> BoxStream<'static, io::Result<Bytes>> {
    const CHUNK: usize = 64 * 1024;
    let mut chunks = Vec::with_capacity(bytes.len() / CHUNK + 1);
    let mut rest = bytes;
    while rest.len() > CHUNK {
        chunks.push(Ok(rest.split_to(CHUNK)));
    }
    chunks.push(Ok(rest));
    futures::stream::iter(chunks).boxed()
}

const MAX_MEDIA_KEY_LEN: usize = 1024;
const MEDIA_URL_PREFIX: &str = "/media";

/// Local-disk media store.
///
/// Payloads land beneath `base_path/{shard}/{shard}/{key}` where the shards
/// are derived from MD5 of the key. Writes go to a temporary file first and
/// are renamed into place, so readers never observe partial objects.
#[derive(Clone, Debug)]
pub struct DiskMediaStore {
    base_path: PathBuf,
}

impl DiskMediaStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects keys that begin with `/` or contain `..`.
    fn ensure_key_safe(&self, key: &str) -> Result<(), MediaError> {
        if key.is_empty() || key.len() > MAX_MEDIA_KEY_LEN {
            return Err(MediaError::InvalidKey);
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(MediaError::InvalidKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(MediaError::InvalidKey);
        }
        Ok(())
    }

    /// Generate two-level shard identifiers for a key.
    ///
    /// Uses MD5(key) and returns the first two bytes as lowercase hex
    /// strings (00-ff). Reduces file count per directory.
    fn shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Construct a fully-qualified payload path. Parent directories may not
    /// exist yet.
    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Recursively remove empty directories up to the store root.
    ///
    /// Stops when a directory is not empty, is missing, or the root is
    /// reached.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base_path) && current != self.base_path {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl MediaStore for DiskMediaStore {
    /// Stream the payload to a temporary file, then atomically rename into
    /// the final location. Computes the MD5 etag while streaming and cleans
    /// up the temp file on every error path.
    async fn store(
        &self,
        key: &str,
        mut stream: BoxStream<'static, io::Result<Bytes>>,
        expected_len: u64,
        progress: Option<ProgressFn>,
    ) -> Result<StoredMedia, MediaError> {
        self.ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            MediaError::Io(io::Error::other("media path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut written: u64 = 0;
        let mut digest = Context::new();
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(MediaError::Io(err));
                }
            };
            written += chunk.len() as u64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(MediaError::Io(err));
            }
            if let Some(progress) = &progress {
                progress(written, expected_len);
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(MediaError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(MediaError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(MediaError::Io(err));
            }
        }

        debug!("stored media object {} ({} bytes)", key, written);
        Ok(StoredMedia {
            url: format!("{}/{}", MEDIA_URL_PREFIX, key),
            key: key.to_string(),
            size: written as i64,
            etag: format!("{:x}", digest.compute()),
        })
    }

    async fn delete_by_url(&self, url: &str) -> Result<bool, MediaError> {
        let Some(key) = self.key_of(url) else {
            debug!("url {} does not reference this media store", url);
            return Ok(false);
        };
        self.ensure_key_safe(&key)?;
        let file_path = self.object_path(&key);
        match fs::remove_file(&file_path).await {
            Ok(_) => {
                debug!("removed media file {}", file_path.display());
                if let Some(parent) = file_path.parent() {
                    self.prune_empty_dirs(parent).await;
                }
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(MediaError::Io(err)),
        }
    }

    async fn reader(&self, key: &str) -> Result<(MediaMeta, MediaReader), MediaError> {
        self.ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                MediaError::NotFound(key.to_string())
            } else {
                MediaError::Io(err)
            }
        })?;
        let metadata = file.metadata().await?;
        let meta = MediaMeta {
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        };
        Ok((meta, Box::new(file)))
    }

    fn key_of(&self, url: &str) -> Option<String> {
        let key = url.strip_prefix(MEDIA_URL_PREFIX)?.strip_prefix('/')?;
        if key.is_empty() {
            return None;
        }
        Some(key.to_string())
    }
}
