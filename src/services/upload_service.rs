//! src/services/upload_service.rs
//!
//! UploadService — the pipeline that turns an accepted file into stored
//! bytes, a ledger row and a domain record, in that order. Validation and
//! the quota check run before any bytes move; a ledger failure after the
//! bytes are stored is absorbed with a log line rather than unwinding the
//! upload.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::image::{GalleryImage, ImageMetadata, NewStoredImage};
use crate::models::post::BlogPost;
use crate::models::upload::UploadKind;
use crate::services::album_service::AlbumService;
use crate::services::gallery_service::GalleryService;
use crate::services::media_store::{MediaStore, ProgressFn, byte_chunks};
use crate::services::post_service::PostService;
use crate::services::quota_service::{MAX_FILE_SIZE, QuotaService, is_file_size_valid};
use crate::services::{ServiceError, ServiceResult};

/// Content types accepted for image uploads.
pub const ACCEPTED_IMAGE_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/avif",
];

/// One file lifted out of a multipart request, fully buffered.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Clone)]
pub struct UploadService {
    quota: QuotaService,
    gallery: GalleryService,
    albums: AlbumService,
    posts: PostService,
    media: Arc<dyn MediaStore>,
}

impl UploadService {
    pub fn new(
        quota: QuotaService,
        gallery: GalleryService,
        albums: AlbumService,
        posts: PostService,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            quota,
            gallery,
            albums,
            posts,
            media,
        }
    }

    /// Store one gallery upload end to end.
    ///
    /// Order matters: validate, check quota, store the bytes, record the
    /// ledger row, insert the image row, then optionally attach to an
    /// album. The quota check and the ledger write are separate statements;
    /// two concurrent uploads can both pass the check and push a user past
    /// the limit, which is accepted in exchange for lock-free uploads.
    pub async fn store_gallery_image(
        &self,
        user_id: &str,
        user_name: &str,
        file: UploadedFile,
        meta: ImageMetadata,
        album_id: Option<&str>,
    ) -> ServiceResult<GalleryImage> {
        validate_file(&file)?;
        let size = file.bytes.len() as i64;

        let info = self.quota.storage_info(Some(user_id)).await;
        if info.remaining < size {
            return Err(ServiceError::QuotaExceeded {
                needed: size,
                remaining: info.remaining,
            });
        }

        let image_id = Uuid::new_v4().to_string();
        let key = format!("gallery/{}.{}", image_id, extension_for(&file));
        let stored = self
            .media
            .store(
                &key,
                byte_chunks(file.bytes.clone()),
                size as u64,
                Some(log_progress(&key)),
            )
            .await
            .map_err(ServiceError::UploadFailed)?;

        if !self
            .quota
            .record_upload(
                user_id,
                &stored.url,
                &file.filename,
                size,
                UploadKind::Gallery,
                Some(&image_id),
            )
            .await
        {
            warn!("upload {} stored but missing from the ledger", stored.url);
        }

        let title = meta
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| filename_stem(&file.filename));
        let image = self
            .gallery
            .create_image(NewStoredImage {
                id: image_id,
                url: stored.url,
                title,
                description: meta.description,
                category: meta.category,
                tags: meta.tags,
                author_id: user_id.to_string(),
                author_name: user_name.to_string(),
                size,
            })
            .await?;

        if let Some(album_id) = album_id {
            if let Err(err) = self
                .albums
                .add_images(album_id, user_id, std::slice::from_ref(&image.id))
                .await
            {
                warn!(
                    "uploaded image {} could not join album {}: {}",
                    image.id, album_id, err
                );
            }
        }

        Ok(image)
    }

    /// Replace a post's featured image, scoped to the author.
    ///
    /// The old upload is retired first — ledger rows dropped, bytes deleted
    /// best-effort — so the slot is never double-charged while the new file
    /// runs the usual store/record/update sequence. When old and new files
    /// share an extension the old key is reused and the post's URL stays
    /// stable across the swap.
    pub async fn set_featured_image(
        &self,
        post_id: &str,
        user_id: &str,
        file: UploadedFile,
    ) -> ServiceResult<BlogPost> {
        let post = self
            .posts
            .get_post_for_author(post_id, user_id)
            .await?
            .ok_or(ServiceError::NotFoundOrForbidden("post"))?;

        let extension = extension_for(&file);
        let mut reuse_key = None;
        if let Some(old_url) = &post.featured_image {
            if !self.quota.remove_upload(user_id, old_url).await {
                warn!("ledger rows for {} could not be released", old_url);
            }
            match self.media.key_of(old_url) {
                Some(key) if key.ends_with(&format!(".{extension}")) => reuse_key = Some(key),
                _ => match self.media.delete_by_url(old_url).await {
                    Ok(true) => {}
                    Ok(false) => debug!("previous featured image {} was already gone", old_url),
                    Err(err) => {
                        warn!("failed to delete previous featured image {}: {}", old_url, err);
                    }
                },
            }
        }

        validate_file(&file)?;
        let size = file.bytes.len() as i64;
        let info = self.quota.storage_info(Some(user_id)).await;
        if info.remaining < size {
            return Err(ServiceError::QuotaExceeded {
                needed: size,
                remaining: info.remaining,
            });
        }

        let key =
            reuse_key.unwrap_or_else(|| format!("blog/{}.{}", Uuid::new_v4(), extension));
        let stored = self
            .media
            .store(
                &key,
                byte_chunks(file.bytes.clone()),
                size as u64,
                Some(log_progress(&key)),
            )
            .await
            .map_err(ServiceError::UploadFailed)?;

        if !self
            .quota
            .record_upload(
                user_id,
                &stored.url,
                &file.filename,
                size,
                UploadKind::Blog,
                Some(post_id),
            )
            .await
        {
            warn!("upload {} stored but missing from the ledger", stored.url);
        }

        self.posts
            .update_featured_image(post_id, user_id, &stored.url)
            .await
    }
}

/// Reject anything that is not a plausible image upload before any bytes
/// leave the process.
fn validate_file(file: &UploadedFile) -> ServiceResult<()> {
    if !ACCEPTED_IMAGE_TYPES.contains(&file.content_type.as_str()) {
        return Err(ServiceError::InvalidFile(format!(
            "unsupported content type `{}`",
            file.content_type
        )));
    }
    if file.bytes.is_empty() {
        return Err(ServiceError::InvalidFile("file is empty".to_string()));
    }
    let size = file.bytes.len() as i64;
    if !is_file_size_valid(size) {
        return Err(ServiceError::InvalidFile(format!(
            "file is {size} bytes; the per-file limit is {MAX_FILE_SIZE}"
        )));
    }
    Ok(())
}

/// Lowercase extension taken from the filename, falling back to one derived
/// from the declared content type.
fn extension_for(file: &UploadedFile) -> String {
    let from_name = file
        .filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.bytes().all(|b| b.is_ascii_alphanumeric())
        });
    if let Some(ext) = from_name {
        return ext;
    }
    mime_guess::get_mime_extensions_str(&file.content_type)
        .and_then(|extensions| extensions.first())
        .map(|ext| ext.to_string())
        .unwrap_or_else(|| "bin".to_string())
}

fn filename_stem(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => filename.to_string(),
    }
}

fn log_progress(key: &str) -> ProgressFn {
    let key = key.to_string();
    Arc::new(move |written, total| {
        debug!("upload {}: {}/{} bytes", key, written, total);
    })
}
