//! HTTP handlers, grouped by resource.

pub mod album_handlers;
pub mod comment_handlers;
pub mod gallery_handlers;
pub mod health_handlers;
pub mod media_handlers;
pub mod post_handlers;
pub mod upload_handlers;
