//! Core data models for the gallery and blog service.
//!
//! These entities represent upload accounting, gallery images, albums,
//! blog posts and reader engagement. They map cleanly to database tables
//! via `sqlx::FromRow` and serialize naturally as JSON via `serde`.

pub mod album;
pub mod comment;
pub mod image;
pub mod post;
pub mod upload;
