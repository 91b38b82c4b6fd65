//! Serves stored media bytes.
//! Streams file contents through the media store so whole objects are never
//! buffered in memory.

use crate::{errors::AppError, state::AppState};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use tokio_util::io::ReaderStream;

/// Download a stored object via `GET /media/{*key}` as a streaming response.
pub async fn get_media(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let (meta, reader) = state.media.reader(&key).await?;
    let stream = ReaderStream::new(reader);
    let body = Body::from_stream(stream);

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();

    let mime = mime_guess::from_path(&key).first_or_octet_stream();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.as_ref())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&meta.size.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    if let Some(modified) = meta.modified {
        if let Ok(value) = HeaderValue::from_str(&modified.to_rfc2822()) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }

    Ok(response)
}
