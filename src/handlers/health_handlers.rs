//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks DB connectivity and the media store

use crate::services::media_store::byte_chunks;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Runs a lightweight query against SQLite (`SELECT 1`).
/// 2. Performs a best-effort store/read/delete round trip through the media
///    store under a throwaway `healthz/` key.
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    // 1) SQLite check
    let sqlite_check = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*state.db)
        .await
    {
        Ok(v) if v == 1 => (true, None::<String>),
        Ok(v) => (false, Some(format!("unexpected result: {}", v))),
        Err(e) => (false, Some(format!("error: {}", e))),
    };

    // 2) Media store round trip (store a probe object, read it back, delete it)
    let probe_key = format!("healthz/.readyz-{}", Uuid::new_v4());
    let payload = Bytes::from_static(b"readyz");
    let media_check = match state
        .media
        .store(&probe_key, byte_chunks(payload.clone()), payload.len() as u64, None)
        .await
    {
        Ok(stored) => match state.media.reader(&probe_key).await {
            Ok((_, mut reader)) => {
                let mut buf = Vec::new();
                match reader.read_to_end(&mut buf).await {
                    Ok(_) if buf == payload => {
                        // try to remove the probe object; report but do not fail on error
                        match state.media.delete_by_url(&stored.url).await {
                            Ok(_) => (true, None::<String>),
                            Err(e) => (true, Some(format!("could not remove probe object: {}", e))),
                        }
                    }
                    Ok(_) => {
                        let _ = state.media.delete_by_url(&stored.url).await; // best-effort cleanup
                        (false, Some("probe content mismatch".to_string()))
                    }
                    Err(e) => {
                        let _ = state.media.delete_by_url(&stored.url).await; // best-effort cleanup
                        (false, Some(format!("could not read probe object: {}", e)))
                    }
                }
            }
            Err(e) => {
                let _ = state.media.delete_by_url(&stored.url).await; // best-effort cleanup
                (false, Some(format!("could not open probe object: {}", e)))
            }
        },
        Err(e) => (false, Some(format!("could not store probe object: {}", e))),
    };

    // Build response JSON
    let sqlite_ok = sqlite_check.0;
    let media_ok = media_check.0;
    let overall_ok = sqlite_ok && media_ok;

    let mut checks = HashMap::new();
    checks.insert(
        "sqlite",
        CheckStatus {
            ok: sqlite_ok,
            error: sqlite_check.1,
        },
    );
    checks.insert(
        "media",
        CheckStatus {
            ok: media_ok,
            error: media_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
