//! Session resolution against an external auth service.
//!
//! Two modes. With a verify URL configured, bearer tokens are checked by a
//! POST to that URL, retried with exponential backoff on transport errors.
//! Without one, the service trusts `x-user-id`/`x-user-name` headers, for
//! deployments behind a gateway that already authenticated the call. Either
//! way a failure degrades to an anonymous caller; endpoints that need an
//! identity reject the request at extraction time instead.

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::state::AppState;

const VERIFY_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 250;
const BACKOFF_MAX_MS: u64 = 2_000;

/// Resolved caller identity.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
}

/// Caller identity when present; `None` for anonymous callers.
#[derive(Clone, Debug)]
pub struct MaybeUser(pub Option<CurrentUser>);

#[derive(Deserialize)]
struct VerifyResponse {
    user_id: String,
    #[serde(default)]
    user_name: String,
}

#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    verify_url: Option<String>,
}

impl AuthClient {
    pub fn new(verify_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            verify_url,
        }
    }

    /// Resolve the caller's identity from request headers, if any.
    pub async fn resolve(&self, headers: &HeaderMap) -> Option<CurrentUser> {
        match &self.verify_url {
            None => resolve_trusted_headers(headers),
            Some(url) => {
                let token = bearer_token(headers)?;
                self.verify_with_retries(url, token).await
            }
        }
    }

    /// Verify a bearer token, retrying transport failures with exponential
    /// backoff. A definitive rejection from the auth service is not
    /// retried; exhausted retries degrade to anonymous.
    async fn verify_with_retries(&self, url: &str, token: &str) -> Option<CurrentUser> {
        for attempt in 1..=VERIFY_ATTEMPTS {
            match self.verify(url, token).await {
                Ok(user) => return user,
                Err(err) => {
                    warn!("token verification attempt {} failed: {}", attempt, err);
                    if attempt < VERIFY_ATTEMPTS {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                    }
                }
            }
        }
        warn!("token verification exhausted retries; treating caller as anonymous");
        None
    }

    async fn verify(&self, url: &str, token: &str) -> Result<Option<CurrentUser>, reqwest::Error> {
        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await?;
        if !response.status().is_success() {
            debug!("auth service rejected token: {}", response.status());
            return Ok(None);
        }
        let verified: VerifyResponse = response.json().await?;
        let name = if verified.user_name.is_empty() {
            verified.user_id.clone()
        } else {
            verified.user_name
        };
        Ok(Some(CurrentUser {
            id: verified.user_id,
            name,
        }))
    }
}

/// `min(base * 2^(attempt-1), max)` in milliseconds; `attempt` is 1-based.
fn backoff_delay(attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let exp_factor = 2u64.saturating_pow(attempt - 1);
    let delay_ms = BACKOFF_BASE_MS
        .saturating_mul(exp_factor)
        .min(BACKOFF_MAX_MS);
    Duration::from_millis(delay_ms)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn resolve_trusted_headers(headers: &HeaderMap) -> Option<CurrentUser> {
    let id = headers.get("x-user-id")?.to_str().ok()?.trim();
    if id.is_empty() {
        return None;
    }
    let name = headers
        .get("x-user-name")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(id);
    Some(CurrentUser {
        id: id.to_string(),
        name: name.to_string(),
    })
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state
            .auth
            .resolve(&parts.headers)
            .await
            .ok_or_else(AppError::unauthorized)
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(state.auth.resolve(&parts.headers).await))
    }
}
