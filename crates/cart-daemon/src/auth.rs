//! Session extraction.
//!
//! A handler that takes [`Caller`] only runs for requests carrying a valid
//! session; everything else is answered here with a 401 (or 500 when the
//! verifier itself fails).

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use cart_auth::token_from_headers;
use cart_core::Identity;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated user making the request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Identity);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let authorization = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let cookie = parts.headers.get(COOKIE).and_then(|v| v.to_str().ok());

        let identity = token_from_headers(authorization, cookie)
            .and_then(|token| state.sessions.verify(token))
            .map_err(|e| {
                warn!(error = %e, path = %parts.uri.path(), "session rejected");
                ApiError::from(e)
            })?;

        Ok(Caller(identity))
    }
}
