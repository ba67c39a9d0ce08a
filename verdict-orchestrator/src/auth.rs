//! API key authentication
//!
//! Every route except `/health` resolves the caller's tenant from an API
//! key sent either as `Authorization: Bearer <key>` or `X-Api-Key: <key>`.

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};

use crate::api::error::ApiError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// The authenticated tenant behind a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub tenant_id: String,
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = presented_key(&parts.headers).ok_or(ApiError::Unauthorized)?;

        match state.config.api_keys.get(token) {
            Some(tenant_id) => Ok(Caller {
                tenant_id: tenant_id.clone(),
            }),
            None => {
                tracing::debug!("Rejected request with unknown API key");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

/// The API key a request carries, bearer token first
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    bearer
        .or_else(|| {
            headers
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        })
        .filter(|key| !key.is_empty())
}
