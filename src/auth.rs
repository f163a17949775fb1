use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use sha2::{Digest, Sha256};

use crate::errors::ServiceError;
use crate::AppState;

/// Extractor guarding admin mutation routes. The bearer token is compared
/// against the server-held `admin_api_key`; nothing client-side marks a
/// request as privileged.
pub struct AdminAuth;

/// Credential check over fixed-length digests, so comparison time does
/// not depend on where a wrong token first diverges.
fn tokens_match(candidate: &str, expected: &str) -> bool {
    Sha256::digest(candidate.as_bytes()) == Sha256::digest(expected.as_bytes())
}

#[async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized("Missing authorization header".to_string())
            })?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            ServiceError::Unauthorized("Expected a bearer token".to_string())
        })?;

        if !tokens_match(token, &state.config.admin_api_key) {
            return Err(ServiceError::Unauthorized("Invalid admin token".to_string()));
        }

        Ok(AdminAuth)
    }
}
