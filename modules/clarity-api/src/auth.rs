use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";

/// Claims we read from an access token. Other claims are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Verify an HS256 access token. Audience is not checked.
pub fn verify_token(secret: &str, token: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Bearer token from the Authorization header, else the access-token cookie.
pub fn request_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| parse_cookie(cookies, ACCESS_TOKEN_COOKIE))
}

/// Value of cookie `name` from a Cookie header string.
pub fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|part| {
        part.trim()
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
            .filter(|v| !v.is_empty())
    })
}

/// Authenticated caller. Extract this in handlers that act on user data.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let secret = state.config.require_jwt_secret()?;
        let token = request_token(&parts.headers).ok_or_else(ApiError::unauthenticated)?;

        match verify_token(secret, token) {
            Ok(claims) if !claims.sub.is_empty() => Ok(AuthUser {
                user_id: claims.sub,
            }),
            Ok(_) => Err(ApiError::unauthenticated()),
            Err(e) => {
                debug!(error = %e, "Rejected access token");
                Err(ApiError::unauthenticated())
            }
        }
    }
}
