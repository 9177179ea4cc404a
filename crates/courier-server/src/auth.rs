//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs whose `sub` claim is the numeric principal id.
//! Handlers take an [`Authenticated`] argument; the request never reaches
//! them without a valid, unexpired token.

use axum::extract::{FromRequestParts, Query};
use axum::http::header;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use courier_core::types::MAX_ID;
use courier_core::Principal;

use crate::api::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub struct TokenVerifier {
    #[cfg(test)]
    encoding: jsonwebtoken::EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            #[cfg(test)]
            encoding: jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Mint a token for `principal` valid for `ttl`.
    #[cfg(test)]
    pub fn issue(&self, principal: Principal, ttl: chrono::Duration) -> Result<String, ApiError> {
        let exp = (chrono::Utc::now() + ttl).timestamp().max(0) as usize;
        let claims = Claims {
            sub: principal.id().to_string(),
            exp,
        };
        jsonwebtoken::encode(
            &jsonwebtoken::Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )
        .map_err(|e| ApiError::Internal(format!("Token error: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Principal, ApiError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            ApiError::Unauthenticated("invalid token".into())
        })?;

        // Subjects must fit storage; they become sender and creator ids.
        match data.claims.sub.parse::<u64>() {
            Ok(id) if id <= MAX_ID => Ok(Principal(id)),
            _ => Err(ApiError::Unauthenticated("invalid subject".into())),
        }
    }
}

/// The principal behind the request's bearer token.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Principal);

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = match bearer_token(&parts.headers)? {
            Some(token) => token,
            None => upgrade_query_token(parts)
                .ok_or_else(|| ApiError::Unauthenticated("missing bearer token".into()))?,
        };

        state.tokens.verify(&token).map(Authenticated)
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthenticated("malformed authorization header".into()))?;

    value
        .strip_prefix("Bearer ")
        .map(|t| Some(t.trim().to_string()))
        .ok_or_else(|| ApiError::Unauthenticated("expected a bearer token".into()))
}

/// Browsers can not set headers on a WebSocket handshake, so upgrades may
/// carry the token as `?token=`.
fn upgrade_query_token(parts: &Parts) -> Option<String> {
    let is_upgrade = parts
        .headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
    if !is_upgrade {
        return None;
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
}
