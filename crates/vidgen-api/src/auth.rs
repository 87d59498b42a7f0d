//! Firebase ID token authentication.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use vidgen_worker::Requester;

use crate::error::ApiError;
use crate::state::AppState;

const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Floor between refreshes triggered by unknown key ids.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Claims of a Firebase ID token that the API reads.
#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseClaims {
    pub sub: String,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
}

/// Authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
}

impl From<FirebaseClaims> for AuthUser {
    fn from(claims: FirebaseClaims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
        }
    }
}

impl AuthUser {
    pub fn requester(&self) -> Requester {
        Requester {
            user_id: self.uid.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkKey>,
}

#[derive(Debug, Deserialize)]
struct JwkKey {
    kid: String,
    n: String,
    e: String,
}

struct KeySet {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
}

/// Signing keys fetched on demand and kept for an hour.
pub struct JwksCache {
    http: Client,
    url: String,
    project_id: String,
    keys: RwLock<KeySet>,
}

impl JwksCache {
    pub fn new(project_id: impl Into<String>, url: impl Into<String>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::internal(format!("http client: {e}")))?;

        Ok(Self {
            http,
            url: url.into(),
            project_id: project_id.into(),
            keys: RwLock::new(KeySet {
                keys: HashMap::new(),
                fetched_at: None,
            }),
        })
    }

    async fn refresh_keys(&self) -> Result<(), ApiError> {
        debug!("Refreshing JWKS keys");
        let jwks: JwksResponse = self
            .http
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::Unavailable(format!("signing keys: {e}")))?
            .json()
            .await
            .map_err(|e| ApiError::Unavailable(format!("signing keys: {e}")))?;

        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys.insert(jwk.kid, key);
                }
                Err(e) => warn!(kid = %jwk.kid, "Skipping unusable JWK: {}", e),
            }
        }

        let mut set = self.keys.write().await;
        debug!("Refreshed {} JWKS keys", keys.len());
        set.keys = keys;
        set.fetched_at = Some(Instant::now());
        Ok(())
    }

    async fn get_key(&self, kid: &str) -> Option<DecodingKey> {
        let (stale, recent, known) = {
            let set = self.keys.read().await;
            let age = set.fetched_at.map(|at| at.elapsed());
            (
                age.map_or(true, |a| a > JWKS_CACHE_TTL),
                age.is_some_and(|a| a < MIN_REFRESH_INTERVAL),
                set.keys.get(kid).cloned(),
            )
        };

        // Rotated keys show up as an unknown kid before the TTL runs out.
        if stale || (known.is_none() && !recent) {
            if let Err(e) = self.refresh_keys().await {
                warn!("Failed to refresh JWKS keys: {}", e);
                return known;
            }
            return self.keys.read().await.keys.get(kid).cloned();
        }
        known
    }

    pub async fn verify_token(&self, token: &str) -> Result<FirebaseClaims, ApiError> {
        let header = decode_header(token)
            .map_err(|e| ApiError::unauthorized(format!("Invalid token header: {e}")))?;
        let kid = header
            .kid
            .ok_or_else(|| ApiError::unauthorized("Token missing key ID"))?;
        let key = self
            .get_key(&kid)
            .await
            .ok_or_else(|| ApiError::unauthorized("Unknown key ID"))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[format!("{}{}", FIREBASE_ISSUER_PREFIX, self.project_id)]);
        validation.set_audience(&[&self.project_id]);

        let data = decode::<FirebaseClaims>(token, &key, &validation)
            .map_err(|e| ApiError::unauthorized(format!("Token validation failed: {e}")))?;
        Ok(data.claims)
    }
}

/// The bearer token of an `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let claims = state.jwks.verify_token(token).await?;
        Ok(AuthUser::from(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[tokio::test]
    async fn test_garbage_token_is_unauthorized_without_fetching_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"keys": []})))
            .expect(0)
            .mount(&server)
            .await;

        let cache = JwksCache::new("vidgen-test", server.uri()).unwrap();
        let err = cache.verify_token("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_unknown_kid_triggers_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"keys": []})))
            .expect(1)
            .mount(&server)
            .await;

        let cache = JwksCache::new("vidgen-test", server.uri()).unwrap();
        assert!(cache.get_key("kid-1").await.is_none());
        // Inside the refresh floor, so no second fetch.
        assert!(cache.get_key("kid-2").await.is_none());
        assert!(cache.keys.read().await.fetched_at.is_some());
    }
}
